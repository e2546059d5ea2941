use crate::error::DestinationError;
use crate::http::{HttpRequest, HttpTransport, RequestBody};
use crate::request_log::{LogChannel, RequestLog};
use chrono::Utc;
use scrobble_sync_config::{TokenRecord, TraktConfig};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Opaque `state` round-tripped through the authorization redirect
pub const OAUTH_STATE: &str = "trakt-sync";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl From<TokenResponse> for TokenRecord {
    fn from(response: TokenResponse) -> Self {
        TokenRecord {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
            created_at: response.created_at.unwrap_or_else(|| Utc::now().timestamp()),
            token_type: response.token_type,
            scope: response.scope,
        }
    }
}

/// URL the user visits to grant access.
pub fn authorization_url(api_url: &str, config: &TraktConfig) -> String {
    format!(
        "{}/oauth/authorize?response_type=code&client_id={}&redirect_uri={}&state={}",
        api_url,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_url),
        OAUTH_STATE
    )
}

pub fn verify_state(state: &str) -> Result<(), DestinationError> {
    if state == OAUTH_STATE {
        Ok(())
    } else {
        Err(DestinationError::Authentication(format!(
            "unexpected OAuth state: {}",
            state
        )))
    }
}

pub(crate) async fn exchange_code(
    transport: &dyn HttpTransport,
    request_log: &RequestLog,
    api_url: &str,
    config: &TraktConfig,
    code: &str,
) -> Result<TokenRecord, DestinationError> {
    let payload = json!({
        "code": code,
        "client_id": config.client_id,
        "client_secret": config.client_secret,
        "redirect_uri": config.redirect_url,
        "grant_type": "authorization_code"
    });
    request_token(transport, request_log, api_url, payload).await
}

pub(crate) async fn refresh_access_token(
    transport: &dyn HttpTransport,
    request_log: &RequestLog,
    api_url: &str,
    config: &TraktConfig,
    refresh_token: &str,
) -> Result<TokenRecord, DestinationError> {
    let payload = json!({
        "refresh_token": refresh_token,
        "client_id": config.client_id,
        "client_secret": config.client_secret,
        "redirect_uri": config.redirect_url,
        "grant_type": "refresh_token"
    });
    request_token(transport, request_log, api_url, payload).await
}

async fn request_token(
    transport: &dyn HttpTransport,
    request_log: &RequestLog,
    api_url: &str,
    payload: Value,
) -> Result<TokenRecord, DestinationError> {
    let request = HttpRequest::post(format!("{}/oauth/token", api_url), RequestBody::Json(payload))
        .header("Content-Type", "application/json")
        .header("Accept", "application/json");

    let response = transport.send(request.clone()).await?;
    request_log.record_exchange(LogChannel::Trakt, &request, &response);

    if !response.is_success() {
        warn!(status = response.status, "Token request rejected");
        return Err(DestinationError::Authentication(format!(
            "token endpoint answered {}",
            response.status
        )));
    }

    let token: TokenResponse = serde_json::from_str(&response.body)?;
    debug!(expires_in = token.expires_in, "Received access token");
    Ok(token.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TraktConfig {
        TraktConfig {
            client_id: "client id".to_string(),
            client_secret: "secret".to_string(),
            redirect_url: "https://sync.example/trakt/callback".to_string(),
        }
    }

    #[test]
    fn test_authorization_url() {
        let url = authorization_url("https://api.trakt.tv", &config());
        assert_eq!(
            url,
            "https://api.trakt.tv/oauth/authorize?response_type=code&client_id=client%20id&redirect_uri=https%3A%2F%2Fsync.example%2Ftrakt%2Fcallback&state=trakt-sync"
        );
    }

    #[test]
    fn test_verify_state() {
        assert!(verify_state("trakt-sync").is_ok());
        assert!(verify_state("other").is_err());
    }

    #[test]
    fn test_token_response_without_created_at() {
        let before = Utc::now().timestamp();
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_in":7776000}"#).unwrap();
        let record = TokenRecord::from(response);
        assert_eq!(record.refresh_token, None);
        assert!(record.created_at >= before);
    }
}
