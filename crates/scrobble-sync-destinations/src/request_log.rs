//! Append-only audit logs of everything sent to and received from destinations.
//!
//! These files are the only record of past destination calls; history views
//! are rebuilt from them by parsing the line format written here.

use crate::http::{HttpRequest, HttpResponse};
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

const REDACTED: &str = "[redacted]";

const SECRET_HEADERS: &[&str] = &["authorization", "cookie", "trakt-api-key"];
const SECRET_FIELDS: &[&str] = &["__csrf", "access_token", "refresh_token", "client_secret", "code"];

/// String values of secret fields inside a raw JSON body
static SECRET_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(__csrf|access_token|refresh_token|client_secret|code)"\s*:\s*"(?:[^"\\]|\\.)*""#)
        .expect("secret value regex should compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogChannel {
    /// Raw webhook payloads as received
    Incoming,
    Trakt,
    Letterboxd,
    /// Diary entries that were resubmitted by hand
    LetterboxdRetries,
}

impl LogChannel {
    /// File name prefix; files are named `<prefix>.<date>.log`
    pub fn file_prefix(&self) -> &'static str {
        match self {
            LogChannel::Incoming => "incoming",
            LogChannel::Trakt => "trakt",
            LogChannel::Letterboxd => "letterboxd",
            LogChannel::LetterboxdRetries => "retries-letterboxd",
        }
    }

    /// Channel name written after the timestamp
    pub fn channel_name(&self) -> &'static str {
        match self {
            LogChannel::Incoming => "incoming",
            LogChannel::Trakt => "trakt",
            LogChannel::Letterboxd => "letterboxd",
            LogChannel::LetterboxdRetries => "letterboxd_retries",
        }
    }
}

/// Format one log line: `[<timestamp>] <channel>.INFO: <message>`.
///
/// Line breaks inside the message are flattened so every record stays on one line.
pub fn format_line(channel: LogChannel, at: DateTime<Utc>, message: &str) -> String {
    let flattened = message.replace("\r\n", " ").replace(['\n', '\r'], " ");
    format!(
        "[{}] {}.INFO: {}\n",
        at.to_rfc3339_opts(SecondsFormat::Micros, false),
        channel.channel_name(),
        flattened
    )
}

fn redact_headers(headers: &[(String, String)]) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        let value = if SECRET_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            REDACTED.to_string()
        } else {
            value.clone()
        };
        map.insert(name.clone(), Value::String(value));
    }
    Value::Object(map)
}

fn redact_fields(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    if SECRET_FIELDS.contains(&k.as_str()) {
                        (k, Value::String(REDACTED.to_string()))
                    } else {
                        (k, redact_fields(v))
                    }
                })
                .collect(),
        ),
        other => other,
    }
}

/// Message body of an exchange line.
pub fn exchange_message(request: &HttpRequest, response: &HttpResponse) -> String {
    let post_data = request
        .body
        .as_ref()
        .map(|body| redact_fields(body.to_json()))
        .unwrap_or_else(|| Value::Object(Map::new()));
    // Logged as received apart from secret values
    let response_body = SECRET_VALUE.replace_all(response.body.trim(), "\"$1\":\"[redacted]\"");

    format!(
        "LastResponseCode: {} | Endpoint: {} | Headers: {} | PostData: {} | Response: {}",
        response.status,
        request.url,
        redact_headers(&request.headers),
        post_data,
        response_body
    )
}

/// Daily rolling log files, one series per channel.
pub struct RequestLog {
    dir: PathBuf,
    appenders: Mutex<HashMap<LogChannel, RollingFileAppender>>,
}

impl RequestLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            appenders: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Log one request/response exchange.
    pub fn record_exchange(&self, channel: LogChannel, request: &HttpRequest, response: &HttpResponse) {
        self.append(channel, &exchange_message(request, response));
    }

    /// Log a bare JSON payload (incoming webhooks, retry markers).
    pub fn record_payload(&self, channel: LogChannel, payload: &Value) {
        self.append(channel, &payload.to_string());
    }

    /// Log a raw payload string as received.
    pub fn record_raw(&self, channel: LogChannel, payload: &str) {
        self.append(channel, payload);
    }

    /// Write failures are logged and swallowed; auditing never fails a sync.
    fn append(&self, channel: LogChannel, message: &str) {
        let line = format_line(channel, Utc::now(), message);

        let mut appenders = match self.appenders.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if !appenders.contains_key(&channel) {
            let built = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(channel.file_prefix())
                .filename_suffix("log")
                .build(&self.dir);
            match built {
                Ok(appender) => {
                    appenders.insert(channel, appender);
                }
                Err(e) => {
                    warn!(channel = channel.channel_name(), dir = ?self.dir, "Failed to open request log: {}", e);
                    return;
                }
            }
        }

        if let Some(appender) = appenders.get_mut(&channel) {
            if let Err(e) = appender.write_all(line.as_bytes()).and_then(|_| appender.flush()) {
                warn!(channel = channel.channel_name(), "Failed to write request log: {}", e);
            }
        }
    }
}
