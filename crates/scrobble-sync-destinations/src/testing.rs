//! Scripted transport for exercising adapters without a network.

use crate::error::DestinationError;
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Answers requests from a queue, in order, and records every request sent.
///
/// An exhausted queue answers `500` with an empty body.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, DestinationError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, body: impl Into<String>) -> &Self {
        self.lock_responses().push_back(Ok(HttpResponse {
            status,
            headers: Vec::new(),
            url: String::new(),
            body: body.into(),
        }));
        self
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.lock_responses()
            .push_back(Err(DestinationError::Transport(message.to_string())));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests().len()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<HttpResponse, DestinationError>>> {
        match self.responses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, DestinationError> {
        let url = request.url.clone();
        match self.requests.lock() {
            Ok(mut guard) => guard.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }

        let next = self.lock_responses().pop_front();
        match next {
            Some(Ok(mut response)) => {
                response.url = url;
                Ok(response)
            }
            Some(Err(e)) => Err(e),
            None => Ok(HttpResponse {
                status: 500,
                headers: Vec::new(),
                url,
                body: String::new(),
            }),
        }
    }
}
