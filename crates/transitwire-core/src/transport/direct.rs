use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::{Transport, TransportError, TransportKind, TransportResult};
use crate::http_client::{HttpClient, HttpRequest};
use crate::url_builder::redact_access_code;

const MAX_ERROR_BODY: usize = 200;

/// Plain HTTP GET with an enforced timeout.
#[derive(Clone)]
pub struct DirectTransport {
    client: Arc<dyn HttpClient>,
}

impl DirectTransport {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }
}

impl Transport for DirectTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Direct
    }

    fn transport<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResult, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let started = Instant::now();
            let request = HttpRequest::get(url)
                .with_header("accept", "application/json")
                .with_timeout(timeout);

            // The client timeout is advisory; this one is not.
            let response = tokio::time::timeout(timeout, self.client.execute(request))
                .await
                .map_err(|_| TransportError::timeout(timeout))??;

            debug!(
                url = %redact_access_code(url),
                status = response.status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "direct transport response"
            );

            if !response.is_success() {
                return Err(TransportError::Status {
                    status: response.status,
                    message: truncate(&response.body),
                });
            }

            let value = serde_json::from_str(&response.body).map_err(|e| TransportError::Decode {
                message: e.to_string(),
            })?;

            Ok(TransportResult {
                value,
                elapsed: started.elapsed(),
            })
        })
    }
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_owned(),
    }
}
