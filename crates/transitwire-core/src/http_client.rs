use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::transport::CALLBACK_PARAM;

/// GET request issued by the transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Raw response; body decoding is left to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Failure below the HTTP status layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
    timed_out: bool,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn timed_out(&self) -> bool {
        self.timed_out
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Async HTTP GET contract shared by the direct transport and the script host.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;
}

/// Production HTTP client backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new(user_agent: &str) -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent(user_agent)
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new(concat!("transitwire/", env!("CARGO_PKG_VERSION")))
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self.client.get(&request.url).timeout(request.timeout);

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::timeout(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    HttpError::new(format!("connection failed: {e}"))
                } else {
                    HttpError::new(format!("request failed: {e}"))
                }
            })?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| HttpError::new(format!("failed to read response body: {e}")))?;

            Ok(HttpResponse { status, body })
        })
    }
}

#[derive(Debug, Clone)]
enum FixtureReply {
    Respond(HttpResponse),
    Fail(HttpError),
    Hang,
}

/// Deterministic offline client: answers by URL fragment and records every request.
///
/// The most recently registered matching fragment wins; unmatched URLs get a 404.
/// Successful replies to URLs carrying a `callback` parameter are wrapped as
/// `callback(<body>);` the way a JSONP endpoint answers.
#[derive(Debug, Default)]
pub struct FixtureHttpClient {
    routes: Mutex<Vec<(String, FixtureReply)>>,
    requests: Mutex<Vec<String>>,
}

impl FixtureHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(self, fragment: impl Into<String>, body: impl Into<String>) -> Self {
        self.set_response(fragment, 200, body);
        self
    }

    pub fn with_status(
        self,
        fragment: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        self.set_response(fragment, status, body);
        self
    }

    pub fn with_error(self, fragment: impl Into<String>, error: HttpError) -> Self {
        self.set_reply(fragment.into(), FixtureReply::Fail(error));
        self
    }

    /// Requests matching `fragment` never complete.
    pub fn with_hang(self, fragment: impl Into<String>) -> Self {
        self.set_reply(fragment.into(), FixtureReply::Hang);
        self
    }

    /// Replaces the reply for `fragment`; usable while requests are in flight.
    pub fn set_response(&self, fragment: impl Into<String>, status: u16, body: impl Into<String>) {
        self.set_reply(
            fragment.into(),
            FixtureReply::Respond(HttpResponse {
                status,
                body: body.into(),
            }),
        );
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_reply(&self, fragment: String, reply: FixtureReply) {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes.retain(|(existing, _)| existing != &fragment);
        routes.push((fragment, reply));
    }

    fn reply_for(&self, url: &str) -> FixtureReply {
        let routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes
            .iter()
            .rev()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| {
                FixtureReply::Respond(HttpResponse {
                    status: 404,
                    body: String::from("{\"Message\":\"not found\"}"),
                })
            })
    }
}

impl HttpClient for FixtureHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request.url.clone());

            match self.reply_for(&request.url) {
                FixtureReply::Respond(mut response) => {
                    if let Some(callback) = callback_name(&request.url) {
                        if response.is_success() {
                            response.body = format!("{callback}({});", response.body);
                        }
                    }
                    Ok(response)
                }
                FixtureReply::Fail(error) => Err(error),
                FixtureReply::Hang => std::future::pending().await,
            }
        })
    }
}

fn callback_name(url: &str) -> Option<&str> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        pair.split_once('=')
            .filter(|(name, _)| *name == CALLBACK_PARAM)
            .map(|(_, value)| value)
    })
}
