//! Callback-wrapped script transport for callers that cannot read cross-origin responses.
//!
//! Each call registers a uniquely named callback, injects a script element whose
//! source carries that name, and waits for the remote body `name(<json>)` to invoke
//! it. A [`ScriptGuard`] unregisters the callback and removes the element on every
//! exit path, including timeout and cancellation of the calling future.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use super::{Transport, TransportError, TransportKind, TransportResult};
use crate::http_client::{HttpClient, HttpRequest};
use crate::url_builder::{append_query, redact_access_code};

/// Query parameter naming the callback the remote must wrap its body in.
pub const CALLBACK_PARAM: &str = "callback";

const CALLBACK_PREFIX: &str = "__transitwire_cb_";
const SCRIPT_ID_PREFIX: &str = "transitwire-script-";

type Settlement = oneshot::Sender<Result<Value, TransportError>>;

/// Global callback table shared between the transport and the script host.
///
/// Settling a callback removes it, so each registration resolves at most once.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    pending: Arc<Mutex<HashMap<String, Settlement>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, name: &str) -> oneshot::Receiver<Result<Value, TransportError>> {
        let (sender, receiver) = oneshot::channel();
        self.lock().insert(name.to_owned(), sender);
        receiver
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.lock().remove(name).is_some()
    }

    /// Fires `name` with a payload. Returns false if it is no longer registered.
    pub fn deliver(&self, name: &str, value: Value) -> bool {
        self.settle(name, Ok(value))
    }

    pub fn fail(&self, name: &str, error: TransportError) -> bool {
        self.settle(name, Err(error))
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Evaluates a script body of the form `name(<json>)`.
    pub fn execute_script(&self, body: &str) -> Result<bool, TransportError> {
        let (name, value) = parse_callback_script(body)?;
        let fired = self.deliver(&name, value);
        if !fired {
            debug!(callback = %name, "script invoked a callback that is no longer registered");
        }
        Ok(fired)
    }

    fn settle(&self, name: &str, outcome: Result<Value, TransportError>) -> bool {
        let Some(sender) = self.lock().remove(name) else {
            return false;
        };
        sender.send(outcome).is_ok()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Settlement>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Splits `name(<json>)` into its callback name and payload.
///
/// Tolerates a leading `/**/` guard and a trailing semicolon.
pub fn parse_callback_script(body: &str) -> Result<(String, Value), TransportError> {
    let mut script = body.trim();
    if let Some(rest) = script.strip_prefix("/**/") {
        script = rest.trim_start();
    }
    script = script.trim_end_matches(';').trim_end();

    let open = script.find('(').ok_or_else(|| decode("script does not call a function"))?;
    let name = script[..open].trim();
    let valid_name = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '$' | '.'));
    if !valid_name {
        return Err(decode("script does not call a named function"));
    }

    let args = script[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| decode("unterminated callback invocation"))?;
    let value = serde_json::from_str(args).map_err(|e| decode(&e.to_string()))?;
    Ok((name.to_owned(), value))
}

fn decode(message: &str) -> TransportError {
    TransportError::Decode {
        message: message.to_owned(),
    }
}

/// Element handed to a [`ScriptHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptElement {
    pub id: String,
    pub src: String,
    pub callback: String,
}

/// Document-like surface able to load script elements.
pub trait ScriptHost: Send + Sync {
    /// Starts loading `element`; the loaded body settles through `registry`.
    fn inject_script(&self, element: ScriptElement, registry: CallbackRegistry);

    /// Returns false if no element with `id` is attached.
    fn remove_script(&self, id: &str) -> bool;

    fn active_scripts(&self) -> usize;
}

/// Script host for non-browser runtimes: loads each element with an HTTP GET on a
/// background task and evaluates the body against the registry.
pub struct HttpScriptHost {
    client: Arc<dyn HttpClient>,
    scripts: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl HttpScriptHost {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            scripts: Mutex::new(HashMap::new()),
        }
    }

    fn scripts(&self) -> std::sync::MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.scripts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ScriptHost for HttpScriptHost {
    fn inject_script(&self, element: ScriptElement, registry: CallbackRegistry) {
        let client = Arc::clone(&self.client);
        let ScriptElement { id, src, callback } = element;

        let task = tokio::spawn(async move {
            let outcome = match client.execute(HttpRequest::get(src)).await {
                Ok(response) if response.is_success() => registry.execute_script(&response.body),
                Ok(response) => Err(TransportError::Status {
                    status: response.status,
                    message: String::from("script failed to load"),
                }),
                Err(error) => Err(TransportError::from(error)),
            };
            if let Err(error) = outcome {
                registry.fail(&callback, error);
            }
        });

        if let Some(previous) = self.scripts().insert(id, task) {
            previous.abort();
        }
    }

    fn remove_script(&self, id: &str) -> bool {
        match self.scripts().remove(id) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    fn active_scripts(&self) -> usize {
        self.scripts().len()
    }
}

/// Releases the callback and the script element when dropped.
struct ScriptGuard<'a> {
    registry: &'a CallbackRegistry,
    host: &'a dyn ScriptHost,
    callback: String,
    element_id: String,
}

impl Drop for ScriptGuard<'_> {
    fn drop(&mut self) {
        self.registry.unregister(&self.callback);
        self.host.remove_script(&self.element_id);
    }
}

#[derive(Clone)]
pub struct CrossOriginTransport {
    host: Arc<dyn ScriptHost>,
    registry: CallbackRegistry,
}

impl CrossOriginTransport {
    pub fn new(host: Arc<dyn ScriptHost>) -> Self {
        Self {
            host,
            registry: CallbackRegistry::new(),
        }
    }

    pub fn with_http_client(client: Arc<dyn HttpClient>) -> Self {
        Self::new(Arc::new(HttpScriptHost::new(client)))
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    pub fn active_scripts(&self) -> usize {
        self.host.active_scripts()
    }
}

impl Transport for CrossOriginTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::CrossOrigin
    }

    fn transport<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResult, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let started = Instant::now();
            let token = Uuid::new_v4().simple().to_string();
            let callback = format!("{CALLBACK_PREFIX}{token}");
            let element_id = format!("{SCRIPT_ID_PREFIX}{token}");

            let mut src = url.to_owned();
            append_query(&mut src, CALLBACK_PARAM, &callback);

            let receiver = self.registry.register(&callback);
            let _guard = ScriptGuard {
                registry: &self.registry,
                host: self.host.as_ref(),
                callback: callback.clone(),
                element_id: element_id.clone(),
            };

            debug!(url = %redact_access_code(&src), callback = %callback, "injecting script");
            self.host.inject_script(
                ScriptElement {
                    id: element_id,
                    src,
                    callback,
                },
                self.registry.clone(),
            );

            let value = match tokio::time::timeout(timeout, receiver).await {
                Ok(Ok(outcome)) => outcome?,
                Ok(Err(_)) => {
                    return Err(TransportError::Aborted {
                        message: String::from("callback was released before it fired"),
                    })
                }
                Err(_) => return Err(TransportError::timeout(timeout)),
            };

            Ok(TransportResult {
                value,
                elapsed: started.elapsed(),
            })
        })
    }
}
