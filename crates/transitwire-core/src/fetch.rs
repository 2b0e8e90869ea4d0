use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::catalog::EndpointDescriptor;
use crate::config::ClientConfig;
use crate::contract::{validate_input, validate_output, Params};
use crate::date_codec::{convert_dates, decode_date, encode_request_date};
use crate::environment::{detect_with, EnvironmentProbe, ProcessProbe, RuntimeEnvironment};
use crate::error::FetchError;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::transport::{
    select_transport, CrossOriginTransport, DirectTransport, Transport, TransportKind,
    TransportOverride,
};
use crate::url_builder::{build_url, redact_access_code, UrlBuildError};

/// Per-call knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchOptions {
    pub transport: TransportOverride,
    /// Replaces the policy-derived request timeout.
    pub timeout: Option<Duration>,
}

impl FetchOptions {
    pub fn with_transport(mut self, transport: TransportOverride) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Single-call pipeline: environment, input contract, URL, transport, dates,
/// output contract. Never retries and never touches the cache.
#[derive(Clone)]
pub struct Fetcher {
    config: Arc<ClientConfig>,
    direct: Arc<dyn Transport>,
    cross_origin: Arc<dyn Transport>,
    probe: Arc<dyn EnvironmentProbe>,
}

impl Fetcher {
    /// Both strategies share `client`; the environment is read from the process.
    pub fn new(config: ClientConfig, client: Arc<dyn HttpClient>) -> Self {
        Self::with_transports(
            config,
            Arc::new(DirectTransport::new(Arc::clone(&client))),
            Arc::new(CrossOriginTransport::with_http_client(client)),
        )
    }

    pub fn with_reqwest(config: ClientConfig) -> Self {
        let client = Arc::new(ReqwestHttpClient::new(config.user_agent()));
        Self::new(config, client)
    }

    pub fn with_transports(
        config: ClientConfig,
        direct: Arc<dyn Transport>,
        cross_origin: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            direct,
            cross_origin,
            probe: Arc::new(ProcessProbe),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn EnvironmentProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn environment(&self) -> RuntimeEnvironment {
        detect_with(self.probe.as_ref())
    }

    /// Fetches `descriptor` and returns the validated, date-normalized payload.
    pub async fn fetch(
        &self,
        descriptor: &EndpointDescriptor,
        params: Params,
        options: &FetchOptions,
    ) -> Result<Value, FetchError> {
        let endpoint = descriptor.id();
        let environment = self.environment();
        let kind = select_transport(environment, options.transport);
        let transport = match kind {
            TransportKind::Direct => &self.direct,
            TransportKind::CrossOrigin => &self.cross_origin,
        };

        let url = self.request_url(descriptor, params)?;
        let timeout = options
            .timeout
            .unwrap_or_else(|| descriptor.settings().request_timeout());

        debug!(
            endpoint,
            domain = descriptor.domain(),
            environment = %environment,
            transport = %kind,
            url = %redact_access_code(&url),
            "fetching"
        );

        let result = transport
            .transport(&url, timeout)
            .await
            .map_err(|e| FetchError::from_transport(endpoint, e))?;

        debug!(
            endpoint,
            transport = %kind,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "transport complete"
        );

        let converted = convert_dates(result.value);
        validate_output(descriptor.output(), converted)
            .map_err(|violation| FetchError::output_validation(endpoint, violation))
    }

    /// [`Fetcher::fetch`] followed by deserialization into `T`.
    ///
    /// A payload that passes the contract but does not fit `T` is an output
    /// validation failure.
    pub async fn fetch_as<T: DeserializeOwned>(
        &self,
        descriptor: &EndpointDescriptor,
        params: Params,
        options: &FetchOptions,
    ) -> Result<T, FetchError> {
        let value = self.fetch(descriptor, params, options).await?;
        serde_json::from_value(value).map_err(|e| {
            FetchError::malformed_output(descriptor.id(), format!("cannot decode payload: {e}"))
        })
    }

    /// Validates `params` and renders the request URL without sending anything.
    pub fn request_url(
        &self,
        descriptor: &EndpointDescriptor,
        params: Params,
    ) -> Result<String, FetchError> {
        let endpoint = descriptor.id();

        let mut params = if params.is_empty() && descriptor.input().accepts_empty_input() {
            params
        } else {
            validate_input(descriptor.input(), params)
                .map_err(|violation| FetchError::input_validation(endpoint, violation))?
        };

        let date_fields: Vec<String> =
            descriptor.input().date_fields().map(str::to_owned).collect();
        for name in date_fields {
            if let Some(Value::String(text)) = params.get(&name) {
                let at = decode_date(text)
                    .map_err(|e| FetchError::invalid_request(endpoint, format!("{name}: {e}")))?;
                params.insert(name, Value::String(encode_request_date(at)));
            }
        }

        build_url(
            self.config.base_url(),
            descriptor.url_template(),
            &params,
            self.config.access_code(),
        )
        .map_err(|e| match e {
            UrlBuildError::MissingParameter { .. } | UrlBuildError::UnsupportedValue { .. } => {
                FetchError::invalid_request(endpoint, e.to_string())
            }
            UrlBuildError::MalformedTemplate { .. } => FetchError::unknown(endpoint, e.to_string()),
        })
    }
}
