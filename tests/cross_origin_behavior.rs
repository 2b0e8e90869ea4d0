//! Behavior-driven tests for the callback-wrapped script transport
//!
//! Covers settlement through the HTTP-backed script host, manual delivery through
//! a document-like host, and cleanup of callbacks and elements on every exit path.

mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use support::{params, vessel_by_id, vessel_locations, BASE_URL, VESSEL_LOCATIONS_BODY};
use transitwire_core::{
    CallbackRegistry, CrossOriginTransport, DirectTransport, FetchErrorKind, FetchOptions, Fetcher,
    FixedProbe, FixtureHttpClient, Params, ScriptElement, ScriptHost, Transport, TransportError,
    TransportKind,
};

/// Fetcher in a browser environment whose cross-origin transport stays observable.
fn browser_fetcher(client: Arc<FixtureHttpClient>) -> (Fetcher, Arc<CrossOriginTransport>) {
    let cross_origin = Arc::new(CrossOriginTransport::with_http_client(client.clone()));
    let fetcher = Fetcher::with_transports(
        support::config(),
        Arc::new(DirectTransport::new(client)),
        cross_origin.clone(),
    )
    .with_probe(Arc::new(FixedProbe::browser()));
    (fetcher, cross_origin)
}

/// Document stand-in: records injected elements and lets the test fire callbacks.
#[derive(Default)]
struct RecordingHost {
    attached: Mutex<Vec<(ScriptElement, CallbackRegistry)>>,
    removed: Mutex<Vec<String>>,
}

impl RecordingHost {
    fn attached(&self) -> Vec<ScriptElement> {
        self.attached
            .lock()
            .expect("lock")
            .iter()
            .map(|(element, _)| element.clone())
            .collect()
    }

    fn registry(&self) -> Option<CallbackRegistry> {
        self.attached
            .lock()
            .expect("lock")
            .first()
            .map(|(_, registry)| registry.clone())
    }

    async fn wait_for_injection(&self) -> ScriptElement {
        loop {
            if let Some(element) = self.attached().into_iter().next() {
                return element;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

impl ScriptHost for RecordingHost {
    fn inject_script(&self, element: ScriptElement, registry: CallbackRegistry) {
        self.attached.lock().expect("lock").push((element, registry));
    }

    fn remove_script(&self, id: &str) -> bool {
        let mut attached = self.attached.lock().expect("lock");
        let before = attached.len();
        attached.retain(|(element, _)| element.id != id);
        self.removed.lock().expect("lock").push(id.to_owned());
        attached.len() != before
    }

    fn active_scripts(&self) -> usize {
        self.attached.lock().expect("lock").len()
    }
}

// =============================================================================
// Cross-origin Transport: Timeout and Cleanup
// =============================================================================

#[tokio::test]
async fn when_script_never_loads_call_times_out_and_leaves_nothing_behind() {
    // Given: a browser environment where the remote never answers
    let client = Arc::new(FixtureHttpClient::new().with_hang("/vessellocations"));
    let (fetcher, cross_origin) = browser_fetcher(client);

    // When: the call runs with a short timeout
    let options = FetchOptions::default().with_timeout(Duration::from_millis(30));
    let err = fetcher
        .fetch(&vessel_locations(), Params::new(), &options)
        .await
        .expect_err("must time out");

    // Then: the failure is a network error and no callback or element survives
    assert_eq!(err.kind(), FetchErrorKind::Network);
    assert!(err.retryable());
    assert!(cross_origin.registry().is_empty());
    assert_eq!(cross_origin.active_scripts(), 0);
}

#[tokio::test]
async fn when_transport_times_out_error_carries_the_budget() {
    // Given: a hanging remote
    let client = Arc::new(FixtureHttpClient::new().with_hang("/slow"));
    let transport = CrossOriginTransport::with_http_client(client);

    // When: the transport is called with a 25ms budget
    let err = transport
        .transport(&format!("{BASE_URL}/slow"), Duration::from_millis(25))
        .await
        .expect_err("must time out");

    // Then: the timeout is reported as such
    assert_eq!(err, TransportError::Timeout { timeout_ms: 25 });
    assert_eq!(transport.kind(), TransportKind::CrossOrigin);
}

#[tokio::test]
async fn when_caller_drops_the_future_callback_and_element_are_released() {
    // Given: a document-like host that never loads anything
    let host = Arc::new(RecordingHost::default());
    let transport = CrossOriginTransport::new(host.clone());

    // When: the caller gives up before the budget elapses
    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        transport.transport("https://example.test/x", Duration::from_secs(60)),
    )
    .await;

    // Then: the guard ran on drop
    assert!(abandoned.is_err());
    assert!(transport.registry().is_empty());
    assert_eq!(host.active_scripts(), 0);
    assert_eq!(host.removed.lock().expect("lock").len(), 1);
}

#[tokio::test]
async fn when_script_fails_to_load_status_is_reported_and_cleanup_runs() {
    // Given: a remote answering 500 to the script request
    let client = Arc::new(FixtureHttpClient::new().with_status("/vesselbasics/1", 500, "oops"));
    let (fetcher, cross_origin) = browser_fetcher(client);

    // When: the endpoint is fetched
    let err = fetcher
        .fetch(&vessel_by_id(), params(json!({ "VesselID": 1 })), &FetchOptions::default())
        .await
        .expect_err("must fail");

    // Then: the status survives classification and nothing leaks
    assert_eq!(err.kind(), FetchErrorKind::Status);
    assert_eq!(err.status_code(), Some(500));
    assert!(cross_origin.registry().is_empty());
    assert_eq!(cross_origin.active_scripts(), 0);
}

#[test]
fn when_script_body_is_not_a_callback_invocation_it_is_rejected() {
    // Given: a registry with nothing pending
    let registry = CallbackRegistry::new();

    // When: a body arrives that is not `name(<json>)`
    let outcome = registry.execute_script("document.write('hi')");

    // Then: it is rejected as undecodable
    assert!(matches!(outcome, Err(TransportError::Decode { .. })));
}

// =============================================================================
// Cross-origin Transport: Settlement
// =============================================================================

#[tokio::test]
async fn when_script_loads_payload_is_delivered_and_normalized() {
    // Given: a browser environment and a JSONP-capable remote
    let client = Arc::new(
        FixtureHttpClient::new().with_json("/vessellocations", VESSEL_LOCATIONS_BODY),
    );
    let (fetcher, cross_origin) = browser_fetcher(client.clone());

    // When: the endpoint is fetched
    let data = fetcher
        .fetch(&vessel_locations(), Params::new(), &FetchOptions::default())
        .await
        .expect("fetch succeeds");

    // Then: the payload arrived through the callback and passed the pipeline
    assert_eq!(data[1]["VesselName"], "Kitsap");
    assert_eq!(data[1]["TimeStamp"], "2023-11-14T22:13:20.000Z");
    assert!(client.requests()[0].contains("callback=__transitwire_cb_"));
    assert!(cross_origin.registry().is_empty());
    assert_eq!(cross_origin.active_scripts(), 0);
}

#[tokio::test]
async fn when_calls_overlap_each_gets_its_own_callback() {
    // Given: two endpoints answered by the same script host
    let client = Arc::new(
        FixtureHttpClient::new()
            .with_json("/a", r#"{"which":"a"}"#)
            .with_json("/b", r#"{"which":"b"}"#),
    );
    let transport = CrossOriginTransport::with_http_client(client.clone());
    let timeout = Duration::from_secs(5);

    // When: both calls run concurrently
    let url_a = format!("{BASE_URL}/a");
    let url_b = format!("{BASE_URL}/b");
    let (a, b) = tokio::join!(
        transport.transport(&url_a, timeout),
        transport.transport(&url_b, timeout),
    );

    // Then: each resolves with its own payload under a distinct callback name
    assert_eq!(a.expect("a succeeds").value, json!({ "which": "a" }));
    assert_eq!(b.expect("b succeeds").value, json!({ "which": "b" }));
    let requests = client.requests();
    let callbacks: Vec<&str> = requests
        .iter()
        .filter_map(|url| url.split("callback=").nth(1))
        .collect();
    assert_eq!(callbacks.len(), 2);
    assert_ne!(callbacks[0], callbacks[1]);
    assert!(transport.registry().is_empty());
}

#[tokio::test]
async fn when_host_fires_callback_manually_call_resolves_exactly_once() {
    // Given: a document-like host the test controls
    let host = Arc::new(RecordingHost::default());
    let transport = Arc::new(CrossOriginTransport::new(host.clone()));

    // When: a call is in flight and the test fires its callback
    let in_flight = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move {
            transport
                .transport("https://example.test/vessels?apiaccesscode=k", Duration::from_secs(5))
                .await
        })
    };
    let element = host.wait_for_injection().await;
    let registry = host.registry().expect("registry handed to host");
    assert!(element.src.ends_with(&format!("callback={}", element.callback)));
    assert!(element.id.starts_with("transitwire-script-"));
    assert!(registry.deliver(&element.callback, json!({ "ok": true })));

    // Then: the call resolves with the delivered value
    let result = in_flight.await.expect("task joins").expect("delivered");
    assert_eq!(result.value, json!({ "ok": true }));

    // And: a late second invocation is ignored
    assert!(!registry.deliver(&element.callback, json!({ "ok": false })));
    assert!(!registry.is_registered(&element.callback));
    assert_eq!(host.active_scripts(), 0);
    assert_eq!(host.removed.lock().expect("lock").as_slice(), [element.id]);
}
