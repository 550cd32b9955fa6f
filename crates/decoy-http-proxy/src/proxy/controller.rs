//! Mode controller: per-request dispatch on the current proxy mode.
//!
//! The mode is read once when a request is dispatched, so switching modes
//! never affects requests already in flight. Store and journal writes happen
//! after the last await of a flow, in one synchronous step.

use super::upstream::Upstream;
use crate::behaviors::apply_delay;
use crate::error::ProxyError;
use crate::matching::{find_match, MatchingStrategy};
use crate::middleware::Middleware;
use crate::recording::{capture_pair, Journal, JournalEntry, Mode, ModeHandle, PairStore, DEFAULT_ENTRY_LIMIT};
use crate::request::RequestDetails;
use crate::simulation::{Pair, ResponseTemplate, Simulation};
use arc_swap::ArcSwapOption;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Per-controller behaviour knobs.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Status returned when nothing matches in a simulating mode.
    pub no_match_status: u16,
    /// Header names captured into recorded pairs; `*` captures all.
    pub capture_headers: Vec<String>,
    /// Replace an existing pair with an identical matcher instead of appending.
    pub overwrite_duplicate: bool,
    /// Store the measured upstream latency as the captured response's `fixedDelay`.
    pub capture_delay: bool,
    pub matching_strategy: MatchingStrategy,
    pub journal_entry_limit: Option<usize>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            no_match_status: 502,
            capture_headers: Vec::new(),
            overwrite_duplicate: false,
            capture_delay: false,
            matching_strategy: MatchingStrategy::default(),
            journal_entry_limit: Some(DEFAULT_ENTRY_LIMIT),
        }
    }
}

/// Result of one dispatch, tagged with the mode that served it.
#[derive(Debug)]
pub struct Dispatched {
    pub mode: Mode,
    pub result: Result<ResponseTemplate, ProxyError>,
}

pub struct ModeController {
    mode: ModeHandle,
    store: PairStore,
    journal: Journal,
    upstream: Arc<dyn Upstream>,
    middleware: ArcSwapOption<Middleware>,
    settings: ControllerSettings,
}

impl ModeController {
    pub fn new(mode: ModeHandle, upstream: Arc<dyn Upstream>, settings: ControllerSettings) -> Self {
        Self {
            mode,
            store: PairStore::default(),
            journal: Journal::new(settings.journal_entry_limit),
            upstream,
            middleware: ArcSwapOption::empty(),
            settings,
        }
    }

    pub fn with_middleware(self, middleware: Middleware) -> Self {
        self.set_middleware(Some(middleware));
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode.get()
    }

    /// Switch modes, returning the previous one.
    pub fn set_mode(&self, mode: Mode) -> Mode {
        let previous = self.mode.set(mode);
        if previous != mode {
            info!(from = %previous, to = %mode, "Mode changed");
        }
        previous
    }

    pub fn mode_handle(&self) -> &ModeHandle {
        &self.mode
    }

    pub fn set_middleware(&self, middleware: Option<Middleware>) {
        self.middleware.store(middleware.map(Arc::new));
    }

    pub fn middleware(&self) -> Option<Arc<Middleware>> {
        self.middleware.load_full()
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn store(&self) -> &PairStore {
        &self.store
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Replace the simulation from a document. On error nothing changes.
    pub fn import_simulation(&self, document: &str) -> Result<usize, ProxyError> {
        self.store.import_json(document)
    }

    pub fn export_simulation(&self) -> Result<String, serde_json::Error> {
        self.store.export_json()
    }

    pub fn replace_pairs(&self, pairs: Vec<Pair>) {
        self.store.replace_pairs(pairs);
    }

    pub fn pairs(&self) -> Vec<Pair> {
        self.store.pairs()
    }

    /// Dispatch one request according to the current mode.
    pub async fn handle(&self, request: &RequestDetails) -> Dispatched {
        let mode = self.mode.get();
        debug!(
            mode = %mode,
            method = %request.method,
            destination = %request.destination,
            path = %request.path,
            "Dispatching request"
        );

        let result = match mode {
            Mode::Simulate => self.simulate(request).await,
            Mode::Capture => self.capture(request, mode).await,
            Mode::Modify => self.modify(request).await,
            Mode::Synthesize => self.synthesize(request).await,
            Mode::Spy => self.spy(request).await,
        };
        Dispatched { mode, result }
    }

    async fn simulate(&self, request: &RequestDetails) -> Result<ResponseTemplate, ProxyError> {
        let snapshot = self.store.snapshot();
        let found = find_match(&snapshot, request, self.settings.matching_strategy);
        match found.pair {
            Some(pair) => {
                delay(&snapshot, request, &pair.response).await;
                Ok(pair.response)
            }
            None => Err(ProxyError::NoMatch {
                closest_miss: found.closest_miss.map(|miss| miss.to_string()),
            }),
        }
    }

    async fn spy(&self, request: &RequestDetails) -> Result<ResponseTemplate, ProxyError> {
        let snapshot = self.store.snapshot();
        let found = find_match(&snapshot, request, self.settings.matching_strategy);
        match found.pair {
            Some(pair) => {
                delay(&snapshot, request, &pair.response).await;
                Ok(pair.response)
            }
            None => self.capture(request, Mode::Spy).await,
        }
    }

    async fn capture(&self, request: &RequestDetails, mode: Mode) -> Result<ResponseTemplate, ProxyError> {
        let time_started = Utc::now();
        let start = Instant::now();
        let response = self
            .upstream
            .forward(request)
            .await
            .map_err(|e| ProxyError::UpstreamUnavailable(e.to_string()))?;
        let latency_ms = start.elapsed().as_millis() as u64;

        let mut recorded = response.clone();
        if self.settings.capture_delay {
            recorded.fixed_delay = latency_ms;
        }
        let pair = capture_pair(request, &recorded, &self.settings.capture_headers);
        let replaced = self.store.record(pair, self.settings.overwrite_duplicate);
        self.journal.append(JournalEntry {
            request: request.clone(),
            response: response.clone(),
            mode,
            time_started,
            latency_ms,
        });
        debug!(
            mode = %mode,
            destination = %request.destination,
            path = %request.path,
            status = response.status,
            replaced,
            "Captured exchange"
        );
        Ok(response)
    }

    fn require_middleware(&self) -> Result<Arc<Middleware>, ProxyError> {
        self.middleware.load_full().ok_or_else(|| {
            ProxyError::MiddlewareUnavailable("no middleware configured".to_string())
        })
    }

    async fn modify(&self, request: &RequestDetails) -> Result<ResponseTemplate, ProxyError> {
        let middleware = self.require_middleware()?;
        let real = self
            .upstream
            .forward(request)
            .await
            .map_err(|e| ProxyError::UpstreamUnavailable(e.to_string()))?;
        let output = middleware.run(request, Some(&real)).await?;
        let response = output.response.unwrap_or(real);

        delay(&self.store.snapshot(), request, &response).await;
        Ok(response)
    }

    async fn synthesize(&self, request: &RequestDetails) -> Result<ResponseTemplate, ProxyError> {
        let middleware = self.require_middleware()?;
        let output = middleware.run(request, None).await?;
        let response = output.response.ok_or_else(|| {
            ProxyError::MiddlewareInvalidOutput("middleware returned no response".to_string())
        })?;

        delay(&self.store.snapshot(), request, &response).await;
        Ok(response)
    }
}

/// Wait for the response's own delay plus any global rule of the snapshot.
async fn delay(snapshot: &Simulation, request: &RequestDetails, response: &ResponseTemplate) {
    apply_delay(
        &snapshot.delays,
        &snapshot.delays_log_normal,
        &request.destination,
        &request.method,
        response.delay(),
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::upstream::UpstreamError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingUpstream {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Upstream for CountingUpstream {
        async fn forward(&self, request: &RequestDetails) -> Result<ResponseTemplate, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ResponseTemplate::new(200, format!("real {}", request.path)))
        }
    }

    fn controller(mode: Mode) -> (ModeController, Arc<CountingUpstream>) {
        controller_with(mode, ControllerSettings::default())
    }

    fn controller_with(mode: Mode, settings: ControllerSettings) -> (ModeController, Arc<CountingUpstream>) {
        let upstream = Arc::new(CountingUpstream {
            calls: AtomicUsize::new(0),
        });
        let controller = ModeController::new(ModeHandle::new(mode), upstream.clone(), settings);
        (controller, upstream)
    }

    fn request(path: &str) -> RequestDetails {
        RequestDetails {
            scheme: "http".into(),
            destination: "destination.com".into(),
            method: "GET".into(),
            path: path.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_simulate_never_contacts_upstream() {
        let (controller, upstream) = controller(Mode::Simulate);
        let dispatched = controller.handle(&request("/a")).await;
        assert_eq!(dispatched.mode, Mode::Simulate);
        assert!(matches!(dispatched.result, Err(ProxyError::NoMatch { .. })));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_capture_records_pair_and_journal() {
        let (controller, upstream) = controller(Mode::Capture);
        let response = controller.handle(&request("/a")).await.result.unwrap();
        assert_eq!(response.body, "real /a");
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        assert_eq!(controller.pairs().len(), 1);
        assert_eq!(controller.journal().len(), 1);

        controller.set_mode(Mode::Simulate);
        let replayed = controller.handle(&request("/a")).await.result.unwrap();
        assert_eq!(replayed.body, "real /a");
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_spy_captures_only_misses() {
        let (controller, upstream) = controller(Mode::Spy);
        controller.handle(&request("/a")).await.result.unwrap();
        controller.handle(&request("/a")).await.result.unwrap();
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        assert_eq!(controller.pairs().len(), 1);
        assert_eq!(controller.journal().entries()[0].mode, Mode::Spy);
    }

    #[tokio::test]
    async fn test_modify_and_synthesize_require_middleware() {
        let (controller, upstream) = controller(Mode::Modify);
        let err = controller.handle(&request("/a")).await.result.unwrap_err();
        assert!(matches!(err, ProxyError::MiddlewareUnavailable(_)));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);

        controller.set_mode(Mode::Synthesize);
        let err = controller.handle(&request("/a")).await.result.unwrap_err();
        assert!(matches!(err, ProxyError::MiddlewareUnavailable(_)));
    }

    #[tokio::test]
    async fn test_synthesize_with_identity_middleware_has_no_response() {
        let (controller, _) = controller(Mode::Synthesize);
        controller.set_middleware(Some(
            Middleware::from_target("cat", crate::middleware::DEFAULT_TIMEOUT).unwrap(),
        ));
        let err = controller.handle(&request("/a")).await.result.unwrap_err();
        assert!(matches!(err, ProxyError::MiddlewareInvalidOutput(_)));
    }

    #[tokio::test]
    async fn test_modify_does_not_touch_store() {
        let (controller, upstream) = controller(Mode::Modify);
        controller.set_middleware(Some(
            Middleware::from_target("cat", crate::middleware::DEFAULT_TIMEOUT).unwrap(),
        ));
        let response = controller.handle(&request("/m")).await.result.unwrap();
        assert_eq!(response.body, "real /m");
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        assert!(controller.pairs().is_empty());
        assert!(controller.journal().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_records_latency_as_fixed_delay() {
        struct SlowUpstream;

        #[async_trait]
        impl Upstream for SlowUpstream {
            async fn forward(&self, _request: &RequestDetails) -> Result<ResponseTemplate, UpstreamError> {
                tokio::time::sleep(Duration::from_millis(150)).await;
                Ok(ResponseTemplate::new(200, "slow"))
            }
        }

        let settings = ControllerSettings {
            capture_delay: true,
            ..Default::default()
        };
        let controller = ModeController::new(ModeHandle::new(Mode::Capture), Arc::new(SlowUpstream), settings);
        let response = controller.handle(&request("/slow")).await.result.unwrap();
        assert_eq!(response.fixed_delay, 0);
        assert!(controller.pairs()[0].response.fixed_delay >= 150);

        controller.set_mode(Mode::Simulate);
        let start = tokio::time::Instant::now();
        controller.handle(&request("/slow")).await.result.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulate_applies_response_fixed_delay() {
        let (controller, _) = controller(Mode::Simulate);
        let mut response = ResponseTemplate::new(200, "late");
        response.fixed_delay = 300;
        controller.replace_pairs(vec![Pair::new(
            crate::predicate::RequestMatcher::default(),
            response,
        )]);

        let start = tokio::time::Instant::now();
        let served = controller.handle(&request("/late")).await.result.unwrap();
        assert_eq!(served.body, "late");
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_first_matching_strategy_setting() {
        use crate::predicate::{FieldSpec, RequestMatcher};

        let pairs = || {
            vec![
                Pair::new(
                    RequestMatcher {
                        path: FieldSpec::exact("/a"),
                        ..Default::default()
                    },
                    ResponseTemplate::new(200, "loose"),
                ),
                Pair::new(
                    RequestMatcher {
                        path: FieldSpec::exact("/a"),
                        method: FieldSpec::exact("GET"),
                        ..Default::default()
                    },
                    ResponseTemplate::new(200, "strict"),
                ),
            ]
        };

        let (strongest, _) = controller(Mode::Simulate);
        strongest.replace_pairs(pairs());
        assert_eq!(strongest.handle(&request("/a")).await.result.unwrap().body, "strict");

        let settings = ControllerSettings {
            matching_strategy: MatchingStrategy::First,
            ..Default::default()
        };
        let (first, _) = controller_with(Mode::Simulate, settings);
        first.replace_pairs(pairs());
        assert_eq!(first.handle(&request("/a")).await.result.unwrap().body, "loose");
    }
}
