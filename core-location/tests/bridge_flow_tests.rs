//! End-to-end flows through a running host: renderer command in, renderer
//! call out, with recording fakes for every platform bridge.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::{
    error::Result as BridgeResult, BridgeError, CancellationToken, EvaluationResult, Fix,
    FixSink, LocationProvider, Notice, Notifier, PermissionCallback, PermissionOutcome,
    PermissionPrompter, PermissionRequestId, PermissionState, PermissionStatus,
    PermissionStore, RendererCall, RendererEndpoint, SubscriptionHandle, TrackingConfig,
};
use core_location::{spawn_host, HostHandle};
use core_runtime::config::HostConfig;
use core_runtime::events::{CoreEvent, EventBus, PermissionEvent};
use tokio::sync::mpsc;

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeProvider {
    live: Mutex<Option<BridgeResult<Fix>>>,
    cached: Mutex<Option<Fix>>,
    sinks: Mutex<Vec<Arc<dyn FixSink>>>,
    request_once_calls: AtomicUsize,
    last_known_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
}

impl FakeProvider {
    fn with_live(result: BridgeResult<Fix>) -> Self {
        let provider = Self::default();
        *provider.live.lock().unwrap() = Some(result);
        provider
    }

    fn calls(&self) -> usize {
        self.request_once_calls.load(Ordering::SeqCst)
            + self.last_known_calls.load(Ordering::SeqCst)
            + self.subscribe_calls.load(Ordering::SeqCst)
            + self.unsubscribe_calls.load(Ordering::SeqCst)
    }

    fn sink(&self) -> Arc<dyn FixSink> {
        self.sinks
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no subscription")
    }
}

#[async_trait]
impl LocationProvider for FakeProvider {
    async fn request_once(&self, _cancel: CancellationToken) -> BridgeResult<Fix> {
        self.request_once_calls.fetch_add(1, Ordering::SeqCst);
        self.live
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(BridgeError::ProviderUnavailable("no live fix".to_string())))
    }

    async fn last_known(&self) -> BridgeResult<Option<Fix>> {
        self.last_known_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.cached.lock().unwrap())
    }

    fn subscribe(
        &self,
        _config: &TrackingConfig,
        sink: Arc<dyn FixSink>,
    ) -> BridgeResult<SubscriptionHandle> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.sinks.lock().unwrap().push(sink);
        Ok(SubscriptionHandle::new())
    }

    fn unsubscribe(&self, _handle: SubscriptionHandle) -> BridgeResult<()> {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeStore {
    status: Mutex<PermissionStatus>,
    pending: Mutex<Option<(PermissionRequestId, Arc<dyn PermissionCallback>)>>,
}

impl FakeStore {
    fn new(status: PermissionStatus) -> Self {
        Self {
            status: Mutex::new(status),
            pending: Mutex::new(None),
        }
    }

    /// Answer the outstanding dialog the way the OS would.
    fn answer(&self, granted: bool, can_ask_again: bool) {
        let (request_id, callback) = self.pending.lock().unwrap().take().expect("no dialog");
        *self.status.lock().unwrap() = if granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied { can_ask_again }
        };
        callback.on_result(PermissionOutcome {
            request_id,
            granted,
            can_ask_again,
        });
    }

    fn dialog_open(&self) -> bool {
        self.pending.lock().unwrap().is_some()
    }
}

impl PermissionStore for FakeStore {
    fn check(&self) -> PermissionStatus {
        *self.status.lock().unwrap()
    }

    fn request(
        &self,
        request_id: PermissionRequestId,
        callback: Arc<dyn PermissionCallback>,
    ) -> BridgeResult<()> {
        *self.pending.lock().unwrap() = Some((request_id, callback));
        Ok(())
    }
}

#[derive(Default)]
struct FakePrompter {
    accept_rationale: bool,
    rationales: AtomicUsize,
    settings: AtomicUsize,
}

#[async_trait]
impl PermissionPrompter for FakePrompter {
    async fn show_rationale(&self) -> bool {
        self.rationales.fetch_add(1, Ordering::SeqCst);
        self.accept_rationale
    }

    async fn offer_settings(&self) -> BridgeResult<()> {
        self.settings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct ChannelRenderer {
    scripts: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl RendererEndpoint for ChannelRenderer {
    async fn evaluate(&self, call: RendererCall) -> BridgeResult<EvaluationResult> {
        self.scripts.send(call.to_script()).ok();
        Ok(EvaluationResult(None))
    }
}

#[derive(Default)]
struct FakeNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl Notifier for FakeNotifier {
    fn show(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

impl FakeNotifier {
    fn messages(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Bridge {
    handle: HostHandle,
    provider: Arc<FakeProvider>,
    store: Arc<FakeStore>,
    prompter: Arc<FakePrompter>,
    notifier: Arc<FakeNotifier>,
    scripts: mpsc::UnboundedReceiver<String>,
    events: EventBus,
}

fn start(provider: FakeProvider, status: PermissionStatus, prompter: FakePrompter) -> Bridge {
    let provider = Arc::new(provider);
    let store = Arc::new(FakeStore::new(status));
    let prompter = Arc::new(prompter);
    let notifier = Arc::new(FakeNotifier::default());
    let (tx, scripts) = mpsc::unbounded_channel();

    let config = HostConfig::builder()
        .location_provider(provider.clone())
        .permission_store(store.clone())
        .permission_prompter(prompter.clone())
        .renderer(Arc::new(ChannelRenderer { scripts: tx }))
        .notifier(notifier.clone())
        .check_permission_on_start(false)
        .build()
        .expect("valid config");

    let events = EventBus::new(64);
    let (handle, _join) = spawn_host(&config, events.clone());

    Bridge {
        handle,
        provider,
        store,
        prompter,
        notifier,
        scripts,
        events,
    }
}

impl Bridge {
    async fn next_script(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(2), self.scripts.recv())
            .await
            .expect("no renderer call")
            .expect("renderer queue closed")
    }

    /// Round-trip through the mailbox so everything queued before has run.
    async fn settle(&self) -> core_location::HostSnapshot {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        self.handle.snapshot().await.expect("host running")
    }
}

async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

fn fix(lat: f64, lon: f64, alt: f64, accuracy: f32) -> Fix {
    Fix::new(lat, lon, alt, accuracy).unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_continuous_fix_reaches_renderer() {
    let mut bridge = start(
        FakeProvider::default(),
        PermissionStatus::Granted,
        FakePrompter::default(),
    );

    bridge.handle.start_tracking().unwrap();
    assert!(bridge.settle().await.tracking_active);

    bridge.provider.sink().on_fix(fix(37.7749, -122.4194, 15.0, 8.5));

    assert_eq!(
        bridge.next_script().await,
        r#"flyToLocation(-122.4194, 37.7749, 15.0, 8.5, "continuous")"#
    );
}

#[tokio::test]
async fn test_continuous_fixes_arrive_in_order() {
    let mut bridge = start(
        FakeProvider::default(),
        PermissionStatus::Granted,
        FakePrompter::default(),
    );
    bridge.handle.start_tracking().unwrap();
    bridge.settle().await;

    let sink = bridge.provider.sink();
    for i in 0..10 {
        sink.on_fix(fix(i as f64, 0.5, 0.0, 3.0));
    }

    for i in 0..10 {
        let expected = format!(r#"flyToLocation(0.5, {:?}, 0.0, 3.0, "continuous")"#, i as f64);
        assert_eq!(bridge.next_script().await, expected);
    }
}

#[tokio::test]
async fn test_get_location_success() {
    let mut bridge = start(
        FakeProvider::with_live(Ok(fix(52.52, 13.405, 34.0, 12.4))),
        PermissionStatus::Granted,
        FakePrompter::default(),
    );

    bridge.handle.get_location().unwrap();

    assert_eq!(
        bridge.next_script().await,
        r#"flyToLocation(13.405, 52.52, 34.0, 12.4, "single")"#
    );
    bridge.settle().await;
    assert_eq!(
        bridge.notifier.messages(),
        vec!["Location acquired (accuracy: 12 m)"]
    );
}

#[tokio::test]
async fn test_get_location_falls_back_to_last_known() {
    let provider =
        FakeProvider::with_live(Err(BridgeError::ProviderUnavailable("gps off".to_string())));
    *provider.cached.lock().unwrap() = Some(fix(40.4168, -3.7038, 650.0, 30.0));
    let mut bridge = start(provider, PermissionStatus::Granted, FakePrompter::default());

    bridge.handle.get_location().unwrap();

    assert_eq!(
        bridge.next_script().await,
        r#"flyToLocation(-3.7038, 40.4168, 650.0, 30.0, "single")"#
    );
    bridge.settle().await;
    assert_eq!(bridge.notifier.messages(), vec!["Using last known location"]);
}

#[tokio::test]
async fn test_get_location_without_any_fix() {
    let mut bridge = start(
        FakeProvider::with_live(Err(BridgeError::OperationFailed("timeout".to_string()))),
        PermissionStatus::Granted,
        FakePrompter::default(),
    );

    bridge.handle.get_location().unwrap();
    eventually(|| bridge.provider.last_known_calls.load(Ordering::SeqCst) == 1).await;
    let snapshot = bridge.settle().await;

    assert_eq!(snapshot.pending_single_fixes, 0);
    assert_eq!(snapshot.deliveries.queued, 0);
    assert!(bridge.scripts.try_recv().is_err());
    assert_eq!(
        bridge.notifier.messages(),
        vec!["Unable to get your location"]
    );
}

#[tokio::test]
async fn test_denied_get_location_offers_rationale() {
    let bridge = start(
        FakeProvider::default(),
        PermissionStatus::Denied {
            can_ask_again: true,
        },
        FakePrompter::default(),
    );

    bridge.handle.get_location().unwrap();
    eventually(|| bridge.prompter.rationales.load(Ordering::SeqCst) == 1).await;
    let snapshot = bridge.settle().await;

    assert_eq!(snapshot.permission, PermissionState::Denied);
    assert_eq!(bridge.provider.calls(), 0);
    assert_eq!(bridge.prompter.settings.load(Ordering::SeqCst), 0);
    assert_eq!(
        bridge.notifier.messages(),
        vec!["Location features are unavailable without permission"]
    );
}

#[tokio::test]
async fn test_permanently_denied_start_tracking_offers_settings() {
    let bridge = start(
        FakeProvider::default(),
        PermissionStatus::Denied {
            can_ask_again: false,
        },
        FakePrompter::default(),
    );
    let mut events = bridge.events.subscribe();

    bridge.handle.start_tracking().unwrap();
    eventually(|| bridge.prompter.settings.load(Ordering::SeqCst) == 1).await;
    let snapshot = bridge.settle().await;

    assert!(!snapshot.tracking_active);
    assert_eq!(snapshot.permission, PermissionState::DeniedPermanently);
    assert_eq!(bridge.provider.calls(), 0);
    assert_eq!(bridge.prompter.rationales.load(Ordering::SeqCst), 0);

    let mut saw_redirect = false;
    while let Ok(event) = events.try_recv() {
        saw_redirect |= event == CoreEvent::Permission(PermissionEvent::SettingsRedirectOffered);
    }
    assert!(saw_redirect);
}

#[tokio::test]
async fn test_rationale_accepted_then_granted() {
    let mut bridge = start(
        FakeProvider::with_live(Ok(fix(35.6762, 139.6503, 40.0, 5.0))),
        PermissionStatus::Denied {
            can_ask_again: true,
        },
        FakePrompter {
            accept_rationale: true,
            ..Default::default()
        },
    );

    bridge.handle.get_location().unwrap();
    eventually(|| bridge.store.dialog_open()).await;
    bridge.store.answer(true, true);

    let snapshot = bridge.settle().await;
    assert_eq!(snapshot.permission, PermissionState::Granted);
    assert_eq!(bridge.provider.calls(), 0);
    assert!(bridge
        .notifier
        .messages()
        .contains(&"Location permission granted".to_string()));

    bridge.handle.get_location().unwrap();
    assert_eq!(
        bridge.next_script().await,
        r#"flyToLocation(139.6503, 35.6762, 40.0, 5.0, "single")"#
    );
}

#[tokio::test]
async fn test_request_denied_for_good_moves_to_settings() {
    let bridge = start(
        FakeProvider::default(),
        PermissionStatus::Denied {
            can_ask_again: true,
        },
        FakePrompter {
            accept_rationale: true,
            ..Default::default()
        },
    );

    bridge.handle.start_tracking().unwrap();
    eventually(|| bridge.store.dialog_open()).await;
    bridge.store.answer(false, false);
    eventually(|| bridge.prompter.settings.load(Ordering::SeqCst) == 1).await;

    let snapshot = bridge.settle().await;
    assert_eq!(snapshot.permission, PermissionState::DeniedPermanently);
    assert!(!snapshot.tracking_active);
}

#[tokio::test]
async fn test_stop_tracking_twice_unsubscribes_once() {
    let bridge = start(
        FakeProvider::default(),
        PermissionStatus::Granted,
        FakePrompter::default(),
    );

    bridge.handle.stop_tracking().unwrap();
    bridge.handle.start_tracking().unwrap();
    bridge.handle.start_tracking().unwrap();
    bridge.handle.stop_tracking().unwrap();
    bridge.handle.stop_tracking().unwrap();
    let snapshot = bridge.settle().await;

    assert!(!snapshot.tracking_active);
    assert_eq!(bridge.provider.subscribe_calls.load(Ordering::SeqCst), 1);
    assert_eq!(bridge.provider.unsubscribe_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_envelope_and_alias_commands() {
    let bridge = start(
        FakeProvider::default(),
        PermissionStatus::Granted,
        FakePrompter::default(),
    );

    bridge
        .handle
        .invoke_envelope(r#"{"command":"showToast","args":["Route saved"]}"#)
        .unwrap();
    bridge
        .handle
        .invoke("log", vec!["tiles loaded".to_string()])
        .unwrap();
    bridge.handle.invoke("zoomIn", Vec::new()).unwrap();
    bridge.settle().await;

    assert_eq!(bridge.notifier.messages(), vec!["Route saved"]);
}

#[tokio::test]
async fn test_shutdown_releases_subscription() {
    let bridge = start(
        FakeProvider::default(),
        PermissionStatus::Granted,
        FakePrompter::default(),
    );
    bridge.handle.start_tracking().unwrap();
    bridge.settle().await;

    bridge.handle.shutdown().await.unwrap();

    assert_eq!(bridge.provider.unsubscribe_calls.load(Ordering::SeqCst), 1);
    eventually(|| !bridge.handle.is_running()).await;
    assert!(bridge.handle.get_location().is_err());
}

#[tokio::test]
async fn test_startup_permission_check() {
    let provider = Arc::new(FakeProvider::default());
    let store = Arc::new(FakeStore::new(PermissionStatus::Denied {
        can_ask_again: false,
    }));
    let prompter = Arc::new(FakePrompter::default());
    let (tx, _scripts) = mpsc::unbounded_channel();

    let config = HostConfig::builder()
        .location_provider(provider.clone())
        .permission_store(store)
        .permission_prompter(prompter.clone())
        .renderer(Arc::new(ChannelRenderer { scripts: tx }))
        .notifier(Arc::new(FakeNotifier::default()))
        .build()
        .unwrap();

    let (handle, _join) = spawn_host(&config, EventBus::default());
    eventually(|| prompter.settings.load(Ordering::SeqCst) == 1).await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.permission, PermissionState::DeniedPermanently);
    assert_eq!(provider.calls(), 0);
}
