//! # Permission Gate
//!
//! Finite state machine over the OS location permission.
//!
//! ```text
//!            check: granted                      request: granted
//! Unknown ─────────────────────────▶ Granted ◀──────────────────── Denied
//!    │                                                               ▲  │
//!    │ check: denied, can ask again ────────────────────────────────┘  │
//!    │                                                                  │ request: denied,
//!    │ check: denied, cannot ask again                                  │ cannot ask again
//!    └──────────────────────────────▶ DeniedPermanently ◀───────────────┘
//! ```
//!
//! Operations needing location call [`PermissionGate::ensure_granted`]. When
//! it refuses, the gate has already started the remediation flow:
//! - `Denied`: rationale dialog, then the OS request if the user agrees
//! - `DeniedPermanently`: redirect to the system settings page
//!
//! Dialog results arrive through the host mailbox and are fed back with
//! [`PermissionGate::on_rationale_answer`] and [`PermissionGate::on_result`].

use std::sync::Arc;

use bridge_traits::{
    PermissionOutcome, PermissionPrompter, PermissionRequestId, PermissionState,
    PermissionStatus, PermissionStore,
};
use core_runtime::events::{CoreEvent, EventBus, PermissionEvent};
use tracing::{debug, info, instrument, warn};

use crate::dispatch::{Dispatcher, HostMessage, PermissionResultSink};
use crate::error::{LocationError, Result};
use crate::report::ErrorReporter;

const GRANTED_NOTICE: &str = "Location permission granted";
const UNAVAILABLE_NOTICE: &str = "Location features are unavailable without permission";

pub struct PermissionGate {
    store: Arc<dyn PermissionStore>,
    prompter: Arc<dyn PermissionPrompter>,
    reporter: ErrorReporter,
    events: EventBus,
    dispatcher: Dispatcher,
    state: PermissionState,
    pending_request: Option<PermissionRequestId>,
    rationale_open: bool,
}

impl PermissionGate {
    pub fn new(
        store: Arc<dyn PermissionStore>,
        prompter: Arc<dyn PermissionPrompter>,
        reporter: ErrorReporter,
        events: EventBus,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            store,
            prompter,
            reporter,
            events,
            dispatcher,
            state: PermissionState::Unknown,
            pending_request: None,
            rationale_open: false,
        }
    }

    /// Last known state, without querying the OS.
    pub fn state(&self) -> PermissionState {
        self.state
    }

    pub fn request_pending(&self) -> bool {
        self.pending_request.is_some()
    }

    /// Query the OS store and record the answer.
    pub fn check(&mut self) -> PermissionState {
        let status = self.store.check();
        self.transition(PermissionState::from_status(status));
        self.state
    }

    /// Succeeds only when permission is granted. Otherwise the remediation
    /// flow has been started and the refusal is returned.
    pub fn ensure_granted(&mut self) -> Result<()> {
        match self.check() {
            PermissionState::Granted => Ok(()),
            PermissionState::DeniedPermanently => {
                self.offer_settings();
                Err(LocationError::PermissionPermanentlyDenied)
            }
            PermissionState::Denied | PermissionState::Unknown => {
                self.offer_rationale();
                Err(LocationError::PermissionDenied)
            }
        }
    }

    /// Launch the OS permission dialog.
    ///
    /// A fresh correlation token replaces any outstanding request, so results
    /// of older dialogs are ignored.
    #[instrument(skip(self))]
    pub fn request(&mut self) {
        let request_id = PermissionRequestId::new();
        let callback = Arc::new(PermissionResultSink::new(self.dispatcher.clone()));

        match self.store.request(request_id, callback) {
            Ok(()) => {
                debug!(%request_id, "Permission dialog launched");
                self.pending_request = Some(request_id);
                self.emit(PermissionEvent::RequestIssued {
                    request_id: request_id.to_string(),
                });
            }
            Err(e) => {
                self.pending_request = None;
                self.reporter.report(&LocationError::from(e));
            }
        }
    }

    /// Apply an OS permission result.
    pub fn on_result(&mut self, outcome: PermissionOutcome) {
        if self.pending_request != Some(outcome.request_id) {
            debug!(request_id = %outcome.request_id, "Ignoring stale permission result");
            return;
        }
        self.pending_request = None;

        let status = if outcome.granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied {
                can_ask_again: outcome.can_ask_again,
            }
        };
        self.transition(PermissionState::from_status(status));

        match self.state {
            PermissionState::Granted => self.reporter.notice(GRANTED_NOTICE),
            PermissionState::DeniedPermanently => {
                self.reporter
                    .report(&LocationError::PermissionPermanentlyDenied);
                self.offer_settings();
            }
            // No new dialog here; the next operation starts remediation again
            _ => self.reporter.report(&LocationError::PermissionDenied),
        }
    }

    /// Apply the user's answer to the rationale dialog.
    pub fn on_rationale_answer(&mut self, accepted: bool) {
        self.rationale_open = false;
        if accepted {
            info!("Rationale accepted, requesting permission");
            self.request();
        } else {
            info!("Rationale declined");
            self.reporter.warning(UNAVAILABLE_NOTICE);
        }
    }

    fn offer_rationale(&mut self) {
        if self.rationale_open || self.pending_request.is_some() {
            debug!("Permission remediation already in progress");
            return;
        }
        self.rationale_open = true;
        self.emit(PermissionEvent::RationaleOffered);

        let prompter = Arc::clone(&self.prompter);
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            let accepted = prompter.show_rationale().await;
            dispatcher.post(HostMessage::RationaleAnswered(accepted));
        });
    }

    fn offer_settings(&mut self) {
        self.emit(PermissionEvent::SettingsRedirectOffered);

        let prompter = Arc::clone(&self.prompter);
        tokio::spawn(async move {
            if let Err(e) = prompter.offer_settings().await {
                warn!(error = %e, "Settings redirect failed");
            }
        });
    }

    fn transition(&mut self, next: PermissionState) {
        if self.state == next {
            return;
        }
        info!(previous = %self.state, current = %next, "Permission state changed");
        let previous = std::mem::replace(&mut self.state, next);
        self.emit(PermissionEvent::StateChanged {
            previous,
            current: next,
        });
    }

    fn emit(&self, event: PermissionEvent) {
        self.events.emit(CoreEvent::Permission(event)).ok();
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("state", &self.state)
            .field("pending_request", &self.pending_request)
            .field("rationale_open", &self.rationale_open)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{
        error::Result as BridgeResult, Notice, NoticeLevel, Notifier, PermissionCallback,
    };
    use mockall::mock;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    mock! {
        pub Store {}

        impl PermissionStore for Store {
            fn check(&self) -> PermissionStatus;
            fn request(
                &self,
                request_id: PermissionRequestId,
                callback: Arc<dyn PermissionCallback>,
            ) -> BridgeResult<()>;
        }
    }

    mock! {
        pub Prompter {}

        #[async_trait::async_trait]
        impl PermissionPrompter for Prompter {
            async fn show_rationale(&self) -> bool;
            async fn offer_settings(&self) -> BridgeResult<()>;
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        notices: Mutex<Vec<Notice>>,
    }

    impl Notifier for RecordingNotifier {
        fn show(&self, notice: Notice) {
            self.notices.lock().unwrap().push(notice);
        }
    }

    struct Harness {
        gate: PermissionGate,
        mailbox: UnboundedReceiver<HostMessage>,
        notifier: Arc<RecordingNotifier>,
        events: EventBus,
    }

    fn harness(store: MockStore, prompter: MockPrompter) -> Harness {
        let (dispatcher, mailbox) = Dispatcher::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let events = EventBus::new(32);
        let gate = PermissionGate::new(
            Arc::new(store),
            Arc::new(prompter),
            ErrorReporter::new(notifier.clone()),
            events.clone(),
            dispatcher,
        );
        Harness {
            gate,
            mailbox,
            notifier,
            events,
        }
    }

    async fn next_message(mailbox: &mut UnboundedReceiver<HostMessage>) -> HostMessage {
        tokio::time::timeout(Duration::from_secs(1), mailbox.recv())
            .await
            .expect("no message posted")
            .expect("mailbox closed")
    }

    fn denied(can_ask_again: bool) -> PermissionStatus {
        PermissionStatus::Denied { can_ask_again }
    }

    #[tokio::test]
    async fn test_check_granted_proceeds() {
        let mut store = MockStore::new();
        store.expect_check().returning(|| PermissionStatus::Granted);
        store.expect_request().never();
        let mut prompter = MockPrompter::new();
        prompter.expect_show_rationale().never();

        let mut h = harness(store, prompter);
        let mut events = h.events.subscribe();

        assert!(h.gate.ensure_granted().is_ok());
        assert_eq!(h.gate.state(), PermissionState::Granted);
        assert_eq!(
            events.try_recv().unwrap(),
            CoreEvent::Permission(PermissionEvent::StateChanged {
                previous: PermissionState::Unknown,
                current: PermissionState::Granted,
            })
        );
    }

    #[tokio::test]
    async fn test_denied_offers_rationale_then_requests() {
        let mut store = MockStore::new();
        store.expect_check().returning(|| denied(true));
        store.expect_request().times(1).returning(|_, _| Ok(()));
        let mut prompter = MockPrompter::new();
        prompter.expect_show_rationale().times(1).returning(|| true);

        let mut h = harness(store, prompter);

        assert_eq!(
            h.gate.ensure_granted(),
            Err(LocationError::PermissionDenied)
        );
        assert_eq!(h.gate.state(), PermissionState::Denied);

        match next_message(&mut h.mailbox).await {
            HostMessage::RationaleAnswered(accepted) => h.gate.on_rationale_answer(accepted),
            other => panic!("Expected RationaleAnswered, got {:?}", other),
        }
        assert!(h.gate.request_pending());
    }

    #[tokio::test]
    async fn test_rationale_declined_shows_notice() {
        let mut store = MockStore::new();
        store.expect_check().returning(|| denied(true));
        store.expect_request().never();
        let mut prompter = MockPrompter::new();
        prompter.expect_show_rationale().times(1).returning(|| false);

        let mut h = harness(store, prompter);
        let _ = h.gate.ensure_granted();

        match next_message(&mut h.mailbox).await {
            HostMessage::RationaleAnswered(accepted) => h.gate.on_rationale_answer(accepted),
            other => panic!("Expected RationaleAnswered, got {:?}", other),
        }

        let notices = h.notifier.notices.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].message, UNAVAILABLE_NOTICE);
        assert!(!h.gate.request_pending());
    }

    #[tokio::test]
    async fn test_rationale_not_stacked() {
        let mut store = MockStore::new();
        store.expect_check().returning(|| denied(true));
        let mut prompter = MockPrompter::new();
        prompter.expect_show_rationale().times(1).returning(|| false);

        let mut h = harness(store, prompter);
        let _ = h.gate.ensure_granted();
        let _ = h.gate.ensure_granted();

        let _ = next_message(&mut h.mailbox).await;
        tokio::task::yield_now().await;
        assert!(h.mailbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_permanently_denied_offers_settings() {
        let mut store = MockStore::new();
        store.expect_check().returning(|| denied(false));
        store.expect_request().never();
        let mut prompter = MockPrompter::new();
        prompter.expect_show_rationale().never();
        prompter.expect_offer_settings().returning(|| Ok(()));

        let mut h = harness(store, prompter);
        let mut events = h.events.subscribe();

        assert_eq!(
            h.gate.ensure_granted(),
            Err(LocationError::PermissionPermanentlyDenied)
        );
        assert_eq!(h.gate.state(), PermissionState::DeniedPermanently);

        let _state_changed = events.try_recv().unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            CoreEvent::Permission(PermissionEvent::SettingsRedirectOffered)
        );
    }

    #[tokio::test]
    async fn test_request_result_transitions() {
        let cases = [
            (true, true, PermissionState::Granted, NoticeLevel::Info),
            (false, true, PermissionState::Denied, NoticeLevel::Warning),
            (
                false,
                false,
                PermissionState::DeniedPermanently,
                NoticeLevel::Warning,
            ),
        ];

        for (granted, can_ask_again, expected, level) in cases {
            let captured = Arc::new(Mutex::new(None));
            let mut store = MockStore::new();
            store.expect_check().returning(|| denied(true));
            let slot = Arc::clone(&captured);
            store.expect_request().times(1).returning(move |id, _| {
                *slot.lock().unwrap() = Some(id);
                Ok(())
            });
            let mut prompter = MockPrompter::new();
            prompter.expect_offer_settings().returning(|| Ok(()));

            let mut h = harness(store, prompter);
            h.gate.check();
            h.gate.request();

            let request_id = (*captured.lock().unwrap()).expect("request issued");
            h.gate.on_result(PermissionOutcome {
                request_id,
                granted,
                can_ask_again,
            });

            assert_eq!(h.gate.state(), expected);
            assert!(!h.gate.request_pending());
            let notices = h.notifier.notices.lock().unwrap();
            assert_eq!(notices.last().map(|n| n.level), Some(level));
            if expected == PermissionState::Granted {
                assert_eq!(notices[0].message, GRANTED_NOTICE);
            }
        }
    }

    #[tokio::test]
    async fn test_stale_result_ignored() {
        let mut store = MockStore::new();
        store.expect_check().returning(|| denied(true));
        store.expect_request().returning(|_, _| Ok(()));
        let prompter = MockPrompter::new();

        let mut h = harness(store, prompter);
        h.gate.check();
        h.gate.request();

        h.gate.on_result(PermissionOutcome {
            request_id: PermissionRequestId::new(),
            granted: true,
            can_ask_again: true,
        });

        assert_eq!(h.gate.state(), PermissionState::Denied);
        assert!(h.gate.request_pending());
        assert!(h.notifier.notices.lock().unwrap().is_empty());
    }
}
