//! # Tracking Session Manager
//!
//! Owns the single [`TrackingSession`] and every outstanding single-fix
//! request, applies the fallback policy and forwards fixes to the renderer.
//!
//! ## Single fix
//!
//! ```text
//! request_once ──ok──▶ forward (single) + accuracy notice
//!      │
//!     err ──▶ last_known ──some──▶ forward (single) + stale notice
//!                  │
//!             none / err ──▶ report NoFixAvailable, nothing forwarded
//! ```
//!
//! The live failure reason is logged; the user sees the generic
//! `NoFixAvailable` message.
//!
//! ## Continuous tracking
//!
//! At most one subscription exists. Starting while active and stopping while
//! inactive are no-ops. Provider errors on a running subscription are reported
//! and the subscription is kept; only [`TrackingSessionManager::stop_continuous`]
//! or [`TrackingSessionManager::teardown`] release it. Deliveries carry the
//! subscription generation, so anything arriving after a stop is discarded.
//!
//! All methods run on the host loop. Provider calls that may take time are
//! spawned and their results come back through the mailbox.

use std::collections::HashMap;
use std::sync::Arc;

use bridge_traits::{
    error::Result as BridgeResult, BridgeError, Fix, FixSource, LocationProvider,
    SubscriptionHandle, TrackingConfig,
};
use core_runtime::events::{CoreEvent, EventBus, TrackingEvent};
use core_runtime::logging::redact_coordinate;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::channel::Outbound;
use crate::dispatch::{Dispatcher, HostMessage, RequestId, SubscriptionSink};
use crate::error::LocationError;
use crate::protocol::BridgeEvent;
use crate::report::ErrorReporter;

const STALE_NOTICE: &str = "Using last known location";
const STARTED_NOTICE: &str = "Location tracking started";
const STOPPED_NOTICE: &str = "Location tracking stopped";

/// The one continuous subscription.
#[derive(Debug, Clone, Default)]
pub struct TrackingSession {
    config: TrackingConfig,
    handle: Option<SubscriptionHandle>,
    generation: u64,
}

impl TrackingSession {
    /// Active exactly while a subscription handle is held.
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn handle(&self) -> Option<SubscriptionHandle> {
        self.handle
    }

    fn accepts(&self, generation: u64) -> bool {
        self.is_active() && self.generation == generation
    }
}

pub struct TrackingSessionManager {
    provider: Arc<dyn LocationProvider>,
    outbound: Outbound,
    renderer_function: String,
    reporter: ErrorReporter,
    events: EventBus,
    dispatcher: Dispatcher,
    session: TrackingSession,
    pending: HashMap<RequestId, CancellationToken>,
    next_request_id: RequestId,
}

impl TrackingSessionManager {
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        outbound: Outbound,
        renderer_function: impl Into<String>,
        reporter: ErrorReporter,
        events: EventBus,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            provider,
            outbound,
            renderer_function: renderer_function.into(),
            reporter,
            events,
            dispatcher,
            session: TrackingSession::default(),
            pending: HashMap::new(),
            next_request_id: 0,
        }
    }

    pub fn session(&self) -> &TrackingSession {
        &self.session
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    // ------------------------------------------------------------------
    // Single fix
    // ------------------------------------------------------------------

    /// Start a one-shot request. Permission must already be granted.
    ///
    /// The returned token cancels the request; cancelling after the result
    /// was handled does nothing.
    pub fn request_single_fix(&mut self) -> (RequestId, CancellationToken) {
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        let cancel = CancellationToken::new();
        self.pending.insert(request_id, cancel.clone());
        debug!(request_id, "Single fix requested");

        let provider = Arc::clone(&self.provider);
        let dispatcher = self.dispatcher.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => Err(BridgeError::Cancelled),
                result = provider.request_once(token.clone()) => result,
            };
            dispatcher.post(HostMessage::SingleFix { request_id, result });
        });

        (request_id, cancel)
    }

    /// Handle the live answer to a single-fix request.
    pub fn on_single_fix(&mut self, request_id: RequestId, result: BridgeResult<Fix>) {
        let Some(token) = self.pending.get(&request_id) else {
            debug!(request_id, "Result for unknown request dropped");
            return;
        };
        if token.is_cancelled() {
            debug!(request_id, "Request cancelled, result dropped");
            self.pending.remove(&request_id);
            return;
        }

        match result {
            Ok(fix) => {
                self.pending.remove(&request_id);
                let fix = fix.with_source(FixSource::Single);
                self.forward(fix);
                self.reporter.notice(format!(
                    "Location acquired (accuracy: {} m)",
                    fix.rounded_accuracy()
                ));
            }
            Err(e) => {
                warn!(request_id, error = %e, "Live fix failed, trying last known location");
                let provider = Arc::clone(&self.provider);
                let dispatcher = self.dispatcher.clone();
                tokio::spawn(async move {
                    let result = provider.last_known().await;
                    dispatcher.post(HostMessage::LastKnown { request_id, result });
                });
            }
        }
    }

    /// Handle the last-known fallback of a failed single-fix request.
    pub fn on_last_known(&mut self, request_id: RequestId, result: BridgeResult<Option<Fix>>) {
        let Some(token) = self.pending.remove(&request_id) else {
            debug!(request_id, "Fallback for unknown request dropped");
            return;
        };
        if token.is_cancelled() {
            debug!(request_id, "Request cancelled, fallback dropped");
            return;
        }

        match result {
            Ok(Some(fix)) => {
                self.forward(fix.with_source(FixSource::Single));
                self.reporter.warning(STALE_NOTICE);
            }
            Ok(None) => self.no_fix(),
            Err(e) => {
                warn!(request_id, error = %e, "Last known location failed");
                self.no_fix();
            }
        }
    }

    /// Cancel every outstanding single-fix request.
    pub fn cancel_pending(&mut self) -> usize {
        let cancelled = self.pending.len();
        for (_, token) in self.pending.drain() {
            token.cancel();
        }
        if cancelled > 0 {
            debug!(cancelled, "Pending single fix requests cancelled");
        }
        cancelled
    }

    fn no_fix(&self) {
        self.reporter.report(&LocationError::NoFixAvailable);
        self.emit(TrackingEvent::NoFixAvailable);
    }

    // ------------------------------------------------------------------
    // Continuous tracking
    // ------------------------------------------------------------------

    /// Subscribe with `config`. Returns `true` when a subscription was created.
    #[instrument(skip(self))]
    pub fn start_continuous(&mut self, config: TrackingConfig) -> bool {
        if self.session.is_active() {
            debug!("Tracking already active");
            return false;
        }

        let generation = self.session.generation + 1;
        let sink = Arc::new(SubscriptionSink::new(generation, self.dispatcher.clone()));

        match self.provider.subscribe(&config, sink) {
            Ok(handle) => {
                info!(%handle, "Continuous tracking started");
                self.session = TrackingSession {
                    config,
                    handle: Some(handle),
                    generation,
                };
                self.emit(TrackingEvent::Started {
                    min_interval_ms: config.min_interval_ms,
                    fastest_interval_ms: config.fastest_interval_ms,
                });
                self.reporter.notice(STARTED_NOTICE);
                true
            }
            Err(e) => {
                self.session.generation = generation;
                self.emit(TrackingEvent::ProviderError {
                    message: e.to_string(),
                    continuous: true,
                });
                self.reporter
                    .report(&LocationError::ProviderUnavailable(e.to_string()));
                false
            }
        }
    }

    /// Release the subscription. Returns `true` when one was active.
    #[instrument(skip(self))]
    pub fn stop_continuous(&mut self) -> bool {
        let Some(handle) = self.session.handle.take() else {
            debug!("Tracking not active");
            return false;
        };

        if let Err(e) = self.provider.unsubscribe(handle) {
            warn!(%handle, error = %e, "Unsubscribe failed, session cleared anyway");
        }
        info!(%handle, "Continuous tracking stopped");
        self.emit(TrackingEvent::Stopped);
        self.reporter.notice(STOPPED_NOTICE);
        true
    }

    pub fn on_continuous_fix(&mut self, generation: u64, fix: Fix) {
        if !self.session.accepts(generation) {
            debug!(generation, "Fix from released subscription dropped");
            return;
        }
        self.forward(fix.with_source(FixSource::Continuous));
    }

    /// Report a subscription error. The subscription keeps running.
    pub fn on_continuous_error(&mut self, generation: u64, error: BridgeError) {
        if !self.session.accepts(generation) {
            debug!(generation, error = %error, "Error from released subscription dropped");
            return;
        }
        self.emit(TrackingEvent::ProviderError {
            message: error.to_string(),
            continuous: true,
        });
        self.reporter
            .report(&LocationError::ProviderUnavailable(error.to_string()));
    }

    /// Stop tracking and cancel pending requests. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        self.stop_continuous();
        self.cancel_pending();
    }

    fn forward(&self, fix: Fix) {
        debug!(
            lat = %redact_coordinate(fix.latitude()),
            lon = %redact_coordinate(fix.longitude()),
            accuracy = fix.accuracy_meters(),
            source = fix.source().tag(),
            "Forwarding fix"
        );
        let call = BridgeEvent::LocationUpdate(fix).to_renderer_call(&self.renderer_function);
        self.outbound.send(call);
    }

    fn emit(&self, event: TrackingEvent) {
        self.events.emit(CoreEvent::Tracking(event)).ok();
    }
}

impl std::fmt::Debug for TrackingSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingSessionManager")
            .field("session", &self.session)
            .field("pending", &self.pending.len())
            .field("renderer_function", &self.renderer_function)
            .finish()
    }
}
