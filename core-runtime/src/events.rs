//! # Event Bus System
//!
//! Broadcasts state changes of the location bridge core using
//! `tokio::sync::broadcast`, so host UI (status indicators, exit confirmation,
//! diagnostics screens) can observe the core without polling it.
//!
//! ## Overview
//!
//! The bus carries *state-change* events only:
//! - **Permission**: state transitions, request dialogs, remediation flows
//! - **Tracking**: subscription started/stopped, provider failures
//! - **Renderer**: failed deliveries into the embedded map view
//!
//! Position fixes are deliberately absent. They travel exclusively over the
//! renderer bridge; this bus is not a location feed.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, TrackingEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::Tracking(TrackingEvent::Stopped)).ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Continuous tracking stopped");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep
//!   receiving newer ones.
//! - **`RecvError::Closed`**: every sender was dropped (core shut down).
//!
//! Emitting with no subscribers returns an error which callers ignore.

use bridge_traits::PermissionState;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Permission-related events
    Permission(PermissionEvent),
    /// Tracking session events
    Tracking(TrackingEvent),
    /// Renderer bridge events
    Renderer(RendererEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Permission(e) => e.description(),
            CoreEvent::Tracking(e) => e.description(),
            CoreEvent::Renderer(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Tracking(TrackingEvent::ProviderError { .. }) => EventSeverity::Error,
            CoreEvent::Tracking(TrackingEvent::NoFixAvailable) => EventSeverity::Error,
            CoreEvent::Renderer(RendererEvent::DeliveryFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Permission(PermissionEvent::SettingsRedirectOffered) => {
                EventSeverity::Warning
            }
            CoreEvent::Permission(PermissionEvent::StateChanged { .. }) => EventSeverity::Info,
            CoreEvent::Tracking(TrackingEvent::Started { .. }) => EventSeverity::Info,
            CoreEvent::Tracking(TrackingEvent::Stopped) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Permission Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PermissionEvent {
    /// The tracked permission state changed after a check or request result.
    StateChanged {
        previous: PermissionState,
        current: PermissionState,
    },
    /// The OS permission dialog was launched.
    RequestIssued {
        /// Correlation token of the request
        request_id: String,
    },
    /// The rationale explanation was shown to the user.
    RationaleOffered,
    /// The user was directed to the system settings page.
    SettingsRedirectOffered,
}

impl PermissionEvent {
    fn description(&self) -> &str {
        match self {
            PermissionEvent::StateChanged { .. } => "Location permission state changed",
            PermissionEvent::RequestIssued { .. } => "Location permission requested",
            PermissionEvent::RationaleOffered => "Permission rationale shown",
            PermissionEvent::SettingsRedirectOffered => "Directed to permission settings",
        }
    }
}

// ============================================================================
// Tracking Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum TrackingEvent {
    /// A continuous subscription was registered.
    Started {
        min_interval_ms: u64,
        fastest_interval_ms: u64,
    },
    /// The continuous subscription was released.
    Stopped,
    /// The provider reported an error; a running subscription stays active.
    ProviderError {
        message: String,
        /// Whether a continuous subscription was affected
        continuous: bool,
    },
    /// A single-fix request found neither a live nor a last-known fix.
    NoFixAvailable,
}

impl TrackingEvent {
    fn description(&self) -> &str {
        match self {
            TrackingEvent::Started { .. } => "Continuous tracking started",
            TrackingEvent::Stopped => "Continuous tracking stopped",
            TrackingEvent::ProviderError { .. } => "Location provider error",
            TrackingEvent::NoFixAvailable => "No location fix available",
        }
    }
}

// ============================================================================
// Renderer Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RendererEvent {
    /// Evaluating a call inside the renderer failed. Never retried.
    DeliveryFailed { function: String, message: String },
}

impl RendererEvent {
    fn description(&self) -> &str {
        match self {
            RendererEvent::DeliveryFailed { .. } => "Renderer delivery failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; [`HostConfig`](crate::config::HostConfig)
    /// validation rejects that value beforehand.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// let bus = EventBus::new(16);
/// let permission_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Permission(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
