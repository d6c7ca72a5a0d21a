//! # Serialized Context Mailbox
//!
//! Every mutation of permission, session and bridge state happens on the host
//! loop task. Platform callbacks fire on arbitrary threads, so they never touch
//! that state directly: they post a [`HostMessage`] through a [`Dispatcher`]
//! and return immediately.

use bridge_traits::{
    error::Result as BridgeResult, BridgeError, Fix, FixSink, PermissionCallback,
    PermissionOutcome,
};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::host::HostSnapshot;

/// Identifier of one single-fix request, local to the host loop.
pub type RequestId = u64;

/// Work item for the host loop.
#[derive(Debug)]
pub enum HostMessage {
    /// Inbound bridge command from the renderer.
    Command { name: String, args: Vec<String> },
    /// Inbound command as a JSON envelope `{"command": .., "args": [..]}`.
    Envelope(String),
    /// Re-run the permission check and start remediation if needed.
    CheckPermission,
    /// OS answer to a permission request.
    PermissionResult(PermissionOutcome),
    /// User answer to the rationale dialog.
    RationaleAnswered(bool),
    /// Live answer to a single-fix request.
    SingleFix {
        request_id: RequestId,
        result: BridgeResult<Fix>,
    },
    /// Last-known fallback for a failed single-fix request.
    LastKnown {
        request_id: RequestId,
        result: BridgeResult<Option<Fix>>,
    },
    /// Delivery from a continuous subscription.
    ContinuousFix { generation: u64, fix: Fix },
    /// Error from a continuous subscription.
    ContinuousError { generation: u64, error: BridgeError },
    Snapshot(oneshot::Sender<HostSnapshot>),
    /// Stop tracking, cancel pending requests and exit the loop.
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable handle posting work onto the host loop.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    sender: mpsc::UnboundedSender<HostMessage>,
}

impl Dispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Queue a message. Returns `false` once the host loop has exited.
    pub fn post(&self, message: HostMessage) -> bool {
        match self.sender.send(message) {
            Ok(()) => true,
            Err(mpsc::error::SendError(message)) => {
                debug!(?message, "Host loop stopped, message dropped");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// [`FixSink`] handed to the provider for one subscription.
///
/// Deliveries carry the subscription generation so the session manager can
/// discard anything arriving after the subscription was released.
pub(crate) struct SubscriptionSink {
    generation: u64,
    dispatcher: Dispatcher,
}

impl SubscriptionSink {
    pub(crate) fn new(generation: u64, dispatcher: Dispatcher) -> Self {
        Self {
            generation,
            dispatcher,
        }
    }
}

impl FixSink for SubscriptionSink {
    fn on_fix(&self, fix: Fix) {
        self.dispatcher.post(HostMessage::ContinuousFix {
            generation: self.generation,
            fix,
        });
    }

    fn on_error(&self, error: BridgeError) {
        self.dispatcher.post(HostMessage::ContinuousError {
            generation: self.generation,
            error,
        });
    }
}

/// [`PermissionCallback`] re-posting OS results onto the host loop.
pub(crate) struct PermissionResultSink {
    dispatcher: Dispatcher,
}

impl PermissionResultSink {
    pub(crate) fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

impl PermissionCallback for PermissionResultSink {
    fn on_result(&self, outcome: PermissionOutcome) {
        self.dispatcher.post(HostMessage::PermissionResult(outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::PermissionRequestId;

    #[test]
    fn test_subscription_sink_tags_generation() {
        let (dispatcher, mut rx) = Dispatcher::new();
        let sink = SubscriptionSink::new(7, dispatcher);

        sink.on_fix(Fix::new(1.0, 2.0, 3.0, 4.0).unwrap());
        sink.on_error(BridgeError::ProviderUnavailable("gps off".to_string()));

        match rx.try_recv().unwrap() {
            HostMessage::ContinuousFix { generation, fix } => {
                assert_eq!(generation, 7);
                assert_eq!(fix.latitude(), 1.0);
            }
            other => panic!("Expected ContinuousFix, got {:?}", other),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            HostMessage::ContinuousError { generation: 7, .. }
        ));
    }

    #[test]
    fn test_permission_sink_posts_outcome() {
        let (dispatcher, mut rx) = Dispatcher::new();
        let sink = PermissionResultSink::new(dispatcher);
        let outcome = PermissionOutcome {
            request_id: PermissionRequestId::new(),
            granted: true,
            can_ask_again: true,
        };

        sink.on_result(outcome);

        match rx.try_recv().unwrap() {
            HostMessage::PermissionResult(received) => assert_eq!(received, outcome),
            other => panic!("Expected PermissionResult, got {:?}", other),
        }
    }

    #[test]
    fn test_post_after_loop_exit() {
        let (dispatcher, rx) = Dispatcher::new();
        drop(rx);

        assert!(dispatcher.is_closed());
        assert!(!dispatcher.post(HostMessage::CheckPermission));
    }
}
