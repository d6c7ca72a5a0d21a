//! # Bridge Channel
//!
//! The two directions of the host/renderer bridge.
//!
//! - **Inbound**: a dispatch table keyed by command name. Handlers only parse
//!   arguments into a [`BridgeCommand`]; the host loop executes it.
//! - **Outbound**: a FIFO queue drained by one delivery task that awaits each
//!   renderer evaluation before starting the next, so calls reach the
//!   renderer in the order they were queued. Nothing is batched, dropped or
//!   retried.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bridge_traits::{RendererCall, RendererEndpoint};
use core_runtime::events::{CoreEvent, EventBus, RendererEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{LocationError, Result};
use crate::protocol::BridgeCommand;

/// Parses the arguments of one inbound command.
pub type CommandHandler = Arc<dyn Fn(&[String]) -> Result<BridgeCommand> + Send + Sync>;

pub struct BridgeChannel {
    handlers: HashMap<String, CommandHandler>,
    outbound: Outbound,
}

impl BridgeChannel {
    /// Channel with an empty dispatch table.
    pub fn new(outbound: Outbound) -> Self {
        Self {
            handlers: HashMap::new(),
            outbound,
        }
    }

    /// Channel accepting every name in [`BridgeCommand::NAMES`].
    pub fn with_default_commands(outbound: Outbound) -> Self {
        let mut channel = Self::new(outbound);
        for &name in BridgeCommand::NAMES {
            channel.on_host_command(name, move |args| BridgeCommand::parse(name, args));
        }
        channel
    }

    /// Register (or replace) the handler for `name`.
    pub fn on_host_command<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&[String]) -> Result<BridgeCommand> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn handles(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Resolve an inbound command through the dispatch table.
    pub fn dispatch(&self, name: &str, args: &[String]) -> Result<BridgeCommand> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| LocationError::UnknownCommand(name.to_string()))?;
        handler(args)
    }

    /// Fire-and-forget call into the renderer.
    pub fn call_renderer(&self, call: RendererCall) -> bool {
        self.outbound.send(call)
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }
}

impl std::fmt::Debug for BridgeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("BridgeChannel")
            .field("commands", &names)
            .field("outbound", &self.outbound.stats())
            .finish()
    }
}

#[derive(Debug, Default)]
struct DeliveryCounters {
    queued: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Counters of the outbound queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub queued: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// Sending half of the outbound queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Outbound {
    sender: mpsc::UnboundedSender<RendererCall>,
    counters: Arc<DeliveryCounters>,
}

impl Outbound {
    pub fn channel() -> (Self, OutboundQueue) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let counters = Arc::new(DeliveryCounters::default());
        (
            Self {
                sender,
                counters: Arc::clone(&counters),
            },
            OutboundQueue { receiver, counters },
        )
    }

    /// Queue a call. Returns `false` once the delivery task is gone.
    pub fn send(&self, call: RendererCall) -> bool {
        match self.sender.send(call) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::SendError(call)) => {
                warn!(function = %call.function, "Renderer queue closed, call dropped");
                false
            }
        }
    }

    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            queued: self.counters.queued.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

/// Receiving half of the outbound queue.
pub struct OutboundQueue {
    receiver: mpsc::UnboundedReceiver<RendererCall>,
    counters: Arc<DeliveryCounters>,
}

impl OutboundQueue {
    pub fn spawn_delivery(
        self,
        renderer: Arc<dyn RendererEndpoint>,
        events: EventBus,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(renderer, events))
    }

    /// Deliver calls one at a time until every [`Outbound`] is dropped.
    pub async fn run(mut self, renderer: Arc<dyn RendererEndpoint>, events: EventBus) {
        while let Some(call) = self.receiver.recv().await {
            let function = call.function.clone();
            match renderer.evaluate(call).await {
                Ok(result) => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                    debug!(function = %function, result = ?result.0, "Renderer call evaluated");
                }
                Err(e) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    let failure = LocationError::BridgeDeliveryFailure(e.to_string());
                    warn!(function = %function, error = %failure, "Renderer call failed");
                    events
                        .emit(CoreEvent::Renderer(RendererEvent::DeliveryFailed {
                            function,
                            message: e.to_string(),
                        }))
                        .ok();
                }
            }
        }
        debug!("Renderer queue closed");
    }

    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Option<RendererCall> {
        self.receiver.try_recv().ok()
    }
}
