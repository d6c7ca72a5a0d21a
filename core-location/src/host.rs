//! # Host Loop
//!
//! The serialized execution context of the location bridge.
//!
//! One tokio task owns the [`PermissionGate`], the [`TrackingSessionManager`]
//! and the [`BridgeChannel`] and processes [`HostMessage`]s strictly one at a
//! time. Renderer commands, provider callbacks and permission results all
//! arrive through the same mailbox, so every check-then-act sequence (such as
//! "subscribe unless already active") runs without interleaving.
//!
//! ```text
//! renderer ──invoke──▶ mailbox ──▶ dispatch table ──▶ PermissionGate
//!                         ▲                               │ granted
//!                         │                               ▼
//!    provider callbacks ──┘                    TrackingSessionManager
//!                                                         │ fix
//!                                                         ▼
//!                                    outbound queue ──▶ renderer.evaluate
//! ```

use std::ops::ControlFlow;

use bridge_traits::{PermissionState, TrackingConfig};
use core_runtime::config::HostConfig;
use core_runtime::events::EventBus;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::channel::{BridgeChannel, DeliveryStats, Outbound};
use crate::dispatch::{Dispatcher, HostMessage};
use crate::error::{LocationError, Result};
use crate::permission::PermissionGate;
use crate::protocol::{parse_envelope, BridgeCommand};
use crate::report::ErrorReporter;
use crate::session::TrackingSessionManager;

/// Point-in-time view of the host state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HostSnapshot {
    pub permission: PermissionState,
    pub tracking_active: bool,
    pub pending_single_fixes: usize,
    pub deliveries: DeliveryStats,
}

pub struct LocationHost {
    gate: PermissionGate,
    sessions: TrackingSessionManager,
    channel: BridgeChannel,
    reporter: ErrorReporter,
    tracking: TrackingConfig,
}

impl LocationHost {
    pub fn new(
        config: &HostConfig,
        events: EventBus,
        dispatcher: Dispatcher,
        outbound: Outbound,
    ) -> Self {
        let reporter = ErrorReporter::new(config.notifier.clone());
        let gate = PermissionGate::new(
            config.permission_store.clone(),
            config.permission_prompter.clone(),
            reporter.clone(),
            events.clone(),
            dispatcher.clone(),
        );
        let sessions = TrackingSessionManager::new(
            config.location_provider.clone(),
            outbound.clone(),
            config.renderer_function.clone(),
            reporter.clone(),
            events,
            dispatcher,
        );

        Self {
            gate,
            sessions,
            channel: BridgeChannel::with_default_commands(outbound),
            reporter,
            tracking: config.tracking,
        }
    }

    /// Dispatch table, for registering extra command names before the loop starts.
    pub fn channel_mut(&mut self) -> &mut BridgeChannel {
        &mut self.channel
    }

    pub fn snapshot(&self) -> HostSnapshot {
        HostSnapshot {
            permission: self.gate.state(),
            tracking_active: self.sessions.session().is_active(),
            pending_single_fixes: self.sessions.pending_requests(),
            deliveries: self.channel.outbound().stats(),
        }
    }

    /// Process messages until shutdown.
    pub async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<HostMessage>) {
        info!("Location host started");
        while let Some(message) = mailbox.recv().await {
            if self.handle_message(message).is_break() {
                info!("Location host stopped");
                return;
            }
        }
        self.sessions.teardown();
        info!("Location host mailbox closed");
    }

    pub fn handle_message(&mut self, message: HostMessage) -> ControlFlow<()> {
        match message {
            HostMessage::Command { name, args } => self.handle_command(&name, &args),
            HostMessage::Envelope(json) => match parse_envelope(&json) {
                Ok((name, args)) => self.handle_command(&name, &args),
                Err(e) => self.reporter.report(&e),
            },
            HostMessage::CheckPermission => {
                if let Err(e) = self.gate.ensure_granted() {
                    info!(error = %e, "Location permission missing");
                }
            }
            HostMessage::PermissionResult(outcome) => self.gate.on_result(outcome),
            HostMessage::RationaleAnswered(accepted) => self.gate.on_rationale_answer(accepted),
            HostMessage::SingleFix { request_id, result } => {
                self.sessions.on_single_fix(request_id, result)
            }
            HostMessage::LastKnown { request_id, result } => {
                self.sessions.on_last_known(request_id, result)
            }
            HostMessage::ContinuousFix { generation, fix } => {
                self.sessions.on_continuous_fix(generation, fix)
            }
            HostMessage::ContinuousError { generation, error } => {
                self.sessions.on_continuous_error(generation, error)
            }
            HostMessage::Snapshot(reply) => {
                reply.send(self.snapshot()).ok();
            }
            HostMessage::Shutdown(reply) => {
                self.sessions.teardown();
                reply.send(()).ok();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn handle_command(&mut self, name: &str, args: &[String]) {
        match self.channel.dispatch(name, args) {
            Ok(command) => self.execute(command),
            Err(e) => self.reporter.report(&e),
        }
    }

    /// Run one bridge command.
    pub fn execute(&mut self, command: BridgeCommand) {
        let name = command.name();
        debug!(command = name, "Executing bridge command");
        match command {
            BridgeCommand::GetLocation => {
                if self.permitted(name) {
                    self.sessions.request_single_fix();
                }
            }
            BridgeCommand::StartTracking => {
                if self.permitted(name) {
                    self.sessions.start_continuous(self.tracking);
                }
            }
            BridgeCommand::StopTracking => {
                self.sessions.stop_continuous();
            }
            BridgeCommand::ShowMessage(text) => self.reporter.notice(text),
            BridgeCommand::LogMessage(text) => info!(target: "renderer", "{}", text),
        }
    }

    fn permitted(&mut self, command: &str) -> bool {
        match self.gate.ensure_granted() {
            Ok(()) => true,
            Err(e) => {
                info!(command, error = %e, "Command refused, remediation started");
                false
            }
        }
    }
}

impl std::fmt::Debug for LocationHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationHost")
            .field("gate", &self.gate)
            .field("sessions", &self.sessions)
            .field("channel", &self.channel)
            .finish()
    }
}

/// Start the host loop and the renderer delivery task on the current runtime.
///
/// With `check_permission_on_start` set, a permission check is queued before
/// any renderer command.
pub fn spawn_host(config: &HostConfig, events: EventBus) -> (HostHandle, JoinHandle<()>) {
    let (dispatcher, mailbox) = Dispatcher::new();
    let (outbound, queue) = Outbound::channel();
    queue.spawn_delivery(config.renderer.clone(), events.clone());

    let host = LocationHost::new(config, events, dispatcher.clone(), outbound);
    if config.check_permission_on_start {
        dispatcher.post(HostMessage::CheckPermission);
    }
    let join = tokio::spawn(host.run(mailbox));

    (HostHandle { dispatcher }, join)
}

/// Thread-safe entry point into a running host. Every method only posts to
/// the mailbox; none waits on the platform.
#[derive(Debug, Clone)]
pub struct HostHandle {
    dispatcher: Dispatcher,
}

impl HostHandle {
    /// Deliver a renderer command by name.
    pub fn invoke(&self, name: impl Into<String>, args: Vec<String>) -> Result<()> {
        self.post(HostMessage::Command {
            name: name.into(),
            args,
        })
    }

    /// Deliver a renderer command as a JSON envelope.
    pub fn invoke_envelope(&self, json: impl Into<String>) -> Result<()> {
        self.post(HostMessage::Envelope(json.into()))
    }

    pub fn get_location(&self) -> Result<()> {
        self.invoke("getLocation", Vec::new())
    }

    pub fn start_tracking(&self) -> Result<()> {
        self.invoke("startTracking", Vec::new())
    }

    pub fn stop_tracking(&self) -> Result<()> {
        self.invoke("stopTracking", Vec::new())
    }

    /// Re-check the permission, starting remediation if it is missing.
    pub fn check_permission(&self) -> Result<()> {
        self.post(HostMessage::CheckPermission)
    }

    pub async fn snapshot(&self) -> Result<HostSnapshot> {
        let (reply, response) = oneshot::channel();
        self.post(HostMessage::Snapshot(reply))?;
        response.await.map_err(|_| LocationError::HostStopped)
    }

    /// Stop tracking, cancel pending requests and end the loop.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.post(HostMessage::Shutdown(reply))?;
        response.await.map_err(|_| LocationError::HostStopped)
    }

    /// Queue a shutdown without waiting for the loop to acknowledge it.
    pub fn request_shutdown(&self) -> Result<()> {
        let (reply, _response) = oneshot::channel();
        self.post(HostMessage::Shutdown(reply))
    }

    pub fn is_running(&self) -> bool {
        !self.dispatcher.is_closed()
    }

    fn post(&self, message: HostMessage) -> Result<()> {
        if self.dispatcher.post(message) {
            Ok(())
        } else {
            Err(LocationError::HostStopped)
        }
    }
}
