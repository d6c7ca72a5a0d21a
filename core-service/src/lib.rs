//! Core service façade and bootstrap helpers.
//!
//! This crate wires a host-provided [`HostConfig`] (positioning, permission,
//! renderer and UI bridges) into the location host loop. Desktop apps
//! typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) and use [`LocationService::desktop`] for a simulated
//! setup.

pub mod error;

pub use error::{CoreError, Result};

pub use core_location::{HostHandle, HostSnapshot};
pub use core_runtime::config::HostConfig;
pub use core_runtime::events::{CoreEvent, EventBus, EventStream};

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

#[cfg(feature = "desktop-shims")]
use bridge_desktop::{MemoryPermissionStore, SimulatedLocationProvider};
#[cfg(feature = "desktop-shims")]
use bridge_traits::RendererEndpoint;
#[cfg(feature = "desktop-shims")]
use std::sync::Arc;

/// Primary façade exposed to host applications.
///
/// Owns the running host loop. Dropping the service queues a shutdown, which
/// stops tracking and cancels pending requests; call
/// [`shutdown`](Self::shutdown) to wait for it.
pub struct LocationService {
    handle: HostHandle,
    events: EventBus,
    task: Option<JoinHandle<()>>,
}

impl LocationService {
    /// Start the host loop on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `InitializationFailed` when called outside a tokio runtime.
    #[instrument(skip(config), fields(renderer_function = %config.renderer_function))]
    pub fn bootstrap(config: HostConfig) -> Result<Self> {
        tokio::runtime::Handle::try_current().map_err(|_| {
            CoreError::InitializationFailed(
                "LocationService must be started inside a tokio runtime".to_string(),
            )
        })?;

        let events = EventBus::new(config.event_buffer_size);
        let (handle, task) = core_location::spawn_host(&config, events.clone());
        info!("Location service started");

        Ok(Self {
            handle,
            events,
            task: Some(task),
        })
    }

    /// Start with the simulated desktop provider and an always-granted
    /// permission store, rendering into `renderer`.
    #[cfg(feature = "desktop-shims")]
    pub fn desktop(renderer: Arc<dyn RendererEndpoint>) -> Result<Self> {
        let config = HostConfig::builder()
            .location_provider(Arc::new(SimulatedLocationProvider::default()))
            .permission_store(Arc::new(MemoryPermissionStore::granted()))
            .renderer(renderer)
            .build()?;
        Self::bootstrap(config)
    }

    /// Handle for platform glue, e.g. the web view's JavaScript interface.
    pub fn handle(&self) -> HostHandle {
        self.handle.clone()
    }

    /// Deliver a renderer command by name.
    pub fn invoke(&self, name: &str, args: Vec<String>) -> Result<()> {
        Ok(self.handle.invoke(name, args)?)
    }

    /// Deliver a renderer command as a JSON envelope.
    pub fn invoke_envelope(&self, json: &str) -> Result<()> {
        Ok(self.handle.invoke_envelope(json)?)
    }

    /// Re-run the permission check, e.g. when the app returns to the
    /// foreground after a settings redirect.
    pub fn check_permission(&self) -> Result<()> {
        Ok(self.handle.check_permission()?)
    }

    /// Subscribe to permission, tracking and renderer state changes.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    /// Current host status, e.g. to confirm exit while tracking.
    pub async fn snapshot(&self) -> Result<HostSnapshot> {
        Ok(self.handle.snapshot().await?)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Stop tracking, cancel pending requests and wait for the loop to end.
    #[instrument(skip(self))]
    pub async fn shutdown(mut self) -> Result<()> {
        self.handle.shutdown().await?;
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| {
                CoreError::InitializationFailed(format!("host task failed: {}", e))
            })?;
        }
        info!("Location service stopped");
        Ok(())
    }
}

impl Drop for LocationService {
    fn drop(&mut self) {
        if self.task.take().is_some() && self.handle.request_shutdown().is_ok() {
            debug!("Location service dropped, shutdown queued");
        }
    }
}

impl std::fmt::Debug for LocationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationService")
            .field("running", &self.handle.is_running())
            .field("subscribers", &self.events.subscriber_count())
            .finish()
    }
}
