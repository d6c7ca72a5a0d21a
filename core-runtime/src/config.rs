//! # Host Configuration Module
//!
//! Configuration management for the location bridge core.
//!
//! ## Overview
//!
//! A builder assembles a [`HostConfig`] holding every bridge the core needs
//! plus the tracking settings. It enforces fail-fast validation so a host
//! learns about a missing capability at startup, not on the first
//! `getLocation()` from the map.
//!
//! ## Required Dependencies
//!
//! - `LocationProvider` - platform positioning
//! - `PermissionStore` - OS location permission
//! - `RendererEndpoint` - the embedded map view
//!
//! ## Dependencies with desktop defaults
//!
//! - `Notifier` - user notices (desktop default: tracing-backed notifier)
//! - `PermissionPrompter` - rationale/settings UI (desktop default: console prompter)
//!
//! When the `desktop-shims` feature is enabled the defaults from
//! `bridge-desktop` are injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::HostConfig;
//! use std::sync::Arc;
//!
//! let config = HostConfig::builder()
//!     .location_provider(Arc::new(MyFusedProvider::new()))
//!     .permission_store(Arc::new(MyPermissionStore::new()))
//!     .renderer(Arc::new(MyWebView::new()))
//!     .notifier(Arc::new(MyToaster::new()))
//!     .permission_prompter(Arc::new(MyDialogs::new()))
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    LocationProvider, Notifier, PermissionPrompter, PermissionStore, RendererEndpoint,
    TrackingConfig,
};
use std::sync::Arc;

/// Name of the renderer-side function receiving location updates.
pub const DEFAULT_RENDERER_FUNCTION: &str = "flyToLocation";

/// Upper bound accepted for tracking intervals (one hour).
const MAX_INTERVAL_MS: u64 = 3_600_000;

/// Host configuration for the location bridge core.
///
/// Use [`HostConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct HostConfig {
    /// Platform positioning
    pub location_provider: Arc<dyn LocationProvider>,

    /// OS permission store
    pub permission_store: Arc<dyn PermissionStore>,

    /// Rationale / settings-redirect UI
    pub permission_prompter: Arc<dyn PermissionPrompter>,

    /// Embedded map renderer
    pub renderer: Arc<dyn RendererEndpoint>,

    /// User notices
    pub notifier: Arc<dyn Notifier>,

    /// Interval settings used by `startTracking`
    pub tracking: TrackingConfig,

    /// Renderer function receiving location updates
    pub renderer_function: String,

    /// Buffer size of the state-change event bus
    pub event_buffer_size: usize,

    /// Run a permission check (and remediation) as soon as the core starts
    pub check_permission_on_start: bool,
}

impl std::fmt::Debug for HostConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostConfig")
            .field("location_provider", &"LocationProvider { ... }")
            .field("permission_store", &"PermissionStore { ... }")
            .field("permission_prompter", &"PermissionPrompter { ... }")
            .field("renderer", &"RendererEndpoint { ... }")
            .field("notifier", &"Notifier { ... }")
            .field("tracking", &self.tracking)
            .field("renderer_function", &self.renderer_function)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("check_permission_on_start", &self.check_permission_on_start)
            .finish()
    }
}

impl HostConfig {
    pub fn builder() -> HostConfigBuilder {
        HostConfigBuilder::default()
    }

    /// Validates settings that the builder cannot enforce by type.
    ///
    /// This checks:
    /// - Tracking intervals are non-zero and below one hour
    /// - The fastest interval does not exceed the desired interval
    /// - The renderer function name is a plain identifier
    /// - The event buffer is non-empty
    pub fn validate(&self) -> Result<()> {
        validate_tracking(&self.tracking)?;

        let function = self.renderer_function.as_str();
        let valid_identifier = !function.is_empty()
            && !function.starts_with(|c: char| c.is_ascii_digit())
            && function
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.');
        if !valid_identifier {
            return Err(Error::Config(format!(
                "Renderer function '{}' is not a valid identifier",
                function
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Validates a tracking interval configuration.
pub fn validate_tracking(tracking: &TrackingConfig) -> Result<()> {
    if tracking.min_interval_ms == 0 || tracking.fastest_interval_ms == 0 {
        return Err(Error::Config(
            "Tracking intervals must be greater than 0ms".to_string(),
        ));
    }

    if tracking.min_interval_ms > MAX_INTERVAL_MS {
        return Err(Error::Config(format!(
            "Tracking interval exceeds maximum of {}ms",
            MAX_INTERVAL_MS
        )));
    }

    if tracking.fastest_interval_ms > tracking.min_interval_ms {
        return Err(Error::Config(format!(
            "Fastest interval ({}ms) cannot exceed the update interval ({}ms)",
            tracking.fastest_interval_ms, tracking.min_interval_ms
        )));
    }

    Ok(())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_notifier() -> Result<Arc<dyn Notifier>> {
    use bridge_desktop::TracingNotifier;

    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier::new());
    Ok(notifier)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_notifier() -> Result<Arc<dyn Notifier>> {
    Err(Error::missing(
        "Notifier",
        "Notifier implementation is required to surface location failures. \
         Desktop: enable the 'desktop-shims' feature to log notices through tracing. \
         Mobile: inject a Toast/banner based notifier.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_prompter() -> Result<Arc<dyn PermissionPrompter>> {
    use bridge_desktop::ConsolePrompter;

    let prompter: Arc<dyn PermissionPrompter> = Arc::new(ConsolePrompter::default());
    Ok(prompter)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_prompter() -> Result<Arc<dyn PermissionPrompter>> {
    Err(Error::missing(
        "PermissionPrompter",
        "PermissionPrompter implementation is required for the permission remediation flow. \
         Desktop: enable the 'desktop-shims' feature to use the console prompter. \
         Mobile: inject dialogs that explain the rationale and open the app settings page.",
    ))
}

/// Builder for constructing [`HostConfig`] instances.
#[derive(Default)]
pub struct HostConfigBuilder {
    location_provider: Option<Arc<dyn LocationProvider>>,
    permission_store: Option<Arc<dyn PermissionStore>>,
    permission_prompter: Option<Arc<dyn PermissionPrompter>>,
    renderer: Option<Arc<dyn RendererEndpoint>>,
    notifier: Option<Arc<dyn Notifier>>,
    tracking: Option<TrackingConfig>,
    renderer_function: Option<String>,
    event_buffer_size: Option<usize>,
    check_permission_on_start: Option<bool>,
}

impl HostConfigBuilder {
    pub fn location_provider(mut self, provider: Arc<dyn LocationProvider>) -> Self {
        self.location_provider = Some(provider);
        self
    }

    pub fn permission_store(mut self, store: Arc<dyn PermissionStore>) -> Self {
        self.permission_store = Some(store);
        self
    }

    /// If not provided, the desktop console prompter is used when the
    /// `desktop-shims` feature is enabled.
    pub fn permission_prompter(mut self, prompter: Arc<dyn PermissionPrompter>) -> Self {
        self.permission_prompter = Some(prompter);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn RendererEndpoint>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// If not provided, notices are logged through `tracing` when the
    /// `desktop-shims` feature is enabled.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Overrides the interval settings used by `startTracking`.
    ///
    /// Default: 5000ms desired, 2000ms fastest, high accuracy, no waiting for
    /// accurate fixes.
    pub fn tracking(mut self, tracking: TrackingConfig) -> Self {
        self.tracking = Some(tracking);
        self
    }

    /// Default: `flyToLocation`
    pub fn renderer_function(mut self, function: impl Into<String>) -> Self {
        self.renderer_function = Some(function.into());
        self
    }

    /// Default: 100 events
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Default: `true`
    pub fn check_permission_on_start(mut self, enabled: bool) -> Self {
        self.check_permission_on_start = Some(enabled);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - `CapabilityMissing` when a required bridge was not provided and no
    ///   platform default exists
    /// - `Config` when validation fails
    pub fn build(self) -> Result<HostConfig> {
        let location_provider = self.location_provider.ok_or_else(|| {
            Error::missing(
                "LocationProvider",
                "No location provider supplied. \
                 Desktop: use bridge_desktop::SimulatedLocationProvider. \
                 Mobile: inject the platform positioning adapter.",
            )
        })?;

        let permission_store = self.permission_store.ok_or_else(|| {
            Error::missing(
                "PermissionStore",
                "No permission store supplied. \
                 Desktop: use bridge_desktop::MemoryPermissionStore. \
                 Mobile: inject the platform permission adapter.",
            )
        })?;

        let renderer = self.renderer.ok_or_else(|| {
            Error::missing(
                "RendererEndpoint",
                "No renderer endpoint supplied. Inject the web view adapter that \
                 evaluates calls inside the embedded map.",
            )
        })?;

        let notifier = match self.notifier {
            Some(notifier) => notifier,
            None => provide_default_notifier()?,
        };

        let permission_prompter = match self.permission_prompter {
            Some(prompter) => prompter,
            None => provide_default_prompter()?,
        };

        let config = HostConfig {
            location_provider,
            permission_store,
            permission_prompter,
            renderer,
            notifier,
            tracking: self.tracking.unwrap_or_default(),
            renderer_function: self
                .renderer_function
                .unwrap_or_else(|| DEFAULT_RENDERER_FUNCTION.to_string()),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            check_permission_on_start: self.check_permission_on_start.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}
