//! Location Provider Abstraction
//!
//! The platform location port: one-shot fixes, last-known fixes and a
//! continuous subscription delivering fixes through a [`FixSink`] callback.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{BridgeError, Result};

/// Minimum update interval for continuous tracking (milliseconds).
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 5_000;

/// Fastest interval at which the platform may deliver fixes (milliseconds).
pub const DEFAULT_FASTEST_INTERVAL_MS: u64 = 2_000;

/// How a fix was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixSource {
    /// Answer to a one-shot request (live or last-known fallback)
    Single,
    /// Delivered by a standing subscription
    Continuous,
}

impl FixSource {
    /// Tag used on the renderer side of the bridge.
    pub fn tag(&self) -> &'static str {
        match self {
            FixSource::Single => "single",
            FixSource::Continuous => "continuous",
        }
    }
}

/// One reported geographic position sample.
///
/// Coordinates are range-checked at construction, so every `Fix` in the
/// system satisfies the invariants below:
/// - latitude in `[-90, 90]`
/// - longitude in `[-180, 180]`
/// - accuracy finite and `>= 0`
/// - altitude finite
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFix", rename_all = "camelCase")]
pub struct Fix {
    latitude: f64,
    longitude: f64,
    altitude_meters: f64,
    accuracy_meters: f32,
    source: FixSource,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFix {
    latitude: f64,
    longitude: f64,
    altitude_meters: f64,
    accuracy_meters: f32,
    #[serde(default = "default_source")]
    source: FixSource,
}

fn default_source() -> FixSource {
    FixSource::Single
}

impl TryFrom<RawFix> for Fix {
    type Error = BridgeError;

    fn try_from(raw: RawFix) -> Result<Self> {
        Ok(Fix::new(
            raw.latitude,
            raw.longitude,
            raw.altitude_meters,
            raw.accuracy_meters,
        )?
        .with_source(raw.source))
    }
}

impl Fix {
    /// Build a fix, validating coordinate ranges.
    ///
    /// New fixes are tagged [`FixSource::Single`]; the tracking layer retags
    /// them when they come from a subscription.
    pub fn new(
        latitude: f64,
        longitude: f64,
        altitude_meters: f64,
        accuracy_meters: f32,
    ) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(BridgeError::InvalidFix(format!(
                "latitude {} outside [-90, 90]",
                latitude
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(BridgeError::InvalidFix(format!(
                "longitude {} outside [-180, 180]",
                longitude
            )));
        }
        if !altitude_meters.is_finite() {
            return Err(BridgeError::InvalidFix(format!(
                "altitude {} is not finite",
                altitude_meters
            )));
        }
        if !accuracy_meters.is_finite() || accuracy_meters < 0.0 {
            return Err(BridgeError::InvalidFix(format!(
                "accuracy {} must be finite and non-negative",
                accuracy_meters
            )));
        }

        Ok(Self {
            latitude,
            longitude,
            altitude_meters,
            accuracy_meters,
            source: FixSource::Single,
        })
    }

    /// Return the same position tagged with `source`.
    pub fn with_source(mut self, source: FixSource) -> Self {
        self.source = source;
        self
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn altitude_meters(&self) -> f64 {
        self.altitude_meters
    }

    pub fn accuracy_meters(&self) -> f32 {
        self.accuracy_meters
    }

    pub fn source(&self) -> FixSource {
        self.source
    }

    /// Accuracy rounded to the nearest whole metre, for user-facing notices.
    pub fn rounded_accuracy(&self) -> u32 {
        self.accuracy_meters.round() as u32
    }
}

/// Interval configuration for a continuous subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Desired interval between fixes
    pub min_interval_ms: u64,
    /// Fastest interval the platform may deliver at
    pub fastest_interval_ms: u64,
    /// Request high-accuracy positioning (GNSS)
    pub high_accuracy: bool,
    /// Hold back delivery until an accurate fix is available.
    ///
    /// Disabled by default: approximate fixes are delivered rather than waited on.
    pub wait_for_accurate: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: DEFAULT_MIN_INTERVAL_MS,
            fastest_interval_ms: DEFAULT_FASTEST_INTERVAL_MS,
            high_accuracy: true,
            wait_for_accurate: false,
        }
    }
}

impl TrackingConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn fastest_interval(&self) -> Duration {
        Duration::from_millis(self.fastest_interval_ms)
    }
}

/// Identifier of a live subscription, issued by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionHandle(pub Uuid);

impl SubscriptionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiver for fixes delivered by a continuous subscription.
///
/// Called from whatever thread the platform delivers on. Implementations must
/// return promptly; the core's sink only posts into its own mailbox.
pub trait FixSink: Send + Sync {
    /// A new fix was produced
    fn on_fix(&self, fix: Fix);

    /// The provider hit an error; the subscription stays registered
    fn on_error(&self, error: BridgeError);
}

/// Location provider trait
///
/// Wraps the OS positioning APIs:
/// - **Android**: FusedLocationProviderClient
/// - **iOS**: CLLocationManager
/// - **Desktop**: simulated or GeoClue/CoreLocation backed providers
///
/// Timeouts and retry/backoff are the provider's responsibility. The core only
/// reacts to the results.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::location::{LocationProvider, TrackingConfig};
/// use tokio_util::sync::CancellationToken;
///
/// async fn locate(provider: &dyn LocationProvider) -> Result<()> {
///     let fix = provider.request_once(CancellationToken::new()).await?;
///     println!("{}, {}", fix.latitude(), fix.longitude());
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait LocationProvider: Send + Sync {
    /// Request a single fresh fix.
    ///
    /// Must resolve with [`BridgeError::Cancelled`] once `cancel` fires before a
    /// fix is available.
    async fn request_once(&self, cancel: CancellationToken) -> Result<Fix>;

    /// Most recent fix cached by the platform, if any.
    async fn last_known(&self) -> Result<Option<Fix>>;

    /// Register a continuous subscription.
    ///
    /// Registration itself must not wait for a fix; fixes arrive later through
    /// `sink`.
    fn subscribe(
        &self,
        config: &TrackingConfig,
        sink: Arc<dyn FixSink>,
    ) -> Result<SubscriptionHandle>;

    /// Release a subscription obtained from [`subscribe`](Self::subscribe).
    fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()>;
}
