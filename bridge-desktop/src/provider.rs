//! Simulated Location Provider Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    location::{Fix, FixSink, LocationProvider, SubscriptionHandle, TrackingConfig},
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Time to first fix of a one-shot request.
const DEFAULT_FIX_DELAY: Duration = Duration::from_millis(250);

/// Simulated GPS for desktop development.
///
/// Replays a route of fixes in a loop:
/// - one-shot requests return the next waypoint after a short delay
/// - subscriptions deliver the next waypoint every `min_interval`
/// - the last delivered waypoint is the last-known fix
///
/// [`set_enabled(false)`](Self::set_enabled) simulates positioning being
/// switched off: requests fail with `ProviderUnavailable` and running
/// subscriptions report errors instead of fixes.
pub struct SimulatedLocationProvider {
    route: Arc<Vec<Fix>>,
    state: Arc<Mutex<SimulationState>>,
    fix_delay: Duration,
}

struct SimulationState {
    enabled: bool,
    cursor: usize,
    last_fix: Option<Fix>,
    subscriptions: HashMap<SubscriptionHandle, JoinHandle<()>>,
}

impl SimulatedLocationProvider {
    /// Create a provider replaying `route`.
    ///
    /// # Errors
    ///
    /// Returns an error if the route is empty.
    pub fn with_route(route: Vec<Fix>) -> Result<Self> {
        if route.is_empty() {
            return Err(BridgeError::InvalidFix(
                "simulated route needs at least one fix".to_string(),
            ));
        }

        Ok(Self::from_route(route))
    }

    fn from_route(route: Vec<Fix>) -> Self {
        Self {
            route: Arc::new(route),
            state: Arc::new(Mutex::new(SimulationState {
                enabled: true,
                cursor: 0,
                last_fix: None,
                subscriptions: HashMap::new(),
            })),
            fix_delay: DEFAULT_FIX_DELAY,
        }
    }

    /// Delay before a one-shot request resolves.
    pub fn with_fix_delay(mut self, delay: Duration) -> Self {
        self.fix_delay = delay;
        self
    }

    /// Switch simulated positioning on or off.
    pub fn set_enabled(&self, enabled: bool) {
        if let Ok(mut state) = self.state.lock() {
            debug!(enabled, "Simulated positioning toggled");
            state.enabled = enabled;
        }
    }

    /// Number of live subscriptions.
    pub fn active_subscriptions(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.subscriptions.len())
            .unwrap_or(0)
    }

    fn lock(state: &Mutex<SimulationState>) -> Result<MutexGuard<'_, SimulationState>> {
        state
            .lock()
            .map_err(|_| BridgeError::OperationFailed("simulation state poisoned".to_string()))
    }

    /// Advance along the route. `None` while positioning is disabled.
    fn advance(route: &[Fix], state: &Mutex<SimulationState>) -> Result<Option<Fix>> {
        let mut state = Self::lock(state)?;
        if !state.enabled {
            return Ok(None);
        }
        let fix = route[state.cursor % route.len()];
        state.cursor = state.cursor.wrapping_add(1);
        state.last_fix = Some(fix);
        Ok(Some(fix))
    }
}

impl Default for SimulatedLocationProvider {
    /// A short walk along the San Francisco waterfront.
    fn default() -> Self {
        let route = [
            (37.7749, -122.4194, 15.0, 8.5),
            (37.7755, -122.4189, 15.5, 6.0),
            (37.7761, -122.4183, 16.0, 5.2),
            (37.7768, -122.4176, 16.2, 4.8),
            (37.7774, -122.4170, 15.8, 7.1),
        ]
        .iter()
        .filter_map(|&(lat, lon, alt, acc)| Fix::new(lat, lon, alt, acc).ok())
        .collect();

        Self::from_route(route)
    }
}

impl Drop for SimulatedLocationProvider {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            for (_, task) in state.subscriptions.drain() {
                task.abort();
            }
        }
    }
}

#[async_trait]
impl LocationProvider for SimulatedLocationProvider {
    async fn request_once(&self, cancel: CancellationToken) -> Result<Fix> {
        tokio::select! {
            _ = cancel.cancelled() => return Err(BridgeError::Cancelled),
            _ = tokio::time::sleep(self.fix_delay) => {}
        }

        Self::advance(&self.route, &self.state)?.ok_or_else(|| {
            BridgeError::ProviderUnavailable("simulated positioning disabled".to_string())
        })
    }

    async fn last_known(&self) -> Result<Option<Fix>> {
        Ok(Self::lock(&self.state)?.last_fix)
    }

    fn subscribe(
        &self,
        config: &TrackingConfig,
        sink: Arc<dyn FixSink>,
    ) -> Result<SubscriptionHandle> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            BridgeError::NotAvailable("simulated tracking needs a tokio runtime".to_string())
        })?;

        let handle = SubscriptionHandle::new();
        let route = Arc::clone(&self.route);
        let state = Arc::clone(&self.state);
        let period = config.min_interval();

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match Self::advance(&route, &state) {
                    Ok(Some(fix)) => sink.on_fix(fix),
                    Ok(None) => sink.on_error(BridgeError::ProviderUnavailable(
                        "simulated positioning disabled".to_string(),
                    )),
                    Err(e) => {
                        warn!(error = %e, "Simulated subscription stopped");
                        break;
                    }
                }
            }
        });

        Self::lock(&self.state)?.subscriptions.insert(handle, task);
        debug!(%handle, interval_ms = config.min_interval_ms, "Simulated subscription started");
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        let task = Self::lock(&self.state)?
            .subscriptions
            .remove(&handle)
            .ok_or_else(|| {
                BridgeError::OperationFailed(format!("unknown subscription {}", handle))
            })?;
        task.abort();
        debug!(%handle, "Simulated subscription released");
        Ok(())
    }
}
