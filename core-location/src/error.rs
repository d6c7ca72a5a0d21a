use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location permission permanently denied")]
    PermissionPermanentlyDenied,

    #[error("Location provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("No location fix available")]
    NoFixAvailable,

    #[error("Renderer delivery failed: {0}")]
    BridgeDeliveryFailure(String),

    #[error("Unknown bridge command: {0}")]
    UnknownCommand(String),

    #[error("Malformed bridge command '{command}': {reason}")]
    MalformedCommand { command: String, reason: String },

    #[error("Location host is not running")]
    HostStopped,

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl LocationError {
    /// Every failure in this crate is recoverable except a stopped host.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LocationError::HostStopped)
    }

    /// Text shown to the user, or `None` for failures that are only logged.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            LocationError::PermissionDenied => {
                Some("Location permission is needed to show your position")
            }
            LocationError::PermissionPermanentlyDenied => {
                Some("Location permission was denied. Enable it in Settings")
            }
            LocationError::ProviderUnavailable(_) => Some("Location services are unavailable"),
            LocationError::NoFixAvailable => Some("Unable to get your location"),
            LocationError::Bridge(BridgeError::ProviderUnavailable(_)) => {
                Some("Location services are unavailable")
            }
            LocationError::BridgeDeliveryFailure(_)
            | LocationError::UnknownCommand(_)
            | LocationError::MalformedCommand { .. }
            | LocationError::HostStopped
            | LocationError::Bridge(_) => None,
        }
    }

    pub(crate) fn malformed(command: &str, reason: impl Into<String>) -> Self {
        LocationError::MalformedCommand {
            command: command.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LocationError>;
