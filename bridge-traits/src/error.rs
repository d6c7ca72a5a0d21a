use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Location provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Invalid fix: {0}")]
    InvalidFix(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl BridgeError {
    /// Whether the error came from a cancellation requested by the core itself.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BridgeError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
