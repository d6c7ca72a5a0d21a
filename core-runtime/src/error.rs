use thiserror::Error;

/// Errors raised while assembling the runtime (configuration, logging).
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid host configuration: {0}")]
    Config(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl Error {
    pub(crate) fn missing(capability: &str, message: impl Into<String>) -> Self {
        Error::CapabilityMissing {
            capability: capability.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
