//! User Notice Abstraction
//!
//! Short human-readable messages surfaced by the host (toasts, snackbars,
//! status lines).

use serde::{Deserialize, Serialize};

/// Severity of a notice; hosts usually map `Error` to a longer display time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Notifier trait
///
/// - **Android**: `Toast` (`LENGTH_LONG` for errors)
/// - **iOS**: banner / HUD
/// - **Desktop**: status bar or log output
///
/// Must not block; hosts marshal onto their UI thread themselves.
pub trait Notifier: Send + Sync {
    fn show(&self, notice: Notice);
}
