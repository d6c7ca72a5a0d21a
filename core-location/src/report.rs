//! User-facing error reporting.
//!
//! Every failure is logged; only those with a [`LocationError::user_message`]
//! reach the host [`Notifier`].

use std::sync::Arc;

use bridge_traits::{Notice, Notifier};
use tracing::{info, warn};

use crate::error::LocationError;

#[derive(Clone)]
pub struct ErrorReporter {
    notifier: Arc<dyn Notifier>,
}

impl ErrorReporter {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Log `error` and surface it to the user when it is user-facing.
    pub fn report(&self, error: &LocationError) {
        warn!(error = %error, "Location failure");

        if let Some(message) = error.user_message() {
            let notice = match error {
                LocationError::PermissionDenied
                | LocationError::PermissionPermanentlyDenied => Notice::warning(message),
                _ => Notice::error(message),
            };
            self.notifier.show(notice);
        }
    }

    /// Informational notice, e.g. a successful fix.
    pub fn notice(&self, message: impl Into<String>) {
        let message = message.into();
        info!(notice = %message, "User notice");
        self.notifier.show(Notice::info(message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        let message = message.into();
        info!(notice = %message, "User warning");
        self.notifier.show(Notice::warning(message));
    }
}

impl std::fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorReporter").finish_non_exhaustive()
    }
}
