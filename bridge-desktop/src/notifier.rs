//! Tracing-backed Notifier Implementation

use bridge_traits::ui::{Notice, NoticeLevel, Notifier};
use tracing::{error, info, warn};

/// Writes user notices to the log under the `notice` target.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for TracingNotifier {
    fn show(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!(target: "notice", "{}", notice.message),
            NoticeLevel::Warning => warn!(target: "notice", "{}", notice.message),
            NoticeLevel::Error => error!(target: "notice", "{}", notice.message),
        }
    }
}
