//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the location bridge core and the
//! platform it runs on. Each trait represents a capability the core requires
//! but that must be implemented differently per platform (Android, iOS,
//! desktop web views).
//!
//! ## Traits
//!
//! ### Positioning
//! - [`LocationProvider`](location::LocationProvider) - One-shot, last-known and continuous fixes
//! - [`FixSink`](location::FixSink) - Callback receiving subscription deliveries
//!
//! ### Permission
//! - [`PermissionStore`](permission::PermissionStore) - Query/request OS location permission
//! - [`PermissionCallback`](permission::PermissionCallback) - Asynchronous request outcome
//! - [`PermissionPrompter`](permission::PermissionPrompter) - Rationale and settings-redirect UI
//!
//! ### Renderer & UI
//! - [`RendererEndpoint`](renderer::RendererEndpoint) - Evaluate calls inside the embedded map view
//! - [`Notifier`](ui::Notifier) - Short user-facing notices
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Simulated provider |
//! | Android  | TBD                 | 📋 Planned |
//! | iOS      | TBD                 | 📋 Planned |
//!
//! ## Callback Threads
//!
//! Platforms deliver fixes and permission results on their own threads. All
//! traits therefore require `Send + Sync`; the core re-posts every callback
//! onto its single serialized context before touching any state.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations should map "positioning disabled" style failures to
//! [`BridgeError::ProviderUnavailable`] and honour cancellation with
//! [`BridgeError::Cancelled`].

pub mod error;
pub mod location;
pub mod logging;
pub mod permission;
pub mod renderer;
pub mod ui;

pub use error::BridgeError;

// Re-export commonly used types
pub use location::{Fix, FixSink, FixSource, LocationProvider, SubscriptionHandle, TrackingConfig};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use permission::{
    PermissionCallback, PermissionOutcome, PermissionPrompter, PermissionRequestId,
    PermissionState, PermissionStatus, PermissionStore,
};
pub use renderer::{EvaluationResult, RendererArg, RendererCall, RendererEndpoint};
pub use ui::{Notice, NoticeLevel, Notifier};

// Hosts implementing `LocationProvider` need the same token type.
pub use tokio_util::sync::CancellationToken;
