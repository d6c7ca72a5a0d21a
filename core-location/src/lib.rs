//! # Location Bridge Core
//!
//! Exposes live and on-demand position to an embedded map renderer through a
//! bidirectional message bridge, while mediating the OS location permission
//! and the lifecycle of a continuous tracking subscription.
//!
//! ## Components
//!
//! - **Permission Gate** (`permission`): permission state machine and remediation flow
//! - **Tracking Session Manager** (`session`): single-fix fallback policy and the one continuous subscription
//! - **Bridge Protocol** (`protocol`): inbound commands and the outbound `flyToLocation` call
//! - **Bridge Channel** (`channel`): command dispatch table and ordered renderer delivery
//! - **Error Reporter** (`report`): logs failures and surfaces user notices
//! - **Host Loop** (`host`): the serialized context everything above runs on
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_location::spawn_host;
//! use core_runtime::events::EventBus;
//!
//! let (handle, _join) = spawn_host(&config, EventBus::default());
//!
//! // From the web view's JavaScript interface
//! handle.invoke("startTracking", vec![])?;
//! handle.invoke_envelope(r#"{"command":"logMessage","args":["map ready"]}"#)?;
//!
//! // On exit
//! handle.shutdown().await?;
//! ```

pub mod channel;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod permission;
pub mod protocol;
pub mod report;
pub mod session;

pub use channel::{BridgeChannel, DeliveryStats, Outbound, OutboundQueue};
pub use dispatch::{Dispatcher, HostMessage};
pub use error::{LocationError, Result};
pub use host::{spawn_host, HostHandle, HostSnapshot, LocationHost};
pub use permission::PermissionGate;
pub use protocol::{BridgeCommand, BridgeEvent};
pub use report::ErrorReporter;
pub use session::{TrackingSession, TrackingSessionManager};
