//! # Desktop Bridge Implementations
//!
//! Default implementations of the bridge traits for desktop development hosts
//! (macOS, Windows, Linux), where no real positioning hardware or permission
//! dialog is available.
//!
//! ## Overview
//!
//! - `LocationProvider` as a simulated GPS replaying a route on a tokio timer
//! - `PermissionStore` kept in memory with a configurable request policy
//! - `PermissionPrompter` answering from configuration and logging the dialog
//! - `Notifier` writing notices through `tracing`
//! - `RendererEndpoint` logging and recording every renderer call
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{LoggingRenderer, MemoryPermissionStore, SimulatedLocationProvider};
//! use core_runtime::config::HostConfig;
//! use std::sync::Arc;
//!
//! let config = HostConfig::builder()
//!     .location_provider(Arc::new(SimulatedLocationProvider::default()))
//!     .permission_store(Arc::new(MemoryPermissionStore::granted()))
//!     .renderer(Arc::new(LoggingRenderer::new()))
//!     .build()?;
//! ```

mod notifier;
mod permission;
mod provider;
mod renderer;

pub use notifier::TracingNotifier;
pub use permission::{ConsolePrompter, MemoryPermissionStore, RequestPolicy};
pub use provider::SimulatedLocationProvider;
pub use renderer::LoggingRenderer;
