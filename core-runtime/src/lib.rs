//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the location bridge core:
//! - Logging and tracing infrastructure
//! - Host configuration and bridge wiring
//! - Event bus for state-change notifications
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the other core crates depend
//! on. It establishes the logging conventions, the fail-fast configuration
//! builder and the event broadcasting used to observe permission and tracking
//! state.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
