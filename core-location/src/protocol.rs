//! # Bridge Protocol
//!
//! Messages crossing the host/renderer boundary.
//!
//! ## Inbound (renderer → host)
//!
//! | name | args | command |
//! |------|------|---------|
//! | `getLocation` | none | [`BridgeCommand::GetLocation`] |
//! | `startTracking` | none | [`BridgeCommand::StartTracking`] |
//! | `stopTracking` | none | [`BridgeCommand::StopTracking`] |
//! | `showMessage` / `showToast` | text | [`BridgeCommand::ShowMessage`] |
//! | `logMessage` / `log` | text | [`BridgeCommand::LogMessage`] |
//!
//! Web views that can only post strings send a JSON envelope instead:
//! `{"command": "showMessage", "args": ["Hello"]}`.
//!
//! ## Outbound (host → renderer)
//!
//! A single entry point carrying five positional values:
//!
//! ```text
//! flyToLocation(longitude, latitude, altitude, accuracy, "single" | "continuous")
//! ```

use bridge_traits::{Fix, RendererCall};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{LocationError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    GetLocation,
    StartTracking,
    StopTracking,
    /// Presentation passthrough
    ShowMessage(String),
    /// Diagnostics passthrough
    LogMessage(String),
}

impl BridgeCommand {
    /// Every command name accepted from the renderer, aliases included.
    pub const NAMES: &'static [&'static str] = &[
        "getLocation",
        "startTracking",
        "stopTracking",
        "showMessage",
        "showToast",
        "logMessage",
        "log",
    ];

    /// Canonical name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            BridgeCommand::GetLocation => "getLocation",
            BridgeCommand::StartTracking => "startTracking",
            BridgeCommand::StopTracking => "stopTracking",
            BridgeCommand::ShowMessage(_) => "showMessage",
            BridgeCommand::LogMessage(_) => "logMessage",
        }
    }

    /// Build a command from its name and positional arguments.
    ///
    /// Extra arguments are ignored; a missing text argument is malformed.
    pub fn parse(name: &str, args: &[String]) -> Result<Self> {
        match name {
            "getLocation" => Ok(BridgeCommand::GetLocation),
            "startTracking" => Ok(BridgeCommand::StartTracking),
            "stopTracking" => Ok(BridgeCommand::StopTracking),
            "showMessage" | "showToast" => text_arg(name, args).map(BridgeCommand::ShowMessage),
            "logMessage" | "log" => text_arg(name, args).map(BridgeCommand::LogMessage),
            other => Err(LocationError::UnknownCommand(other.to_string())),
        }
    }
}

fn text_arg(name: &str, args: &[String]) -> Result<String> {
    args.first()
        .cloned()
        .ok_or_else(|| LocationError::malformed(name, "expected a text argument"))
}

#[derive(Deserialize)]
struct CommandEnvelope {
    command: String,
    #[serde(default)]
    args: Vec<Value>,
}

/// Split a JSON envelope into command name and positional arguments.
///
/// Non-string arguments are kept in their JSON text form.
pub fn parse_envelope(json: &str) -> Result<(String, Vec<String>)> {
    let envelope: CommandEnvelope = serde_json::from_str(json)
        .map_err(|e| LocationError::malformed("envelope", e.to_string()))?;

    let args = envelope
        .args
        .into_iter()
        .map(|value| match value {
            Value::String(text) => text,
            other => other.to_string(),
        })
        .collect();

    Ok((envelope.command, args))
}

/// Outbound message to the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BridgeEvent {
    LocationUpdate(Fix),
}

impl BridgeEvent {
    /// Serialize into one call of the renderer `function`.
    pub fn to_renderer_call(&self, function: &str) -> RendererCall {
        match self {
            BridgeEvent::LocationUpdate(fix) => RendererCall::new(function)
                .arg(fix.longitude())
                .arg(fix.latitude())
                .arg(fix.altitude_meters())
                .arg(fix.accuracy_meters())
                .arg(fix.source().tag()),
        }
    }
}
