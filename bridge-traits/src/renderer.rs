//! Renderer Endpoint Abstraction
//!
//! The embedded map renderer lives in a separate execution context (a web
//! view). The host reaches it by evaluating a function call inside that
//! context; the evaluation result is only useful for diagnostics.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A positional argument of a renderer call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RendererArg {
    Number(f64),
    Float(f32),
    Text(String),
}

impl RendererArg {
    fn to_script(&self) -> String {
        match self {
            // Debug formatting keeps the shortest round-trip representation
            // and always includes a fractional part ("15.0", "8.5").
            RendererArg::Number(value) => format!("{:?}", value),
            RendererArg::Float(value) => format!("{:?}", value),
            RendererArg::Text(text) => {
                serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
            }
        }
    }
}

impl From<f64> for RendererArg {
    fn from(value: f64) -> Self {
        RendererArg::Number(value)
    }
}

impl From<f32> for RendererArg {
    fn from(value: f32) -> Self {
        RendererArg::Float(value)
    }
}

impl From<&str> for RendererArg {
    fn from(value: &str) -> Self {
        RendererArg::Text(value.to_string())
    }
}

impl From<String> for RendererArg {
    fn from(value: String) -> Self {
        RendererArg::Text(value)
    }
}

/// One function invocation inside the renderer context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererCall {
    pub function: String,
    pub args: Vec<RendererArg>,
}

impl RendererCall {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<RendererArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Render the call as a script expression, e.g.
    /// `flyToLocation(-122.4194, 37.7749, 15.0, 8.5, "continuous")`.
    pub fn to_script(&self) -> String {
        let args = self
            .args
            .iter()
            .map(RendererArg::to_script)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.function, args)
    }
}

/// Raw value returned by the renderer after evaluating a call.
///
/// `None` when the platform reports no value (e.g. a `void` function).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult(pub Option<String>);

/// Renderer endpoint trait
///
/// - **Android**: `WebView.evaluateJavascript`
/// - **iOS**: `WKWebView.evaluateJavaScript`
/// - **Desktop**: wry/webview `evaluate_script`
///
/// Implementations must evaluate calls in the order they are awaited. The
/// core never retries a failed evaluation.
#[async_trait::async_trait]
pub trait RendererEndpoint: Send + Sync {
    async fn evaluate(&self, call: RendererCall) -> Result<EvaluationResult>;
}
