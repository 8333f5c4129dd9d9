//! Render configuration.

use serde::{Deserialize, Serialize};

/// How a session treats slots whose value is not yet available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Flush what is rendered so far and wait for the value inline.
    Blocking,
    /// Emit a placeholder and patch it once the value resolves.
    #[default]
    Streaming,
}

/// When the engine flushes the output sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Flush only at protocol markers: activation, each patch, before blocking.
    #[default]
    AtMarkers,
    /// Flush after every write.
    Eager,
    /// Flush at markers, and whenever this many bytes are buffered.
    Threshold { bytes: usize },
}

/// Names used by the placeholder/patch markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupConfig {
    /// Attribute carrying the correlation ID.
    #[serde(default = "default_attribute")]
    pub attribute: String,
    /// Element wrapping pending content.
    #[serde(default = "default_container_tag")]
    pub container_tag: String,
    /// Client-side function applying a patch.
    #[serde(default = "default_swap_function")]
    pub swap_function: String,
}

fn default_attribute() -> String {
    "data-trickle-cid".to_string()
}

fn default_container_tag() -> String {
    "div".to_string()
}

fn default_swap_function() -> String {
    "trickleSwap".to_string()
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            attribute: default_attribute(),
            container_tag: default_container_tag(),
            swap_function: default_swap_function(),
        }
    }
}

/// Configuration for a render session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Blocking or streaming.
    #[serde(default)]
    pub mode: RenderMode,
    /// Flush behavior.
    #[serde(default)]
    pub flush: FlushPolicy,
    /// Placeholder/patch markup names.
    #[serde(default)]
    pub markup: MarkupConfig,
}

impl RenderConfig {
    /// Configuration for a streaming session.
    pub fn streaming() -> Self {
        Self::default()
    }

    /// Configuration for a blocking session.
    pub fn blocking() -> Self {
        Self {
            mode: RenderMode::Blocking,
            ..Default::default()
        }
    }

    /// Set the flush policy.
    pub fn with_flush(mut self, flush: FlushPolicy) -> Self {
        self.flush = flush;
        self
    }

    /// Set the markup names.
    pub fn with_markup(mut self, markup: MarkupConfig) -> Self {
        self.markup = markup;
        self
    }

    /// Whether unresolved slots are streamed.
    pub fn is_streaming(&self) -> bool {
        self.mode == RenderMode::Streaming
    }
}
