//! Render lifecycle tracking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::context::CorrelationId;

/// Lifecycle phases of a render session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderPhase {
    /// Render started, synchronous pass running.
    Start,
    /// Synchronous pass finished; all inline output written.
    InlineComplete,
    /// Await loop entered, activation script flushed.
    Awaiting,
    /// A fatal error occurred; remaining deliveries are discarded.
    Draining,
    /// Render finished successfully.
    Completion,
    /// Render finished with an error.
    Error(String),
}

/// Something worth observing during a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// The session moved to a new phase.
    Phase(RenderPhase),
    /// A slot rendered inline from an already resolved value.
    SlotInline { fragment: String },
    /// A blocking session waited on an unresolved value.
    SlotBlocked { fragment: String },
    /// A streaming session emitted a placeholder and deferred the slot.
    SlotDeferred {
        cid: CorrelationId,
        fragment: String,
    },
    /// A resolved patch was written.
    PatchSent {
        cid: CorrelationId,
        fragment: String,
        bytes: usize,
    },
    /// An optional `:pending` or `:error` variant failed and was replaced by nothing.
    VariantSuppressed { fragment: String, error: String },
    /// A delivery arrived while draining, or for a dropped placeholder, and was dropped.
    DeliveryDiscarded { cid: CorrelationId },
}

/// Timing context for observability.
#[derive(Debug, Clone)]
pub struct TimingContext {
    start: Instant,
    marks: HashMap<String, Instant>,
}

impl TimingContext {
    /// Create a new timing context.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            marks: HashMap::new(),
        }
    }

    /// Record a timing mark.
    pub fn mark(&mut self, name: &str) {
        self.marks.insert(name.to_string(), Instant::now());
    }

    /// Mark a resolved patch as sent.
    pub fn mark_patch_sent(&mut self, cid: CorrelationId) {
        self.mark(&format!("patch_{}_sent", cid));
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time from start to a named mark.
    pub fn since_start(&self, name: &str) -> Option<Duration> {
        self.marks.get(name).map(|t| t.duration_since(self.start))
    }

    /// Time to the end of the synchronous pass.
    pub fn time_to_inline(&self) -> Option<Duration> {
        self.since_start("inline_complete")
    }

    /// Time to the activation script flush.
    pub fn time_to_activation(&self) -> Option<Duration> {
        self.since_start("activation_sent")
    }

    /// Time to the first resolved patch.
    pub fn time_to_first_patch(&self) -> Option<Duration> {
        self.marks
            .iter()
            .filter(|(k, _)| k.starts_with("patch_") && k.ends_with("_sent"))
            .map(|(_, t)| t.duration_since(self.start))
            .min()
    }

    /// Time to the patch for one correlation ID.
    pub fn patch_timing(&self, cid: CorrelationId) -> Option<Duration> {
        self.since_start(&format!("patch_{}_sent", cid))
    }

    /// Number of patches marked.
    pub fn patches_sent(&self) -> usize {
        self.marks
            .keys()
            .filter(|k| k.starts_with("patch_") && k.ends_with("_sent"))
            .count()
    }

    /// Get total render time, up to completion when marked.
    pub fn total_time(&self) -> Duration {
        self.since_start("complete").unwrap_or_else(|| self.elapsed())
    }
}

impl Default for TimingContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer for render events.
pub trait RenderObserver: Send + Sync {
    /// Called for every event, with time elapsed since the render started.
    fn on_event(&self, event: &RenderEvent, elapsed: Duration);
}
