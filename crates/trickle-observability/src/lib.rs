//! Logging and render metrics for trickle sessions.
//!
//! This crate provides:
//! - `init_logging` - Global tracing subscriber setup
//! - `TracingObserver` - Render events as tracing events
//! - `MetricsObserver` / `RenderMetrics` - Per-render counters and timings

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;

// Re-export the observer seam from trickle-core for convenience
pub use trickle_core::{RenderEvent, RenderObserver, RenderPhase, TimingContext};
