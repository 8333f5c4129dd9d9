//! Per-render counters and timings.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use trickle_core::{CorrelationId, RenderEvent, RenderObserver, RenderPhase};

/// Metrics for a single render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderMetrics {
    /// Slots rendered inline from already resolved values.
    pub inline_slots: usize,
    /// Slots a blocking render waited on.
    pub blocked_slots: usize,
    /// Slots deferred behind a placeholder.
    pub deferred_slots: usize,
    /// Patches written.
    pub patches: usize,
    /// Bytes written as patches.
    pub patch_bytes: usize,
    /// Optional variants that failed and rendered nothing.
    pub suppressed_variants: usize,
    /// Deliveries dropped after a fatal error or for a dropped placeholder.
    pub discarded_deliveries: usize,
    /// Time until the synchronous pass finished (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_inline_us: Option<u64>,
    /// Time until the first patch was written (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_first_patch_us: Option<u64>,
    /// Total render time (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_us: Option<u64>,
    /// Patch time per correlation ID (microseconds).
    pub patch_times_us: BTreeMap<CorrelationId, u64>,
    /// Error that ended the render, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenderMetrics {
    /// Fold one event into the metrics.
    pub fn record(&mut self, event: &RenderEvent, elapsed: Duration) {
        let elapsed_us = elapsed.as_micros() as u64;
        match event {
            RenderEvent::Phase(RenderPhase::InlineComplete) => {
                self.time_to_inline_us = Some(elapsed_us);
            }
            RenderEvent::Phase(RenderPhase::Completion) => {
                self.total_us = Some(elapsed_us);
            }
            RenderEvent::Phase(RenderPhase::Error(error)) => {
                self.total_us = Some(elapsed_us);
                self.error = Some(error.clone());
            }
            RenderEvent::Phase(_) => {}
            RenderEvent::SlotInline { .. } => self.inline_slots += 1,
            RenderEvent::SlotBlocked { .. } => self.blocked_slots += 1,
            RenderEvent::SlotDeferred { .. } => self.deferred_slots += 1,
            RenderEvent::PatchSent { cid, bytes, .. } => {
                self.patches += 1;
                self.patch_bytes += bytes;
                self.time_to_first_patch_us.get_or_insert(elapsed_us);
                self.patch_times_us.insert(*cid, elapsed_us);
            }
            RenderEvent::VariantSuppressed { .. } => self.suppressed_variants += 1,
            RenderEvent::DeliveryDiscarded { .. } => self.discarded_deliveries += 1,
        }
    }

    /// Whether the render finished without a fatal error.
    pub fn succeeded(&self) -> bool {
        self.total_us.is_some() && self.error.is_none()
    }

    /// Format as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Format as JSON (pretty printed).
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Format as human-readable summary.
    pub fn to_summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "Slots: {} inline, {} blocked, {} deferred",
            self.inline_slots, self.blocked_slots, self.deferred_slots
        ));
        lines.push(format!(
            "Patches: {} ({} bytes)",
            self.patches, self.patch_bytes
        ));

        if let Some(us) = self.time_to_inline_us {
            lines.push(format!("  Time to inline: {}", format_us(us)));
        }
        if let Some(us) = self.time_to_first_patch_us {
            lines.push(format!("  Time to first patch: {}", format_us(us)));
        }
        for (cid, us) in &self.patch_times_us {
            lines.push(format!("    patch {}: {}", cid, format_us(*us)));
        }
        if let Some(us) = self.total_us {
            lines.push(format!("  Total: {}", format_us(us)));
        }

        if self.suppressed_variants > 0 {
            lines.push(format!("Suppressed variants: {}", self.suppressed_variants));
        }
        if self.discarded_deliveries > 0 {
            lines.push(format!(
                "Discarded deliveries: {}",
                self.discarded_deliveries
            ));
        }
        if let Some(error) = &self.error {
            lines.push(format!("Error: {}", error));
        }

        lines.join("\n")
    }
}

fn format_us(us: u64) -> String {
    format!("{}us ({:.2}ms)", us, us as f64 / 1000.0)
}

/// Observer that accumulates [`RenderMetrics`].
///
/// Share it with the session through an `Arc` and read a snapshot after the
/// render returns.
#[derive(Debug, Default)]
pub struct MetricsObserver {
    metrics: Mutex<RenderMetrics>,
}

impl MetricsObserver {
    /// Create an observer with empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RenderMetrics> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the metrics recorded so far.
    pub fn snapshot(&self) -> RenderMetrics {
        self.lock().clone()
    }
}

impl RenderObserver for MetricsObserver {
    fn on_event(&self, event: &RenderEvent, elapsed: Duration) {
        self.lock().record(event, elapsed);
    }
}

/// Forwards every event to several observers, in order.
#[derive(Default)]
pub struct FanoutObserver {
    observers: Vec<Arc<dyn RenderObserver>>,
}

impl FanoutObserver {
    /// Create an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer.
    pub fn with(mut self, observer: Arc<dyn RenderObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Number of observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether there are no observers.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl RenderObserver for FanoutObserver {
    fn on_event(&self, event: &RenderEvent, elapsed: Duration) {
        for observer in &self.observers {
            observer.on_event(event, elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn deferred(cid: CorrelationId) -> RenderEvent {
        RenderEvent::SlotDeferred {
            cid,
            fragment: "card".to_string(),
        }
    }

    fn patch(cid: CorrelationId, bytes: usize) -> RenderEvent {
        RenderEvent::PatchSent {
            cid,
            fragment: "card".to_string(),
            bytes,
        }
    }

    // === RenderMetrics Tests ===

    #[test]
    fn test_streaming_render_metrics() {
        let mut metrics = RenderMetrics::default();
        metrics.record(&RenderEvent::Phase(RenderPhase::Start), ms(0));
        metrics.record(&deferred(1), ms(1));
        metrics.record(&deferred(2), ms(1));
        metrics.record(&RenderEvent::Phase(RenderPhase::InlineComplete), ms(2));
        metrics.record(&patch(2, 40), ms(10));
        metrics.record(&patch(1, 60), ms(30));
        metrics.record(&RenderEvent::Phase(RenderPhase::Completion), ms(31));

        assert_eq!(metrics.deferred_slots, 2);
        assert_eq!(metrics.patches, 2);
        assert_eq!(metrics.patch_bytes, 100);
        assert_eq!(metrics.time_to_inline_us, Some(2_000));
        assert_eq!(metrics.time_to_first_patch_us, Some(10_000));
        assert_eq!(metrics.patch_times_us.get(&1), Some(&30_000));
        assert_eq!(metrics.total_us, Some(31_000));
        assert!(metrics.succeeded());
    }

    #[test]
    fn test_failed_render_metrics() {
        let mut metrics = RenderMetrics::default();
        metrics.record(&RenderEvent::DeliveryDiscarded { cid: 3 }, ms(5));
        metrics.record(
            &RenderEvent::Phase(RenderPhase::Error("fragment not found: x".to_string())),
            ms(6),
        );

        assert_eq!(metrics.discarded_deliveries, 1);
        assert_eq!(metrics.error.as_deref(), Some("fragment not found: x"));
        assert!(!metrics.succeeded());
        assert!(metrics.to_summary().contains("Error: fragment not found: x"));
    }

    #[test]
    fn test_metrics_json_skips_missing_times() {
        let metrics = RenderMetrics {
            inline_slots: 1,
            ..RenderMetrics::default()
        };

        let json = metrics.to_json();
        assert!(json.contains("\"inline_slots\":1"));
        assert!(!json.contains("total_us"));

        let parsed: RenderMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, metrics);
    }

    #[test]
    fn test_summary_lists_patches() {
        let mut metrics = RenderMetrics::default();
        metrics.record(&patch(1, 10), ms(2));

        let summary = metrics.to_summary();
        assert!(summary.contains("Patches: 1 (10 bytes)"));
        assert!(summary.contains("patch 1: 2000us (2.00ms)"));
    }

    // === Observer Tests ===

    #[test]
    fn test_metrics_observer_snapshot() {
        let observer = MetricsObserver::new();
        observer.on_event(&RenderEvent::SlotInline { fragment: "a".to_string() }, ms(1));
        observer.on_event(
            &RenderEvent::VariantSuppressed {
                fragment: "a:pending".to_string(),
                error: "missing".to_string(),
            },
            ms(1),
        );

        let snapshot = observer.snapshot();
        assert_eq!(snapshot.inline_slots, 1);
        assert_eq!(snapshot.suppressed_variants, 1);
    }

    #[test]
    fn test_fanout_forwards_to_all() {
        let first = Arc::new(MetricsObserver::new());
        let second = Arc::new(MetricsObserver::new());
        let fanout = FanoutObserver::new()
            .with(first.clone())
            .with(second.clone());

        fanout.on_event(&RenderEvent::SlotBlocked { fragment: "a".to_string() }, ms(1));

        assert_eq!(fanout.len(), 2);
        assert_eq!(first.snapshot().blocked_slots, 1);
        assert_eq!(second.snapshot().blocked_slots, 1);
    }
}
