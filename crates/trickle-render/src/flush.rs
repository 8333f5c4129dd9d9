//! Explicit flush control.

pub use trickle_core::FlushPolicy;

/// Tracks buffered bytes and decides when a write should also flush.
///
/// Protocol markers (activation, patches, blocking waits) always flush;
/// the controller only decides about plain inline writes.
#[derive(Debug)]
pub struct FlushController {
    policy: FlushPolicy,
    pending_bytes: usize,
    flushes: usize,
}

impl FlushController {
    /// Create a new flush controller with given policy.
    pub fn new(policy: FlushPolicy) -> Self {
        Self {
            policy,
            pending_bytes: 0,
            flushes: 0,
        }
    }

    /// Record bytes added to buffer.
    pub fn add_bytes(&mut self, count: usize) {
        self.pending_bytes += count;
    }

    /// Check if the bytes written so far warrant a flush.
    pub fn should_flush(&self) -> bool {
        match self.policy {
            FlushPolicy::AtMarkers => false,
            FlushPolicy::Eager => self.pending_bytes > 0,
            FlushPolicy::Threshold { bytes } => self.pending_bytes >= bytes,
        }
    }

    /// Reset pending byte count after flush.
    pub fn reset(&mut self) {
        self.pending_bytes = 0;
        self.flushes += 1;
    }

    /// Bytes written since the last flush.
    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes
    }

    /// Number of flushes so far.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Get current policy.
    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }
}

impl Default for FlushController {
    fn default() -> Self {
        Self::new(FlushPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_markers_never_flushes_on_write() {
        let mut controller = FlushController::default();
        controller.add_bytes(1 << 20);

        assert!(!controller.should_flush());
    }

    #[test]
    fn test_eager_flushes_any_write() {
        let mut controller = FlushController::new(FlushPolicy::Eager);
        assert!(!controller.should_flush());

        controller.add_bytes(1);
        assert!(controller.should_flush());
    }

    #[test]
    fn test_threshold() {
        let mut controller = FlushController::new(FlushPolicy::Threshold { bytes: 10 });
        controller.add_bytes(9);
        assert!(!controller.should_flush());

        controller.add_bytes(1);
        assert!(controller.should_flush());

        controller.reset();
        assert_eq!(controller.pending_bytes(), 0);
        assert_eq!(controller.flushes(), 1);
        assert!(!controller.should_flush());
    }
}
