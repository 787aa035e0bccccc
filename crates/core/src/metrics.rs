use std::sync::atomic::{AtomicU64, Ordering};

/// Lightweight counters shared between the pipeline, the controller,
/// and buffer pools.
///
/// # Example
/// ```rust
/// use argus_core::metrics::Counters;
///
/// let counters = Counters::default();
/// counters.frame_synthesized();
/// assert_eq!(counters.frames_synthesized(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Counters {
    frames_synthesized: AtomicU64,
    frames_failed: AtomicU64,
    requests_flushed: AtomicU64,
    vsync_pulses: AtomicU64,
    pool_hits: AtomicU64,
    pool_misses: AtomicU64,
}

impl Counters {
    /// Record a completed synthesis cycle.
    pub fn frame_synthesized(&self) {
        self.frames_synthesized.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that produced a failure notification.
    pub fn frame_failed(&self) {
        self.frames_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request drained by flush.
    pub fn request_flushed(&self) {
        self.requests_flushed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a vertical sync pulse.
    pub fn vsync_pulse(&self) {
        self.vsync_pulses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a buffer served from the pool free list.
    pub fn pool_hit(&self) {
        self.pool_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a buffer that had to be freshly allocated.
    pub fn pool_miss(&self) {
        self.pool_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_synthesized(&self) -> u64 {
        self.frames_synthesized.load(Ordering::Relaxed)
    }

    pub fn frames_failed(&self) -> u64 {
        self.frames_failed.load(Ordering::Relaxed)
    }

    pub fn requests_flushed(&self) -> u64 {
        self.requests_flushed.load(Ordering::Relaxed)
    }

    pub fn vsync_pulses(&self) -> u64 {
        self.vsync_pulses.load(Ordering::Relaxed)
    }

    pub fn pool_hits(&self) -> u64 {
        self.pool_hits.load(Ordering::Relaxed)
    }

    pub fn pool_misses(&self) -> u64 {
        self.pool_misses.load(Ordering::Relaxed)
    }
}
