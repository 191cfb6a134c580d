//! Connection metrics
//!
//! Atomic counters owned by each connection and shared by its two halves.
//! Counting never affects what goes on the wire.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Counters for one connection
#[derive(Debug)]
pub struct WireMetrics {
    /// Frames written (primitives, objects and blocks)
    pub frames_sent: AtomicU64,
    /// Frames read
    pub frames_received: AtomicU64,
    /// Bytes handed to the transport, length fields included
    pub bytes_sent: AtomicU64,
    /// Bytes taken from the transport, length fields included
    pub bytes_received: AtomicU64,
    /// Objects written with a negative (compressed) length
    pub compressed_sent: AtomicU64,
    /// Objects read with a negative (compressed) length
    pub compressed_received: AtomicU64,
    /// Writes refused for exceeding a size cap
    pub oversize_rejections: AtomicU64,
    /// Reads that hit end-of-stream inside a frame or saw an invalid length
    pub frame_corruptions: AtomicU64,
    start_time: Instant,
}

impl WireMetrics {
    pub fn new() -> Self {
        Self {
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            compressed_sent: AtomicU64::new(0),
            compressed_received: AtomicU64::new(0),
            oversize_rejections: AtomicU64::new(0),
            frame_corruptions: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a frame of `byte_count` bytes written
    pub fn frame_sent(&self, byte_count: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent
            .fetch_add(byte_count as u64, Ordering::Relaxed);
    }

    /// Record a frame of `byte_count` bytes read
    pub fn frame_received(&self, byte_count: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(byte_count as u64, Ordering::Relaxed);
    }

    pub fn compressed_sent(&self) {
        self.compressed_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn compressed_received(&self) {
        self.compressed_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn oversize_rejected(&self) {
        self.oversize_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_corrupted(&self) {
        self.frame_corruptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            compressed_sent: self.compressed_sent.load(Ordering::Relaxed),
            compressed_received: self.compressed_received.load(Ordering::Relaxed),
            oversize_rejections: self.oversize_rejections.load(Ordering::Relaxed),
            frame_corruptions: self.frame_corruptions.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_summary(&self) {
        let snapshot = self.snapshot();
        info!(
            frames_sent = snapshot.frames_sent,
            frames_received = snapshot.frames_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            compressed_sent = snapshot.compressed_sent,
            compressed_received = snapshot.compressed_received,
            oversize_rejections = snapshot.oversize_rejections,
            frame_corruptions = snapshot.frame_corruptions,
            uptime_seconds = snapshot.uptime_seconds,
            "Connection metrics snapshot"
        );
    }
}

impl Default for WireMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub compressed_sent: u64,
    pub compressed_received: u64,
    pub oversize_rejections: u64,
    pub frame_corruptions: u64,
    pub uptime_seconds: u64,
}
