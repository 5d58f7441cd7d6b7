//! # Source Statistics
//!
//! Monotonic counters shared between the producer path, the I/O worker, and
//! external observers, plus a serializable snapshot for export.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// ─── Shared Counters ────────────────────────────────────────────────────────

/// Live counters. The producer bumps the `*_sent` set; the I/O worker bumps
/// the `*_acked_*` sets; any thread may snapshot.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub frames_sent: AtomicU64,
    pub bundle_bytes_sent: AtomicU64,
    pub framed_bytes_sent: AtomicU64,
    pub frames_acked_by_transport: AtomicU64,
    pub bytes_acked_by_transport: AtomicU64,
    pub frames_acked_by_rate: AtomicU64,
    pub bytes_acked_by_rate: AtomicU64,
}

impl Counters {
    pub fn snapshot(&self) -> SourceStats {
        SourceStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bundle_bytes_sent: self.bundle_bytes_sent.load(Ordering::Relaxed),
            framed_bytes_sent: self.framed_bytes_sent.load(Ordering::Relaxed),
            frames_acked_by_transport: self.frames_acked_by_transport.load(Ordering::Relaxed),
            bytes_acked_by_transport: self.bytes_acked_by_transport.load(Ordering::Relaxed),
            frames_acked_by_rate: self.frames_acked_by_rate.load(Ordering::Relaxed),
            bytes_acked_by_rate: self.bytes_acked_by_rate.load(Ordering::Relaxed),
        }
    }
}

// ─── Snapshot ───────────────────────────────────────────────────────────────

/// Point-in-time statistics snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceStats {
    /// Data frames handed to the transport.
    pub frames_sent: u64,
    /// Bundle payload bytes accepted (pre-framing).
    pub bundle_bytes_sent: u64,
    /// Framed bytes handed to the transport (payload + length prefixes).
    pub framed_bytes_sent: u64,
    /// Frames whose flush completed.
    pub frames_acked_by_transport: u64,
    /// Framed bytes whose flush completed.
    pub bytes_acked_by_transport: u64,
    /// Frames released by the rate pacer.
    pub frames_acked_by_rate: u64,
    /// Framed bytes released by the rate pacer.
    pub bytes_acked_by_rate: u64,
}

impl SourceStats {
    /// Frames fully acknowledged: a frame counts once both the transport and
    /// the pacer have released it, so this is the minimum of the two sides.
    pub fn frames_acked(&self) -> u64 {
        self.frames_acked_by_transport.min(self.frames_acked_by_rate)
    }

    /// Frames still awaiting at least one of the two acks.
    pub fn unacked_frames(&self) -> u64 {
        self.frames_sent.saturating_sub(self.frames_acked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_acked_takes_the_slower_side() {
        let stats = SourceStats {
            frames_sent: 10,
            frames_acked_by_transport: 7,
            frames_acked_by_rate: 4,
            ..Default::default()
        };
        assert_eq!(stats.frames_acked(), 4);
        assert_eq!(stats.unacked_frames(), 6);
    }

    #[test]
    fn counters_snapshot_roundtrip() {
        let counters = Counters::default();
        counters.frames_sent.store(3, Ordering::Relaxed);
        counters.framed_bytes_sent.store(312, Ordering::Relaxed);
        let stats = counters.snapshot();
        assert_eq!(stats.frames_sent, 3);
        assert_eq!(stats.framed_bytes_sent, 312);
        assert_eq!(stats.frames_acked(), 0);
    }

    #[test]
    fn stats_serialization() {
        let stats = SourceStats {
            frames_sent: 5,
            bundle_bytes_sent: 500,
            framed_bytes_sent: 520,
            frames_acked_by_transport: 5,
            bytes_acked_by_transport: 520,
            frames_acked_by_rate: 5,
            bytes_acked_by_rate: 520,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"frames_sent\":5"));
        assert!(json.contains("\"framed_bytes_sent\":520"));
    }
}
