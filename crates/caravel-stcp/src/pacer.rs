//! # Rate Pacer
//!
//! Converts queued framed-byte counts into wall-clock delays at the
//! configured bit rate. Pure state machine — the I/O worker arms the actual
//! timer with the returned delay and reports expiry back.
//!
//! Frames are released in **batches**: starting a cycle drains the rate ring
//! until the accumulated delay reaches a 10 ms floor (or the ring empties),
//! so small frames at high rates coalesce into one sleep instead of churning
//! the timer with sub-millisecond arms. The whole batch is credited at once
//! when the timer fires, and the next cycle starts immediately after.

use std::sync::Arc;
use std::time::Duration;

use crate::ring::AckRing;

/// Smallest delay worth sleeping for; batches accumulate until they reach it.
pub(crate) const MIN_SLEEP_MICROS: u64 = 10_000;

/// A completed pacing batch, ready to be credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RateBatch {
    /// Frames released by this batch.
    pub frames: u64,
    /// Framed bytes released by this batch.
    pub bytes: u64,
}

/// Timer-driven release of framed bytes at a configured bit rate.
#[derive(Debug)]
pub(crate) struct RatePacer {
    ring: Arc<AckRing>,
    rate_bps: u64,
    /// Byte counts drained from the ring and charged to the running timer.
    batch: Vec<u32>,
    timer_running: bool,
}

impl RatePacer {
    pub fn new(ring: Arc<AckRing>, rate_bps: u64) -> Self {
        assert!(rate_bps > 0, "rate must be non-zero");
        RatePacer {
            ring,
            rate_bps,
            batch: Vec::new(),
            timer_running: false,
        }
    }

    /// Begin a pacing cycle if none is in flight and the ring has entries.
    ///
    /// Drains the ring into the pending batch, accumulating the delay for
    /// each frame, and stops as soon as the delay reaches the 10 ms floor or
    /// the ring empties. Returns the delay to arm, or `None` when a cycle is
    /// already running or there is nothing to pace.
    pub fn try_start(&mut self) -> Option<Duration> {
        if self.timer_running || !self.batch.is_empty() {
            return None;
        }

        let mut delay_micros: u64 = 0;
        while let Some(index) = self.ring.try_acquire_read() {
            let framed_len = self.ring.load_len(index);
            self.ring.commit_read();
            delay_micros += self.delay_micros_for(framed_len);
            self.batch.push(framed_len);
            if delay_micros >= MIN_SLEEP_MICROS {
                break;
            }
        }

        if self.batch.is_empty() {
            return None;
        }
        self.timer_running = true;
        Some(Duration::from_micros(delay_micros))
    }

    /// Complete the running cycle: the whole batch is released at once.
    ///
    /// Returns `None` if no batch was pending (the worker logs that as an
    /// accounting error).
    pub fn on_expired(&mut self) -> Option<RateBatch> {
        self.timer_running = false;
        if self.batch.is_empty() {
            return None;
        }
        let frames = self.batch.len() as u64;
        let bytes = self.batch.iter().map(|&len| u64::from(len)).sum();
        self.batch.clear();
        Some(RateBatch { frames, bytes })
    }

    // Delay in whole microseconds to transmit `framed_len` bytes at the
    // configured rate. Computed in f64 and truncated: integer division would
    // silently zero the delay for small frames at low rates.
    fn delay_micros_for(&self, framed_len: u32) -> u64 {
        let bits = f64::from(framed_len) * 8.0;
        ((1.0 / self.rate_bps as f64) * bits * 1e6) as u64
    }
}
