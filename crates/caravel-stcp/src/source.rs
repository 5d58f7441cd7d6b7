//! # STCP Source
//!
//! The externally visible sender object. Owns a dedicated I/O worker thread
//! (spawned at construction, joined on drop) and exposes the non-blocking
//! producer surface: `connect`, `forward`, the counters, and the
//! successful-ack callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use arc_swap::ArcSwapOption;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::SourceConfig;
use crate::error::ForwardError;
use crate::frame;
use crate::pacer::RatePacer;
use crate::reactor::{Command, Reactor};
use crate::ring::AckRing;
use crate::stats::{Counters, SourceStats};

/// Callback invoked from the worker thread once per fully acknowledged frame.
pub(crate) type AckCallback = Box<dyn Fn() + Send + Sync>;

/// State shared between producer threads and the I/O worker.
pub(crate) struct Shared {
    /// Lock-free readiness bit; producers read it without synchronization
    /// and accept that a flip to `false` may race a `forward` call.
    pub ready_to_forward: AtomicBool,
    pub counters: Counters,
    /// Write side owned by `forward`, read side by the rate pacer.
    pub ring_rate: Arc<AckRing>,
    /// Write side owned by `forward`, read side by the transport ack path.
    pub ring_transport: Arc<AckRing>,
    pub on_ack: ArcSwapOption<AckCallback>,
}

impl Shared {
    pub(crate) fn invoke_on_ack(&self) {
        if let Some(cb) = self.on_ack.load_full() {
            (*cb)();
        }
    }
}

/// Rate-paced STCP bundle sender over a single TCP connection.
///
/// Construction spawns the I/O worker; [`connect`](Self::connect) begins the
/// asynchronous resolve/connect sequence; once
/// [`ready_to_forward`](Self::ready_to_forward) reports `true`, bundles may
/// be handed to [`forward`](Self::forward). Every frame is acknowledged
/// twice — once when its bytes are flushed to the transport, once when the
/// rate pacer has let enough wall-clock time pass — and the registered
/// callback fires on whichever of the two completes second.
///
/// `forward` is callable from any thread and never blocks, but the ack
/// windows are single-producer: calls must not overlap. Calling `forward`
/// from inside the ack callback is supported (and is the usual way to keep
/// the window full).
///
/// Dropping the source tears down the link, joins the worker, and logs a
/// final stats summary.
pub struct StcpSource {
    shared: Arc<Shared>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    io_thread: Option<thread::JoinHandle<()>>,
    max_unacked: usize,
}

impl StcpSource {
    /// Spawn the I/O worker and return the detached source.
    pub fn new(config: SourceConfig) -> Self {
        assert!(config.rate_bps > 0, "rate_bps must be non-zero");
        assert!(config.max_unacked > 0, "max_unacked must be non-zero");

        let ring_rate = Arc::new(AckRing::new(config.max_unacked));
        let ring_transport = Arc::new(AckRing::new(config.max_unacked));
        let shared = Arc::new(Shared {
            ready_to_forward: AtomicBool::new(false),
            counters: Counters::default(),
            ring_rate: Arc::clone(&ring_rate),
            ring_transport,
            on_ack: ArcSwapOption::empty(),
        });

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let reactor = Reactor {
            cmd_rx,
            shared: Arc::clone(&shared),
            config: config.clone(),
            pacer: RatePacer::new(ring_rate, config.rate_bps),
        };

        let io_thread = thread::Builder::new()
            .name("caravel-stcp-io".into())
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build stcp io runtime");
                rt.block_on(reactor.run());
            })
            .unwrap_or_else(|e| panic!("failed to spawn stcp io worker: {e}"));

        StcpSource {
            shared,
            cmd_tx,
            io_thread: Some(io_thread),
            max_unacked: config.max_unacked,
        }
    }

    /// Begin asynchronous resolution and connection to the peer.
    ///
    /// Returns immediately; watch [`ready_to_forward`](Self::ready_to_forward)
    /// for completion. Resolution or connection failures are logged and leave
    /// the source not-ready; there is no automatic retry.
    pub fn connect(&self, host: impl Into<String>, port: u16) {
        let _ = self.cmd_tx.send(Command::Connect {
            host: host.into(),
            port,
        });
    }

    /// Frame a bundle and queue it for paced transmission.
    ///
    /// Never blocks: when either ack window is full the bundle is rejected
    /// and the caller decides whether to retry, drop, or back off.
    pub fn forward(&self, bundle: &[u8]) -> Result<(), ForwardError> {
        if !self.shared.ready_to_forward.load(Ordering::Acquire) {
            warn!("link not ready to forward yet");
            return Err(ForwardError::NotReady);
        }

        let Some(rate_index) = self.shared.ring_rate.try_reserve_write() else {
            warn!("rejecting bundle, too many unacked frames by rate");
            return Err(ForwardError::RateWindowFull {
                max_unacked: self.max_unacked,
            });
        };
        // The rate reservation above is abandoned (not rolled back) on this
        // failure path; an uncommitted reservation publishes nothing.
        let Some(transport_index) = self.shared.ring_transport.try_reserve_write() else {
            warn!("rejecting bundle, too many unacked frames by transport");
            return Err(ForwardError::TransportWindowFull {
                max_unacked: self.max_unacked,
            });
        };

        let unit = frame::encode_data_unit(bundle).map_err(|e| {
            warn!(bundle_len = bundle.len(), "rejecting bundle, cannot frame");
            ForwardError::from(e)
        })?;
        let framed_len = unit.len() as u32;

        self.shared.counters.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.shared
            .counters
            .bundle_bytes_sent
            .fetch_add(bundle.len() as u64, Ordering::Relaxed);
        self.shared
            .counters
            .framed_bytes_sent
            .fetch_add(u64::from(framed_len), Ordering::Relaxed);

        self.shared.ring_rate.store_len(rate_index, framed_len);
        self.shared.ring_rate.commit_write();
        self.shared
            .ring_transport
            .store_len(transport_index, framed_len);
        self.shared.ring_transport.commit_write();

        // Hand the frame to the worker; delivery doubles as the new-data
        // signal for the rate pacer.
        let _ = self.cmd_tx.send(Command::SendFrame(unit));
        Ok(())
    }

    /// Whether the connection is up and `forward` may be called.
    pub fn ready_to_forward(&self) -> bool {
        self.shared.ready_to_forward.load(Ordering::Acquire)
    }

    /// Register the callback invoked (from the worker thread) once per fully
    /// acknowledged frame. Replaces any previously registered callback.
    pub fn set_on_successful_ack<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let callback: AckCallback = Box::new(callback);
        self.shared.on_ack.store(Some(Arc::new(callback)));
    }

    /// Point-in-time counter snapshot.
    pub fn stats(&self) -> SourceStats {
        self.shared.counters.snapshot()
    }

    /// Total data frames handed to the transport.
    pub fn frames_sent(&self) -> u64 {
        self.stats().frames_sent
    }

    /// Frames acknowledged by both the transport and the rate pacer.
    pub fn frames_acked(&self) -> u64 {
        self.stats().frames_acked()
    }

    /// Frames still awaiting at least one of the two acks.
    pub fn unacked_frames(&self) -> u64 {
        self.stats().unacked_frames()
    }

    /// Tear down the link and join the I/O worker. Idempotent.
    pub fn shutdown(&mut self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        if let Some(handle) = self.io_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StcpSource {
    fn drop(&mut self) {
        self.shutdown();
        let stats = self.shared.counters.snapshot();
        info!(
            frames_sent = stats.frames_sent,
            frames_acked_by_transport = stats.frames_acked_by_transport,
            frames_acked_by_rate = stats.frames_acked_by_rate,
            bundle_bytes_sent = stats.bundle_bytes_sent,
            framed_bytes_sent = stats.framed_bytes_sent,
            bytes_acked_by_transport = stats.bytes_acked_by_transport,
            bytes_acked_by_rate = stats.bytes_acked_by_rate,
            "stcp source closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_before_connect_is_rejected() {
        let source = StcpSource::new(SourceConfig::default());
        let err = source.forward(b"bundle").unwrap_err();
        assert!(matches!(err, ForwardError::NotReady));
        assert_eq!(source.frames_sent(), 0);
    }

    #[test]
    fn forward_after_shutdown_is_rejected() {
        let mut source = StcpSource::new(SourceConfig::default());
        source.shutdown();
        let err = source.forward(b"bundle").unwrap_err();
        assert!(matches!(err, ForwardError::NotReady));
    }

    #[test]
    fn construct_and_drop_does_not_hang() {
        let source = StcpSource::new(SourceConfig::default());
        assert!(!source.ready_to_forward());
        drop(source);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut source = StcpSource::new(SourceConfig::default());
        source.shutdown();
        source.shutdown();
    }

    #[test]
    fn callback_can_be_registered_before_connect() {
        let source = StcpSource::new(SourceConfig::default());
        source.set_on_successful_ack(|| {});
        drop(source);
    }
}
