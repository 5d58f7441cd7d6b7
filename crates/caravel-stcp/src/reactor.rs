//! # I/O Worker
//!
//! Single-threaded cooperative loop owning the socket, the keep-alive timer,
//! the rate timer, and the read sides of both ack windows. Every mutation of
//! link state happens here; producers only reach the worker through the
//! command channel, so no producer can ever observe a torn-down socket.
//!
//! ```text
//! forward()            mpsc                select! loop
//!   ├── Connect ────────────▶ resolve → connect → arm keep-alive, post read
//!   ├── SendFrame ──────────▶ outbound FIFO ──▶ incremental flush ──▶ transport ack
//!   │                        └▶ pacer.try_start ─▶ rate sleep ──▶ rate ack
//!   └── Shutdown ───────────▶ teardown, loop exit
//! ```
//!
//! The outbound FIFO is flushed incrementally inside the loop so the timers
//! keep firing while a write is stalled. Delivery of `SendFrame` doubles as
//! the new-data signal for the pacer. Cancellation needs no special casing:
//! dropping the loop drops every pending future, so there are no aborted
//! completions to filter.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, error, info, trace, warn};

use crate::config::SourceConfig;
use crate::error::ConnectError;
use crate::frame::KEEP_ALIVE_FRAME;
use crate::pacer::RatePacer;
use crate::source::Shared;

/// Producer-to-worker commands.
pub(crate) enum Command {
    Connect { host: String, port: u16 },
    SendFrame(Bytes),
    Shutdown,
}

/// An entry in the outbound FIFO. Keep-alives carry no ack bookkeeping.
enum Outbound {
    Data(Bytes),
    KeepAlive(Bytes),
}

impl Outbound {
    fn bytes(&self) -> &Bytes {
        match self {
            Outbound::Data(b) | Outbound::KeepAlive(b) => b,
        }
    }
}

pub(crate) struct Reactor {
    pub cmd_rx: mpsc::UnboundedReceiver<Command>,
    pub shared: Arc<Shared>,
    pub config: SourceConfig,
    pub pacer: RatePacer,
}

impl Reactor {
    pub(crate) async fn run(self) {
        let Reactor {
            mut cmd_rx,
            shared,
            config,
            mut pacer,
        } = self;

        let mut read_half: Option<OwnedReadHalf> = None;
        let mut write_half: Option<OwnedWriteHalf> = None;
        let mut keep_alive: Option<Interval> = None;
        let mut rate_sleep: Option<Pin<Box<Sleep>>> = None;
        let mut outbound: VecDeque<Outbound> = VecDeque::new();
        let mut write_offset: usize = 0;
        // True when a data frame was enqueued since the last keep-alive tick.
        let mut data_served_as_keep_alive = true;
        // The diagnostic read is posted once at connect; the peer must never
        // send payload on this stream, so one completion is all we act on.
        let mut read_armed = false;
        let mut link_shut = false;
        let mut read_buf = [0u8; 16];

        loop {
            // O(1) view of the frame currently being flushed.
            let pending: Option<Bytes> =
                outbound.front().map(|o| o.bytes().slice(write_offset..));

            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Connect { host, port }) => {
                        if read_half.is_some() || link_shut {
                            warn!("connect requested on an already-used link, ignoring");
                            continue;
                        }
                        match establish(&host, port).await {
                            Ok(stream) => {
                                info!(host = %host, port, "stcp connection complete");
                                let (rh, wh) = stream.into_split();
                                read_half = Some(rh);
                                write_half = Some(wh);
                                read_armed = true;
                                let period = config.keep_alive_interval;
                                let mut probe = interval_at(Instant::now() + period, period);
                                probe.set_missed_tick_behavior(MissedTickBehavior::Delay);
                                keep_alive = Some(probe);
                                shared.ready_to_forward.store(true, Ordering::Release);
                            }
                            Err(e) => error!(error = %e, "stcp connect failed"),
                        }
                    }
                    Some(Command::SendFrame(frame)) => {
                        data_served_as_keep_alive = true;
                        if link_shut || write_half.is_none() {
                            debug!(framed_len = frame.len(), "dropping frame, link is not up");
                        } else {
                            outbound.push_back(Outbound::Data(frame));
                        }
                        // The command delivery is the new-data signal: start a
                        // pacing cycle even when the link is already down so the
                        // rate window drains naturally.
                        if let Some(delay) = pacer.try_start() {
                            rate_sleep = Some(Box::pin(sleep(delay)));
                        }
                    }
                    Some(Command::Shutdown) | None => {
                        shutdown_link(
                            &shared,
                            &mut write_half,
                            &mut keep_alive,
                            &mut outbound,
                            &mut write_offset,
                            &mut link_shut,
                        )
                        .await;
                        break;
                    }
                },

                _ = async { keep_alive.as_mut().unwrap().tick().await }, if keep_alive.is_some() => {
                    if write_half.is_some() && !link_shut {
                        if data_served_as_keep_alive {
                            trace!("keep-alive probe not needed, data traffic stands in");
                        } else {
                            debug!("link idle, sending keep-alive frame");
                            outbound.push_back(Outbound::KeepAlive(Bytes::from_static(&KEEP_ALIVE_FRAME)));
                        }
                    }
                    data_served_as_keep_alive = false;
                }

                _ = async { rate_sleep.as_mut().unwrap().await }, if rate_sleep.is_some() => {
                    rate_sleep = None;
                    match pacer.on_expired() {
                        Some(batch) => {
                            let acked_by_rate = shared
                                .counters
                                .frames_acked_by_rate
                                .fetch_add(batch.frames, Ordering::Relaxed)
                                + batch.frames;
                            shared
                                .counters
                                .bytes_acked_by_rate
                                .fetch_add(batch.bytes, Ordering::Relaxed);
                            let acked_by_transport = shared
                                .counters
                                .frames_acked_by_transport
                                .load(Ordering::Relaxed);
                            // Second-arriver rule: one callback per batch, and
                            // only if the transport side is already ahead.
                            if acked_by_rate <= acked_by_transport {
                                shared.invoke_on_ack();
                            }
                            if let Some(delay) = pacer.try_start() {
                                rate_sleep = Some(Box::pin(sleep(delay)));
                            }
                        }
                        None => error!("rate timer fired with an empty batch"),
                    }
                }

                result = async { write_half.as_mut().unwrap().write(pending.as_ref().unwrap()).await },
                    if write_half.is_some() && pending.is_some() =>
                {
                    match result {
                        Ok(0) => {
                            error!("tcp write made no progress");
                            shutdown_link(
                                &shared,
                                &mut write_half,
                                &mut keep_alive,
                                &mut outbound,
                                &mut write_offset,
                                &mut link_shut,
                            )
                            .await;
                        }
                        Ok(n) => {
                            write_offset += n;
                            let front_len = outbound.front().map(|o| o.bytes().len()).unwrap_or(0);
                            if write_offset == front_len {
                                write_offset = 0;
                                match outbound.pop_front() {
                                    Some(Outbound::Data(frame)) => {
                                        complete_transport_ack(&shared, frame.len());
                                    }
                                    Some(Outbound::KeepAlive(_)) => info!("keep-alive frame sent"),
                                    None => {}
                                }
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "tcp write failed");
                            shutdown_link(
                                &shared,
                                &mut write_half,
                                &mut keep_alive,
                                &mut outbound,
                                &mut write_offset,
                                &mut link_shut,
                            )
                            .await;
                        }
                    }
                }

                result = async { read_half.as_mut().unwrap().read(&mut read_buf).await },
                    if read_armed && read_half.is_some() =>
                {
                    read_armed = false;
                    match result {
                        Ok(0) => {
                            info!("tcp connection closed cleanly by peer");
                            shutdown_link(
                                &shared,
                                &mut write_half,
                                &mut keep_alive,
                                &mut outbound,
                                &mut write_offset,
                                &mut link_shut,
                            )
                            .await;
                        }
                        Ok(n) => {
                            error!(bytes = n, "received data on a send-only stcp stream");
                        }
                        Err(e) => {
                            error!(error = %e, "tcp receive failed");
                        }
                    }
                }
            }
        }
    }
}

/// Transport-side completion of one fully flushed data frame.
fn complete_transport_ack(shared: &Shared, flushed: usize) {
    match shared.ring_transport.try_acquire_read() {
        None => error!("transport ack arrived with an empty window"),
        Some(index) => {
            let expected = shared.ring_transport.load_len(index);
            if expected as usize != flushed {
                // Accounting mismatch: do not advance, do not tear down.
                error!(expected, flushed, "transport ack accounting mismatch");
                return;
            }
            let acked_by_transport = shared
                .counters
                .frames_acked_by_transport
                .fetch_add(1, Ordering::Relaxed)
                + 1;
            shared
                .counters
                .bytes_acked_by_transport
                .fetch_add(u64::from(expected), Ordering::Relaxed);
            shared.ring_transport.commit_read();
            let acked_by_rate = shared.counters.frames_acked_by_rate.load(Ordering::Relaxed);
            // Second-arriver rule, mirrored from the rate side.
            if acked_by_transport <= acked_by_rate {
                shared.invoke_on_ack();
            }
        }
    }
}

/// Close the link and refuse further traffic. The socket halves stay in
/// place: shutdown disables them, it never deallocates them.
async fn shutdown_link(
    shared: &Shared,
    write_half: &mut Option<OwnedWriteHalf>,
    keep_alive: &mut Option<Interval>,
    outbound: &mut VecDeque<Outbound>,
    write_offset: &mut usize,
    link_shut: &mut bool,
) {
    shared.ready_to_forward.store(false, Ordering::Release);
    if !*link_shut {
        if let Some(wh) = write_half.as_mut() {
            info!("shutting down tcp link");
            if let Err(e) = wh.shutdown().await {
                debug!(error = %e, "tcp shutdown reported an error");
            }
        }
    }
    *keep_alive = None;
    outbound.clear();
    *write_offset = 0;
    *link_shut = true;
}

/// Resolve the peer and connect to the first reachable endpoint.
async fn establish(host: &str, port: u16) -> Result<TcpStream, ConnectError> {
    let addrs = lookup_host((host, port)).await.map_err(ConnectError::Resolve)?;
    let mut last_error: Option<io::Error> = None;
    for addr in addrs {
        debug!(%addr, "resolved peer, attempting connect");
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(%addr, error = %e, "connect attempt failed");
                last_error = Some(e);
            }
        }
    }
    Err(ConnectError::Connect(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
    })))
}
