//! Error types for the STCP source.

use std::io;

use thiserror::Error;

/// Framing failures.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The bundle does not fit behind a 32-bit length prefix.
    #[error("bundle of {len} bytes exceeds the 32-bit length prefix")]
    PayloadTooLarge { len: usize },
}

/// Reasons a [`forward`](crate::StcpSource::forward) call is rejected.
///
/// Rejection never tears anything down: the link stays up and a later call
/// may succeed once completions drain the windows.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The connection has not completed yet, or the link has shut down.
    #[error("link is not ready to forward")]
    NotReady,

    /// The rate window is full: `max_unacked` frames await their rate ack.
    #[error("too many unacked frames by rate ({max_unacked} in flight)")]
    RateWindowFull { max_unacked: usize },

    /// The transport window is full: `max_unacked` frames await their flush.
    #[error("too many unacked frames by transport ({max_unacked} in flight)")]
    TransportWindowFull { max_unacked: usize },

    /// The bundle cannot be framed.
    #[error(transparent)]
    PayloadTooLarge(#[from] FrameError),
}

/// Connection establishment failures, logged by the I/O worker.
#[derive(Debug, Error)]
pub(crate) enum ConnectError {
    #[error("failed to resolve peer: {0}")]
    Resolve(#[source] io::Error),

    #[error("failed to connect to peer: {0}")]
    Connect(#[source] io::Error),
}
