//! # caravel-stcp
//!
//! Rate-paced STCP bundle source: streams length-prefixed bundles over a
//! single TCP connection under a configured bit-rate ceiling and an
//! in-flight frame cap, with keep-alive probes while idle.
//!
//! Every frame earns two independent acknowledgments — the **transport ack**
//! when its bytes are flushed to the socket, and the **rate ack** when the
//! pacer has let enough wall-clock time pass at the configured rate — and
//! the user callback fires once per frame, on whichever side completes
//! second. Producers and the single I/O worker meet at a pair of bounded
//! SPSC rings, one per ack criterion, over the same frame stream.
//!
//! ## Crate structure
//!
//! - [`frame`] — STCP data-unit framing (4-byte big-endian length prefix)
//! - [`ring`] — bounded SPSC ring of framed lengths (the ack windows)
//! - [`config`] — source configuration
//! - [`stats`] — shared counters and serializable snapshot
//! - [`error`] — error taxonomy
//! - [`source`] — the [`StcpSource`] facade and its I/O worker
//!
//! ## Example
//!
//! ```no_run
//! use caravel_stcp::{SourceConfig, StcpSource};
//!
//! let source = StcpSource::new(SourceConfig::default());
//! source.set_on_successful_ack(|| println!("frame fully acked"));
//! source.connect("bundle-sink.example", 4556);
//! while !source.ready_to_forward() {
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! source.forward(b"bundle payload").unwrap();
//! ```

pub mod config;
pub mod error;
pub mod frame;
pub mod ring;
pub mod source;
pub mod stats;

mod pacer;
mod reactor;

pub use config::SourceConfig;
pub use error::{ForwardError, FrameError};
pub use source::StcpSource;
pub use stats::SourceStats;
