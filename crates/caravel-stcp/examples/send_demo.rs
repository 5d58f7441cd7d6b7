//! Stream generated bundles to an STCP sink at a paced rate.
//!
//! ```text
//! cargo run --example send_demo -- --host 127.0.0.1 --port 4556 --count 500
//! ```
//!
//! Pair it with any listener that accepts the length-prefixed stream, e.g.
//! `nc -l 4556 > /dev/null`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::bail;
use caravel_stcp::{ForwardError, SourceConfig, StcpSource};
use clap::Parser;

/// Stream test bundles to an STCP sink.
#[derive(Parser, Debug)]
#[command(name = "send_demo", about = "Stream test bundles to an STCP sink")]
struct Cli {
    /// Peer hostname.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Peer port.
    #[arg(long, default_value_t = 4556)]
    port: u16,

    /// Number of bundles to stream.
    #[arg(long, default_value_t = 100)]
    count: u64,

    /// Bundle payload size in bytes.
    #[arg(long, default_value_t = 1000)]
    size: usize,

    /// Rate ceiling in bits per second.
    #[arg(long, default_value_t = 5_000_000)]
    rate_bps: u64,

    /// Keep-alive interval in seconds.
    #[arg(long, default_value_t = 15)]
    keep_alive_secs: u64,

    /// In-flight unacked frame cap.
    #[arg(long, default_value_t = 100)]
    max_unacked: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let source = StcpSource::new(SourceConfig {
        keep_alive_interval: Duration::from_secs(cli.keep_alive_secs),
        rate_bps: cli.rate_bps,
        max_unacked: cli.max_unacked,
    });

    let acked = Arc::new(AtomicU64::new(0));
    let acked_in_cb = Arc::clone(&acked);
    source.set_on_successful_ack(move || {
        acked_in_cb.fetch_add(1, Ordering::Relaxed);
    });

    source.connect(cli.host.as_str(), cli.port);
    let deadline = Instant::now() + Duration::from_secs(10);
    while !source.ready_to_forward() {
        if Instant::now() > deadline {
            bail!("peer did not accept the connection");
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let bundle = vec![0x42u8; cli.size];
    let mut sent = 0u64;
    while sent < cli.count {
        match source.forward(&bundle) {
            Ok(()) => sent += 1,
            Err(ForwardError::NotReady) => bail!("link went down mid-stream"),
            Err(e) => {
                tracing::debug!(error = %e, "window full, backing off");
                std::thread::sleep(Duration::from_millis(5));
            }
        }
    }

    let deadline = Instant::now() + Duration::from_secs(600);
    while source.frames_acked() < cli.count {
        if Instant::now() > deadline {
            bail!(
                "timed out waiting for acks: {}/{}",
                source.frames_acked(),
                cli.count
            );
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    tracing::info!(acks = acked.load(Ordering::Relaxed), "all frames acked");
    println!("{}", serde_json::to_string_pretty(&source.stats())?);
    Ok(())
}
