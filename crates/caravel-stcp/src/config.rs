//! Source configuration.

use std::time::Duration;

/// STCP source configuration parameters. Immutable after construction.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Period between keep-alive probes; also the idle threshold. A
    /// zero-length frame is written whenever no data frame was enqueued in
    /// the preceding interval.
    pub keep_alive_interval: Duration,
    /// Bit-rate ceiling applied to framed (post-prefix) bytes.
    pub rate_bps: u64,
    /// In-flight unacked frame cap; capacity of each ack window.
    pub max_unacked: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            keep_alive_interval: Duration::from_secs(15),
            rate_bps: 5_000_000,
            max_unacked: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_wire_protocol_profile() {
        let config = SourceConfig::default();
        assert_eq!(config.rate_bps, 5_000_000);
        assert_eq!(config.max_unacked, 100);
        assert_eq!(config.keep_alive_interval, Duration::from_secs(15));
    }
}
