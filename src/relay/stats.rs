//! Relay Statistics

use std::time::Duration;
use tracing::info;

/// Byte counts and duration of a finished relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayStats {
    /// Bytes forwarded client to destination
    pub bytes_up: u64,
    /// Bytes forwarded destination to client
    pub bytes_down: u64,
    pub duration: Duration,
}

impl RelayStats {
    /// Get total bytes transferred
    pub fn total_bytes(&self) -> u64 {
        self.bytes_up + self.bytes_down
    }

    /// Log relay statistics for the given destination
    pub fn log_stats(&self, target: &str) {
        info!(
            target_addr = %target,
            duration_ms = self.duration.as_millis() as u64,
            bytes_up = self.bytes_up,
            bytes_down = self.bytes_down,
            total_bytes = self.total_bytes(),
            "Relay completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_bytes() {
        let stats = RelayStats {
            bytes_up: 120,
            bytes_down: 4096,
            duration: Duration::from_millis(15),
        };
        assert_eq!(stats.total_bytes(), 4216);
        assert_eq!(RelayStats::default().total_bytes(), 0);
    }
}
