//! Timeout enforcement.
//!
//! # Responsibilities
//! - Turn the configured seconds into durations once
//! - Wrap connect and drain steps with a deadline
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;

use crate::config::TimeoutConfig;

/// Resolved timeouts for a running relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
    pub drain: Duration,
}

impl From<&TimeoutConfig> for Timeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            connect: Duration::from_secs(config.connect_secs),
            read: Duration::from_secs(config.read_secs),
            drain: Duration::from_secs(config.drain_secs),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

/// A deadline expired before the operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline of {0:?} exceeded")]
pub struct DeadlineExceeded(pub Duration);

/// Run `fut` to completion or until `limit` elapses.
pub async fn with_deadline<F>(limit: Duration, fut: F) -> Result<F::Output, DeadlineExceeded>
where
    F: Future,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| DeadlineExceeded(limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_config() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.read, Duration::from_secs(60));
        assert_eq!(timeouts.connect, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let result = with_deadline(Duration::from_secs(1), std::future::pending::<()>()).await;
        assert_eq!(result, Err(DeadlineExceeded(Duration::from_secs(1))));
    }

    #[tokio::test]
    async fn fast_future_completes() {
        let result = with_deadline(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result, Ok(7));
    }
}
