//! SSH readiness polling
//!
//! The loop is bounded by wall-clock time, not by the attempt count: the
//! expected number of attempts is only used to annotate progress. A single
//! probe never outlives the deadline.

use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{info, warn};

use crate::clients::RemoteExecutor;

pub struct SshProber<'a> {
    remote: &'a dyn RemoteExecutor,
    timeout: Duration,
    retry_interval: Duration,
}

impl<'a> SshProber<'a> {
    pub fn new(
        remote: &'a dyn RemoteExecutor,
        timeout: Duration,
        retry_interval: Duration,
    ) -> Self {
        Self {
            remote,
            timeout,
            retry_interval,
        }
    }

    /// `timeout / retry_interval`, integer division
    pub fn total_attempts(&self) -> u128 {
        self.timeout.as_millis() / self.retry_interval.as_millis().max(1)
    }

    /// Poll until a session can be opened or `timeout` has elapsed
    pub async fn wait_until_available(&self, host: &str) -> bool {
        let start = Instant::now();
        let total_attempts = self.total_attempts();
        let mut attempt: u128 = 0;

        while start.elapsed() < self.timeout {
            attempt += 1;
            let progress = format!("{}/{} attempts", attempt, total_attempts);
            if total_attempts / 2 < attempt {
                warn!("Attempting connection to {}. {}.", host, progress);
            } else {
                info!("Attempting connection to {}. {}.", host, progress);
            }

            let remaining = self.timeout.saturating_sub(start.elapsed());
            match timeout(remaining, self.remote.probe(host)).await {
                Ok(Ok(())) => return true,
                Err(_) => {
                    warn!("Connection attempt to {} still pending at the deadline.", host);
                    break;
                }
                Ok(Err(e)) => {
                    warn!(
                        "Connection attempt to {} failed: {}. Waiting {}s to retry.",
                        host,
                        e,
                        self.retry_interval.as_secs()
                    );
                    sleep(self.retry_interval).await;
                }
            }
        }

        false
    }
}
