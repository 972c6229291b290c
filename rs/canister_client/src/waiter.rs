use crate::agent_config::AgentConfig;
use crate::agent_error::AgentError;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Paces the polling of an update call's status.
///
/// The sleep between polls follows the backoff policy, and polling gives up
/// once `timeout` has elapsed since the first call to [`Waiter::wait`].
/// Dropping the future returned by `wait` cancels the sleep.
#[derive(Debug)]
pub struct Waiter<B: Backoff = ExponentialBackoff> {
    backoff: B,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Waiter<ExponentialBackoff> {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.backoff_policy(), config.ingress_timeout())
    }
}

impl<B: Backoff> Waiter<B> {
    pub fn new(backoff: B, timeout: Duration) -> Self {
        Self {
            backoff,
            timeout,
            deadline: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Restarts the backoff from its initial interval. The deadline is kept.
    pub fn reset(&mut self) {
        self.backoff.reset();
    }

    /// Sleeps until the next poll is due.
    ///
    /// Fails with `TimeoutWaitingForResponse` once the deadline has passed or
    /// the backoff policy is exhausted. The last sleep is cut short at the
    /// deadline so that one final poll happens right at it.
    pub async fn wait(&mut self) -> Result<(), AgentError> {
        let now = Instant::now();
        let timeout = self.timeout;
        let deadline = *self.deadline.get_or_insert_with(|| now + timeout);
        if now >= deadline {
            return Err(AgentError::TimeoutWaitingForResponse);
        }
        let interval = self
            .backoff
            .next_backoff()
            .ok_or(AgentError::TimeoutWaitingForResponse)?;
        sleep_until(deadline.min(now + interval)).await;
        Ok(())
    }
}
