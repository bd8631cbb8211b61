//! Client-side polling schedule.
//!
//! A poller asks for progress, then either fetches the result, stops on
//! failure, or sleeps and asks again. Delays grow exponentially and the
//! number of polls is bounded. The browser script on the job page follows
//! the same rules with the constants from `PollPolicy`.

use std::time::Duration;

use crate::domain::ProgressReport;
use crate::queue::RetryPolicy;

#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub backoff: RetryPolicy,
    /// Total polls (including failed requests) before giving up.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            backoff: RetryPolicy::new(Duration::from_millis(500), 1.5)
                .with_max_delay(Duration::from_secs(5)),
            max_attempts: 120,
        }
    }
}

impl PollPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn base_delay_ms(&self) -> u128 {
        self.backoff.base_delay.as_millis()
    }

    pub fn max_delay_ms(&self) -> u128 {
        self.backoff
            .max_delay
            .unwrap_or(Duration::MAX)
            .as_millis()
    }

    /// Worst-case time spent waiting between polls before giving up.
    pub fn total_wait(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.backoff.next_delay(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// `attempt` polls have been made so far.
    Polling { attempt: u32 },
    Ready,
    Failed(String),
    GaveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    /// Poll again after this delay.
    Retry(Duration),
    /// The result is ready; fetch it.
    Fetch,
    /// Terminal; do nothing more.
    Stop,
}

#[derive(Debug, Clone)]
pub struct PollTracker {
    policy: PollPolicy,
    state: PollState,
}

impl PollTracker {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            state: PollState::Polling { attempt: 0 },
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self.state, PollState::Polling { .. })
    }

    /// Feed one `/progress` response.
    pub fn observe(&mut self, report: &ProgressReport) -> PollStep {
        let PollState::Polling { attempt } = self.state else {
            return PollStep::Stop;
        };
        let attempt = attempt + 1;

        if report.is_complete() {
            self.state = PollState::Ready;
            return PollStep::Fetch;
        }
        if report.is_failed() {
            let reason = report
                .error
                .clone()
                .unwrap_or_else(|| "job failed".to_string());
            self.state = PollState::Failed(reason);
            return PollStep::Stop;
        }
        self.reschedule(attempt)
    }

    /// Record a poll that failed at the transport level.
    pub fn observe_error(&mut self) -> PollStep {
        let PollState::Polling { attempt } = self.state else {
            return PollStep::Stop;
        };
        self.reschedule(attempt + 1)
    }

    fn reschedule(&mut self, attempt: u32) -> PollStep {
        if attempt >= self.policy.max_attempts {
            self.state = PollState::GaveUp;
            return PollStep::Stop;
        }
        self.state = PollState::Polling { attempt };
        PollStep::Retry(self.policy.backoff.next_delay(attempt))
    }
}
