use std::time::Duration;

use kura_core::status::DbErrorCode;

/// Delay before the next connection attempt: `1 + budget * 1.5` seconds, capped at `max`.
pub fn backoff_delay(budget: u32, max: Duration) -> Duration {
    let delay = Duration::from_secs_f64(1.0 + budget as f64 * 1.5);

    delay.min(max)
}

/// Counts failures of one kind. A different failure mode supersedes the backoff
/// accumulated so far, so the count starts over whenever the kind changes.
#[derive(Debug, Default, Clone)]
pub struct RetryBudget {
    failures: u32,
    last_probe: Option<i32>,
    last_failure: Option<DbErrorCode>,
}

impl RetryBudget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> u32 {
        self.failures
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Records a probe result, returns true if the budget was reset.
    pub fn observe_probe(&mut self, code: i32) -> bool {
        let changed = self.last_probe.map(|x| x != code).unwrap_or(false);
        self.last_probe = Some(code);

        if changed {
            self.reset();
        }

        changed
    }

    /// Records a failed attempt and returns the new budget.
    pub fn record_failure(&mut self, code: DbErrorCode) -> u32 {
        if self.last_failure.map(|x| x != code).unwrap_or(false) {
            self.reset();
        }

        self.last_failure = Some(code);
        self.failures += 1;

        self.failures
    }

    pub fn delay(&self, max: Duration) -> Duration {
        backoff_delay(self.failures, max)
    }
}
