use std::time::Duration;
use tokio::time::Instant;

/// Wall-clock allowance for one run.
///
/// Only consulted between cycles; an in-flight fetch or delivery always
/// completes, so a run may overshoot by one cycle.
#[derive(Debug, Clone, Copy)]
pub struct RunBudget {
    max_run_time: Duration,
    started_at: Instant,
}

impl RunBudget {
    pub fn start(max_run_time: Duration) -> Self {
        Self {
            max_run_time,
            started_at: Instant::now(),
        }
    }

    pub fn max_run_time(&self) -> Duration {
        self.max_run_time
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.max_run_time.saturating_sub(self.elapsed())
    }

    pub fn is_exhausted(&self) -> bool {
        self.elapsed() >= self.max_run_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhausts_at_limit() {
        let budget = RunBudget::start(Duration::from_secs(5));
        assert!(!budget.is_exhausted());
        assert_eq!(budget.remaining(), Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(!budget.is_exhausted());
        assert_eq!(budget.remaining(), Duration::from_secs(2));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(budget.is_exhausted());
        assert_eq!(budget.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_saturates_after_overrun() {
        let budget = RunBudget::start(Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(budget.remaining(), Duration::ZERO);
        assert!(budget.elapsed() >= Duration::from_secs(10));
    }
}
