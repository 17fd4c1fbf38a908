use std::time::Duration;

use rand::Rng;
use rocket::tokio::time::{sleep, Instant};

use crate::model::store::{StoreError, StoreResult};

/// How long a single store operation may keep retrying its transaction.
pub const TRANSACTION_BUDGET: Duration = Duration::from_secs(10);

const BASE_BACKOFF: Duration = Duration::from_millis(2);
const MAX_BACKOFF: Duration = Duration::from_millis(250);

/// Retry bookkeeping for one transactional store operation.
///
/// Every wait sleeps for a random duration up to an exponentially growing
/// ceiling, and the whole operation gives up with [`StoreError::Contended`]
/// once its time budget is spent.
#[derive(Debug)]
pub struct TransactionRetry {
    deadline: Instant,
    attempts: usize,
}

impl TransactionRetry {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::with_budget(TRANSACTION_BUDGET)
    }

    pub fn with_budget(budget: Duration) -> Self {
        Self {
            deadline: Instant::now() + budget,
            attempts: 1,
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Back off before the next attempt, or fail if the budget is spent.
    pub async fn wait(&mut self) -> StoreResult<()> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(StoreError::Contended(self.attempts));
        }

        let ceiling = backoff_ceiling(self.attempts);
        let delay = {
            let mut rng = rand::thread_rng();
            Duration::from_micros(rng.gen_range(0..=ceiling.as_micros() as u64))
        };
        sleep(delay.min(remaining)).await;

        self.attempts += 1;
        Ok(())
    }
}

/// The longest wait after the given number of failed attempts.
fn backoff_ceiling(attempts: usize) -> Duration {
    let shift = attempts.saturating_sub(1).min(16) as u32;
    BASE_BACKOFF.saturating_mul(1 << shift).min(MAX_BACKOFF)
}
