// Progress Aggregator
//
// total = INGESTION_STEPS + items * STEPS_PER_ITEM, fixed once the batch is
// loaded. completed only grows and never exceeds total.

use super::constants::{INGESTION_STEPS, STEPS_PER_ITEM};
use crate::domain::{DomainError, ProgressSnapshot};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    completed: u32,
    total: u32,
    fixed: bool,
}

impl Default for ProgressAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressAggregator {
    /// Before the batch is known only the ingestion step is counted
    pub fn new() -> Self {
        Self {
            completed: 0,
            total: INGESTION_STEPS,
            fixed: false,
        }
    }

    /// Fix the step total from the loaded batch size (once per run)
    pub fn fix_total(&mut self, item_count: usize) -> Result<u32, DomainError> {
        if self.fixed {
            return Err(DomainError::ValidationError(
                "total steps already fixed for this run".into(),
            ));
        }
        let items = u32::try_from(item_count).map_err(|_| {
            DomainError::ValidationError(format!("batch too large: {} items", item_count))
        })?;
        self.total = INGESTION_STEPS + items * STEPS_PER_ITEM;
        self.fixed = true;
        Ok(self.total)
    }

    /// Record one finished unit of work (success, error and skip all count)
    pub fn complete_step(&mut self) -> u32 {
        if self.completed < self.total {
            self.completed += 1;
        } else {
            warn!(
                completed = self.completed,
                total = self.total,
                "Step completion beyond total ignored"
            );
        }
        self.completed
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// floor(completed / total * 100); 0 until the total is fixed
    pub fn percent(&self) -> u8 {
        if !self.fixed || self.total == 0 {
            return 0;
        }
        ((self.completed as u64 * 100) / self.total as u64) as u8
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed_steps: self.completed,
            total_steps: self.total,
            percent: self.percent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_accounting() {
        let mut progress = ProgressAggregator::new();
        progress.complete_step(); // ingestion
        assert_eq!(progress.fix_total(3).unwrap(), 7);
        assert_eq!(progress.completed(), 1);
        assert_eq!(progress.percent(), 14);

        for _ in 0..6 {
            progress.complete_step();
        }
        assert_eq!(progress.completed(), 7);
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn test_percent_is_floored() {
        let mut progress = ProgressAggregator::new();
        progress.fix_total(1).unwrap(); // total 3
        progress.complete_step();
        assert_eq!(progress.percent(), 33);
        progress.complete_step();
        assert_eq!(progress.percent(), 66);
    }

    #[test]
    fn test_never_exceeds_total() {
        let mut progress = ProgressAggregator::new();
        progress.fix_total(0).unwrap();
        assert_eq!(progress.complete_step(), 1);
        assert_eq!(progress.complete_step(), 1);
        assert_eq!(progress.snapshot().percent, 100);
    }

    #[test]
    fn test_total_fixed_once() {
        let mut progress = ProgressAggregator::new();
        progress.fix_total(2).unwrap();
        assert!(progress.fix_total(10).is_err());
        assert_eq!(progress.total(), 5);
    }

    #[test]
    fn test_percent_zero_before_batch_known() {
        let mut progress = ProgressAggregator::new();
        progress.complete_step();
        assert_eq!(progress.percent(), 0);
        assert_eq!(progress.completed(), 1);
        assert_eq!(progress.total(), 1);
    }
}
