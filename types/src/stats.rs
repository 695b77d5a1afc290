//! Import progress counters.

use serde::{Deserialize, Serialize};

/// Running totals for one import.
///
/// At the end of a completed run `success + failed == processed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub processed: usize,
}

impl ImportStats {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }

    /// Whole-number percentage of rows processed; 0 for an empty import.
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let percent = (self.processed as f64 / self.total as f64 * 100.0).round();
        percent.clamp(0.0, 100.0) as u8
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.success == self.processed
    }
}
