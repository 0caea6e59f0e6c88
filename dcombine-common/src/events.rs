//! Progress event types
//!
//! Events emitted by the reconciliation engine and the task runner. Callers
//! consume them either incrementally (mpsc channel) or through the
//! console indicator.

use serde::{Deserialize, Serialize};

/// Per-contact progress: emitted once for every contact handled, including
/// skipped and remediated ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Contacts handled so far in this run
    pub processed: usize,
    /// Contacts in the batch
    pub total: usize,
}

impl ProgressEvent {
    pub fn new(processed: usize, total: usize) -> Self {
        Self { processed, total }
    }

    /// Whole-number percentage, 100 for an empty batch
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = (self.processed as f64 / self.total as f64 * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

/// Task-level phase report for callers that poll a running task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// 0 while harvesting, 1 once harvesting finished
    pub harvest_done: u8,
    /// Reconciliation progress, 0..=100
    pub process_percent: u8,
}

impl TaskProgress {
    pub fn harvesting() -> Self {
        Self { harvest_done: 0, process_percent: 0 }
    }

    pub fn harvested() -> Self {
        Self { harvest_done: 1, process_percent: 0 }
    }

    pub fn processing(event: &ProgressEvent) -> Self {
        Self { harvest_done: 1, process_percent: event.percent() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_rounds() {
        assert_eq!(ProgressEvent::new(1, 3).percent(), 33);
        assert_eq!(ProgressEvent::new(2, 3).percent(), 67);
        assert_eq!(ProgressEvent::new(3, 3).percent(), 100);
    }

    #[test]
    fn test_percent_empty_batch() {
        assert_eq!(ProgressEvent::new(0, 0).percent(), 100);
        assert!(ProgressEvent::new(0, 0).is_complete());
    }

    #[test]
    fn test_task_progress_serializes_phase_keys() {
        let json = serde_json::to_value(TaskProgress::processing(&ProgressEvent::new(1, 4))).unwrap();
        assert_eq!(json["harvest_done"], 1);
        assert_eq!(json["process_percent"], 25);
    }
}
