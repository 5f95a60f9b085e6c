//! Run reports produced by [`Flow::run`](crate::Flow::run).

use std::time::Duration;

use codetutor_stage_api::Outcome;

/// Item counts for one batch stage invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub fallback: usize,
    pub failed: usize,
}

impl BatchSummary {
    #[must_use]
    pub fn degraded(&self) -> usize {
        self.fallback + self.failed
    }
}

/// What happened during one stage invocation.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: String,
    /// 0-based position of this invocation within the run
    pub step: usize,
    pub outcome: Outcome,
    /// Attempts spent on `execute` (the maximum across items for batch stages)
    pub attempts: u32,
    pub duration: Duration,
    /// The stage's fallback replaced the output of a failed `execute`
    pub used_fallback: bool,
    pub batch: Option<BatchSummary>,
    pub warnings: Vec<String>,
}

impl StageReport {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.used_fallback || self.outcome == Outcome::DEGRADED || !self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    SucceededWithWarnings,
}

/// Summary of a flow run that reached the end without a fatal error.
#[derive(Debug, Clone)]
pub struct FlowReport {
    pub stages: Vec<StageReport>,
    pub duration: Duration,
}

impl FlowReport {
    #[must_use]
    pub fn status(&self) -> RunStatus {
        if self.stages.iter().any(StageReport::is_degraded) {
            RunStatus::SucceededWithWarnings
        } else {
            RunStatus::Succeeded
        }
    }

    /// Warnings from every stage, prefixed with the stage name.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.stages
            .iter()
            .flat_map(|stage| {
                stage
                    .warnings
                    .iter()
                    .map(move |warning| format!("{}: {warning}", stage.name))
            })
            .collect()
    }

    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|stage| stage.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(name: &str, outcome: Outcome) -> StageReport {
        StageReport {
            name: name.to_string(),
            step: 0,
            outcome,
            attempts: 1,
            duration: Duration::from_millis(3),
            used_fallback: false,
            batch: None,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_status_clean_run() {
        let report = FlowReport {
            stages: vec![stage("a", Outcome::DEFAULT), stage("b", Outcome::DEFAULT)],
            duration: Duration::from_millis(6),
        };
        assert_eq!(report.status(), RunStatus::Succeeded);
        assert!(report.warnings().is_empty());
    }

    #[test]
    fn test_status_with_degraded_stage() {
        let mut degraded = stage("write-chapters", Outcome::DEGRADED);
        degraded.warnings.push("1 of 2 items used fallback".to_string());
        let report = FlowReport {
            stages: vec![stage("a", Outcome::DEFAULT), degraded],
            duration: Duration::from_millis(6),
        };

        assert_eq!(report.status(), RunStatus::SucceededWithWarnings);
        assert_eq!(
            report.warnings(),
            vec!["write-chapters: 1 of 2 items used fallback".to_string()]
        );
        assert!(report.stage("write-chapters").is_some());
    }

    #[test]
    fn test_batch_summary_degraded_count() {
        let summary = BatchSummary {
            total: 5,
            completed: 2,
            fallback: 2,
            failed: 1,
        };
        assert_eq!(summary.degraded(), 3);
    }
}
