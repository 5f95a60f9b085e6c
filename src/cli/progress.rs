//! Human progress lines on stdout

use codetutor_engine::{FlowObserver, StageReport};

/// Prints one line when a stage starts and one when it finishes.
#[derive(Debug, Default)]
pub struct ProgressObserver;

impl ProgressObserver {
    fn finished_line(report: &StageReport) -> String {
        let marker = if report.is_degraded() { "⚠" } else { "✓" };
        let mut line = format!(
            "{marker} {} ({:.1}s",
            report.name,
            report.duration.as_secs_f64()
        );

        if let Some(batch) = report.batch {
            line.push_str(&format!(", {}/{} items", batch.completed, batch.total));
            if batch.degraded() > 0 {
                line.push_str(&format!(", {} placeholder(s)", batch.degraded()));
            }
        }
        if report.attempts > 1 {
            line.push_str(&format!(", {} attempts", report.attempts));
        }
        if report.used_fallback {
            line.push_str(", fallback used");
        }
        line.push(')');
        line
    }
}

impl FlowObserver for ProgressObserver {
    fn stage_started(&self, name: &str, step: usize) {
        println!("→ [{}] {name}", step + 1);
    }

    fn stage_finished(&self, report: &StageReport) {
        println!("{}", Self::finished_line(report));
    }

    fn stage_failed(&self, name: &str, error: &str) {
        println!("✗ {name}: {error}");
    }
}
