//! One end-to-end tutorial run.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use codetutor_config::Config;
use codetutor_crawl::{Crawler, Source};
use codetutor_engine::{CancellationFlag, FlowObserver, FlowReport, RunStatus};
use codetutor_llm::LlmClient;
use codetutor_stages::{IntegrityWarning, SharedContext, StageSettings, tutorial_flow};
use codetutor_utils::error::TutorError;

/// Result of a run that reached the combine stage.
#[derive(Debug, Clone)]
pub struct TutorialRun {
    /// `<output>/<project>/`
    pub output_root: PathBuf,
    pub project_name: String,
    pub report: FlowReport,
    /// Data problems repaired in place while the run progressed
    pub warnings: Vec<IntegrityWarning>,
}

impl TutorialRun {
    /// `SucceededWithWarnings` if any stage degraded or any data was repaired.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        if self.warnings.is_empty() {
            self.report.status()
        } else {
            RunStatus::SucceededWithWarnings
        }
    }
}

/// Run the full pipeline for `source`.
///
/// `project_name` overrides the name derived from the source. The flow checks
/// `cancel` between stage invocations and reports progress to `observer`.
///
/// # Errors
///
/// Returns [`TutorError::Flow`] when a stage fails without a fallback or the
/// run is cancelled.
pub async fn generate_tutorial(
    config: &Config,
    source: Source,
    project_name: Option<String>,
    client: LlmClient,
    crawler: Arc<dyn Crawler>,
    cancel: &CancellationFlag,
    observer: &dyn FlowObserver,
) -> Result<TutorialRun, TutorError> {
    info!(source = %source.describe(), language = config.language(), "Generating tutorial");

    let flow = tutorial_flow(client, crawler, StageSettings::from_config(config))?;
    debug!(stages = ?flow.stage_names(), "Flow built");
    let mut ctx = SharedContext::new(source, project_name, config);

    let report = flow.run(&mut ctx, cancel, observer).await?;

    let output_root = ctx.output_root.take().ok_or_else(|| {
        TutorError::Io(std::io::Error::other(
            "pipeline finished without writing the tutorial",
        ))
    })?;

    let run = TutorialRun {
        output_root,
        project_name: ctx.project_name_or_default().to_string(),
        report,
        warnings: std::mem::take(&mut ctx.warnings),
    };

    match run.status() {
        RunStatus::Succeeded => info!(
            output = %run.output_root.display(),
            duration_ms = run.report.duration.as_millis() as u64,
            "Tutorial complete"
        ),
        RunStatus::SucceededWithWarnings => warn!(
            output = %run.output_root.display(),
            warnings = run.warnings.len() + run.report.warnings().len(),
            "Tutorial complete with warnings"
        ),
    }

    Ok(run)
}
