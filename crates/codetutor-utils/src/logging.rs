//! Logging infrastructure for codetutor.
//!
//! Logs go to stderr through `tracing-subscriber`; human progress lines are
//! printed separately by the CLI. Stage execution is wrapped in [`stage_span`]
//! and reported through the `log_stage_*` helpers so every line carries the
//! same structured fields.

use tracing::{Level, error, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Default filter when `RUST_LOG` is unset.
#[must_use]
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "codetutor=debug,info"
    } else {
        "codetutor=info,warn"
    }
}

/// Initialize the tracing subscriber.
///
/// Compact format by default; `verbose` adds targets and span close events
/// (which carry span durations). `RUST_LOG` overrides the filter.
///
/// Calling this twice returns an error from the second call instead of
/// panicking.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(verbose)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false);

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                layer
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.with_target(false).compact())
            .try_init()?;
    }

    Ok(())
}

/// Span wrapping one stage invocation.
pub fn stage_span(stage: &str, step: usize) -> tracing::Span {
    span!(Level::INFO, "stage", stage = %stage, step = step)
}

pub fn log_stage_start(stage: &str, step: usize) {
    info!(stage = %stage, step = step, "Starting stage");
}

pub fn log_stage_complete(stage: &str, outcome: &str, duration_ms: u128) {
    info!(
        stage = %stage,
        outcome = %outcome,
        duration_ms = %duration_ms,
        "Stage completed"
    );
}

pub fn log_stage_error(stage: &str, error: &str, duration_ms: u128) {
    error!(
        stage = %stage,
        duration_ms = %duration_ms,
        error = %error,
        "Stage failed"
    );
}
