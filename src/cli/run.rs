//! CLI entry point
//!
//! `run()` parses arguments, validates the source selection, discovers the
//! configuration, builds the provider client and drives one tutorial run on a
//! tokio runtime. `--list-files` and `--no-llm` return before any provider
//! setup. It prints every error itself; `main` only maps the returned
//! [`ExitCode`] to the process exit status.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, warn};

use codetutor_config::Config;
use codetutor_crawl::{FsCrawler, Source};
use codetutor_engine::{CancellationFlag, RunStatus};
use codetutor_llm::LlmClient;
use codetutor_utils::error::TutorError;
use codetutor_utils::exit_codes::ExitCode;
use codetutor_utils::logging::init_tracing;

use super::args::Cli;
use super::progress::ProgressObserver;
use crate::generate::{TutorialRun, generate_tutorial};
use crate::survey::{document_structure, list_files};

fn report_error(err: &TutorError) -> ExitCode {
    eprintln!("{}", err.display_for_user());
    err.to_exit_code()
}

/// Main CLI execution function.
///
/// Returns `Ok(())` on success (with or without warnings) and the exit code
/// for the first fatal failure otherwise.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    // Exactly one source, checked before anything touches the network.
    let source = Source::from_selection(cli.repo.clone(), cli.dir.clone(), cli.token.clone())
        .map_err(|err| report_error(&TutorError::Config(err)))?;

    let config = Config::discover(&cli.config_args())
        .map_err(|err| report_error(&TutorError::Config(err)))?;

    if cli.verbose {
        for (key, (value, origin)) in config.effective_config() {
            debug!(key = %key, value = %value, source = %origin, "Effective config");
        }
    }

    if cli.list_files || cli.no_llm {
        return runtime()?
            .block_on(run_offline(&cli, &config, source))
            .map_err(|err| report_error(&err));
    }

    let client =
        LlmClient::from_config(&config).map_err(|err| report_error(&TutorError::Llm(err)))?;

    let rt = runtime()?;

    println!("Generating tutorial for {}", source.describe());

    let result = rt.block_on(async {
        let cancel = CancellationFlag::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping after the current stage");
                on_signal.cancel();
            }
        });

        generate_tutorial(
            &config,
            source,
            cli.name.clone(),
            client,
            Arc::new(FsCrawler),
            &cancel,
            &ProgressObserver,
        )
        .await
    });

    match result {
        Ok(run) => {
            print_summary(&run);
            Ok(())
        }
        Err(err) => Err(report_error(&err)),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, ExitCode> {
    tokio::runtime::Runtime::new()
        .context("failed to create async runtime")
        .map_err(|e| {
            eprintln!("✗ {e:#}");
            ExitCode::INTERNAL
        })
}

async fn run_offline(cli: &Cli, config: &Config, source: Source) -> Result<(), TutorError> {
    if cli.list_files {
        let files = list_files(config, &source, &FsCrawler).await?;
        println!("Found {} file(s) in {}:", files.len(), source.describe());
        for file in &files {
            println!("- {}", file.path);
        }
        return Ok(());
    }

    let run = document_structure(config, source, cli.name.clone(), &FsCrawler).await?;
    println!(
        "✓ Structure of '{}' documented ({} component(s), {} shared librar{})",
        run.project_name,
        run.structure.components.len(),
        run.structure.shared_libraries.len(),
        if run.structure.shared_libraries.len() == 1 { "y" } else { "ies" },
    );
    println!("Output: {}", run.output_root.display());
    Ok(())
}

fn print_summary(run: &TutorialRun) {
    let warnings: Vec<String> = run
        .report
        .warnings()
        .into_iter()
        .chain(run.warnings.iter().map(ToString::to_string))
        .collect();

    match run.status() {
        RunStatus::Succeeded => println!("\n✓ Tutorial for '{}' complete", run.project_name),
        RunStatus::SucceededWithWarnings => {
            println!(
                "\n⚠ Tutorial for '{}' complete with {} warning(s):",
                run.project_name,
                warnings.len()
            );
            for warning in &warnings {
                println!("  • {warning}");
            }
        }
    }
    println!("Output: {}", run.output_root.display());
}
