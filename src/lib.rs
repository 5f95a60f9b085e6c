//! codetutor - turn a codebase into a chaptered, beginner-friendly tutorial
//!
//! A small, strictly sequential pipeline crawls a repository, asks an LLM
//! provider to identify its core abstractions and how they relate, picks a
//! teaching order, writes one chapter per abstraction and renders the result
//! to `<output>/<project>/`.
//!
//! codetutor can be used in two ways:
//! - **CLI**: `codetutor --dir . --include "**/*.rs"`
//! - **Library**: build a [`Config`], pick a [`Source`] and call
//!   [`generate_tutorial`]
//!
//! Without a provider, [`list_files`] shows what a run would read and
//! [`document_structure`] writes a layout-only overview.
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # Tutorial for a local checkout
//! codetutor --dir ./my-project --name "My Project"
//!
//! # Tutorial for a GitHub repository, written in Spanish
//! codetutor --repo https://github.com/owner/repo --language spanish
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use codetutor::{
//!     CancellationFlag, Config, FsCrawler, LlmClient, NoopObserver, Source, TutorError,
//!     generate_tutorial,
//! };
//!
//! async fn build() -> Result<(), TutorError> {
//!     let config = Config::builder().language("english").build()?;
//!     let client = LlmClient::from_config(&config)?;
//!     let source = Source::from_selection(None, Some("./my-project".into()), None)?;
//!
//!     let run = generate_tutorial(
//!         &config,
//!         source,
//!         None,
//!         client,
//!         Arc::new(FsCrawler),
//!         &CancellationFlag::new(),
//!         &NoopObserver,
//!     )
//!     .await?;
//!
//!     println!("tutorial written to {}", run.output_root.display());
//!     Ok(())
//! }
//! ```
//!
//! # Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | Internal error |
//! | 2 | Invalid arguments or configuration |
//! | 3 | Source could not be crawled |
//! | 70 | Provider failure |
//! | 74 | Output could not be written |
//! | 130 | Cancelled |

mod generate;
mod survey;

pub mod cli;

// ============================================================================
// Public API
// ============================================================================

pub use generate::{TutorialRun, generate_tutorial};
pub use survey::{StructureRun, document_structure, list_files};

/// Configuration with precedence CLI > `.codetutor/config.toml` > defaults.
///
/// Use [`Config::discover()`] for CLI-like behavior or [`Config::builder()`]
/// when embedding.
pub use codetutor_config::Config;

pub use codetutor_config::{CliArgs, ConfigBuilder, ConfigSource};

/// Library-level error type.
///
/// Library code returns `TutorError` and never calls `std::process::exit()`;
/// use [`display_for_user()`](TutorError::display_for_user) and
/// [`to_exit_code()`](TutorError::to_exit_code) at the edge.
pub use codetutor_utils::error::TutorError;

pub use codetutor_utils::error::{ErrorCategory, UserFriendlyError};
pub use codetutor_utils::exit_codes::ExitCode;

pub use codetutor_crawl::{Crawler, FsCrawler, Source, SourceFile};
pub use codetutor_engine::{
    CancellationFlag, FlowObserver, FlowReport, NoopObserver, RunStatus, StageReport,
};
pub use codetutor_llm::{LlmBackend, LlmClient};
pub use codetutor_stages::{
    IntegrityWarning, ProjectStructure, SharedContext, StageSettings, tutorial_flow,
};

// ============================================================================
// Internal crates - accessible but not stable
// ============================================================================

#[doc(hidden)]
pub use codetutor_config as config;
#[doc(hidden)]
pub use codetutor_crawl as crawl;
#[doc(hidden)]
pub use codetutor_engine as engine;
#[doc(hidden)]
pub use codetutor_llm as llm;
#[doc(hidden)]
pub use codetutor_stage_api as stage_api;
#[doc(hidden)]
pub use codetutor_stages as stages;
#[doc(hidden)]
pub use codetutor_utils::{error, exit_codes, logging};
