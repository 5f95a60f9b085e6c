//! CLI argument definitions

use clap::{CommandFactory, Parser};
use std::path::PathBuf;

use codetutor_config::CliArgs;

/// codetutor - generate a beginner-friendly tutorial from a codebase
#[derive(Parser, Debug)]
#[command(name = "codetutor")]
#[command(about = "Generate a chaptered tutorial for a codebase using an LLM provider")]
#[command(long_about = r#"
codetutor crawls a GitHub repository or a local directory, identifies the core
abstractions of the code, explains how they relate and writes one markdown
chapter per abstraction in a beginner-friendly order.

EXAMPLES:
  # Tutorial for a local checkout
  codetutor --dir ./my-project

  # Tutorial for a GitHub repository, only Rust sources
  codetutor --repo https://github.com/owner/repo --include "**/*.rs"

  # Write the tutorial in French to a custom directory
  codetutor --dir . --language french --output docs/tutorial

  # Check which files would be read, or document the layout only
  codetutor --dir . --include "*.java" --list-files
  codetutor --dir . --include "*.java" --no-llm

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > config file > defaults
  Config file is discovered by searching upward from CWD for .codetutor/config.toml
  Use --config to specify an explicit config file path

CREDENTIALS:
  ANTHROPIC_API_KEY or OPENROUTER_API_KEY, depending on --llm-provider
  (not needed for --list-files or --no-llm)
  GITHUB_TOKEN for private repositories (or --token)
  A .env file in the working directory is loaded at start-up
"#)]
#[command(version)]
pub struct Cli {
    /// URL of a GitHub repository to document
    #[arg(long)]
    pub repo: Option<String>,

    /// Local directory to document
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Project name (derived from the repository or directory if omitted)
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// GitHub token for private repositories
    #[arg(short = 't', long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Base output directory
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Include patterns, e.g. "**/*.py" "*.md"
    #[arg(short = 'i', long, num_args = 1..)]
    pub include: Vec<String>,

    /// Exclude patterns, e.g. "tests/*" "docs/*"
    #[arg(short = 'e', long, num_args = 1..)]
    pub exclude: Vec<String>,

    /// Maximum file size in bytes
    #[arg(short = 's', long = "max-size")]
    pub max_size: Option<u64>,

    /// Language of the generated tutorial
    #[arg(long)]
    pub language: Option<String>,

    /// Path to configuration file (overrides discovery)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Maximum number of abstractions to identify
    #[arg(long)]
    pub max_abstractions: Option<usize>,

    /// Retries per provider call after the first attempt
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Seconds to wait between attempts
    #[arg(long = "retry-wait")]
    pub retry_wait: Option<u64>,

    /// Chapters written concurrently
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// LLM provider (anthropic or openrouter)
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// Model to use for LLM provider calls
    #[arg(long)]
    pub model: Option<String>,

    /// Print the files a run would analyse and exit
    #[arg(long, conflicts_with = "no_llm")]
    pub list_files: bool,

    /// Write documentation.json and documentation.md from the file layout
    /// without contacting a provider
    #[arg(long)]
    pub no_llm: bool,
}

impl Cli {
    /// Overrides handed to [`Config::discover`](codetutor_config::Config::discover).
    #[must_use]
    pub fn config_args(&self) -> CliArgs {
        CliArgs {
            config_path: self.config.clone(),
            output_dir: self.output.clone(),
            max_file_size: self.max_size,
            language: self.language.clone(),
            max_abstractions: self.max_abstractions,
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            max_retries: self.max_retries,
            retry_wait_secs: self.retry_wait,
            concurrency: self.concurrency,
            llm_provider: self.llm_provider.clone(),
            model: self.model.clone(),
        }
    }
}

/// Build the clap command for completions and parser tests.
#[must_use]
pub fn build_cli() -> clap::Command {
    <Cli as CommandFactory>::command()
}
