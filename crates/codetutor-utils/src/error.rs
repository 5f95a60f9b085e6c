use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Library-level error type with rich context and user-friendly reporting.
///
/// `TutorError` is what the codetutor library hands back to the CLI. It provides:
/// - Detailed error information for programmatic handling
/// - User-friendly messages with context and suggestions
/// - Mapping to CLI exit codes for consistent error reporting
///
/// # Exit Code Mapping
///
/// | Exit Code | Error Type |
/// |-----------|------------|
/// | 2 | Configuration / source selection errors |
/// | 3 | Crawl failures |
/// | 70 | Text-generation provider failures |
/// | 74 | Writing the rendered tutorial failed |
/// | 130 | Run cancelled between stages |
/// | 1 | Other errors |
///
/// Library code returns `TutorError` and does NOT call `std::process::exit()`.
#[derive(Error, Debug)]
pub enum TutorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline error: {0}")]
    Flow(#[from] FlowError),

    #[error("LLM backend error: {0}")]
    Llm(#[from] LlmError),

    #[error("Crawl error: {0}")]
    Crawl(#[from] CrawlError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    StageExecution,
    ProviderIntegration,
    FileSystem,
    ResourceLimits,
    Validation,
    Cancellation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::StageExecution => write!(f, "Stage Execution"),
            Self::ProviderIntegration => write!(f, "Provider Integration"),
            Self::FileSystem => write!(f, "File System"),
            Self::ResourceLimits => write!(f, "Resource Limits"),
            Self::Validation => write!(f, "Validation"),
            Self::Cancellation => write!(f, "Cancellation"),
        }
    }
}

// ============================================================================
// Configuration errors
// ============================================================================

/// Configuration-related errors, including source selection.
///
/// Every variant is fatal and surfaced before any stage executes.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration validation failed: {error_count} errors")]
    ValidationFailed {
        errors: Vec<String>,
        error_count: usize,
    },

    #[error("Invalid source selection: {reason}")]
    InvalidSource { reason: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => {
                format!("Configuration file not found: {path}")
            }
            Self::ValidationFailed { errors, .. } => {
                format!(
                    "Configuration validation failed with {} errors: {}",
                    errors.len(),
                    errors.join(", ")
                )
            }
            Self::InvalidSource { reason } => format!("Invalid source selection: {reason}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) | Self::ValidationFailed { .. } => Some(
                "Configuration is read from .codetutor/config.toml (searched upward from the working directory) or from --config."
                    .to_string(),
            ),
            Self::InvalidSource { .. } => Some(
                "Exactly one source must be given: a remote repository (--repo) or a local directory (--dir)."
                    .to_string(),
            ),
            Self::NotFound { .. } => {
                Some("An explicit --config path must point at an existing file.".to_string())
            }
            Self::InvalidValue { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of the configuration file".to_string(),
                "Compare section names against [defaults], [selectors], [retry], [batch] and [llm]"
                    .to_string(),
            ],
            Self::InvalidValue { key, .. } => vec![
                format!("Correct the value of '{key}' on the command line or in the config file"),
                "Glob patterns use shell syntax, e.g. '**/*.rs' or 'tests/*'".to_string(),
            ],
            Self::NotFound { path } => vec![
                format!("Create the file at {path} or drop the --config flag"),
            ],
            Self::ValidationFailed { .. } => {
                vec!["Fix each listed problem and run again".to_string()]
            }
            Self::InvalidSource { .. } => vec![
                "Pass --repo <url> to document a remote repository".to_string(),
                "Pass --dir <path> to document a local directory".to_string(),
                "Do not pass both at once".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidSource { .. } => ErrorCategory::Validation,
            _ => ErrorCategory::Configuration,
        }
    }
}

// ============================================================================
// Crawl errors
// ============================================================================

/// Failures of the file crawler collaborator.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Source directory not found: {path}")]
    RootNotFound { path: String },

    #[error("Source path is not a directory: {path}")]
    NotADirectory { path: String },

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("git executable not found on PATH")]
    GitUnavailable,

    #[error("git clone of {url} failed: {stderr}")]
    CloneFailed { url: String, stderr: String },
}

impl CrawlError {
    /// Whether retrying the crawl could plausibly succeed.
    ///
    /// Only clone failures caused by the network qualify.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::CloneFailed { stderr, .. } => {
                let lowered = stderr.to_lowercase();
                [
                    "could not resolve host",
                    "connection timed out",
                    "connection reset",
                    "failed to connect",
                    "early eof",
                    "the remote end hung up",
                    "operation timed out",
                ]
                .iter()
                .any(|marker| lowered.contains(marker))
            }
            _ => false,
        }
    }
}

impl UserFriendlyError for CrawlError {
    fn user_message(&self) -> String {
        match self {
            Self::RootNotFound { path } => format!("Directory '{path}' does not exist"),
            Self::NotADirectory { path } => format!("'{path}' is not a directory"),
            Self::InvalidPattern { pattern, reason } => {
                format!("Pattern '{pattern}' is not a valid glob: {reason}")
            }
            Self::Io { path, source } => format!("Could not read '{path}': {source}"),
            Self::GitUnavailable => "git is required to fetch remote repositories".to_string(),
            Self::CloneFailed { url, .. } => format!("Could not clone repository {url}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::CloneFailed { stderr, .. } => Some(format!("git reported: {}", stderr.trim())),
            Self::GitUnavailable => Some(
                "Remote sources are shallow-cloned with the git command-line client.".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::RootNotFound { .. } | Self::NotADirectory { .. } => {
                vec!["Check the path given to --dir".to_string()]
            }
            Self::InvalidPattern { .. } => {
                vec!["Fix the pattern passed to --include/--exclude".to_string()]
            }
            Self::Io { .. } => vec!["Check file permissions in the source tree".to_string()],
            Self::GitUnavailable => vec!["Install git and make sure it is on PATH".to_string()],
            Self::CloneFailed { .. } => vec![
                "Verify the repository URL".to_string(),
                "Private repositories need --token or GITHUB_TOKEN".to_string(),
                "Check network connectivity".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidPattern { .. } => ErrorCategory::Configuration,
            _ => ErrorCategory::FileSystem,
        }
    }
}

// ============================================================================
// LLM errors
// ============================================================================

/// Errors raised by text-generation backends.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport-level failure (HTTP connectivity, unreadable response body)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Provider rejected the request as malformed (other 4xx)
    #[error("Provider rejected request: {0}")]
    InvalidRequest(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Budget limit exceeded
    #[error("Budget exceeded: attempted {attempted} calls, limit is {limit}")]
    BudgetExceeded { limit: u32, attempted: u32 },

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Unsupported feature or provider
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl LlmError {
    /// Transient failures are the only ones the retry policy spends attempts on.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::ProviderQuota(_)
                | Self::ProviderOutage(_)
                | Self::Timeout { .. }
        )
    }
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("LLM transport error: {msg}"),
            Self::ProviderAuth(msg) => format!("LLM provider authentication failed: {msg}"),
            Self::ProviderQuota(msg) => format!("LLM provider quota exceeded: {msg}"),
            Self::ProviderOutage(msg) => format!("LLM provider service outage: {msg}"),
            Self::InvalidRequest(msg) => format!("LLM provider rejected the request: {msg}"),
            Self::Timeout { duration } => {
                format!("LLM invocation timed out after {duration:?}")
            }
            Self::BudgetExceeded { limit, attempted } => {
                format!("LLM budget exceeded: attempted {attempted} calls, limit is {limit}")
            }
            Self::Misconfiguration(msg) => format!("LLM configuration error: {msg}"),
            Self::Unsupported(msg) => format!("LLM feature not supported: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Transport(_) => Some(
                "Transport errors occur when the LLM provider cannot be reached.".to_string(),
            ),
            Self::ProviderAuth(_) => Some(
                "Authentication errors indicate missing or invalid API keys.".to_string(),
            ),
            Self::ProviderQuota(_) => Some(
                "Quota errors occur when rate limits or usage limits are exceeded.".to_string(),
            ),
            Self::ProviderOutage(_) => {
                Some("Provider outages are temporary service disruptions.".to_string())
            }
            Self::InvalidRequest(_) => Some(
                "The provider refused the request body; retrying the same request will not help."
                    .to_string(),
            ),
            Self::Timeout { .. } => Some(
                "Timeouts occur when a single completion takes longer than the configured limit."
                    .to_string(),
            ),
            Self::BudgetExceeded { .. } => {
                Some("The per-run call budget caps spend on the provider.".to_string())
            }
            Self::Misconfiguration(_) => Some(
                "Configuration errors indicate missing or invalid LLM provider settings."
                    .to_string(),
            ),
            Self::Unsupported(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Transport(_) => vec![
                "Verify network connectivity".to_string(),
                "Run with --verbose to see detailed error information".to_string(),
            ],
            Self::ProviderAuth(_) => vec![
                "Check that ANTHROPIC_API_KEY (or OPENROUTER_API_KEY) is set".to_string(),
                "Verify the API key is valid and not expired".to_string(),
            ],
            Self::ProviderQuota(_) | Self::ProviderOutage(_) => vec![
                "Wait a few minutes and try again".to_string(),
                "Raise --max-retries or --retry-wait to ride out short disruptions".to_string(),
            ],
            Self::InvalidRequest(_) => vec![
                "Check the configured model name".to_string(),
                "Lower --max-size if prompts are too large for the model".to_string(),
            ],
            Self::Timeout { .. } => vec![
                "Increase [llm] timeout_secs in the config file".to_string(),
                "Reduce the number of files with --include/--exclude".to_string(),
            ],
            Self::BudgetExceeded { .. } => vec![
                "Increase [llm] budget in the config file".to_string(),
                "Lower --max-abstractions to need fewer chapter calls".to_string(),
            ],
            Self::Misconfiguration(_) => vec![
                "Check the [llm] section of .codetutor/config.toml".to_string(),
            ],
            Self::Unsupported(_) => vec![
                "Use --llm-provider anthropic or --llm-provider openrouter".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::ProviderAuth(_) | Self::Misconfiguration(_) | Self::Unsupported(_) => {
                ErrorCategory::Configuration
            }
            Self::ProviderQuota(_) | Self::BudgetExceeded { .. } => ErrorCategory::ResourceLimits,
            Self::Timeout { .. } => ErrorCategory::StageExecution,
            Self::Transport(_) | Self::ProviderOutage(_) | Self::InvalidRequest(_) => {
                ErrorCategory::ProviderIntegration
            }
        }
    }
}

// ============================================================================
// Stage errors
// ============================================================================

/// Failure of one stage (or one batch item) execution.
///
/// Only [`StageError::is_transient`] failures consume further retry attempts.
#[derive(Error, Debug)]
pub enum StageError {
    /// Malformed input detected while preparing; always fatal
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Provider call failed: {0}")]
    Provider(#[from] LlmError),

    #[error("Crawl failed: {0}")]
    Crawl(#[from] CrawlError),

    /// The provider answered but the answer could not be interpreted
    #[error("Malformed provider response: {reason}")]
    MalformedResponse { reason: String },

    #[error("I/O failure at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl StageError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Provider(err) => err.is_transient(),
            Self::Crawl(err) => err.is_transient(),
            Self::Validation(_) | Self::MalformedResponse { .. } | Self::Io { .. } => false,
        }
    }
}

impl UserFriendlyError for StageError {
    fn user_message(&self) -> String {
        match self {
            Self::Validation(reason) => format!("Invalid pipeline input: {reason}"),
            Self::Provider(err) => err.user_message(),
            Self::Crawl(err) => err.user_message(),
            Self::MalformedResponse { reason } => {
                format!("The provider's answer could not be understood: {reason}")
            }
            Self::Io { path, source } => format!("Could not write '{path}': {source}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Provider(err) => err.context(),
            Self::Crawl(err) => err.context(),
            Self::MalformedResponse { .. } => Some(
                "Structured stages expect a fenced ```yaml block in the provider response."
                    .to_string(),
            ),
            Self::Validation(_) | Self::Io { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Provider(err) => err.suggestions(),
            Self::Crawl(err) => err.suggestions(),
            Self::MalformedResponse { .. } => vec![
                "Try a more capable model with --model".to_string(),
                "Run again; completions are not deterministic".to_string(),
            ],
            Self::Io { .. } => vec![
                "Check that the --output directory is writable".to_string(),
                "Ensure sufficient disk space is available".to_string(),
            ],
            Self::Validation(_) => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Provider(err) => err.category(),
            Self::Crawl(err) => err.category(),
            Self::MalformedResponse { .. } => ErrorCategory::ProviderIntegration,
            Self::Io { .. } => ErrorCategory::FileSystem,
        }
    }
}

// ============================================================================
// Flow errors
// ============================================================================

/// Failures that stop a pipeline run or prevent a flow from being built.
#[derive(Error, Debug)]
pub enum FlowError {
    /// A stage exhausted its retries without a fallback (or failed fatally)
    #[error("Stage '{stage}' failed after {attempts} attempt(s): {source}")]
    StageFailed {
        stage: String,
        attempts: u32,
        #[source]
        source: StageError,
    },

    #[error("Stage '{stage}' returned undeclared outcome '{outcome}'")]
    UndeclaredOutcome { stage: String, outcome: String },

    #[error("Transition from '{stage}' uses outcome '{outcome}' which the stage never returns")]
    UnknownTransitionLabel { stage: String, outcome: String },

    #[error("Unknown stage '{name}'")]
    UnknownStage { name: String },

    #[error("Stage '{name}' registered twice")]
    DuplicateStage { name: String },

    #[error("Flow has no stages")]
    Empty,

    #[error("Flow exceeded {limit} stage invocations")]
    StepLimitExceeded { limit: usize },

    #[error("Run cancelled before stage '{next_stage}'")]
    Cancelled { next_stage: String },
}

impl FlowError {
    /// Name of the stage the failure originated from, if any.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::StageFailed { stage, .. }
            | Self::UndeclaredOutcome { stage, .. }
            | Self::UnknownTransitionLabel { stage, .. } => Some(stage),
            Self::Cancelled { next_stage } => Some(next_stage),
            _ => None,
        }
    }
}

impl UserFriendlyError for FlowError {
    fn user_message(&self) -> String {
        match self {
            Self::StageFailed { stage, source, .. } => {
                format!("Stage '{stage}' failed: {}", source.user_message())
            }
            Self::Cancelled { next_stage } => {
                format!("Run cancelled; stage '{next_stage}' was not started")
            }
            other => other.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::StageFailed {
                attempts, source, ..
            } => {
                let attempts_note = format!("The stage made {attempts} attempt(s).");
                Some(match source.context() {
                    Some(inner) => format!("{attempts_note} {inner}"),
                    None => attempts_note,
                })
            }
            Self::UndeclaredOutcome { .. } | Self::UnknownTransitionLabel { .. } => Some(
                "Outcome labels are checked strictly so that typos in branch labels fail loudly."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::StageFailed { source, .. } => source.suggestions(),
            Self::Cancelled { .. } => vec!["Run the command again to start over".to_string()],
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::StageFailed { source, .. } => source.category(),
            Self::Cancelled { .. } => ErrorCategory::Cancellation,
            Self::StepLimitExceeded { .. } => ErrorCategory::ResourceLimits,
            _ => ErrorCategory::Configuration,
        }
    }
}

// ============================================================================
// TutorError reporting
// ============================================================================

impl UserFriendlyError for TutorError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(err) => err.user_message(),
            Self::Flow(err) => err.user_message(),
            Self::Llm(err) => err.user_message(),
            Self::Crawl(err) => err.user_message(),
            Self::Io(err) => format!("File system operation failed: {err}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(err) => err.context(),
            Self::Flow(err) => err.context(),
            Self::Llm(err) => err.context(),
            Self::Crawl(err) => err.context(),
            Self::Io(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(err) => err.suggestions(),
            Self::Flow(err) => err.suggestions(),
            Self::Llm(err) => err.suggestions(),
            Self::Crawl(err) => err.suggestions(),
            Self::Io(_) => vec!["Check file and directory permissions".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(err) => err.category(),
            Self::Flow(err) => err.category(),
            Self::Llm(err) => err.category(),
            Self::Crawl(err) => err.category(),
            Self::Io(_) => ErrorCategory::FileSystem,
        }
    }
}

impl TutorError {
    /// Get a user-friendly error message with context and actionable suggestions.
    ///
    /// ```text
    /// Error: <user message>
    ///
    /// Context: <context if available>
    ///
    /// Suggestions:
    ///   • <suggestion 1>
    /// ```
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error: {}\n", self.user_message()));

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }

    /// Map this error to the CLI exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> crate::exit_codes::ExitCode {
        use crate::exit_codes::ExitCode;

        match self {
            TutorError::Config(_) => ExitCode::CLI_ARGS,
            TutorError::Crawl(_) => ExitCode::CRAWL_FAILURE,
            TutorError::Llm(llm_err) => match llm_err {
                LlmError::Misconfiguration(_) | LlmError::Unsupported(_) => ExitCode::CLI_ARGS,
                _ => ExitCode::PROVIDER_FAILURE,
            },
            TutorError::Io(_) => ExitCode::OUTPUT_FAILURE,
            TutorError::Flow(flow_err) => match flow_err {
                FlowError::StageFailed { source, .. } => match source {
                    StageError::Validation(_) => ExitCode::CLI_ARGS,
                    StageError::Crawl(_) => ExitCode::CRAWL_FAILURE,
                    StageError::Provider(LlmError::Misconfiguration(_)) => ExitCode::CLI_ARGS,
                    StageError::Provider(_) | StageError::MalformedResponse { .. } => {
                        ExitCode::PROVIDER_FAILURE
                    }
                    StageError::Io { .. } => ExitCode::OUTPUT_FAILURE,
                },
                FlowError::Cancelled { .. } => ExitCode::CANCELLED,
                _ => ExitCode::INTERNAL,
            },
        }
    }
}
