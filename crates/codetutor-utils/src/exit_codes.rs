//! Exit code constants for the codetutor CLI.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Tutorial generated (possibly with warnings) |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments, source selection or configuration |
//! | 3 | `CRAWL_FAILURE` | Source could not be fetched or walked |
//! | 70 | `PROVIDER_FAILURE` | Text-generation provider failed after retries |
//! | 74 | `OUTPUT_FAILURE` | Writing the rendered tutorial failed |
//! | 130 | `CANCELLED` | Run interrupted between stages |

/// Exit codes matching the documented exit code table.
///
/// Use the named constants, or [`as_i32()`](Self::as_i32) to get the numeric
/// value for `std::process::exit()`.
///
/// ```rust
/// use codetutor_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::CLI_ARGS, ExitCode::from_i32(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - tutorial written
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid flags, source selection or config file
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Crawl failure - directory missing, clone failed, unreadable tree
    pub const CRAWL_FAILURE: ExitCode = ExitCode(3);

    /// Provider failure - LLM calls exhausted their retries (EX_SOFTWARE)
    pub const PROVIDER_FAILURE: ExitCode = ExitCode(70);

    /// Output failure - final artifacts could not be written (EX_IOERR)
    pub const OUTPUT_FAILURE: ExitCode = ExitCode(74);

    /// Cancelled - interrupted by Ctrl-C (128 + SIGINT)
    pub const CANCELLED: ExitCode = ExitCode(130);

    /// Get the numeric exit code value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an ExitCode from a raw i32 value.
    ///
    /// Prefer using the named constants when possible.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}
