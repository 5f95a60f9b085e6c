//! Foundation utilities shared by every codetutor crate.
//!
//! - [`error`]: the error taxonomy (`TutorError`, `StageError`, `FlowError`, ...)
//!   and the [`UserFriendlyError`](error::UserFriendlyError) reporting trait
//! - [`exit_codes`]: process exit codes for the CLI
//! - [`logging`]: tracing subscriber setup and stage spans
//! - [`atomic_write`]: temp-file + fsync + rename writes for rendered output

pub mod atomic_write;
pub mod error;
pub mod exit_codes;
pub mod logging;
