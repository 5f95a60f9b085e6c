//! Pipeline engine for codetutor
//!
//! Drives [`Stage`](codetutor_stage_api::Stage) and
//! [`BatchStage`](codetutor_stage_api::BatchStage) implementations through a
//! [`Flow`] against one shared, mutable context:
//!
//! - [`retry`]: the bounded retry combinator wrapped around every execute call
//! - [`node`]: the closed set of stage shapes and their lifecycle adapters
//! - [`flow`]: builder, transition table and the run loop
//! - [`report`]: per-stage reports and the overall run status
//! - [`observer`]: cancellation flag and progress callbacks

pub mod flow;
pub mod node;
pub mod observer;
pub mod report;
pub mod retry;

pub use flow::{DEFAULT_MAX_STEPS, Flow, FlowBuilder};
pub use node::StageNode;
pub use observer::{CancellationFlag, FlowObserver, NoopObserver};
pub use report::{BatchSummary, FlowReport, RunStatus, StageReport};
pub use retry::{RetryFailure, run_with_retry};
