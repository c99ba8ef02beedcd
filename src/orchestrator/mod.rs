//! Application-level orchestration.
//!
//! Owns the analysis workflow (state machine, countdown, command-driven
//! driver) and post-run processing such as exports. UI/CLI layers call into
//! this module to keep responsibilities separated.

mod controller;
mod countdown;
mod post_process;
mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use controller::AnalysisController;
pub use session::{RunOutcome, WorkflowSettings};

#[cfg(feature = "tui")]
pub(crate) use controller::{run_controller, UiCommand};
#[cfg(feature = "tui")]
pub(crate) use post_process::default_export_name;
#[cfg(feature = "tui")]
pub(crate) use post_process::export_report_json;
pub(crate) use post_process::process_run_completion;
