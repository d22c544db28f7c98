pub mod config;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod report;
pub mod rules;
pub mod runtime;

pub use error::ScanError;
pub use pipeline::{Outcome, report_failure, run};

pub const TOOL_NAME: &str = "imagescan";
