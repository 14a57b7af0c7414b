mod process;
mod scheduler;

pub use process::{ProcessEvaluator, parse_output};
pub use scheduler::{EvaluationReport, Scheduler};
