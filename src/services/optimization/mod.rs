mod errors;
mod models;
mod service;
mod service_builder;

pub use errors::Error;
pub use models::{GenerationSummary, RunOutcome};
pub use service::GenerationController;
pub use service_builder::ControllerBuilder;
