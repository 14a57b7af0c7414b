mod builder;

pub mod bootstrap;
pub mod events;
pub mod logging;
pub mod models;
pub mod services;

pub use bootstrap::{Configuration, bootstrap};
pub use services::StopSignal;
pub use services::optimization::{GenerationController, RunOutcome};
