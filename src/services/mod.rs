pub mod evaluation;
pub mod optimization;

mod stop;

pub use stop::StopSignal;
