mod archive;
mod breeder;
mod config;
mod crossover;
mod distribution;
mod evaluator;
mod individual;
mod mutagen;
mod population;
mod schedule;
mod selector;

pub use archive::{Elite, EliteArchive};
pub use config::{ConfigurationError, RunConfig};
pub use crossover::{Crossover, fitness_weights};
pub use distribution::Distribution;
pub use evaluator::{EvaluationError, Evaluator, FnEvaluator};
pub use individual::{Fitness, Gene, Individual, Scored, TrialOutcome};
pub use mutagen::{Decay, Mutagen, MutagenError, MutationMode, MutationRate, MutationRateOutOfRange};
pub use population::{Generation, Population, Ranked};
pub use schedule::{Conclusion, Schedule, ScheduleDecision};
pub use selector::{SelectionError, Selector};

pub(crate) use breeder::Breeder;
