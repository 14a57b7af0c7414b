use crate::models::{Conclusion, Elite, Gene, Generation};
use serde::Serialize;
use uuid::Uuid;

/// Condensed record of one evaluated generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationSummary {
    pub generation: u32,
    pub best_score: Option<u64>,
    pub best_genome: Option<Vec<Gene>>,
    pub average_score: f64,
    pub average_auxiliary: f64,
    pub evaluated: usize,
    pub population_size: usize,
    pub failed_trials: usize,
    pub complete: bool,
}

impl GenerationSummary {
    pub(crate) fn new(generation: &Generation, failed_trials: usize) -> Self {
        Self {
            generation: generation.id(),
            best_score: generation.best().map(|best| best.score()),
            best_genome: generation.best().map(|best| best.genome().to_vec()),
            average_score: generation.average_score(),
            average_auxiliary: generation.average_auxiliary(),
            evaluated: generation.evaluated(),
            population_size: generation.population_size(),
            failed_trials,
            complete: generation.is_complete(),
        }
    }
}

/// What a finished run hands back to its caller.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub conclusion: Conclusion,
    /// One entry per evaluated generation, oldest first.
    pub generations: Vec<GenerationSummary>,
    /// Best individual seen over the whole run.
    pub best: Option<Elite>,
    /// The final generation, ranked best first.
    pub last_generation: Option<Generation>,
}

impl RunOutcome {
    pub fn best_score(&self) -> Option<u64> {
        self.best.as_ref().map(|elite| elite.scored.score())
    }
}
