use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A single heuristic weight.
pub type Gene = f64;

/// A candidate weight vector.
///
/// Individuals are values: operators never edit one in place, they return a new
/// individual. The genome length is fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub(crate) genome: Vec<Gene>,
}

impl Individual {
    pub fn new(genome: Vec<Gene>) -> Self {
        Self { genome }
    }

    pub fn genome(&self) -> &[Gene] {
        &self.genome
    }

    pub fn dimension(&self) -> usize {
        self.genome.len()
    }

    /// Renders the genome the way it is passed to an external evaluator.
    pub(crate) fn to_arguments(&self) -> Vec<String> {
        self.genome.iter().map(|gene| gene.to_string()).collect()
    }
}

/// Result of a single external evaluation run (one trial).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialOutcome {
    /// Primary score reported by the agent (rows cleared).
    pub score: u64,
    /// Secondary statistic reported by the agent (turns played).
    pub auxiliary: u64,
}

impl TrialOutcome {
    pub fn new(score: u64, auxiliary: u64) -> Self {
        Self { score, auxiliary }
    }

    /// Outcome recorded for a trial that failed after all retries.
    pub fn failed() -> Self {
        Self::default()
    }
}

/// Generation-scoped fitness of an individual, aggregated over its trials.
///
/// Selection uses `score` only. `auxiliary` is carried for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fitness {
    pub score: u64,
    pub auxiliary: u64,
    /// Number of trials that contributed to this fitness.
    pub trials: usize,
}

impl Fitness {
    /// Integer floor of the mean of each metric. No trials yields zero fitness.
    #[instrument(level = "debug", skip(outcomes), fields(trials = outcomes.len()))]
    pub fn aggregate(outcomes: &[TrialOutcome]) -> Self {
        if outcomes.is_empty() {
            return Self::default();
        }

        // Summed in u128: a mean of u64 values never exceeds u64::MAX
        let trials = outcomes.len() as u128;
        let score: u128 = outcomes.iter().map(|o| u128::from(o.score)).sum();
        let auxiliary: u128 = outcomes.iter().map(|o| u128::from(o.auxiliary)).sum();

        Self {
            score: (score / trials) as u64,
            auxiliary: (auxiliary / trials) as u64,
            trials: outcomes.len(),
        }
    }
}

/// An individual together with the fitness it earned in one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scored {
    pub individual: Individual,
    pub fitness: Fitness,
}

impl Scored {
    pub fn new(individual: Individual, fitness: Fitness) -> Self {
        Self {
            individual,
            fitness,
        }
    }

    pub fn score(&self) -> u64 {
        self.fitness.score
    }

    pub fn genome(&self) -> &[Gene] {
        self.individual.genome()
    }
}
