use super::{
    Crossover, Distribution, Mutagen, MutagenError, Schedule, SelectionError, Selector,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

/// A run configuration that cannot be executed.
///
/// All of these are reported before any evaluation starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("population size must be positive and even, got: {0}")]
    PopulationSize(usize),

    #[error("genome dimension must be positive")]
    ZeroDimension,

    #[error("expected genomes of {expected} genes, got {provided}")]
    DimensionMismatch { expected: usize, provided: usize },

    #[error("seeding spread must be finite and non-negative, got: {0}")]
    Spread(f64),

    #[error("seeding bounds must be finite with lower < upper, got [{lower}, {upper}]")]
    Bounds { lower: f64, upper: f64 },

    #[error("Mutagen error: {0}")]
    Mutagen(#[from] MutagenError),

    #[error("Selector error: {0}")]
    Selector(#[from] SelectionError),

    #[error("elitism of {elitism} must be smaller than the population size of {population_size}")]
    Elitism {
        elitism: usize,
        population_size: usize,
    },

    #[error("the worker pool needs at least one worker")]
    ZeroWorkers,

    #[error("each individual needs at least one trial")]
    ZeroTrials,

    #[error("max_generations must be at least 1")]
    ZeroGenerations,

    #[error("evaluation timeout must be a positive number of seconds, got: {0}")]
    Timeout(f64),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ConfigurationError {
    pub(crate) fn check_population_size(size: usize) -> Result<(), ConfigurationError> {
        if size == 0 || size % 2 != 0 {
            return Err(ConfigurationError::PopulationSize(size));
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    4
}

fn default_trials() -> usize {
    1
}

fn default_retries() -> usize {
    1
}

fn default_report_top() -> usize {
    5
}

/// Everything a run needs besides the evaluator itself.
///
/// Loaded from JSON, or assembled in code with [`RunConfig::new`] and the
/// `with_*` methods. Either way, [`RunConfig::validate`] runs before the first
/// generation is seeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Number of individuals per generation (`P`). Positive and even.
    pub population_size: usize,
    /// Number of genes per individual (`N`).
    pub dimension: usize,
    pub distribution: Distribution,
    #[serde(default)]
    pub selector: Selector,
    #[serde(default)]
    pub crossover: Crossover,
    #[serde(default)]
    pub mutagen: Mutagen,
    #[serde(default)]
    pub schedule: Schedule,
    /// Maximum number of trials in flight.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Trials per individual. Fitness is the floored mean over trials.
    #[serde(default = "default_trials")]
    pub trials: usize,
    /// Extra attempts for a failing trial before it is scored zero.
    #[serde(default = "default_retries")]
    pub retries: usize,
    /// Best individuals copied unchanged into the next generation.
    #[serde(default)]
    pub elitism: usize,
    /// Number of top individuals reported per generation.
    #[serde(default = "default_report_top")]
    pub report_top: usize,
    /// Wall-clock limit for one trial attempt.
    #[serde(default)]
    pub timeout_secs: Option<f64>,
    /// Seed for reproducible runs. Evaluators are outside its reach.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl RunConfig {
    /// A configuration with default operators, pool and reporting settings.
    pub fn new(population_size: usize, dimension: usize, distribution: Distribution) -> Self {
        Self {
            population_size,
            dimension,
            distribution,
            selector: Selector::default(),
            crossover: Crossover::default(),
            mutagen: Mutagen::default(),
            schedule: Schedule::default(),
            workers: default_workers(),
            trials: default_trials(),
            retries: default_retries(),
            elitism: 0,
            report_top: default_report_top(),
            timeout_secs: None,
            seed: None,
        }
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_crossover(mut self, crossover: Crossover) -> Self {
        self.crossover = crossover;
        self
    }

    pub fn with_mutagen(mut self, mutagen: Mutagen) -> Self {
        self.mutagen = mutagen;
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_elitism(mut self, elitism: usize) -> Self {
        self.elitism = elitism;
        self
    }

    pub fn with_report_top(mut self, report_top: usize) -> Self {
        self.report_top = report_top;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs_f64());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let config: RunConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Checks every invariant a run depends on.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        ConfigurationError::check_population_size(self.population_size)?;

        if self.dimension == 0 {
            return Err(ConfigurationError::ZeroDimension);
        }

        self.distribution.validate(self.dimension)?;
        self.selector.validate()?;
        self.mutagen.validate()?;

        let min_pool_size = self.selector.min_pool_size();
        if self.population_size < min_pool_size {
            return Err(SelectionError::InvalidSampleSize {
                min_required: min_pool_size,
                provided: self.population_size,
            }
            .into());
        }

        if self.elitism >= self.population_size {
            return Err(ConfigurationError::Elitism {
                elitism: self.elitism,
                population_size: self.population_size,
            });
        }

        if self.workers == 0 {
            return Err(ConfigurationError::ZeroWorkers);
        }

        if self.trials == 0 {
            return Err(ConfigurationError::ZeroTrials);
        }

        if self.schedule.max_generations == Some(0) {
            return Err(ConfigurationError::ZeroGenerations);
        }

        if let Some(secs) = self.timeout_secs {
            if secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
                return Err(ConfigurationError::Timeout(secs));
            }
        }

        Ok(())
    }

    /// Per-attempt evaluation timeout, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}
