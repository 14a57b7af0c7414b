use crate::models::{ConfigurationError, Gene, Individual};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// How the initial population is seeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Distribution {
    /// Every gene is `base[i] + uniform(-spread, spread)`.
    Perturbed { base: Vec<Gene>, spread: f64 },
    /// Every gene is drawn from `uniform(lower, upper)`.
    Uniform { lower: f64, upper: f64 },
    /// Non-negative genes summing to 1, drawn by splitting the remaining mass
    /// gene by gene. The last gene takes whatever is left.
    Simplex,
    /// The first individual is `base` unchanged, the rest are `Uniform`.
    Anchored {
        base: Vec<Gene>,
        lower: f64,
        upper: f64,
    },
}

impl Distribution {
    pub fn perturbed(base: Vec<Gene>, spread: f64) -> Self {
        Distribution::Perturbed { base, spread }
    }

    pub fn uniform(lower: f64, upper: f64) -> Self {
        Distribution::Uniform { lower, upper }
    }

    pub fn simplex() -> Self {
        Distribution::Simplex
    }

    pub fn anchored(base: Vec<Gene>, lower: f64, upper: f64) -> Self {
        Distribution::Anchored { base, lower, upper }
    }

    /// Whether genomes of this distribution must stay on the simplex.
    pub fn is_simplex(&self) -> bool {
        matches!(self, Distribution::Simplex)
    }

    pub(crate) fn validate(&self, dimension: usize) -> Result<(), ConfigurationError> {
        match self {
            Distribution::Perturbed { base, spread } => {
                check_base(base, dimension)?;
                if !(2.0 * spread).is_finite() || *spread < 0.0 {
                    return Err(ConfigurationError::Spread(*spread));
                }
                Ok(())
            }
            Distribution::Uniform { lower, upper } => check_bounds(*lower, *upper),
            Distribution::Simplex => Ok(()),
            Distribution::Anchored { base, lower, upper } => {
                check_base(base, dimension)?;
                check_bounds(*lower, *upper)
            }
        }
    }

    /// Draws `size` individuals of `dimension` genes.
    #[instrument(level = "debug", skip(self, rng), fields(size = size, dimension = dimension))]
    pub fn distribute<R: Rng>(
        &self,
        size: usize,
        dimension: usize,
        rng: &mut R,
    ) -> Result<Vec<Individual>, ConfigurationError> {
        self.validate(dimension)?;

        let individuals = match self {
            Distribution::Perturbed { base, spread } => (0..size)
                .map(|_| perturbed_genome(base, *spread, rng))
                .collect(),
            Distribution::Uniform { lower, upper } => (0..size)
                .map(|_| uniform_genome(dimension, *lower, *upper, rng))
                .collect(),
            Distribution::Simplex => (0..size).map(|_| simplex_genome(dimension, rng)).collect(),
            Distribution::Anchored { base, lower, upper } => (0..size)
                .map(|i| match i {
                    0 => base.clone(),
                    _ => uniform_genome(dimension, *lower, *upper, rng),
                })
                .collect::<Vec<_>>(),
        };

        Ok(individuals.into_iter().map(Individual::new).collect())
    }
}

fn check_base(base: &[Gene], dimension: usize) -> Result<(), ConfigurationError> {
    if base.len() != dimension {
        return Err(ConfigurationError::DimensionMismatch {
            expected: dimension,
            provided: base.len(),
        });
    }
    Ok(())
}

fn check_bounds(lower: f64, upper: f64) -> Result<(), ConfigurationError> {
    // The sampled width must be finite too, not just the bounds
    if !(upper - lower).is_finite() || lower >= upper {
        return Err(ConfigurationError::Bounds { lower, upper });
    }
    Ok(())
}

fn perturbed_genome<R: Rng>(base: &[Gene], spread: f64, rng: &mut R) -> Vec<Gene> {
    base.iter()
        .map(|gene| gene + rng.random_range(-spread..=spread))
        .collect()
}

fn uniform_genome<R: Rng>(dimension: usize, lower: f64, upper: f64, rng: &mut R) -> Vec<Gene> {
    (0..dimension)
        .map(|_| rng.random_range(lower..upper))
        .collect()
}

fn simplex_genome<R: Rng>(dimension: usize, rng: &mut R) -> Vec<Gene> {
    let mut genome = Vec::with_capacity(dimension);
    let mut remaining: f64 = 1.0;

    for _ in 1..dimension {
        let gene = rng.random_range(0.0..=remaining);
        remaining = (remaining - gene).max(0.0);
        genome.push(gene);
    }

    if dimension > 0 {
        genome.push(remaining);
    }

    genome
}
