use crate::models::{Gene, Individual};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::instrument;

fn decay_linear(value: f64, progress: f64, multiplier: f64) -> f64 {
    value * (1.0 - progress * multiplier).max(0.0)
}

fn decay_exponential(value: f64, progress: f64, multiplier: f64, exponent: i32) -> f64 {
    value * (1.0 - progress * multiplier).max(0.0).powi(exponent)
}

// ============================================================
// Decay
// ============================================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decay {
    Constant,
    Linear { multiplier: f64 },
    Exponential { multiplier: f64, exponent: i32 },
}

impl Decay {
    fn apply(&self, value: f64, progress: f64) -> f64 {
        match self {
            Decay::Constant => value,
            Decay::Linear { multiplier } => decay_linear(value, progress, *multiplier),
            Decay::Exponential {
                multiplier,
                exponent,
            } => decay_exponential(value, progress, *multiplier, *exponent),
        }
    }

    fn is_valid(&self) -> bool {
        match self {
            Decay::Constant => true,
            Decay::Linear { multiplier } | Decay::Exponential { multiplier, .. } => {
                multiplier.is_finite() && *multiplier >= 0.0
            }
        }
    }
}

// ============================================================
// MutationRate
// ============================================================
/// Per-individual probability of mutating one gene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRate {
    value: f64,
    decay: Decay,
}

#[derive(Debug, thiserror::Error)]
#[error("mutation_rate must be between 0.0 and 1.0, got: {0}")]
pub struct MutationRateOutOfRange(f64);

impl MutationRate {
    pub fn new(value: f64, decay: Decay) -> Result<Self, MutationRateOutOfRange> {
        let value = Self::validate(value)?;

        Ok(Self { value, decay })
    }

    pub fn constant(value: f64) -> Result<Self, MutationRateOutOfRange> {
        let value = Self::validate(value)?;

        Ok(Self {
            value,
            decay: Decay::Constant,
        })
    }

    fn validate(value: f64) -> Result<f64, MutationRateOutOfRange> {
        if !(0.0..=1.0).contains(&value) {
            return Err(MutationRateOutOfRange(value));
        }

        Ok(value)
    }

    /// Rate at the given run progress, within [0, 1].
    pub fn get(&self, progress: f64) -> f64 {
        self.decay.apply(self.value, progress).clamp(0.0, 1.0)
    }
}

// ============================================================
// MutationMode
// ============================================================
/// How the selected gene is replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MutationMode {
    /// `base + uniform(-delta, delta)`
    Perturb { base: f64 },
    /// `current * uniform(-delta, delta)`
    Scale,
}

impl Default for MutationMode {
    fn default() -> Self {
        MutationMode::Perturb { base: 0.0 }
    }
}

// ============================================================
// Mutagen
// ============================================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutagen {
    mutation_rate: MutationRate,
    delta: f64,
    #[serde(default)]
    mode: MutationMode,
}

#[derive(Debug, thiserror::Error)]
pub enum MutagenError {
    #[error("Mutation rate error: {0}")]
    MutationRate(#[from] MutationRateOutOfRange),
    #[error("mutation delta must be finite and non-negative, got: {0}")]
    Delta(f64),
    #[error("mutation rate decay multiplier must be finite and non-negative")]
    Decay,
}

impl Default for Mutagen {
    /// Replaces one gene with a fresh draw from [-1, 1] for 5% of individuals.
    fn default() -> Self {
        Self {
            mutation_rate: MutationRate {
                value: 0.05,
                decay: Decay::Constant,
            },
            delta: 1.0,
            mode: MutationMode::default(),
        }
    }
}

impl Mutagen {
    pub fn new(
        mutation_rate: MutationRate,
        delta: f64,
        mode: MutationMode,
    ) -> Result<Self, MutagenError> {
        let mutagen = Self {
            mutation_rate,
            delta,
            mode,
        };
        mutagen.validate()?;

        Ok(mutagen)
    }

    pub fn constant(
        mutation_rate_value: f64,
        delta: f64,
        mode: MutationMode,
    ) -> Result<Self, MutagenError> {
        Self::new(MutationRate::constant(mutation_rate_value)?, delta, mode)
    }

    /// Re-checks invariants, for values that bypassed the constructors.
    pub(crate) fn validate(&self) -> Result<(), MutagenError> {
        MutationRate::validate(self.mutation_rate.value)?;

        if !(2.0 * self.delta).is_finite() || self.delta < 0.0 {
            return Err(MutagenError::Delta(self.delta));
        }

        if !self.mutation_rate.decay.is_valid() {
            return Err(MutagenError::Decay);
        }

        Ok(())
    }

    pub fn mutation_rate(&self) -> &MutationRate {
        &self.mutation_rate
    }

    /// Returns a possibly mutated copy of `individual`.
    ///
    /// With probability equal to the mutation rate at `progress`, one gene chosen
    /// uniformly is replaced. When `normalize` is set the returned genome is
    /// projected back onto the simplex, whether or not a gene was replaced.
    #[instrument(level = "debug", skip(self, rng, individual), fields(dimension = individual.dimension(), progress = progress, normalize = normalize))]
    pub fn mutate<R: Rng>(
        &self,
        rng: &mut R,
        individual: &Individual,
        progress: f64,
        normalize: bool,
    ) -> Individual {
        let mut genome = individual.genome().to_vec();
        let mutation_rate = self.mutation_rate.get(progress);

        if !genome.is_empty() && rng.random_bool(mutation_rate) {
            let index = rng.random_range(0..genome.len());
            let noise = rng.random_range(-self.delta..=self.delta);

            genome[index] = match self.mode {
                MutationMode::Perturb { base } => base + noise,
                MutationMode::Scale => genome[index] * noise,
            };
        }

        if normalize {
            normalize_simplex(&mut genome);
        }

        Individual::new(genome)
    }
}

/// Projects a genome onto the probability simplex: negatives are clamped to
/// zero and the rest rescaled to sum to 1. An all-zero genome becomes uniform.
pub(crate) fn normalize_simplex(genome: &mut [Gene]) {
    if genome.is_empty() {
        return;
    }

    for gene in genome.iter_mut() {
        if !gene.is_finite() || *gene < 0.0 {
            *gene = 0.0;
        }
    }

    let total: f64 = genome.iter().sum();
    if total > 0.0 {
        genome.iter_mut().for_each(|gene| *gene /= total);
    } else {
        let uniform = 1.0 / genome.len() as f64;
        genome.iter_mut().for_each(|gene| *gene = uniform);
    }
}
