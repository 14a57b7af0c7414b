use super::{ConfigurationError, Fitness, Individual, Scored};
use std::collections::BTreeMap;
use tracing::instrument;

/// The individuals of the current generation, in a fixed order.
///
/// Positions are stable for the lifetime of a generation, and evaluation results
/// are keyed by them.
#[derive(Debug, Clone, PartialEq)]
pub struct Population {
    individuals: Vec<Individual>,
    dimension: usize,
}

impl Population {
    /// Builds a population, checking the size and dimension invariants.
    #[instrument(level = "debug", skip(individuals), fields(size = individuals.len(), dimension = dimension))]
    pub fn new(individuals: Vec<Individual>, dimension: usize) -> Result<Self, ConfigurationError> {
        ConfigurationError::check_population_size(individuals.len())?;

        if let Some(individual) = individuals.iter().find(|i| i.dimension() != dimension) {
            return Err(ConfigurationError::DimensionMismatch {
                expected: dimension,
                provided: individual.dimension(),
            });
        }

        Ok(Self {
            individuals,
            dimension,
        })
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn get(&self, index: usize) -> Option<&Individual> {
        self.individuals.get(index)
    }
}

/// A scored individual together with its position in the population.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    pub index: usize,
    pub scored: Scored,
}

/// Snapshot of one generation after evaluation, ranked by fitness.
#[derive(Debug, Clone)]
pub struct Generation {
    id: u32,
    ranked: Vec<Ranked>,
    population_size: usize,
    complete: bool,
}

impl Generation {
    /// Ranks the evaluated members of a population, best first.
    ///
    /// Ties keep population order. Members without an evaluation (a stopped,
    /// partial generation) are left out of the ranking.
    #[instrument(level = "debug", skip(population, evaluations), fields(generation = id, evaluated = evaluations.len(), complete = complete))]
    pub fn rank(
        id: u32,
        population: &Population,
        evaluations: &BTreeMap<usize, Fitness>,
        complete: bool,
    ) -> Self {
        let mut ranked: Vec<Ranked> = evaluations
            .iter()
            .filter_map(|(&index, &fitness)| {
                population.get(index).map(|individual| Ranked {
                    index,
                    scored: Scored::new(individual.clone(), fitness),
                })
            })
            .collect();

        // BTreeMap iteration is index order and sort_by is stable
        ranked.sort_by(|a, b| b.scored.score().cmp(&a.scored.score()));

        Self {
            id,
            ranked,
            population_size: population.len(),
            complete,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn ranked(&self) -> &[Ranked] {
        &self.ranked
    }

    /// Scored individuals in rank order.
    pub fn pool(&self) -> Vec<&Scored> {
        self.ranked.iter().map(|r| &r.scored).collect()
    }

    pub fn best(&self) -> Option<&Scored> {
        self.ranked.first().map(|r| &r.scored)
    }

    pub fn top(&self, k: usize) -> &[Ranked] {
        &self.ranked[..k.min(self.ranked.len())]
    }

    /// Whether every member of the population was evaluated.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn evaluated(&self) -> usize {
        self.ranked.len()
    }

    pub fn population_size(&self) -> usize {
        self.population_size
    }

    /// Mean primary score over the evaluated members.
    pub fn average_score(&self) -> f64 {
        if self.ranked.is_empty() {
            return 0.0;
        }
        let total: u128 = self.ranked.iter().map(|r| u128::from(r.scored.score())).sum();
        total as f64 / self.ranked.len() as f64
    }

    /// Mean auxiliary metric over the evaluated members.
    pub fn average_auxiliary(&self) -> f64 {
        if self.ranked.is_empty() {
            return 0.0;
        }
        let total: u128 = self
            .ranked
            .iter()
            .map(|r| u128::from(r.scored.fitness.auxiliary))
            .sum();
        total as f64 / self.ranked.len() as f64
    }
}
