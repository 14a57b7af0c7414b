//! Parent selection strategies.
//!
//! Both strategies read the ranked pool of a completed generation and use the
//! primary score only.
//!
//! ## Roulette Wheel Selection
//!
//! Each parent is drawn with probability proportional to its score. A pool in
//! which every score is zero falls back to uniform sampling, so a generation of
//! crashed or useless agents can still reproduce.
//!
//! ## Tournament Selection
//!
//! Each tournament samples `size` distinct candidates and keeps the best two as a
//! parent pair. Ties are broken by rank, then by sample position.
//!
//! ```rust
//! use fx_heuristic_ga::models::Selector;
//!
//! let roulette = Selector::roulette();
//! let tournament = Selector::tournament(4)?;
//! # Ok::<(), fx_heuristic_ga::models::SelectionError>(())
//! ```

use crate::models::Scored;
use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Performs a single roulette wheel spin to select a candidate index.
fn spin_roulette(
    candidates: &[&Scored],
    total_fitness: f64,
    rng: &mut impl Rng,
) -> Result<usize, SelectionError> {
    if total_fitness <= 0.0 {
        return Ok(rng.random_range(0..candidates.len()));
    }

    let spin = rng.random_range(0.0..total_fitness);
    locate_spin(candidates, spin).ok_or(SelectionError::RouletteSelectionFailed)
}

/// Index of the first candidate whose cumulative score reaches or exceeds `spin`.
fn locate_spin(candidates: &[&Scored], spin: f64) -> Option<usize> {
    let mut cumulative = 0.0;

    for (index, candidate) in candidates.iter().enumerate() {
        cumulative += candidate.score() as f64;
        if cumulative >= spin {
            return Some(index);
        }
    }

    None
}

/// Selects parent pairs using fitness-proportionate roulette wheel selection.
#[instrument(level = "debug", skip(candidates, rng), fields(num_pairs = num_pairs, num_candidates = candidates.len()))]
fn roulette_selection<'a>(
    num_pairs: usize,
    candidates: &[&'a Scored],
    rng: &mut impl Rng,
) -> Result<Vec<(&'a Scored, &'a Scored)>, SelectionError> {
    let total_fitness: f64 = candidates.iter().map(|c| c.score() as f64).sum();
    let mut parent_pairs = Vec::with_capacity(num_pairs);

    for _ in 0..num_pairs {
        let parent1_idx = spin_roulette(candidates, total_fitness, rng)?;
        let parent2_idx = spin_roulette(candidates, total_fitness, rng)?;
        parent_pairs.push((candidates[parent1_idx], candidates[parent2_idx]));
    }

    Ok(parent_pairs)
}

/// Selects parent pairs by running one tournament per pair.
#[instrument(level = "debug", skip(candidates, rng), fields(num_pairs = num_pairs, tournament_size = tournament_size, num_candidates = candidates.len()))]
fn tournament_selection<'a>(
    num_pairs: usize,
    tournament_size: usize,
    candidates: &[&'a Scored],
    rng: &mut impl Rng,
) -> Result<Vec<(&'a Scored, &'a Scored)>, SelectionError> {
    if candidates.len() < tournament_size {
        return Err(SelectionError::InvalidSampleSize {
            min_required: tournament_size,
            provided: candidates.len(),
        });
    }

    let mut parent_pairs = Vec::with_capacity(num_pairs);

    for _ in 0..num_pairs {
        let mut entrants = index::sample(rng, candidates.len(), tournament_size).into_vec();
        // The pool is in rank order, so a lower index wins a tie.
        entrants.sort_by(|&a, &b| {
            candidates[b]
                .score()
                .cmp(&candidates[a].score())
                .then(a.cmp(&b))
        });

        parent_pairs.push((candidates[entrants[0]], candidates[entrants[1]]));
    }

    Ok(parent_pairs)
}

/// Parent selection strategy.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector {
    /// Fitness-proportionate selection with a uniform fallback for an all-zero pool.
    #[default]
    Roulette,
    /// Tournament of `size` distinct candidates, the best two become the pair.
    Tournament { size: usize },
}

#[derive(Debug, thiserror::Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum SelectionError {
    #[error("No valid parents available for selection")]
    NoValidParents,

    #[error("Tournament size must be at least 2, got {0}")]
    InvalidTournamentSize(usize),

    #[error("Tournament needs at least {min_required} candidates, got {provided}")]
    InvalidSampleSize {
        min_required: usize,
        provided: usize,
    },

    #[error("Internal error: roulette wheel failed to select candidate")]
    RouletteSelectionFailed,
}

impl Selector {
    pub fn roulette() -> Self {
        Selector::Roulette
    }

    /// Creates a tournament selector. Each tournament yields two parents, so the
    /// size must be at least 2.
    pub fn tournament(size: usize) -> Result<Self, SelectionError> {
        let selector = Selector::Tournament { size };
        selector.validate()?;
        Ok(selector)
    }

    pub(crate) fn validate(&self) -> Result<(), SelectionError> {
        match self {
            Selector::Tournament { size } if *size < 2 => {
                Err(SelectionError::InvalidTournamentSize(*size))
            }
            _ => Ok(()),
        }
    }

    /// Smallest pool this selector can draw from.
    pub fn min_pool_size(&self) -> usize {
        match self {
            Selector::Roulette => 1,
            Selector::Tournament { size } => *size,
        }
    }

    /// Selects `num_pairs` parent pairs from a pool given in rank order.
    ///
    /// Selection is with replacement: an individual may appear in several pairs
    /// and on both sides of one pair.
    #[instrument(level = "debug", skip(self, candidates, rng), fields(selector = ?self, num_pairs = num_pairs, num_candidates = candidates.len()))]
    pub fn select_pairs<'a, R: Rng>(
        &self,
        num_pairs: usize,
        candidates: &[&'a Scored],
        rng: &mut R,
    ) -> Result<Vec<(&'a Scored, &'a Scored)>, SelectionError> {
        if candidates.is_empty() {
            return Err(SelectionError::NoValidParents);
        }

        match self {
            Selector::Roulette => roulette_selection(num_pairs, candidates, rng),
            Selector::Tournament { size } => {
                self.validate()?;
                tournament_selection(num_pairs, *size, candidates, rng)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fitness, Individual};
    use rand::{SeedableRng, rngs::StdRng};

    const TOLERANCE: f64 = 0.07;

    fn scored(id: f64, score: u64) -> Scored {
        Scored::new(
            Individual::new(vec![id]),
            Fitness {
                score,
                auxiliary: 0,
                trials: 1,
            },
        )
    }

    fn pool(scored: &[Scored]) -> Vec<&Scored> {
        scored.iter().collect()
    }

    #[test]
    fn it_spins_the_roulette_proportionally() {
        let scored = vec![scored(0.0, 1), scored(1.0, 3), scored(2.0, 6)];
        let candidates = pool(&scored);
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = [0; 3];

        for _ in 0..1000 {
            let idx = spin_roulette(&candidates, 10.0, &mut rng).unwrap();
            counts[idx] += 1;
        }

        assert!((counts[0] as f64 / 1000.0 - 0.1).abs() < TOLERANCE);
        assert!((counts[1] as f64 / 1000.0 - 0.3).abs() < TOLERANCE);
        assert!((counts[2] as f64 / 1000.0 - 0.6).abs() < TOLERANCE);
    }

    #[test]
    fn it_never_selects_a_zero_score_beside_a_positive_one() {
        let scored = vec![scored(0.0, 10), scored(1.0, 0)];
        let candidates = pool(&scored);
        let mut rng = StdRng::seed_from_u64(42);

        let pairs = Selector::roulette()
            .select_pairs(1000, &candidates, &mut rng)
            .unwrap();

        assert!(
            pairs
                .iter()
                .all(|(a, b)| a.score() == 10 && b.score() == 10)
        );
    }

    #[test]
    fn it_stops_at_the_first_slice_reaching_the_spin() {
        let scored = vec![scored(0.0, 0), scored(1.0, 4), scored(2.0, 6)];
        let candidates = pool(&scored);

        assert_eq!(locate_spin(&candidates, 0.0), Some(0));
        assert_eq!(locate_spin(&candidates, 0.5), Some(1));
        assert_eq!(locate_spin(&candidates, 4.0), Some(1));
        assert_eq!(locate_spin(&candidates, 4.5), Some(2));
        assert_eq!(locate_spin(&candidates, 10.5), None);
    }

    #[test]
    fn it_samples_uniformly_when_all_scores_are_zero() {
        let scored: Vec<Scored> = (0..4).map(|i| scored(i as f64, 0)).collect();
        let candidates = pool(&scored);
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = [0usize; 4];

        for _ in 0..10_000 {
            let idx = spin_roulette(&candidates, 0.0, &mut rng).unwrap();
            counts[idx] += 1;
        }

        for count in counts {
            assert!((count as f64 / 10_000.0 - 0.25).abs() < TOLERANCE);
        }
    }

    #[test]
    fn it_fails_when_total_fitness_is_incorrect() {
        let scored = vec![scored(0.0, 0)];
        let candidates = pool(&scored);
        let mut rng = StdRng::seed_from_u64(42);

        assert_eq!(
            spin_roulette(&candidates, 1.0, &mut rng),
            Err(SelectionError::RouletteSelectionFailed)
        );
    }

    #[test]
    fn it_picks_the_two_best_of_a_full_tournament() {
        let scored: Vec<Scored> = [9, 7, 5, 3].iter().map(|&s| scored(s as f64, s)).collect();
        let candidates = pool(&scored);
        let mut rng = StdRng::seed_from_u64(1);

        let pairs = Selector::tournament(4)
            .unwrap()
            .select_pairs(5, &candidates, &mut rng)
            .unwrap();

        assert_eq!(pairs.len(), 5);
        for (first, second) in pairs {
            assert_eq!(first.score(), 9);
            assert_eq!(second.score(), 7);
        }
    }

    #[test]
    fn it_breaks_tournament_ties_by_rank() {
        let scored = vec![scored(0.0, 4), scored(1.0, 4)];
        let candidates = pool(&scored);
        let mut rng = StdRng::seed_from_u64(3);

        let pairs = Selector::tournament(2)
            .unwrap()
            .select_pairs(10, &candidates, &mut rng)
            .unwrap();

        for (first, second) in pairs {
            assert_eq!(first.genome(), &[0.0]);
            assert_eq!(second.genome(), &[1.0]);
        }
    }

    #[test]
    fn it_rejects_invalid_tournaments() {
        assert_eq!(
            Selector::tournament(1),
            Err(SelectionError::InvalidTournamentSize(1))
        );

        let scored = vec![scored(0.0, 1), scored(1.0, 2)];
        let candidates = pool(&scored);
        let mut rng = StdRng::seed_from_u64(42);
        let result = Selector::Tournament { size: 3 }.select_pairs(1, &candidates, &mut rng);

        assert_eq!(
            result,
            Err(SelectionError::InvalidSampleSize {
                min_required: 3,
                provided: 2
            })
        );
    }

    #[test]
    fn it_rejects_an_empty_pool() {
        let mut rng = StdRng::seed_from_u64(42);
        assert_eq!(
            Selector::roulette().select_pairs(1, &[], &mut rng),
            Err(SelectionError::NoValidParents)
        );
    }
}
