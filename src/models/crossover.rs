use crate::models::{Gene, Individual, Scored};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Performs single-point crossover at the specified cut point.
///
/// The first child takes `lhs[..point]` and `rhs[point..]`, the second child the
/// complement. A cut at either end yields copies of the parents.
#[instrument(level = "debug", skip(lhs, rhs), fields(genome_length = lhs.len(), cut_point = point))]
fn crossover_single_point(lhs: &[Gene], rhs: &[Gene], point: usize) -> (Vec<Gene>, Vec<Gene>) {
    let mut first = Vec::with_capacity(lhs.len());
    first.extend_from_slice(&lhs[..point]);
    first.extend_from_slice(&rhs[point..]);

    let mut second = Vec::with_capacity(rhs.len());
    second.extend_from_slice(&rhs[..point]);
    second.extend_from_slice(&lhs[point..]);

    (first, second)
}

/// Blends both parents gene by gene: `w1 * lhs[i] + w2 * rhs[i]`.
#[instrument(level = "debug", skip(lhs, rhs), fields(genome_length = lhs.len(), lhs_weight = weights.0, rhs_weight = weights.1))]
fn crossover_weighted_average(lhs: &[Gene], rhs: &[Gene], weights: (f64, f64)) -> Vec<Gene> {
    let (w1, w2) = weights;
    lhs.iter()
        .zip(rhs.iter())
        .map(|(&a, &b)| w1 * a + w2 * b)
        .collect()
}

/// Normalized blend weights from the parents' primary scores.
///
/// Two zero scores blend evenly.
pub fn fitness_weights(lhs_score: u64, rhs_score: u64) -> (f64, f64) {
    let total = lhs_score as f64 + rhs_score as f64;
    if total <= 0.0 {
        return (0.5, 0.5);
    }
    (lhs_score as f64 / total, rhs_score as f64 / total)
}

/// Strategy for combining two parents into offspring.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crossover {
    /// Cut both genomes at a uniform point in `[0, N]` and swap the tails.
    /// Produces two children per pair.
    #[default]
    SinglePoint,
    /// One child whose genes are the fitness-weighted average of its parents.
    WeightedAverage,
}

impl Crossover {
    pub fn single_point() -> Self {
        Crossover::SinglePoint
    }

    pub fn weighted_average() -> Self {
        Crossover::WeightedAverage
    }

    /// Number of children produced from one parent pair.
    pub fn offspring_per_pair(&self) -> usize {
        match self {
            Crossover::SinglePoint => 2,
            Crossover::WeightedAverage => 1,
        }
    }

    /// Combines two parents. Parents are never modified.
    #[instrument(level = "debug", skip(self, rng, lhs, rhs), fields(crossover = ?self, lhs_score = lhs.score(), rhs_score = rhs.score()))]
    pub fn apply<R: Rng>(&self, rng: &mut R, lhs: &Scored, rhs: &Scored) -> Vec<Individual> {
        let (lhs_genome, rhs_genome) = (lhs.genome(), rhs.genome());
        debug_assert_eq!(lhs_genome.len(), rhs_genome.len());

        match self {
            Crossover::SinglePoint => {
                let point = rng.random_range(0..=lhs_genome.len());
                let (first, second) = crossover_single_point(lhs_genome, rhs_genome, point);
                vec![Individual::new(first), Individual::new(second)]
            }
            Crossover::WeightedAverage => {
                let weights = fitness_weights(lhs.score(), rhs.score());
                vec![Individual::new(crossover_weighted_average(
                    lhs_genome, rhs_genome, weights,
                ))]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Fitness;
    use rand::{SeedableRng, rngs::StdRng};

    fn scored(genome: Vec<Gene>, score: u64) -> Scored {
        Scored::new(
            Individual::new(genome),
            Fitness {
                score,
                auxiliary: 0,
                trials: 1,
            },
        )
    }

    #[test]
    fn test_single_point_swaps_tails() {
        let (first, second) =
            crossover_single_point(&[1.0, 2.0, 3.0, 4.0], &[5.0, 6.0, 7.0, 8.0], 2);

        assert_eq!(first, vec![1.0, 2.0, 7.0, 8.0]);
        assert_eq!(second, vec![5.0, 6.0, 3.0, 4.0]);
    }

    #[test]
    fn test_single_point_at_the_ends_copies_the_parents() {
        let lhs = [1.0, 2.0, 3.0];
        let rhs = [4.0, 5.0, 6.0];

        let (first, second) = crossover_single_point(&lhs, &rhs, 0);
        assert_eq!(first, rhs.to_vec());
        assert_eq!(second, lhs.to_vec());

        let (first, second) = crossover_single_point(&lhs, &rhs, 3);
        assert_eq!(first, lhs.to_vec());
        assert_eq!(second, rhs.to_vec());
    }

    #[test]
    fn test_single_point_children_take_every_gene_from_a_parent() {
        let mut rng = StdRng::seed_from_u64(42);
        let lhs = scored(vec![1.0, 2.0, 3.0, 4.0, 5.0], 3);
        let rhs = scored(vec![-1.0, -2.0, -3.0, -4.0, -5.0], 8);

        for _ in 0..100 {
            let children = Crossover::single_point().apply(&mut rng, &lhs, &rhs);
            assert_eq!(children.len(), 2);

            for (i, (first, second)) in children[0]
                .genome()
                .iter()
                .zip(children[1].genome())
                .enumerate()
            {
                // Complementary children hold both parents' genes at every position
                assert_eq!(first.abs(), (i + 1) as f64);
                assert_eq!(first, &-second);
            }
        }
    }

    #[test]
    fn test_single_point_reaches_both_ends() {
        let mut rng = StdRng::seed_from_u64(42);
        let lhs = scored(vec![1.0, 1.0], 1);
        let rhs = scored(vec![0.0, 0.0], 1);
        let mut seen_clone_of_lhs = false;
        let mut seen_clone_of_rhs = false;

        for _ in 0..200 {
            let children = Crossover::single_point().apply(&mut rng, &lhs, &rhs);
            seen_clone_of_lhs |= children[0].genome() == lhs.genome();
            seen_clone_of_rhs |= children[0].genome() == rhs.genome();
        }

        assert!(seen_clone_of_lhs && seen_clone_of_rhs);
    }

    #[test]
    fn test_weighted_average_follows_fitness() {
        let mut rng = StdRng::seed_from_u64(42);
        let lhs = scored(vec![0.0, 4.0], 3);
        let rhs = scored(vec![4.0, 0.0], 1);

        let children = Crossover::weighted_average().apply(&mut rng, &lhs, &rhs);

        assert_eq!(children, vec![Individual::new(vec![1.0, 3.0])]);
    }

    #[test]
    fn test_weighted_average_with_a_zero_parent_copies_the_other() {
        let mut rng = StdRng::seed_from_u64(42);
        let lhs = scored(vec![0.3, -0.7, 0.1], 10);
        let rhs = scored(vec![0.9, 0.9, 0.9], 0);

        let children = Crossover::weighted_average().apply(&mut rng, &lhs, &rhs);

        assert_eq!(children[0].genome(), lhs.genome());
    }

    #[test]
    fn test_fitness_weights_fall_back_to_even() {
        assert_eq!(fitness_weights(0, 0), (0.5, 0.5));
        assert_eq!(fitness_weights(1, 3), (0.25, 0.75));
    }

    #[test]
    fn test_crossover_leaves_parents_untouched() {
        let mut rng = StdRng::seed_from_u64(5);
        let lhs = scored(vec![1.0, 2.0], 1);
        let rhs = scored(vec![3.0, 4.0], 2);
        let snapshot = (lhs.clone(), rhs.clone());

        let _ = Crossover::single_point().apply(&mut rng, &lhs, &rhs);
        let _ = Crossover::weighted_average().apply(&mut rng, &lhs, &rhs);

        assert_eq!((lhs, rhs), snapshot);
    }
}
