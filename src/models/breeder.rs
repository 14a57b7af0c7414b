use crate::models::{Crossover, Individual, Mutagen, Scored};
use tracing::instrument;

/// Turns selected parent pairs into offspring.
pub(crate) struct Breeder<'a> {
    crossover: &'a Crossover,
    mutagen: &'a Mutagen,
    simplex: bool,
}

impl<'a> Breeder<'a> {
    pub(crate) fn new(crossover: &'a Crossover, mutagen: &'a Mutagen, simplex: bool) -> Self {
        Self {
            crossover,
            mutagen,
            simplex,
        }
    }

    fn breed_pair(
        &self,
        parent1: &Scored,
        parent2: &Scored,
        progress: f64,
        rng: &mut impl rand::Rng,
    ) -> Vec<Individual> {
        let children = self.crossover.apply(rng, parent1, parent2);

        children
            .iter()
            .map(|child| self.mutagen.mutate(rng, child, progress, self.simplex))
            .collect()
    }

    /// Breeds offspring pair by pair until `count` children exist.
    ///
    /// Surplus children of the last pair are discarded.
    #[instrument(level = "debug", skip(self, parent_pairs, rng), fields(pairs = parent_pairs.len(), count = count, progress = progress))]
    pub(crate) fn breed_batch(
        &self,
        parent_pairs: &[(Scored, Scored)],
        count: usize,
        progress: f64,
        rng: &mut impl rand::Rng,
    ) -> Vec<Individual> {
        let mut offspring = Vec::with_capacity(count + 1);

        for (parent1, parent2) in parent_pairs {
            if offspring.len() >= count {
                break;
            }
            offspring.extend(self.breed_pair(parent1, parent2, progress, rng));
        }

        offspring.truncate(count);
        offspring
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fitness, MutationMode};
    use rand::{SeedableRng, rngs::StdRng};

    fn scored(genome: Vec<f64>, score: u64) -> Scored {
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
    fn it_breeds_exactly_the_requested_count() {
        let mut rng = StdRng::seed_from_u64(42);
        let crossover = Crossover::single_point();
        let mutagen = Mutagen::constant(0.5, 1.0, MutationMode::default()).unwrap();
        let breeder = Breeder::new(&crossover, &mutagen, false);
        let pairs = vec![
            (scored(vec![1.0; 3], 1), scored(vec![2.0; 3], 2)),
            (scored(vec![3.0; 3], 3), scored(vec![4.0; 3], 4)),
        ];

        let offspring = breeder.breed_batch(&pairs, 3, 0.0, &mut rng);

        assert_eq!(offspring.len(), 3);
        assert!(offspring.iter().all(|child| child.dimension() == 3));
    }

    #[test]
    fn it_keeps_simplex_offspring_on_the_simplex() {
        let mut rng = StdRng::seed_from_u64(42);
        let crossover = Crossover::single_point();
        let mutagen = Mutagen::constant(0.0, 1.0, MutationMode::default()).unwrap();
        let breeder = Breeder::new(&crossover, &mutagen, true);
        let pairs = vec![(scored(vec![0.9, 0.1], 1), scored(vec![0.1, 0.9], 1)); 20];

        for child in breeder.breed_batch(&pairs, 40, 0.0, &mut rng) {
            let total: f64 = child.genome().iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }
}
