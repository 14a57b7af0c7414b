use super::{Generation, Scored};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Best individual ever observed, with the generation it was scored in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Elite {
    pub generation: u32,
    pub scored: Scored,
}

/// Holds the best-ever individual of a run, independent of population churn.
#[derive(Debug, Default, Clone)]
pub struct EliteArchive {
    best: Option<Elite>,
}

impl EliteArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers the best of a generation to the archive.
    ///
    /// Returns true when it replaced the incumbent. Equal scores keep the
    /// incumbent.
    #[instrument(level = "debug", skip(self, generation), fields(generation = generation.id()))]
    pub fn consider(&mut self, generation: &Generation) -> bool {
        let Some(candidate) = generation.best() else {
            return false;
        };

        let improves = match &self.best {
            Some(elite) => candidate.score() > elite.scored.score(),
            None => true,
        };

        if improves {
            self.best = Some(Elite {
                generation: generation.id(),
                scored: candidate.clone(),
            });
        }

        improves
    }

    pub fn best(&self) -> Option<&Elite> {
        self.best.as_ref()
    }

    pub fn into_best(self) -> Option<Elite> {
        self.best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fitness, Individual, Population};
    use std::collections::BTreeMap;

    fn generation(id: u32, scores: &[u64]) -> Generation {
        let population = Population::new(
            scores
                .iter()
                .map(|&s| Individual::new(vec![s as f64]))
                .collect(),
            1,
        )
        .unwrap();
        let evaluations = scores
            .iter()
            .enumerate()
            .map(|(i, &score)| {
                (
                    i,
                    Fitness {
                        score,
                        auxiliary: 0,
                        trials: 1,
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();
        Generation::rank(id, &population, &evaluations, true)
    }

    #[test]
    fn it_keeps_the_best_ever_individual() {
        let mut archive = EliteArchive::new();

        assert!(archive.consider(&generation(1, &[3, 7])));
        assert!(!archive.consider(&generation(2, &[5, 6])));
        assert!(!archive.consider(&generation(3, &[7, 0])));

        let best = archive.best().unwrap();
        assert_eq!(best.generation, 1);
        assert_eq!(best.scored.score(), 7);

        assert!(archive.consider(&generation(4, &[8, 1])));
        assert_eq!(archive.best().unwrap().generation, 4);
    }
}
