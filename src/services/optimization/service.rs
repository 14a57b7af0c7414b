use super::models::{GenerationSummary, RunOutcome};
use super::{ControllerBuilder, Error};
use crate::builder::Unset;
use crate::events::RunEvent;
use crate::logging::RunLog;
use crate::models::{
    Breeder, Conclusion, EliteArchive, Evaluator, Generation, Individual, Population, RunConfig,
    ScheduleDecision, Scored,
};
use crate::services::StopSignal;
use crate::services::evaluation::{EvaluationReport, Scheduler};
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// A generation that went through evaluation and ranking.
struct Evaluated {
    generation: Generation,
    failed_trials: usize,
}

/// What happens once a generation has been reported.
enum Next {
    Continue(Population),
    Conclude(Conclusion),
}

/// Steps of the generational loop.
///
/// `Seeding -> Evaluating -> Ranking -> Selecting -> Reproducing -> Replacing
/// -> Reporting -> Evaluating ...`, leaving through `Ranking -> Reporting ->
/// Terminal` once the schedule is exhausted or a stop was requested.
enum Phase {
    Seeding,
    Evaluating {
        generation: u32,
        population: Population,
    },
    Ranking {
        generation: u32,
        population: Population,
        report: EvaluationReport,
    },
    Selecting {
        evaluated: Evaluated,
    },
    Reproducing {
        evaluated: Evaluated,
        parents: Vec<(Scored, Scored)>,
    },
    Replacing {
        evaluated: Evaluated,
        offspring: Vec<Individual>,
    },
    Reporting {
        evaluated: Evaluated,
        next: Next,
    },
    Terminal(Conclusion),
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Seeding => "seeding",
            Phase::Evaluating { .. } => "evaluating",
            Phase::Ranking { .. } => "ranking",
            Phase::Selecting { .. } => "selecting",
            Phase::Reproducing { .. } => "reproducing",
            Phase::Replacing { .. } => "replacing",
            Phase::Reporting { .. } => "reporting",
            Phase::Terminal(_) => "terminal",
        }
    }
}

/// Drives a run from the seeded population to its conclusion.
///
/// Generations are strictly sequential: generation `g + 1` is bred only from
/// the complete, ranked generation `g`.
pub struct GenerationController {
    pub(super) config: RunConfig,
    pub(super) scheduler: Scheduler,
    pub(super) log: Arc<RunLog>,
    pub(super) stop: StopSignal,
    pub(super) rng: StdRng,
    pub(super) archive: EliteArchive,
    pub(super) summaries: Vec<GenerationSummary>,
    pub(super) last_generation: Option<Generation>,
}

impl GenerationController {
    pub fn builder(config: RunConfig) -> ControllerBuilder<Unset<Arc<dyn Evaluator>>> {
        ControllerBuilder::new(config)
    }

    pub fn run_id(&self) -> Uuid {
        self.log.run_id()
    }

    /// Handle for requesting a graceful stop while [`GenerationController::run`]
    /// is in progress.
    pub fn stop_handle(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Runs generations until the schedule is exhausted, the target score is
    /// reached, or a stop is requested.
    #[instrument(level = "info", skip(self), fields(run_id = %self.run_id(), population_size = self.config.population_size, dimension = self.config.dimension))]
    pub async fn run(mut self) -> Result<RunOutcome, Error> {
        self.log.record(&RunEvent::RunStarted {
            run_id: self.run_id(),
            population_size: self.config.population_size,
            dimension: self.config.dimension,
            workers: self.config.workers,
            trials: self.config.trials,
        });

        let mut phase = Phase::Seeding;
        let conclusion = loop {
            tracing::debug!(phase = phase.name(), "Entering phase");
            phase = match phase {
                Phase::Terminal(conclusion) => break conclusion,
                phase => self.step(phase).await?,
            };
        };

        let run_id = self.run_id();
        let best = self.archive.into_best();

        self.log.record(&RunEvent::RunConcluded {
            run_id,
            generations: self.summaries.last().map_or(0, |s| s.generation),
            conclusion,
            best_score: best.as_ref().map(|elite| elite.scored.score()),
        });

        Ok(RunOutcome {
            run_id,
            conclusion,
            generations: self.summaries,
            best,
            last_generation: self.last_generation,
        })
    }

    async fn step(&mut self, phase: Phase) -> Result<Phase, Error> {
        let next = match phase {
            Phase::Seeding => self.seed()?,
            Phase::Evaluating {
                generation,
                population,
            } => self.evaluate(generation, population).await,
            Phase::Ranking {
                generation,
                population,
                report,
            } => self.rank(generation, population, report),
            Phase::Selecting { evaluated } => self.select(evaluated)?,
            Phase::Reproducing { evaluated, parents } => self.reproduce(evaluated, parents),
            Phase::Replacing {
                evaluated,
                offspring,
            } => self.replace(evaluated, offspring)?,
            Phase::Reporting { evaluated, next } => self.report(evaluated, next),
            Phase::Terminal(conclusion) => Phase::Terminal(conclusion),
        };

        Ok(next)
    }

    #[instrument(level = "debug", skip(self), fields(distribution = ?self.config.distribution))]
    fn seed(&mut self) -> Result<Phase, Error> {
        let individuals = self.config.distribution.distribute(
            self.config.population_size,
            self.config.dimension,
            &mut self.rng,
        )?;
        let population = Population::new(individuals, self.config.dimension)?;

        Ok(Phase::Evaluating {
            generation: 1,
            population,
        })
    }

    async fn evaluate(&mut self, generation: u32, population: Population) -> Phase {
        self.log.record(&RunEvent::GenerationStarted {
            generation,
            population_size: population.len(),
        });

        let report = self
            .scheduler
            .evaluate_generation(generation, &population, &self.stop)
            .await;

        Phase::Ranking {
            generation,
            population,
            report,
        }
    }

    #[instrument(level = "debug", skip(self, population, report), fields(generation = generation, complete = report.complete))]
    fn rank(&mut self, generation: u32, population: Population, report: EvaluationReport) -> Phase {
        let ranked = Generation::rank(generation, &population, &report.fitness, report.complete);

        if self.archive.consider(&ranked) {
            if let Some(elite) = self.archive.best() {
                self.log.record(&RunEvent::EliteImproved {
                    generation,
                    score: elite.scored.score(),
                    genome: elite.scored.genome().to_vec(),
                });
            }
        }

        let decision = if !report.complete || self.stop.is_stopped() {
            ScheduleDecision::Terminate(Conclusion::Stopped)
        } else {
            self.config.schedule.decide(&ranked)
        };

        let evaluated = Evaluated {
            generation: ranked,
            failed_trials: report.failed_trials,
        };

        match decision {
            ScheduleDecision::Continue => Phase::Selecting { evaluated },
            ScheduleDecision::Terminate(conclusion) => Phase::Reporting {
                evaluated,
                next: Next::Conclude(conclusion),
            },
        }
    }

    fn offspring_needed(&self) -> usize {
        self.config.population_size - self.config.elitism
    }

    #[instrument(level = "debug", skip(self, evaluated), fields(generation = evaluated.generation.id(), selector = ?self.config.selector))]
    fn select(&mut self, evaluated: Evaluated) -> Result<Phase, Error> {
        let num_pairs = self
            .offspring_needed()
            .div_ceil(self.config.crossover.offspring_per_pair());

        let pool = evaluated.generation.pool();
        let parents = self
            .config
            .selector
            .select_pairs(num_pairs, &pool, &mut self.rng)?
            .into_iter()
            .map(|(parent1, parent2)| (parent1.clone(), parent2.clone()))
            .collect();

        Ok(Phase::Reproducing { evaluated, parents })
    }

    #[instrument(level = "debug", skip(self, evaluated, parents), fields(generation = evaluated.generation.id(), pairs = parents.len()))]
    fn reproduce(&mut self, evaluated: Evaluated, parents: Vec<(Scored, Scored)>) -> Phase {
        let progress = self.config.schedule.progress(evaluated.generation.id());
        let count = self.offspring_needed();
        let breeder = Breeder::new(
            &self.config.crossover,
            &self.config.mutagen,
            self.config.distribution.is_simplex(),
        );

        let offspring = breeder.breed_batch(&parents, count, progress, &mut self.rng);

        Phase::Replacing {
            evaluated,
            offspring,
        }
    }

    #[instrument(level = "debug", skip(self, evaluated, offspring), fields(generation = evaluated.generation.id(), elitism = self.config.elitism, offspring = offspring.len()))]
    fn replace(&mut self, evaluated: Evaluated, offspring: Vec<Individual>) -> Result<Phase, Error> {
        let mut individuals: Vec<Individual> = evaluated
            .generation
            .top(self.config.elitism)
            .iter()
            .map(|ranked| ranked.scored.individual.clone())
            .collect();
        individuals.extend(offspring);

        let population = Population::new(individuals, self.config.dimension)?;

        Ok(Phase::Reporting {
            evaluated,
            next: Next::Continue(population),
        })
    }

    fn report(&mut self, evaluated: Evaluated, next: Next) -> Phase {
        let generation = &evaluated.generation;

        for (rank, ranked) in generation.top(self.config.report_top).iter().enumerate() {
            self.log.record(&RunEvent::IndividualReported {
                generation: generation.id(),
                rank: rank + 1,
                index: ranked.index,
                score: ranked.scored.fitness.score,
                auxiliary: ranked.scored.fitness.auxiliary,
                genome: ranked.scored.genome().to_vec(),
            });
        }

        let summary = GenerationSummary::new(generation, evaluated.failed_trials);
        self.log.record(&RunEvent::GenerationSummarized {
            generation: summary.generation,
            best_score: summary.best_score,
            average_score: summary.average_score,
            average_auxiliary: summary.average_auxiliary,
            evaluated: summary.evaluated,
            population_size: summary.population_size,
            failed_trials: summary.failed_trials,
            complete: summary.complete,
        });
        self.summaries.push(summary);

        let following = generation.id() + 1;
        self.last_generation = Some(evaluated.generation);

        match next {
            Next::Conclude(conclusion) => Phase::Terminal(conclusion),
            Next::Continue(_) if self.stop.is_stopped() => Phase::Terminal(Conclusion::Stopped),
            Next::Continue(population) => Phase::Evaluating {
                generation: following,
                population,
            },
        }
    }
}
