use crate::events::RunEvent;
use crate::logging::RunLog;
use crate::models::{EvaluationError, Evaluator, Fitness, Individual, Population, TrialOutcome};
use crate::services::StopSignal;
use futures::FutureExt;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::instrument;

/// Fitness of one generation as produced by the worker pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationReport {
    /// Aggregated fitness keyed by population index.
    pub fitness: BTreeMap<usize, Fitness>,
    /// Trials that failed every attempt and were scored zero.
    pub failed_trials: usize,
    /// Whether every trial of every individual ran.
    pub complete: bool,
}

/// Result of one trial as returned by a worker.
struct TrialRecord {
    index: usize,
    trial: usize,
    attempts: usize,
    outcome: Result<TrialOutcome, EvaluationError>,
}

/// Fans the trials of a generation out over a bounded worker pool.
///
/// At most `workers` trials are in flight at any time. Workers only return
/// their results; the coordinator owns the fitness table and is the only one
/// writing to it.
pub struct Scheduler {
    evaluator: Arc<dyn Evaluator>,
    log: Arc<RunLog>,
    workers: usize,
    trials: usize,
    retries: usize,
    timeout: Option<Duration>,
}

impl Scheduler {
    pub fn new(evaluator: Arc<dyn Evaluator>, log: Arc<RunLog>) -> Self {
        Self {
            evaluator,
            log,
            workers: 4,
            trials: 1,
            retries: 1,
            timeout: None,
        }
    }

    /// Maximum concurrent trials. Zero is treated as one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Trials per individual. Zero is treated as one.
    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials.max(1);
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Evaluates every individual of `population`.
    ///
    /// A trial that keeps failing after its retries is recorded as a zero
    /// outcome and logged. It never fails the generation. When `stop` is
    /// raised no further trials are dispatched, trials already running are
    /// awaited, and the report is marked incomplete.
    #[instrument(level = "info", skip(self, population, stop), fields(generation = generation, population_size = population.len(), workers = self.workers, trials = self.trials))]
    pub async fn evaluate_generation(
        &self,
        generation: u32,
        population: &Population,
        stop: &StopSignal,
    ) -> EvaluationReport {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        let mut dispatched: HashMap<task::Id, (usize, usize)> = HashMap::new();
        let mut interrupted = false;

        'dispatch: for (index, individual) in population.individuals().iter().enumerate() {
            for trial in 0..self.trials {
                let permit = tokio::select! {
                    biased;
                    _ = stop.stopped() => {
                        interrupted = true;
                        break 'dispatch;
                    }
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => {
                            interrupted = true;
                            break 'dispatch;
                        }
                    },
                };

                let evaluator = self.evaluator.clone();
                let individual = individual.clone();
                let (retries, timeout) = (self.retries, self.timeout);

                let handle = tasks.spawn(async move {
                    let _permit = permit;
                    let (attempts, outcome) =
                        run_trial(evaluator, individual, retries, timeout).await;
                    TrialRecord {
                        index,
                        trial,
                        attempts,
                        outcome,
                    }
                });
                dispatched.insert(handle.id(), (index, trial));
            }
        }

        if interrupted {
            tracing::info!(
                in_flight = tasks.len(),
                "Stop requested, draining in-flight trials"
            );
        }

        let mut outcomes: BTreeMap<usize, Vec<TrialOutcome>> = BTreeMap::new();
        let mut failed_trials = 0;

        while let Some(joined) = tasks.join_next_with_id().await {
            let record = match joined {
                Ok((_, record)) => record,
                Err(err) => {
                    let (index, trial) = dispatched.get(&err.id()).copied().unwrap_or_default();
                    TrialRecord {
                        index,
                        trial,
                        attempts: 1,
                        outcome: Err(EvaluationError::Panicked),
                    }
                }
            };

            let outcome = match record.outcome {
                Ok(outcome) => outcome,
                Err(err) => {
                    failed_trials += 1;
                    self.log.record(&RunEvent::TrialFailed {
                        generation,
                        index: record.index,
                        trial: record.trial,
                        attempts: record.attempts,
                        error: err.to_string(),
                    });
                    TrialOutcome::failed()
                }
            };

            outcomes.entry(record.index).or_default().push(outcome);
        }

        let fitness = outcomes
            .iter()
            .map(|(&index, outcomes)| (index, Fitness::aggregate(outcomes)))
            .collect();

        EvaluationReport {
            fitness,
            failed_trials,
            complete: !interrupted,
        }
    }
}

/// Runs one trial, retrying failures up to `retries` more times. A panicking
/// evaluation counts as a failed attempt.
async fn run_trial(
    evaluator: Arc<dyn Evaluator>,
    individual: Individual,
    retries: usize,
    timeout: Option<Duration>,
) -> (usize, Result<TrialOutcome, EvaluationError>) {
    let mut attempt = 1;

    loop {
        // Deferred into the future so a panic while starting the trial is caught too
        let evaluation = AssertUnwindSafe(async { evaluator.evaluate(individual.clone()).await })
            .catch_unwind()
            .map(|caught| caught.unwrap_or(Err(EvaluationError::Panicked)));
        let result = match timeout {
            Some(limit) => tokio::time::timeout(limit, evaluation)
                .await
                .unwrap_or(Err(EvaluationError::Timeout(limit))),
            None => evaluation.await,
        };

        match result {
            Ok(outcome) => return (attempt, Ok(outcome)),
            Err(err) if attempt > retries => return (attempt, Err(err)),
            Err(err) => {
                tracing::warn!(attempt = attempt, error = %err, "Trial failed, retrying");
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FnEvaluator;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn population(size: usize) -> Population {
        Population::new(
            (0..size).map(|i| Individual::new(vec![i as f64])).collect(),
            1,
        )
        .unwrap()
    }

    fn scheduler<E: Evaluator + 'static>(evaluator: E) -> Scheduler {
        Scheduler::new(Arc::new(evaluator), Arc::new(RunLog::console_only()))
    }

    /// Sleeps, then scores the first gene, tracking peak concurrency.
    struct SlowEvaluator {
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Evaluator for SlowEvaluator {
        fn evaluate<'a>(
            &self,
            individual: Individual,
        ) -> BoxFuture<'a, Result<TrialOutcome, EvaluationError>> {
            let in_flight = self.in_flight.clone();
            let peak = self.peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(TrialOutcome::new(individual.genome()[0] as u64, 1))
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn it_scores_every_individual_with_bounded_concurrency() {
        let peak = Arc::new(AtomicUsize::new(0));
        let evaluator = SlowEvaluator {
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: peak.clone(),
        };

        let report = scheduler(evaluator)
            .with_workers(3)
            .evaluate_generation(1, &population(10), &StopSignal::new())
            .await;

        assert!(report.complete);
        assert_eq!(report.failed_trials, 0);
        assert_eq!(report.fitness.len(), 10);
        for (index, fitness) in &report.fitness {
            assert_eq!(fitness.score, *index as u64);
        }
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn it_averages_over_trials() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let evaluator = FnEvaluator::new(move |_: &Individual| {
            let call = counter.fetch_add(1, Ordering::SeqCst) as u64;
            Ok(TrialOutcome::new(10 + call % 2, 4))
        });

        let report = scheduler(evaluator)
            .with_workers(1)
            .with_trials(2)
            .evaluate_generation(1, &population(2), &StopSignal::new())
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        for fitness in report.fitness.values() {
            // (10 + 11) / 2 floored
            assert_eq!(fitness.score, 10);
            assert_eq!(fitness.trials, 2);
        }
    }

    #[tokio::test]
    async fn it_scores_a_persistently_failing_trial_zero() {
        let evaluator = FnEvaluator::new(|individual: &Individual| {
            if individual.genome()[0] == 1.0 {
                Err(EvaluationError::Other(anyhow::anyhow!("agent crashed")))
            } else {
                Ok(TrialOutcome::new(5, 5))
            }
        });

        let report = scheduler(evaluator)
            .with_retries(2)
            .evaluate_generation(1, &population(4), &StopSignal::new())
            .await;

        assert!(report.complete);
        assert_eq!(report.failed_trials, 1);
        assert_eq!(report.fitness[&1].score, 0);
        for index in [0, 2, 3] {
            assert_eq!(report.fitness[&index].score, 5);
        }
    }

    #[tokio::test]
    async fn it_retries_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let evaluator = FnEvaluator::new(move |_: &Individual| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(EvaluationError::Other(anyhow::anyhow!("flaky")))
            } else {
                Ok(TrialOutcome::new(8, 1))
            }
        });

        let report = scheduler(evaluator)
            .with_workers(1)
            .with_retries(1)
            .evaluate_generation(1, &population(2), &StopSignal::new())
            .await;

        assert_eq!(report.failed_trials, 0);
        assert!(report.fitness.values().all(|f| f.score == 8));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn it_records_panicking_trials_as_failures() {
        let evaluator = FnEvaluator::new(|individual: &Individual| {
            if individual.genome()[0] == 0.0 {
                panic!("agent panicked");
            }
            Ok(TrialOutcome::new(3, 3))
        });

        let report = scheduler(evaluator)
            .with_retries(0)
            .evaluate_generation(1, &population(2), &StopSignal::new())
            .await;

        assert_eq!(report.failed_trials, 1);
        assert_eq!(report.fitness[&0].score, 0);
        assert_eq!(report.fitness[&1].score, 3);
    }

    #[tokio::test]
    async fn it_retries_panicking_trials() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let evaluator = FnEvaluator::new(move |_: &Individual| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("agent panicked once");
            }
            Ok(TrialOutcome::new(6, 2))
        });

        let report = scheduler(evaluator)
            .with_workers(1)
            .with_retries(1)
            .evaluate_generation(1, &population(2), &StopSignal::new())
            .await;

        assert_eq!(report.failed_trials, 0);
        assert!(report.fitness.values().all(|f| f.score == 6));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn it_times_out_slow_trials() {
        struct Hanging;

        impl Evaluator for Hanging {
            fn evaluate<'a>(
                &self,
                _: Individual,
            ) -> BoxFuture<'a, Result<TrialOutcome, EvaluationError>> {
                futures::future::pending().boxed()
            }
        }

        let report = scheduler(Hanging)
            .with_retries(0)
            .with_timeout(Some(Duration::from_millis(10)))
            .evaluate_generation(1, &population(2), &StopSignal::new())
            .await;

        assert!(report.complete);
        assert_eq!(report.failed_trials, 2);
        assert!(report.fitness.values().all(|f| f.score == 0));
    }

    #[tokio::test]
    async fn it_stops_dispatching_when_stopped() {
        let stop = StopSignal::new();
        let trigger = stop.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let evaluator = FnEvaluator::new(move |_: &Individual| {
            if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                trigger.stop();
            }
            Ok(TrialOutcome::new(1, 1))
        });

        let report = scheduler(evaluator)
            .with_workers(1)
            .evaluate_generation(1, &population(10), &stop)
            .await;

        assert!(!report.complete);
        assert!(report.fitness.len() < 10);
        assert_eq!(report.fitness.len(), calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn it_dispatches_nothing_when_already_stopped() {
        let stop = StopSignal::new();
        stop.stop();
        let evaluator = FnEvaluator::new(|_: &Individual| Ok(TrialOutcome::new(1, 1)));

        let report = scheduler(evaluator)
            .evaluate_generation(1, &population(4), &stop)
            .await;

        assert!(!report.complete);
        assert!(report.fitness.is_empty());
    }
}
