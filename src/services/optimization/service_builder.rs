use super::GenerationController;
use crate::builder::{Set, Unset};
use crate::logging::RunLog;
use crate::models::{ConfigurationError, EliteArchive, Evaluator, RunConfig};
use crate::services::StopSignal;
use crate::services::evaluation::Scheduler;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::instrument;

/// Assembles a [`GenerationController`]. An evaluator is required before
/// [`ControllerBuilder::build`] becomes available.
pub struct ControllerBuilder<E> {
    config: RunConfig,
    evaluator: E,
    log: Option<Arc<RunLog>>,
    stop: Option<StopSignal>,
}

impl ControllerBuilder<Unset<Arc<dyn Evaluator>>> {
    pub(crate) fn new(config: RunConfig) -> Self {
        Self {
            config,
            evaluator: Unset::new(),
            log: None,
            stop: None,
        }
    }

    pub fn evaluator<V>(self, evaluator: V) -> ControllerBuilder<Set<Arc<dyn Evaluator>>>
    where
        V: Evaluator + 'static,
    {
        self.shared_evaluator(Arc::new(evaluator))
    }

    pub fn shared_evaluator(
        self,
        evaluator: Arc<dyn Evaluator>,
    ) -> ControllerBuilder<Set<Arc<dyn Evaluator>>> {
        ControllerBuilder {
            config: self.config,
            evaluator: Set::new(evaluator),
            log: self.log,
            stop: self.stop,
        }
    }
}

impl<E> ControllerBuilder<E> {
    /// Run log to record into. Defaults to [`RunLog::console_only`].
    pub fn with_run_log(mut self, log: RunLog) -> Self {
        self.log = Some(Arc::new(log));
        self
    }

    /// Stop signal to observe. Defaults to a fresh one, reachable through
    /// [`GenerationController::stop_handle`].
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = Some(stop);
        self
    }
}

impl ControllerBuilder<Set<Arc<dyn Evaluator>>> {
    /// Validates the configuration and wires up the controller.
    #[instrument(level = "debug", skip(self), fields(population_size = self.config.population_size, dimension = self.config.dimension, seeded = self.config.seed.is_some()))]
    pub fn build(self) -> Result<GenerationController, ConfigurationError> {
        self.config.validate()?;

        let log = self
            .log
            .unwrap_or_else(|| Arc::new(RunLog::console_only()));

        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let scheduler = Scheduler::new(self.evaluator.into_inner(), log.clone())
            .with_workers(self.config.workers)
            .with_trials(self.config.trials)
            .with_retries(self.config.retries)
            .with_timeout(self.config.timeout());

        Ok(GenerationController {
            config: self.config,
            scheduler,
            log,
            stop: self.stop.unwrap_or_default(),
            rng,
            archive: EliteArchive::new(),
            summaries: Vec::new(),
            last_generation: None,
        })
    }
}
