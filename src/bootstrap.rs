use crate::builder::Set;
use crate::logging::RunLog;
use crate::models::{Evaluator, RunConfig};
use crate::services::evaluation::ProcessEvaluator;
use crate::services::optimization::{ControllerBuilder, GenerationController};
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;

/// Where a run reads its configuration, writes its log, and finds its agent.
pub struct Configuration {
    run_config: PathBuf,
    log_directory: PathBuf,
    program: PathBuf,
    args: Vec<String>,
}

impl Configuration {
    pub fn new(
        run_config: impl Into<PathBuf>,
        log_directory: impl Into<PathBuf>,
        program: impl Into<PathBuf>,
    ) -> Self {
        Self {
            run_config: run_config.into(),
            log_directory: log_directory.into(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Fixed agent arguments placed before the weights.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Loads the run configuration, opens the run log and wires the agent process
/// in as the evaluator.
pub fn bootstrap(
    configuration: Configuration,
) -> anyhow::Result<ControllerBuilder<Set<Arc<dyn Evaluator>>>> {
    let config = RunConfig::from_path(&configuration.run_config).with_context(|| {
        format!(
            "Failed to load run configuration from {}",
            configuration.run_config.display()
        )
    })?;

    let log = RunLog::create(&configuration.log_directory).with_context(|| {
        format!(
            "Failed to open run log in {}",
            configuration.log_directory.display()
        )
    })?;

    let evaluator = ProcessEvaluator::new(configuration.program).with_args(configuration.args);

    Ok(GenerationController::builder(config)
        .evaluator(evaluator)
        .with_run_log(log))
}
