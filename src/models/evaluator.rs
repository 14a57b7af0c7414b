use super::{Individual, TrialOutcome};
use futures::future::{self, BoxFuture, FutureExt};
use std::time::Duration;

/// Runs one trial of the game agent with the given weights.
///
/// Implementations must be safe to call concurrently, and repeated calls may
/// return different outcomes. The returned future must not borrow `self`, so
/// implementations clone whatever state they need into it.
pub trait Evaluator: Send + Sync {
    fn evaluate<'a>(
        &self,
        individual: Individual,
    ) -> BoxFuture<'a, Result<TrialOutcome, EvaluationError>>;
}

/// Why a trial produced no outcome.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("failed to launch the evaluator: {0}")]
    Launch(#[source] std::io::Error),

    #[error("evaluator exited unsuccessfully (code {code:?}): {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },

    #[error("evaluator output is not exactly two non-negative integers: {output:?}")]
    MalformedOutput { output: String },

    #[error("evaluation timed out after {0:?}")]
    Timeout(Duration),

    #[error("evaluation task panicked")]
    Panicked,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Adapts a synchronous closure into an [`Evaluator`].
///
/// ```rust
/// use fx_heuristic_ga::models::{FnEvaluator, TrialOutcome};
///
/// let evaluator = FnEvaluator::new(|individual| {
///     let rows = individual.genome().iter().filter(|g| **g > 0.0).count() as u64;
///     Ok(TrialOutcome::new(rows, 1))
/// });
/// ```
pub struct FnEvaluator<F> {
    function: F,
}

impl<F> FnEvaluator<F>
where
    F: Fn(&Individual) -> Result<TrialOutcome, EvaluationError> + Send + Sync,
{
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

impl<F> Evaluator for FnEvaluator<F>
where
    F: Fn(&Individual) -> Result<TrialOutcome, EvaluationError> + Send + Sync,
{
    fn evaluate<'a>(
        &self,
        individual: Individual,
    ) -> BoxFuture<'a, Result<TrialOutcome, EvaluationError>> {
        future::ready((self.function)(&individual)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn it_adapts_a_closure() {
        let evaluator = FnEvaluator::new(|individual: &Individual| {
            Ok(TrialOutcome::new(individual.dimension() as u64, 7))
        });

        let outcome = evaluator
            .evaluate(Individual::new(vec![0.0; 3]))
            .await
            .unwrap();

        assert_eq!(outcome, TrialOutcome::new(3, 7));
    }

    #[tokio::test]
    async fn it_propagates_closure_errors() {
        let evaluator = FnEvaluator::new(|_: &Individual| {
            Err(EvaluationError::Other(anyhow::anyhow!("agent crashed")))
        });

        let result = evaluator.evaluate(Individual::new(vec![0.0])).await;

        assert!(matches!(result, Err(EvaluationError::Other(_))));
    }
}
