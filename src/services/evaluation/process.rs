use crate::models::{EvaluationError, Evaluator, Individual, TrialOutcome};
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::Instrument;

/// Runs the game agent as a child process, once per trial.
///
/// The agent is launched as `program [args...] w1 w2 ... wN` with each weight
/// rendered as a decimal number. It must exit successfully and print exactly one
/// line holding two non-negative integers: the primary score, then the
/// auxiliary statistic. A child whose trial is abandoned (timeout, stop) is
/// killed.
#[derive(Debug, Clone)]
pub struct ProcessEvaluator {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessEvaluator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Fixed arguments placed before the weights.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn command(&self, individual: &Individual) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .args(individual.to_arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl Evaluator for ProcessEvaluator {
    fn evaluate<'a>(
        &self,
        individual: Individual,
    ) -> BoxFuture<'a, Result<TrialOutcome, EvaluationError>> {
        let mut command = self.command(&individual);
        let span = tracing::debug_span!(
            "evaluate",
            program = %self.program.display(),
            dimension = individual.dimension()
        );

        Box::pin(
            async move {
                let output = command.output().await.map_err(EvaluationError::Launch)?;

                if !output.status.success() {
                    return Err(EvaluationError::ExitStatus {
                        code: output.status.code(),
                        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    });
                }

                parse_output(&String::from_utf8_lossy(&output.stdout))
            }
            .instrument(span),
        )
    }
}

/// Parses agent output: one line, two whitespace-separated non-negative
/// integers, terminated by a newline.
pub fn parse_output(stdout: &str) -> Result<TrialOutcome, EvaluationError> {
    let malformed = || EvaluationError::MalformedOutput {
        output: stdout.to_string(),
    };

    let line = stdout.strip_suffix('\n').ok_or_else(malformed)?;
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.contains('\n') {
        return Err(malformed());
    }

    let mut tokens = line.split_whitespace();
    let (Some(score), Some(auxiliary), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return Err(malformed());
    };

    let parse = |token: &str| {
        if token.starts_with('+') {
            return Err(malformed());
        }
        token.parse::<u64>().map_err(|_| malformed())
    };

    Ok(TrialOutcome::new(parse(score)?, parse(auxiliary)?))
}
