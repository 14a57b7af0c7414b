//! Events recorded over the course of a run.
//!
//! Every event has a one-line human-readable rendering, which is what the run
//! log file contains.

use crate::models::{Conclusion, Gene};
use serde::Serialize;
use std::fmt;
use tracing::Level;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RunEvent {
    // ============================================================
    // Run lifecycle
    // ============================================================
    RunStarted {
        run_id: Uuid,
        population_size: usize,
        dimension: usize,
        workers: usize,
        trials: usize,
    },
    RunConcluded {
        run_id: Uuid,
        generations: u32,
        conclusion: Conclusion,
        best_score: Option<u64>,
    },

    // ============================================================
    // Generations
    // ============================================================
    GenerationStarted {
        generation: u32,
        population_size: usize,
    },
    /// One line of the per-generation top-K report.
    IndividualReported {
        generation: u32,
        rank: usize,
        index: usize,
        score: u64,
        auxiliary: u64,
        genome: Vec<Gene>,
    },
    GenerationSummarized {
        generation: u32,
        best_score: Option<u64>,
        average_score: f64,
        average_auxiliary: f64,
        evaluated: usize,
        population_size: usize,
        failed_trials: usize,
        complete: bool,
    },
    EliteImproved {
        generation: u32,
        score: u64,
        genome: Vec<Gene>,
    },

    // ============================================================
    // Evaluation
    // ============================================================
    TrialFailed {
        generation: u32,
        index: usize,
        trial: usize,
        attempts: usize,
        error: String,
    },
}

impl RunEvent {
    /// Level the event is mirrored at on the tracing subscriber.
    pub fn level(&self) -> Level {
        match self {
            RunEvent::TrialFailed { .. } => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn fmt_genome(f: &mut fmt::Formatter<'_>, genome: &[Gene]) -> fmt::Result {
    write!(f, "[")?;
    for (i, gene) in genome.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{gene}")?;
    }
    write!(f, "]")
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::RunStarted {
                run_id,
                population_size,
                dimension,
                workers,
                trials,
            } => write!(
                f,
                "run {run_id} started: population={population_size} dimension={dimension} workers={workers} trials={trials}"
            ),
            RunEvent::RunConcluded {
                run_id,
                generations,
                conclusion,
                best_score,
            } => {
                write!(f, "run {run_id} concluded after {generations} generation(s): {conclusion}")?;
                match best_score {
                    Some(score) => write!(f, ", best score {score}"),
                    None => write!(f, ", nothing evaluated"),
                }
            }
            RunEvent::GenerationStarted {
                generation,
                population_size,
            } => write!(
                f,
                "generation {generation}: evaluating {population_size} individuals"
            ),
            RunEvent::IndividualReported {
                generation,
                rank,
                index,
                score,
                auxiliary,
                genome,
            } => {
                write!(
                    f,
                    "generation {generation} #{rank} (individual {index}): score={score} auxiliary={auxiliary} weights="
                )?;
                fmt_genome(f, genome)
            }
            RunEvent::GenerationSummarized {
                generation,
                best_score,
                average_score,
                average_auxiliary,
                evaluated,
                population_size,
                failed_trials,
                complete,
            } => {
                write!(f, "generation {generation} summary: best=")?;
                match best_score {
                    Some(score) => write!(f, "{score}")?,
                    None => write!(f, "-")?,
                }
                write!(
                    f,
                    " average_score={average_score:.2} average_auxiliary={average_auxiliary:.2} evaluated={evaluated}/{population_size} failed_trials={failed_trials}"
                )?;
                if !complete {
                    write!(f, " (partial)")?;
                }
                Ok(())
            }
            RunEvent::EliteImproved {
                generation,
                score,
                genome,
            } => {
                write!(f, "generation {generation}: new best score {score} weights=")?;
                fmt_genome(f, genome)
            }
            RunEvent::TrialFailed {
                generation,
                index,
                trial,
                attempts,
                error,
            } => write!(
                f,
                "generation {generation}: trial {trial} of individual {index} failed after {attempts} attempt(s), scored 0: {error}"
            ),
        }
    }
}
