use super::Generation;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;

/// Controls how long the generational loop runs.
///
/// A run ends after `max_generations` generations, or as soon as a generation's
/// best primary score reaches `target_score`, whichever comes first. With neither
/// set the run is open-ended and only a stop request ends it.
///
/// # Examples
///
/// ```rust
/// use fx_heuristic_ga::models::Schedule;
///
/// // Fixed budget of 20 generations
/// let budget = Schedule::generational(20);
///
/// // Stop early once an agent clears 10 000 rows
/// let targeted = Schedule::generational(50).with_target_score(10_000);
///
/// // Runs until stopped
/// let open_ended = Schedule::unbounded();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Number of generations to evaluate. Generations are numbered from 1.
    #[serde(default)]
    pub max_generations: Option<u32>,
    /// Primary score at which the run ends early.
    #[serde(default)]
    pub target_score: Option<u64>,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conclusion {
    /// The configured number of generations was evaluated.
    GenerationLimit,
    /// A generation reached the target score.
    TargetReached,
    /// A stop request was honored.
    Stopped,
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conclusion::GenerationLimit => write!(f, "generation limit reached"),
            Conclusion::TargetReached => write!(f, "target score reached"),
            Conclusion::Stopped => write!(f, "stopped"),
        }
    }
}

/// Decision about what to do after ranking a generation.
#[derive(Debug, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// Breed the next generation.
    Continue,
    /// End the run after reporting this generation.
    Terminate(Conclusion),
}

impl Schedule {
    pub fn generational(max_generations: u32) -> Self {
        Self {
            max_generations: Some(max_generations),
            target_score: None,
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_target_score(mut self, target_score: u64) -> Self {
        self.target_score = Some(target_score);
        self
    }

    /// Decides whether to breed another generation after `generation` was ranked.
    #[instrument(level = "debug", skip(generation), fields(generation = generation.id(), best = ?generation.best().map(|s| s.score())))]
    pub fn decide(&self, generation: &Generation) -> ScheduleDecision {
        if let (Some(target), Some(best)) = (self.target_score, generation.best()) {
            if best.score() >= target {
                return ScheduleDecision::Terminate(Conclusion::TargetReached);
            }
        }

        match self.max_generations {
            Some(max) if generation.id() >= max => {
                ScheduleDecision::Terminate(Conclusion::GenerationLimit)
            }
            _ => ScheduleDecision::Continue,
        }
    }

    /// Fraction of the run completed after `generation`, in [0, 1].
    ///
    /// Always 0 for an open-ended run.
    pub fn progress(&self, generation: u32) -> f64 {
        match self.max_generations {
            Some(max) if max > 0 => (generation as f64 / max as f64).min(1.0),
            _ => 0.0,
        }
    }
}
