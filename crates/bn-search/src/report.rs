//! Run summaries, the search report and progress events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SearchConfig;

/// Unique search identifier.
pub type SearchId = Uuid;

/// Lifecycle state of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    Running,
    /// All configured restarts ran.
    Completed,
    /// Cancellation was observed at a restart boundary.
    Cancelled,
}

/// Outcome of one restart: random start plus climb to convergence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_index: usize,
    /// Random insertions attempted while generating the start graph.
    pub random_attempts: usize,
    /// Arcs in the start graph.
    pub initial_arcs: usize,
    /// Arcs in the converged graph.
    pub final_arcs: usize,
    pub edits_applied: usize,
    pub start_score: f64,
    pub final_score: f64,
    pub duration_ms: u64,
}

/// Aggregate result of a repeated hill-climbing search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    pub id: SearchId,
    pub config: SearchConfig,
    pub state: SearchState,
    /// Score of the graph the caller handed in.
    pub initial_score: f64,
    /// Best score seen; never below `initial_score`.
    pub best_score: f64,
    /// Restart that produced the incumbent, `None` if the input was kept.
    pub best_run: Option<usize>,
    pub runs: Vec<RunSummary>,
    /// Arcs added by the Markov-blanket correction.
    pub markov_blanket_arcs: usize,
    /// Score of the returned graph, after any post-processing.
    pub final_score: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SearchReport {
    pub fn new(config: SearchConfig, initial_score: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            state: SearchState::Running,
            initial_score,
            best_score: initial_score,
            best_run: None,
            runs: Vec::new(),
            markov_blanket_arcs: 0,
            final_score: initial_score,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn runs_completed(&self) -> usize {
        self.runs.len()
    }

    /// Record a finished run. Returns true when it strictly beats the
    /// incumbent; equal scores keep the earlier incumbent.
    pub fn record_run(&mut self, summary: RunSummary) -> bool {
        let improved = summary.final_score > self.best_score;
        if improved {
            self.best_score = summary.final_score;
            self.best_run = Some(summary.run_index);
        }
        self.runs.push(summary);
        improved
    }

    pub fn mark_completed(&mut self) {
        self.state = SearchState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_cancelled(&mut self) {
        self.state = SearchState::Cancelled;
        self.finished_at = Some(Utc::now());
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == SearchState::Cancelled
    }
}

/// Progress events emitted on the optional channel of the controller.
///
/// With parallel restarts, run events arrive in completion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SearchEvent {
    Started {
        id: SearchId,
        run_count: usize,
        initial_score: f64,
    },
    RunStarted {
        run_index: usize,
    },
    RunFinished(RunSummary),
    IncumbentImproved {
        run_index: usize,
        score: f64,
    },
    Cancelled {
        runs_completed: usize,
    },
    Finished {
        id: SearchId,
        best_score: f64,
    },
}
