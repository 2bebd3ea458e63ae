//! # bn-search
//!
//! Repeated hill-climbing structure search for Bayesian network classifiers.
//!
//! Provides the local search engine over single-arc edits, random starting
//! structures, the multi-restart controller with cooperative cancellation,
//! oracle adapters, and the Markov-blanket post-processor. Scores come from an
//! external [`ScoringOracle`].

mod cancel;
mod config;
mod hill_climber;
mod markov;
mod oracle;
mod random_graph;
mod report;
mod restart;

pub use cancel::CancellationToken;
pub use config::SearchConfig;
pub use hill_climber::{AppliedEdit, ArcRules, ClimbOutcome, ClimbStep, Edit, HillClimber};
pub use markov::{MarkovBlanketCorrection, MAX_TARGET_PARENT_CARDINALITY};
pub use oracle::{FnOracle, MemoizedOracle, ScoringOracle};
pub use random_graph::{GeneratedGraph, RandomGraphGenerator};
pub use report::{RunSummary, SearchEvent, SearchId, SearchReport, SearchState};
pub use restart::{run_rng, RepeatedHillClimber};
