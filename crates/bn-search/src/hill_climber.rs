//! Best-improvement hill climbing over single-arc edits.
//!
//! Every step enumerates the legal edits of the current graph in a fixed order
//! (additions, then deletions, then reversals), scores each candidate by
//! applying it, asking the oracle and undoing it, and commits the best one if
//! it strictly improves on the current score. Ties go to the edit enumerated
//! first. When no edit improves, the climb has converged to a local optimum.

use bn_types::{BnResult, Dataset, DirectedArc, Graph, GraphError, ScoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::oracle::ScoringOracle;

/// A single local edit of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edit {
    /// Add the arc `tail -> head`.
    Add(DirectedArc),
    /// Delete the existing arc `tail -> head`.
    Delete(DirectedArc),
    /// Replace the existing arc `tail -> head` by `head -> tail`.
    Reverse(DirectedArc),
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add(arc) => write!(f, "add {arc}"),
            Self::Delete(arc) => write!(f, "delete {arc}"),
            Self::Reverse(arc) => write!(f, "reverse {arc}"),
        }
    }
}

/// An edit that has been applied and can be undone exactly, including the
/// position the removed parent held in its set.
#[derive(Debug, Clone, Copy)]
pub struct AppliedEdit {
    edit: Edit,
    position: usize,
}

impl Edit {
    pub fn apply(self, graph: &mut Graph) -> Result<AppliedEdit, GraphError> {
        let position = match self {
            Self::Add(arc) => {
                graph.add_parent(arc.head, arc.tail)?;
                graph.num_parents(arc.head) - 1
            }
            Self::Delete(arc) => graph.remove_parent(arc.head, arc.tail)?,
            Self::Reverse(arc) => {
                let position = graph.remove_parent(arc.head, arc.tail)?;
                if let Err(err) = graph.add_parent(arc.tail, arc.head) {
                    graph.insert_parent(arc.head, position, arc.tail)?;
                    return Err(err);
                }
                position
            }
        };
        Ok(AppliedEdit {
            edit: self,
            position,
        })
    }
}

impl AppliedEdit {
    pub fn edit(&self) -> Edit {
        self.edit
    }

    /// Restore the graph to its state before the edit.
    pub fn revert(self, graph: &mut Graph) -> Result<(), GraphError> {
        match self.edit {
            Edit::Add(arc) => {
                graph.delete_last_parent(arc.head);
            }
            Edit::Delete(arc) => graph.insert_parent(arc.head, self.position, arc.tail)?,
            Edit::Reverse(arc) => {
                graph.delete_last_parent(arc.tail);
                graph.insert_parent(arc.head, self.position, arc.tail)?;
            }
        }
        Ok(())
    }
}

/// Legality rules for local edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcRules {
    pub max_parents: usize,
    pub allow_reversal: bool,
}

impl ArcRules {
    pub fn new(max_parents: usize, allow_reversal: bool) -> Self {
        Self {
            max_parents,
            allow_reversal,
        }
    }

    /// `tail -> head` may be added: distinct known nodes, arc absent, head
    /// below the parent limit, and no path `head ⇝ tail`.
    pub fn can_add(&self, graph: &Graph, tail: usize, head: usize) -> bool {
        let n = graph.num_nodes();
        tail != head
            && tail < n
            && head < n
            && graph.num_parents(head) < self.max_parents
            && !graph.contains_arc(tail, head)
            && !graph.has_path(head, tail)
    }

    pub fn can_delete(&self, graph: &Graph, tail: usize, head: usize) -> bool {
        graph.contains_arc(tail, head)
    }

    /// `tail -> head` may be turned around: reversal enabled, arc present,
    /// tail below the parent limit, and no other path `tail ⇝ head`.
    pub fn can_reverse(&self, graph: &Graph, tail: usize, head: usize) -> bool {
        self.allow_reversal
            && graph.contains_arc(tail, head)
            && graph.num_parents(tail) < self.max_parents
            && !graph.has_path_without(tail, head, DirectedArc::new(tail, head))
    }

    /// All legal edits in enumeration order.
    pub fn legal_edits(&self, graph: &Graph) -> Vec<Edit> {
        let n = graph.num_nodes();
        let mut edits = Vec::new();

        for head in 0..n {
            for tail in 0..n {
                if self.can_add(graph, tail, head) {
                    edits.push(Edit::Add(DirectedArc::new(tail, head)));
                }
            }
        }

        let arcs = graph.arcs();
        edits.extend(arcs.iter().map(|&arc| Edit::Delete(arc)));

        if self.allow_reversal {
            edits.extend(
                arcs.iter()
                    .filter(|arc| self.can_reverse(graph, arc.tail, arc.head))
                    .map(|&arc| Edit::Reverse(arc)),
            );
        }

        edits
    }
}

/// Result of one exploration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClimbStep {
    /// `edit` was applied and the graph now scores `score`.
    Improved { edit: Edit, score: f64 },
    /// No legal edit improves on the current score.
    Converged,
}

/// Summary of a climb from a start graph to a local optimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimbOutcome {
    pub initial_score: f64,
    pub final_score: f64,
    /// Edits in the order they were applied.
    pub edits: Vec<Edit>,
    /// Score after each applied edit; strictly increasing.
    pub trajectory: Vec<f64>,
}

impl ClimbOutcome {
    pub fn edits_applied(&self) -> usize {
        self.edits.len()
    }
}

/// Local search engine driving a graph to a local optimum.
pub struct HillClimber<'a, O: ?Sized> {
    oracle: &'a O,
    dataset: &'a Dataset,
    rules: ArcRules,
}

impl<'a, O: ScoringOracle + ?Sized> HillClimber<'a, O> {
    pub fn new(oracle: &'a O, dataset: &'a Dataset, rules: ArcRules) -> Self {
        Self {
            oracle,
            dataset,
            rules,
        }
    }

    pub fn rules(&self) -> &ArcRules {
        &self.rules
    }

    /// Ask the oracle for the score of `graph`. NaN is reported as a failure.
    pub fn score(&self, graph: &Graph) -> Result<f64, ScoreError> {
        let score = self.oracle.score(graph, self.dataset)?;
        if score.is_nan() {
            return Err(ScoreError::NotANumber);
        }
        Ok(score)
    }

    /// Run one exploration step from `graph` whose score is `current`.
    ///
    /// On error the graph is left exactly as it was.
    pub fn step(&self, graph: &mut Graph, current: f64) -> BnResult<ClimbStep> {
        let mut best: Option<(Edit, f64)> = None;

        for edit in self.rules.legal_edits(graph) {
            let applied = edit.apply(graph)?;
            let candidate = self.score(graph);
            applied.revert(graph)?;
            let candidate = candidate?;

            let better = match best {
                None => true,
                Some((_, best_score)) => candidate > best_score,
            };
            if better {
                best = Some((edit, candidate));
            }
        }

        match best {
            Some((edit, score)) if score > current => {
                edit.apply(graph)?;
                Ok(ClimbStep::Improved { edit, score })
            }
            _ => Ok(ClimbStep::Converged),
        }
    }

    /// Climb from `graph` until no single edit improves the score.
    pub fn climb(&self, graph: &mut Graph) -> BnResult<ClimbOutcome> {
        let initial_score = self.score(graph)?;
        let mut current = initial_score;
        let mut edits = Vec::new();
        let mut trajectory = Vec::new();

        while let ClimbStep::Improved { edit, score } = self.step(graph, current)? {
            debug!(%edit, score, "applied edit");
            edits.push(edit);
            trajectory.push(score);
            current = score;
        }

        Ok(ClimbOutcome {
            initial_score,
            final_score: current,
            edits,
            trajectory,
        })
    }
}
