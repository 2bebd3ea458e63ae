//! Markov-blanket correction applied to a finished structure.
//!
//! After the search, every variable should lie in the Markov blanket of the
//! target so that it can influence classification. A variable outside the
//! blanket is connected to the target: ancestors of the target become one of
//! its parents, everything else gets the target as a parent. Both choices keep
//! the graph acyclic. The parent limit of the search does not apply here.

use bn_types::{Dataset, Graph, GraphError};
use tracing::warn;

/// The target's parent configurations must stay below this count for an
/// ancestor to be added as another parent of the target.
pub const MAX_TARGET_PARENT_CARDINALITY: u64 = 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkovBlanketCorrection;

impl MarkovBlanketCorrection {
    pub fn new() -> Self {
        Self
    }

    /// Connect every variable outside the target's Markov blanket.
    ///
    /// Returns the number of arcs added.
    pub fn apply(&self, graph: &mut Graph, dataset: &Dataset) -> Result<usize, GraphError> {
        let target = dataset.target();
        let n = graph.num_nodes();
        if n != dataset.num_attributes() {
            return Err(GraphError::NodeCountMismatch {
                expected: dataset.num_attributes(),
                actual: n,
            });
        }

        let mut is_ancestor = vec![false; n];
        for node in graph.ancestors(target) {
            is_ancestor[node] = true;
        }

        let mut added = 0;
        for node in 0..n {
            if Self::in_blanket(graph, target, node) {
                continue;
            }
            if is_ancestor[node] {
                let cardinality = Self::parent_cardinality(graph, dataset, target);
                if cardinality < MAX_TARGET_PARENT_CARDINALITY {
                    graph.add_parent(target, node)?;
                    added += 1;
                } else {
                    warn!(
                        node,
                        cardinality, "target parent table too large, leaving node outside blanket"
                    );
                }
            } else {
                graph.add_parent(node, target)?;
                added += 1;
            }
        }

        Ok(added)
    }

    /// Node is the target, a parent or child of it, or a co-parent of one of
    /// its children.
    pub fn in_blanket(graph: &Graph, target: usize, node: usize) -> bool {
        node == target
            || graph.contains_arc(target, node)
            || graph.contains_arc(node, target)
            || graph
                .parent_sets()
                .iter()
                .any(|set| set.contains(node) && set.contains(target))
    }

    fn parent_cardinality(graph: &Graph, dataset: &Dataset, node: usize) -> u64 {
        graph
            .parents(node)
            .iter()
            .fold(1u64, |acc, parent| {
                acc.saturating_mul(u64::from(dataset.cardinality(parent)))
            })
    }
}
