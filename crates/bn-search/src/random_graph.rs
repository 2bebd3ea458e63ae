//! Random starting structures for restarts.

use bn_types::{Graph, GraphError};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::hill_climber::ArcRules;

/// What a single generation produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedGraph {
    /// Random insertions attempted, legal or not.
    pub attempts: usize,
    /// Arcs in the generated graph, including the naive seed.
    pub arcs: usize,
}

/// Generates random acyclic graphs that respect [`ArcRules`].
#[derive(Debug, Clone)]
pub struct RandomGraphGenerator {
    rules: ArcRules,
    target: usize,
    init_as_naive_bayes: bool,
}

impl RandomGraphGenerator {
    pub fn new(rules: ArcRules, target: usize, init_as_naive_bayes: bool) -> Self {
        Self {
            rules,
            target,
            init_as_naive_bayes,
        }
    }

    /// Overwrite `graph` with a random structure.
    ///
    /// The graph is cleared, optionally seeded with the target as the parent
    /// of every other node, then `uniform(0..N²)` random arcs are attempted;
    /// any attempt that is not a legal addition is skipped.
    pub fn generate<R: Rng>(
        &self,
        graph: &mut Graph,
        rng: &mut R,
    ) -> Result<GeneratedGraph, GraphError> {
        let n = graph.num_nodes();
        graph.clear();

        if self.init_as_naive_bayes {
            for node in (0..n).filter(|&node| node != self.target) {
                if graph.num_parents(node) < self.rules.max_parents {
                    graph.add_parent(node, self.target)?;
                }
            }
        }

        let attempts = if n == 0 { 0 } else { rng.gen_range(0..n * n) };
        for _ in 0..attempts {
            let tail = rng.gen_range(0..n);
            let head = rng.gen_range(0..n);
            if self.rules.can_add(graph, tail, head) {
                graph.add_parent(head, tail)?;
            }
        }

        Ok(GeneratedGraph {
            attempts,
            arcs: graph.arc_count(),
        })
    }
}
