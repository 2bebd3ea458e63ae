//! Directed dependency graph over a fixed set of variables.
//!
//! A [`Graph`] holds one [`ParentSet`] per variable. Arcs point from a parent
//! to its child. The graph itself does not re-derive reachability on every
//! mutation; callers use [`Graph::has_path`] to check that an arc keeps the
//! graph acyclic before adding it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::GraphError;

/// Ordered parents of a single variable, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParentSet {
    parents: Vec<usize>,
}

impl ParentSet {
    pub fn new() -> Self {
        Self {
            parents: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn contains(&self, parent: usize) -> bool {
        self.parents.contains(&parent)
    }

    /// Parent at `index` in insertion order.
    pub fn get(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied()
    }

    pub fn position(&self, parent: usize) -> Option<usize> {
        self.parents.iter().position(|&p| p == parent)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.parents.iter().copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.parents
    }

    fn push(&mut self, parent: usize) {
        self.parents.push(parent);
    }

    fn pop(&mut self) -> Option<usize> {
        self.parents.pop()
    }

    fn remove_at(&mut self, index: usize) -> usize {
        self.parents.remove(index)
    }

    fn insert_at(&mut self, index: usize, parent: usize) {
        self.parents.insert(index, parent);
    }

    fn clear(&mut self) {
        self.parents.clear();
    }

    /// Overwrite with the contents of `other`, reusing this set's allocation.
    fn copy_from(&mut self, other: &ParentSet) {
        self.parents.clone_from(&other.parents);
    }
}

impl<'a> IntoIterator for &'a ParentSet {
    type Item = &'a usize;
    type IntoIter = std::slice::Iter<'a, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.parents.iter()
    }
}

/// A directed arc `tail -> head` (tail is the parent, head is the child).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DirectedArc {
    pub tail: usize,
    pub head: usize,
}

impl DirectedArc {
    pub fn new(tail: usize, head: usize) -> Self {
        Self { tail, head }
    }

    pub fn reversed(self) -> Self {
        Self {
            tail: self.head,
            head: self.tail,
        }
    }
}

impl fmt::Display for DirectedArc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.tail, self.head)
    }
}

/// Dependency graph: one parent set per variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Graph {
    parent_sets: Vec<ParentSet>,
}

impl Graph {
    /// Create an arc-free graph over `num_nodes` variables.
    pub fn new(num_nodes: usize) -> Self {
        Self {
            parent_sets: vec![ParentSet::new(); num_nodes],
        }
    }

    /// Build a graph from a list of arcs, applying each through [`Graph::add_parent`].
    ///
    /// Cycles are not rejected here; use [`Graph::is_acyclic`] when the arcs
    /// come from an untrusted source.
    pub fn from_arcs(num_nodes: usize, arcs: &[DirectedArc]) -> Result<Self, GraphError> {
        let mut graph = Self::new(num_nodes);
        for arc in arcs {
            graph.add_parent(arc.head, arc.tail)?;
        }
        Ok(graph)
    }

    pub fn num_nodes(&self) -> usize {
        self.parent_sets.len()
    }

    pub fn parents(&self, node: usize) -> &ParentSet {
        &self.parent_sets[node]
    }

    pub fn parent_sets(&self) -> &[ParentSet] {
        &self.parent_sets
    }

    pub fn num_parents(&self, node: usize) -> usize {
        self.parent_sets[node].len()
    }

    pub fn contains_arc(&self, tail: usize, head: usize) -> bool {
        self.parent_sets
            .get(head)
            .map(|set| set.contains(tail))
            .unwrap_or(false)
    }

    pub fn arc_count(&self) -> usize {
        self.parent_sets.iter().map(ParentSet::len).sum()
    }

    /// All arcs, head-major and in parent insertion order.
    pub fn arcs(&self) -> Vec<DirectedArc> {
        self.parent_sets
            .iter()
            .enumerate()
            .flat_map(|(head, set)| set.iter().map(move |tail| DirectedArc::new(tail, head)))
            .collect()
    }

    fn check_node(&self, node: usize) -> Result<(), GraphError> {
        if node >= self.num_nodes() {
            return Err(GraphError::NodeOutOfRange {
                node,
                num_nodes: self.num_nodes(),
            });
        }
        Ok(())
    }

    /// Append `parent` to the parent set of `child`.
    ///
    /// Rejects self-loops, duplicates and unknown nodes. Acyclicity and the
    /// parent-count limit are the caller's responsibility.
    pub fn add_parent(&mut self, child: usize, parent: usize) -> Result<(), GraphError> {
        self.check_node(child)?;
        self.check_node(parent)?;
        if child == parent {
            return Err(GraphError::SelfLoop { node: child });
        }
        if self.parent_sets[child].contains(parent) {
            return Err(GraphError::DuplicateParent { child, parent });
        }
        self.parent_sets[child].push(parent);
        Ok(())
    }

    /// Remove the most recently appended parent of `child`.
    ///
    /// Returns `None` when the set is already empty.
    pub fn delete_last_parent(&mut self, child: usize) -> Option<usize> {
        self.parent_sets.get_mut(child)?.pop()
    }

    /// Remove `parent` from `child`'s set, returning the position it held.
    pub fn remove_parent(&mut self, child: usize, parent: usize) -> Result<usize, GraphError> {
        self.check_node(child)?;
        let index = self.parent_sets[child]
            .position(parent)
            .ok_or(GraphError::MissingArc { child, parent })?;
        self.parent_sets[child].remove_at(index);
        Ok(index)
    }

    /// Insert `parent` at `index` in `child`'s set. Restores the order
    /// undone by [`Graph::remove_parent`].
    pub fn insert_parent(
        &mut self,
        child: usize,
        index: usize,
        parent: usize,
    ) -> Result<(), GraphError> {
        self.check_node(child)?;
        self.check_node(parent)?;
        if child == parent {
            return Err(GraphError::SelfLoop { node: child });
        }
        let set = &mut self.parent_sets[child];
        if set.contains(parent) {
            return Err(GraphError::DuplicateParent { child, parent });
        }
        if index > set.len() {
            return Err(GraphError::PositionOutOfRange {
                child,
                index,
                len: set.len(),
            });
        }
        set.insert_at(index, parent);
        Ok(())
    }

    /// Remove every arc.
    pub fn clear(&mut self) {
        for set in &mut self.parent_sets {
            set.clear();
        }
    }

    /// Overwrite this graph's parent sets with copies of `source`'s.
    ///
    /// The destination keeps its own slots; nothing is shared with `source`.
    pub fn copy_from(&mut self, source: &Graph) -> Result<(), GraphError> {
        if self.num_nodes() != source.num_nodes() {
            return Err(GraphError::NodeCountMismatch {
                expected: self.num_nodes(),
                actual: source.num_nodes(),
            });
        }
        for (dest, src) in self.parent_sets.iter_mut().zip(&source.parent_sets) {
            dest.copy_from(src);
        }
        Ok(())
    }

    /// True if a directed path `from ⇝ to` exists (a node reaches itself).
    pub fn has_path(&self, from: usize, to: usize) -> bool {
        self.reaches(from, to, None)
    }

    /// Same as [`Graph::has_path`] but ignoring the single arc `skip`.
    pub fn has_path_without(&self, from: usize, to: usize, skip: DirectedArc) -> bool {
        self.reaches(from, to, Some(skip))
    }

    // Walks parents upward from `to`, looking for `from`.
    fn reaches(&self, from: usize, to: usize, skip: Option<DirectedArc>) -> bool {
        if from >= self.num_nodes() || to >= self.num_nodes() {
            return false;
        }
        if from == to {
            return true;
        }
        let mut visited = vec![false; self.num_nodes()];
        let mut stack = vec![to];
        visited[to] = true;

        while let Some(node) = stack.pop() {
            for parent in self.parent_sets[node].iter() {
                if skip == Some(DirectedArc::new(parent, node)) {
                    continue;
                }
                if parent == from {
                    return true;
                }
                if !visited[parent] {
                    visited[parent] = true;
                    stack.push(parent);
                }
            }
        }
        false
    }

    /// Kahn-style check that the parent relation has no directed cycle.
    pub fn is_acyclic(&self) -> bool {
        let n = self.num_nodes();
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut in_degree: Vec<usize> = vec![0; n];
        for (head, set) in self.parent_sets.iter().enumerate() {
            for tail in set.iter() {
                if tail >= n {
                    return false;
                }
                children[tail].push(head);
                in_degree[head] += 1;
            }
        }

        let mut ready: Vec<usize> = (0..n).filter(|&v| in_degree[v] == 0).collect();
        let mut visited = 0;
        while let Some(node) = ready.pop() {
            visited += 1;
            for &child in &children[node] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    ready.push(child);
                }
            }
        }
        visited == n
    }

    /// Ancestors of `node` (excluding `node` itself).
    pub fn ancestors(&self, node: usize) -> Vec<usize> {
        let mut seen = vec![false; self.num_nodes()];
        let mut stack = vec![node];
        let mut result = Vec::new();
        while let Some(current) = stack.pop() {
            for parent in self.parent_sets[current].iter() {
                if !seen[parent] {
                    seen[parent] = true;
                    result.push(parent);
                    stack.push(parent);
                }
            }
        }
        result
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (node, set) in self.parent_sets.iter().enumerate() {
            write!(f, "{node}:")?;
            for parent in set.iter() {
                write!(f, " {parent}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
