//! Scoring oracle interface and adapters.
//!
//! The search never computes a statistical score itself. It asks a
//! [`ScoringOracle`] for the fit of a candidate graph on a dataset and only
//! compares the returned numbers: larger is better, no scale is assumed.

use bn_types::{Dataset, Graph, ScoreError};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Fit-quality function consumed by the search.
///
/// Implementations must not mutate observable state that changes later
/// scores: the same graph on the same dataset always yields the same value.
pub trait ScoringOracle: Send + Sync {
    /// Score `graph` against `dataset`. Higher is better.
    fn score(&self, graph: &Graph, dataset: &Dataset) -> Result<f64, ScoreError>;

    /// Human-readable oracle name.
    fn name(&self) -> &str {
        "oracle"
    }
}

impl<T: ScoringOracle + ?Sized> ScoringOracle for &T {
    fn score(&self, graph: &Graph, dataset: &Dataset) -> Result<f64, ScoreError> {
        (**self).score(graph, dataset)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: ScoringOracle + ?Sized> ScoringOracle for Box<T> {
    fn score(&self, graph: &Graph, dataset: &Dataset) -> Result<f64, ScoreError> {
        (**self).score(graph, dataset)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// ---- closure adapter ----

/// Wraps a closure as an oracle.
pub struct FnOracle<F> {
    name: String,
    score_fn: F,
}

impl<F> FnOracle<F>
where
    F: Fn(&Graph, &Dataset) -> Result<f64, ScoreError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, score_fn: F) -> Self {
        Self {
            name: name.into(),
            score_fn,
        }
    }
}

impl<F> ScoringOracle for FnOracle<F>
where
    F: Fn(&Graph, &Dataset) -> Result<f64, ScoreError> + Send + Sync,
{
    fn score(&self, graph: &Graph, dataset: &Dataset) -> Result<f64, ScoreError> {
        (self.score_fn)(graph, dataset)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---- memoization ----

/// Explicit memoization in front of an expensive oracle.
///
/// Entries are keyed by graph structure only, so one instance must be used
/// with a single dataset; call [`MemoizedOracle::clear`] before switching.
/// Failures are never cached.
pub struct MemoizedOracle<O> {
    inner: O,
    cache: DashMap<Graph, f64>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<O: ScoringOracle> MemoizedOracle<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<O: ScoringOracle> ScoringOracle for MemoizedOracle<O> {
    fn score(&self, graph: &Graph, dataset: &Dataset) -> Result<f64, ScoreError> {
        if let Some(cached) = self.cache.get(graph) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(*cached);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let score = self.inner.score(graph, dataset)?;
        self.cache.insert(graph.clone(), score);
        Ok(score)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
