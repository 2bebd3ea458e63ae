//! Search configuration.

use bn_types::{BnResult, SearchError};
use serde::{Deserialize, Serialize};

/// Top-level configuration for a repeated hill-climbing search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of parents any variable may have.
    pub max_parents: usize,

    /// Number of random restarts.
    pub run_count: usize,

    /// Base seed; run `i` draws from stream `i` of this seed. Negative seeds
    /// are accepted and reinterpreted bit for bit as the generator key.
    pub seed: i64,

    /// Consider reversing an existing arc as a local edit.
    pub allow_arc_reversal: bool,

    /// Seed every random start with the target as the parent of all other
    /// variables.
    pub init_as_naive_bayes: bool,

    /// Run the Markov-blanket post-processor after a completed search.
    pub apply_markov_blanket_correction: bool,

    /// Execute restarts on the rayon pool. The result does not depend on it.
    pub parallel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_parents: 2,
            run_count: 10,
            seed: 1,
            allow_arc_reversal: false,
            init_as_naive_bayes: true,
            apply_markov_blanket_correction: false,
            parallel: false,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserialize from JSON and validate. Missing fields take their defaults.
    ///
    /// Negative counts are reported as invalid configuration rather than as a
    /// type mismatch.
    pub fn from_json(json: &str) -> BnResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        for field in ["max_parents", "run_count"] {
            if let Some(n) = value.get(field).and_then(serde_json::Value::as_i64) {
                if n < 0 {
                    return Err(SearchError::InvalidConfiguration {
                        message: format!("{field} must not be negative, got {n}"),
                    }
                    .into());
                }
            }
        }
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_parents(mut self, n: usize) -> Self {
        self.max_parents = n;
        self
    }

    pub fn with_run_count(mut self, n: usize) -> Self {
        self.run_count = n;
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_arc_reversal(mut self, enabled: bool) -> Self {
        self.allow_arc_reversal = enabled;
        self
    }

    pub fn with_naive_bayes_init(mut self, enabled: bool) -> Self {
        self.init_as_naive_bayes = enabled;
        self
    }

    pub fn with_markov_blanket_correction(mut self, enabled: bool) -> Self {
        self.apply_markov_blanket_correction = enabled;
        self
    }

    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Reject configurations the search cannot run with.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.run_count < 1 {
            return Err(SearchError::InvalidConfiguration {
                message: format!("run_count must be at least 1, got {}", self.run_count),
            });
        }
        Ok(())
    }
}
