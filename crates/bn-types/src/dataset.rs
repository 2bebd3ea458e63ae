//! Finalized tabular dataset handed to the structure search.
//!
//! The search itself only reads the attribute count, the target index and the
//! attribute cardinalities. Rows exist for the benefit of scoring oracles.

use serde::{Deserialize, Serialize};

use crate::errors::DatasetError;

/// A discrete attribute (one variable of the network).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    /// Number of distinct values; values are encoded as `0..cardinality`.
    pub cardinality: u32,
}

impl Attribute {
    pub fn new(name: impl Into<String>, cardinality: u32) -> Self {
        Self {
            name: name.into(),
            cardinality,
        }
    }
}

/// One weighted row. `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub values: Vec<Option<u32>>,
    pub weight: f64,
}

impl Instance {
    pub fn new(values: Vec<Option<u32>>) -> Self {
        Self { values, weight: 1.0 }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn is_missing(&self, attribute: usize) -> bool {
        matches!(self.values.get(attribute), Some(None))
    }
}

/// Attributes, a designated target (class) attribute and weighted instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    attributes: Vec<Attribute>,
    target: usize,
    instances: Vec<Instance>,
}

impl Dataset {
    pub fn new(attributes: Vec<Attribute>, target: usize) -> Result<Self, DatasetError> {
        if attributes.is_empty() {
            return Err(DatasetError::NoAttributes);
        }
        if target >= attributes.len() {
            return Err(DatasetError::TargetOutOfRange {
                target,
                num_attributes: attributes.len(),
            });
        }
        if let Some(attr) = attributes.iter().find(|a| a.cardinality == 0) {
            return Err(DatasetError::EmptyDomain {
                name: attr.name.clone(),
            });
        }
        Ok(Self {
            attributes,
            target,
            instances: Vec::new(),
        })
    }

    /// Convenience constructor: `num_attributes` binary attributes named `x0..`.
    pub fn binary(num_attributes: usize, target: usize) -> Result<Self, DatasetError> {
        let attributes = (0..num_attributes)
            .map(|i| Attribute::new(format!("x{i}"), 2))
            .collect();
        Self::new(attributes, target)
    }

    pub fn push(&mut self, instance: Instance) -> Result<(), DatasetError> {
        if instance.values.len() != self.attributes.len() {
            return Err(DatasetError::ArityMismatch {
                expected: self.attributes.len(),
                actual: instance.values.len(),
            });
        }
        if !instance.weight.is_finite() || instance.weight < 0.0 {
            return Err(DatasetError::InvalidWeight {
                weight: instance.weight,
            });
        }
        for (attribute, value) in instance.values.iter().enumerate() {
            if let Some(value) = *value {
                let cardinality = self.attributes[attribute].cardinality;
                if value >= cardinality {
                    return Err(DatasetError::ValueOutOfRange {
                        attribute,
                        value,
                        cardinality,
                    });
                }
            }
        }
        self.instances.push(instance);
        Ok(())
    }

    pub fn num_attributes(&self) -> usize {
        self.attributes.len()
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn cardinality(&self, attribute: usize) -> u32 {
        self.attributes[attribute].cardinality
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn num_instances(&self) -> usize {
        self.instances.len()
    }

    pub fn total_weight(&self) -> f64 {
        self.instances.iter().map(|i| i.weight).sum()
    }

    /// Number of missing cells in column `attribute`.
    pub fn missing_count(&self, attribute: usize) -> usize {
        self.instances
            .iter()
            .filter(|i| i.is_missing(attribute))
            .count()
    }
}
