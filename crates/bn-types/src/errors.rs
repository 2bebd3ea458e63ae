use thiserror::Error;

/// Main error type for Bayesian network structure search
#[derive(Error, Debug)]
pub enum BnError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Scoring failure: {0}")]
    Score(#[from] ScoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Structural errors raised by the graph model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node {node} out of range for a graph with {num_nodes} nodes")]
    NodeOutOfRange { node: usize, num_nodes: usize },

    #[error("Node {node} cannot be its own parent")]
    SelfLoop { node: usize },

    #[error("Node {parent} is already a parent of node {child}")]
    DuplicateParent { child: usize, parent: usize },

    #[error("Arc {parent} -> {child} does not exist")]
    MissingArc { child: usize, parent: usize },

    #[error("Parent position {index} out of range for node {child} with {len} parents")]
    PositionOutOfRange { child: usize, index: usize, len: usize },

    #[error("Node count mismatch: expected {expected}, got {actual}")]
    NodeCountMismatch { expected: usize, actual: usize },
}

/// Dataset contract violations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    #[error("Dataset has no attributes")]
    NoAttributes,

    #[error("Target index {target} out of range for {num_attributes} attributes")]
    TargetOutOfRange { target: usize, num_attributes: usize },

    #[error("Attribute {name} must have at least one value")]
    EmptyDomain { name: String },

    #[error("Instance has {actual} values, expected {expected}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("Value {value} out of range for attribute {attribute} with cardinality {cardinality}")]
    ValueOutOfRange {
        attribute: usize,
        value: u32,
        cardinality: u32,
    },

    #[error("Invalid instance weight: {weight}")]
    InvalidWeight { weight: f64 },
}

/// Search-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Invalid search configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Graph has {graph_nodes} nodes but the dataset has {attributes} attributes")]
    DimensionMismatch { graph_nodes: usize, attributes: usize },
}

/// Failure reported by a scoring oracle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    #[error("Ill-conditioned statistics: {message}")]
    IllConditioned { message: String },

    #[error("Score is not a number")]
    NotANumber,

    #[error("Scoring failed: {message}")]
    Failed { message: String },
}

/// Result type alias for structure search operations
pub type BnResult<T> = Result<T, BnError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::BnError::Validation(format!($($arg)*))
    };
}
