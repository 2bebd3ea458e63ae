pub mod dataset;
pub mod errors;
pub mod graph;

pub use dataset::*;
pub use errors::*;
pub use graph::*;
