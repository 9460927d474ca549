//! citenet citation tree builder
//!
//! Expands a paper into a network of papers and citation contexts by
//! following multiply-cited references through the citation database.

pub mod builder;
pub mod graph;
pub mod source;

pub use builder::{BuildStats, GraphBuilder};
pub use graph::{ContextNode, Edge, Graph, Node, NodeId, PaperNode};
pub use source::{ApiDataSource, DataSource, StaticDataSource};
