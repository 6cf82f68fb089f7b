//! Contraction Hierarchies for road networks
//!
//! Build once with [`ContractionHierarchy::build`], then answer any number
//! of point-to-point queries with [`ChQuery`].
//!
//! ```no_run
//! use butterfly_ch::{ChQuery, ContractionConfig, ContractionHierarchy, Graph};
//!
//! let mut graph = Graph::new();
//! let a = graph.add_vertex(50.85, 4.35);
//! let b = graph.add_vertex(50.86, 4.36);
//! graph.add_edge(a, b, 120.0, true, true, None)?;
//!
//! let ch = ContractionHierarchy::build(graph, &ContractionConfig::default())?;
//! let route = ChQuery::new(&ch).route(a, b)?;
//! # Ok::<(), butterfly_common::Error>(())
//! ```

pub mod config;
pub mod contraction;
pub mod dijkstra;
pub mod graph;
pub mod priority;
pub mod query;
pub mod unpack;
pub mod validate;
pub mod witness;

pub use config::ContractionConfig;
pub use contraction::{ChStats, ContractionHierarchy, HierarchyArc, VertexState};
pub use graph::{Coordinate, Direction, Edge, EdgeInsert, EdgeOutcome, Graph, GraphBuilder, VertexId, Weight};
pub use priority::{plan_contraction, ContractionPlan, HopCounts, PriorityCalculator, Shortcut};
pub use query::{ChQuery, QueryStats, Route};
pub use unpack::{unpack_arc, unpack_path};
pub use validate::{validate_random_pairs, verify_shortcuts, ShortcutReport, ValidationResult};
pub use witness::{WitnessOutcome, WitnessSearch};
