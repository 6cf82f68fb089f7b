//! Error types for the butterfly-osm toolkit
//!
//! Graph construction and contraction report precondition violations through
//! [`Error`]. Expected outcomes (an unreachable target, a missing witness) are
//! not errors and never surface here.

use thiserror::Error;

/// Errors raised by graph building, contraction and queries
#[derive(Debug, Error)]
pub enum Error {
    /// A vertex id was referenced that was never added to the graph
    #[error("unknown vertex {0}")]
    UnknownVertex(u32),

    /// A vertex id was supplied twice while building a graph
    #[error("vertex {0} added more than once")]
    DuplicateVertex(u32),

    /// An edge weight is negative, NaN or infinite
    #[error("invalid weight {weight} on edge {from} -> {to}")]
    InvalidWeight { from: u32, to: u32, weight: f64 },

    /// Contraction was asked to process a graph without vertices
    #[error("graph contains no vertices")]
    EmptyGraph,

    /// A query was stopped through its cancellation flag
    #[error("query cancelled")]
    Cancelled,

    /// Invalid configuration or parameters
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors caused by malformed graph input, as opposed to
    /// configuration problems or query-time conditions.
    pub fn is_graph_precondition(&self) -> bool {
        matches!(
            self,
            Error::UnknownVertex(_)
                | Error::DuplicateVertex(_)
                | Error::InvalidWeight { .. }
                | Error::EmptyGraph
        )
    }
}
