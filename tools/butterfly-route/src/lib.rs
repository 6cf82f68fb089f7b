pub mod input;
pub mod output;

pub use input::{load_graph, load_hierarchy};
pub use output::{write_arcs, write_levels};
