//! Shortcut unpacking
//!
//! Expands hierarchy arcs back into original vertices with an explicit
//! stack, so deep shortcut nesting never recurses.

use butterfly_common::{Error, Result};

use crate::graph::{Graph, VertexId};

/// Original vertices of the arc `from → to`, both endpoints included
pub fn unpack_arc(graph: &Graph, from: VertexId, to: VertexId) -> Result<Vec<VertexId>> {
    let mut out = vec![from];
    unpack_into(graph, from, to, &mut out)?;
    Ok(out)
}

/// Expand a path of hierarchy vertices into original vertices
pub fn unpack_path(graph: &Graph, path: &[VertexId]) -> Result<Vec<VertexId>> {
    let Some(&first) = path.first() else {
        return Ok(Vec::new());
    };
    let mut out = vec![first];
    for pair in path.windows(2) {
        unpack_into(graph, pair[0], pair[1], &mut out)?;
    }
    Ok(out)
}

/// Append the vertices after `from` up to `to`
fn unpack_into(
    graph: &Graph,
    from: VertexId,
    to: VertexId,
    out: &mut Vec<VertexId>,
) -> Result<()> {
    let mut stack = vec![(from, to)];
    while let Some((a, b)) = stack.pop() {
        let edge = graph
            .find_edge(a, b)
            .ok_or_else(|| Error::InvalidInput(format!("no arc {a} -> {b} in hierarchy")))?;
        match edge.contracted_via {
            Some(via) => {
                stack.push((via, b));
                stack.push((a, via));
            }
            None => out.push(b),
        }
    }
    Ok(())
}
