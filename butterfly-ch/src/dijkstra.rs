//! Plain Dijkstra on an uncontracted graph
//!
//! Ground truth for validating hierarchies.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use butterfly_common::{Error, Result};
use ordered_float::OrderedFloat;

use crate::graph::{Graph, VertexId, Weight};
use crate::query::Route;

/// Shortest path `source → target`, `Ok(None)` if unreachable
pub fn shortest_path(graph: &Graph, source: VertexId, target: VertexId) -> Result<Option<Route>> {
    for v in [source, target] {
        if !graph.contains(v) {
            return Err(Error::UnknownVertex(v));
        }
    }

    let n = graph.vertex_count();
    let mut dist = vec![Weight::INFINITY; n];
    let mut parent: Vec<Option<VertexId>> = vec![None; n];
    let mut heap: BinaryHeap<Reverse<(OrderedFloat<Weight>, VertexId)>> = BinaryHeap::new();

    dist[source as usize] = 0.0;
    heap.push(Reverse((OrderedFloat(0.0), source)));

    while let Some(Reverse((OrderedFloat(d), u))) = heap.pop() {
        if u == target {
            break;
        }
        if d > dist[u as usize] {
            continue;
        }
        for e in graph.outgoing(u) {
            let nd = d + e.weight;
            if nd < dist[e.target as usize] {
                dist[e.target as usize] = nd;
                parent[e.target as usize] = Some(u);
                heap.push(Reverse((OrderedFloat(nd), e.target)));
            }
        }
    }

    let weight = dist[target as usize];
    if !weight.is_finite() {
        return Ok(None);
    }
    let mut vertices = vec![target];
    let mut current = target;
    while let Some(prev) = parent[current as usize] {
        vertices.push(prev);
        current = prev;
    }
    vertices.reverse();
    Ok(Some(Route { weight, vertices }))
}

pub fn distance(graph: &Graph, source: VertexId, target: VertexId) -> Result<Option<Weight>> {
    Ok(shortest_path(graph, source, target)?.map(|r| r.weight))
}
