//! Node priority
//!
//! Answers "what would contracting `v` right now cost?" without touching the
//! graph. The same [`plan_contraction`] result drives the real contraction
//! step, so a priority is exactly as expensive as one contraction's witness
//! phase.

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::config::ContractionConfig;
use crate::graph::{Graph, VertexId, Weight};
use crate::witness::WitnessSearch;

/// Shortcut required when contracting `via`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shortcut {
    pub from: VertexId,
    pub to: VertexId,
    pub weight: Weight,
    pub via: VertexId,
    /// Number of original arcs the shortcut stands for
    pub hops: u32,
}

/// Original-arc count of every arc created by contraction. Arcs not listed
/// are original and count as one.
#[derive(Debug, Clone, Default)]
pub struct HopCounts {
    counts: FxHashMap<(VertexId, VertexId), u32>,
}

impl HopCounts {
    #[inline]
    pub fn get(&self, from: VertexId, to: VertexId) -> u32 {
        self.counts.get(&(from, to)).copied().unwrap_or(1)
    }

    pub fn set(&mut self, from: VertexId, to: VertexId, hops: u32) {
        self.counts.insert((from, to), hops);
    }
}

/// Everything contracting a vertex would do, computed read-only
#[derive(Debug, Clone, Default)]
pub struct ContractionPlan {
    pub shortcuts: Vec<Shortcut>,
    /// Directed arcs incident to the vertex
    pub removed_arcs: usize,
    /// Original arcs carried by the removed arcs
    pub removed_hops: u64,
    /// Original arcs carried by the planned shortcuts
    pub added_hops: u64,
    pub witness_searches: usize,
    pub capped_searches: usize,
}

impl ContractionPlan {
    pub fn edge_difference(&self) -> i64 {
        self.shortcuts.len() as i64 - self.removed_arcs as i64
    }

    pub fn original_edge_difference(&self) -> i64 {
        self.added_hops as i64 - self.removed_hops as i64
    }
}

/// Work out which shortcuts contracting `v` needs.
///
/// For every arc `x → v` one bounded witness search from `x` answers all
/// pairs `(x, y)` with `v → y`. Searches are independent and may run on the
/// rayon pool; the returned shortcut order does not depend on it.
pub fn plan_contraction(
    graph: &Graph,
    v: VertexId,
    witness: &WitnessSearch<'_>,
    hops: &HopCounts,
    config: &ContractionConfig,
) -> ContractionPlan {
    let incoming: Vec<(VertexId, Weight)> = graph
        .incoming(v)
        .map(|e| (e.target, e.weight))
        .collect();
    let outgoing: Vec<(VertexId, Weight)> = graph
        .outgoing(v)
        .map(|e| (e.target, e.weight))
        .collect();

    let removed_hops = incoming
        .iter()
        .map(|&(x, _)| hops.get(x, v) as u64)
        .chain(outgoing.iter().map(|&(y, _)| hops.get(v, y) as u64))
        .sum();

    let search_from = |&(x, w_in): &(VertexId, Weight)| -> (Vec<Shortcut>, bool, bool) {
        let candidates: Vec<(VertexId, Weight)> = outgoing
            .iter()
            .filter(|&&(y, _)| y != x)
            .map(|&(y, w_out)| (y, w_in + w_out))
            .collect();
        if candidates.is_empty() {
            return (Vec::new(), false, false);
        }
        let outcome = witness.witnesses(v, x, &candidates);
        let shortcuts = candidates
            .iter()
            .zip(&outcome.found)
            .filter(|(_, found)| !**found)
            .map(|(&(y, weight), _)| Shortcut {
                from: x,
                to: y,
                weight,
                via: v,
                hops: hops.get(x, v) + hops.get(v, y),
            })
            .collect();
        (shortcuts, true, outcome.capped)
    };

    let pairs = incoming.len() * outgoing.len();
    let per_source: Vec<(Vec<Shortcut>, bool, bool)> =
        if config.parallel_witness && pairs >= config.parallel_threshold {
            incoming.par_iter().map(search_from).collect()
        } else {
            incoming.iter().map(search_from).collect()
        };

    let mut plan = ContractionPlan {
        removed_arcs: incoming.len() + outgoing.len(),
        removed_hops,
        ..Default::default()
    };
    for (shortcuts, searched, capped) in per_source {
        plan.witness_searches += searched as usize;
        plan.capped_searches += capped as usize;
        plan.added_hops += shortcuts.iter().map(|s| s.hops as u64).sum::<u64>();
        plan.shortcuts.extend(shortcuts);
    }
    plan
}

/// Weighted sum of the priority terms; lower contracts sooner
#[derive(Debug, Clone, Copy)]
pub struct PriorityCalculator<'c> {
    config: &'c ContractionConfig,
}

impl<'c> PriorityCalculator<'c> {
    pub fn new(config: &'c ContractionConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, plan: &ContractionPlan, contracted_neighbors: u32) -> f64 {
        self.config.edge_difference_factor * plan.edge_difference() as f64
            + self.config.contracted_neighbors_factor * contracted_neighbors as f64
            + self.config.original_edges_factor * plan.original_edge_difference() as f64
    }

    /// Priority of `v` given the current live graph
    pub fn priority(
        &self,
        graph: &Graph,
        v: VertexId,
        witness: &WitnessSearch<'_>,
        hops: &HopCounts,
        contracted_neighbors: u32,
    ) -> f64 {
        let plan = plan_contraction(graph, v, witness, hops, self.config);
        self.score(&plan, contracted_neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_graph(n: usize) -> Graph {
        let mut g = Graph::new();
        for _ in 0..n {
            g.add_vertex(0.0, 0.0);
        }
        for i in 0..n - 1 {
            g.add_edge(i as u32, i as u32 + 1, 1.0, true, true, None).unwrap();
        }
        g
    }

    #[test]
    fn test_inner_path_vertex_needs_two_shortcuts() {
        let g = path_graph(5);
        let config = ContractionConfig::default();
        let witness = WitnessSearch::new(&g, 10, 100);

        let plan = plan_contraction(&g, 2, &witness, &HopCounts::default(), &config);
        let mut pairs: Vec<(u32, u32, f64)> =
            plan.shortcuts.iter().map(|s| (s.from, s.to, s.weight)).collect();
        pairs.sort_by(|a, b| a.partial_cmp(b).unwrap());

        assert_eq!(pairs, vec![(1, 3, 2.0), (3, 1, 2.0)]);
        assert_eq!(plan.removed_arcs, 4);
        assert_eq!(plan.edge_difference(), -2);
        assert_eq!(plan.original_edge_difference(), 0);
        assert!(plan.shortcuts.iter().all(|s| s.via == 2 && s.hops == 2));
    }

    #[test]
    fn test_end_vertex_needs_none() {
        let g = path_graph(5);
        let config = ContractionConfig::default();
        let witness = WitnessSearch::new(&g, 10, 100);

        let plan = plan_contraction(&g, 0, &witness, &HopCounts::default(), &config);
        assert!(plan.shortcuts.is_empty());
        assert_eq!(plan.removed_arcs, 2);
        assert_eq!(plan.witness_searches, 0);
    }

    #[test]
    fn test_plan_does_not_mutate() {
        let g = path_graph(4);
        let before = g.entry_count();
        let config = ContractionConfig::default();
        let witness = WitnessSearch::new(&g, 10, 100);
        let calc = PriorityCalculator::new(&config);

        let p = calc.priority(&g, 1, &witness, &HopCounts::default(), 0);
        assert_eq!(g.entry_count(), before);
        assert_eq!(p, -2.0);
    }

    #[test]
    fn test_contracted_neighbors_raise_priority() {
        let config = ContractionConfig::default();
        let calc = PriorityCalculator::new(&config);
        let plan = ContractionPlan {
            removed_arcs: 2,
            ..Default::default()
        };
        assert!(calc.score(&plan, 3) > calc.score(&plan, 0));
    }

    #[test]
    fn test_parallel_plan_matches_sequential() {
        // wheel: hub 0 with 12 spokes and a rim
        let mut g = Graph::new();
        for _ in 0..13 {
            g.add_vertex(0.0, 0.0);
        }
        for leaf in 1..13u32 {
            g.add_edge(0, leaf, 1.0, true, true, None).unwrap();
            let next = if leaf == 12 { 1 } else { leaf + 1 };
            g.add_edge(leaf, next, 1.5, true, true, None).unwrap();
        }
        let witness = WitnessSearch::new(&g, 10, 1000);
        let sequential = ContractionConfig {
            parallel_witness: false,
            ..Default::default()
        };
        let parallel = ContractionConfig {
            parallel_witness: true,
            parallel_threshold: 1,
            ..Default::default()
        };

        let a = plan_contraction(&g, 0, &witness, &HopCounts::default(), &sequential);
        let b = plan_contraction(&g, 0, &witness, &HopCounts::default(), &parallel);
        assert_eq!(a.shortcuts, b.shortcuts);
        assert_eq!(a.witness_searches, 12);
        // rim neighbours are witnessed, everything else needs a shortcut
        assert_eq!(a.shortcuts.len(), 12 * 11 - 24);
    }
}
