//! Bounded witness search
//!
//! Decides whether the path `x → via → y` is the only shortest connection
//! between two neighbours of a vertex about to be contracted. The search is a
//! forward Dijkstra on the live graph that never enters `via` and gives up
//! after a hop limit, a settle limit, or once its frontier exceeds the
//! largest candidate weight.
//!
//! Giving up early only ever means "no witness", which inserts a shortcut
//! that might not be needed. Query results stay exact.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::graph::{Graph, VertexId, Weight};

/// Result of one batched witness search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WitnessOutcome {
    /// `found[i]` is true when target `i` has a witness
    pub found: Vec<bool>,
    /// A hop or settle limit stopped the search while some target still
    /// had no witness
    pub capped: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct WitnessSearch<'g> {
    graph: &'g Graph,
    hop_limit: u32,
    settle_limit: usize,
}

impl<'g> WitnessSearch<'g> {
    pub fn new(graph: &'g Graph, hop_limit: u32, settle_limit: usize) -> Self {
        Self {
            graph,
            hop_limit,
            settle_limit,
        }
    }

    pub fn hop_limit(&self) -> u32 {
        self.hop_limit
    }

    /// True iff a path `from → to` of weight at most `max_weight` avoiding
    /// `via` is found within `hop_limit` hops.
    pub fn has_witness(
        &self,
        via: VertexId,
        from: VertexId,
        to: VertexId,
        max_weight: Weight,
        hop_limit: u32,
    ) -> bool {
        if from == to {
            // the empty walk; never worth a loop shortcut
            return max_weight >= 0.0;
        }
        let bounded = Self {
            hop_limit,
            ..*self
        };
        bounded.witnesses(via, from, &[(to, max_weight)]).found[0]
    }

    /// Run one search from `from` answering every `(target, max_weight)`
    /// pair at once.
    pub fn witnesses(
        &self,
        via: VertexId,
        from: VertexId,
        targets: &[(VertexId, Weight)],
    ) -> WitnessOutcome {
        let limit = targets
            .iter()
            .map(|&(_, w)| w)
            .fold(f64::NEG_INFINITY, f64::max);
        if targets.is_empty() || limit < 0.0 {
            return WitnessOutcome {
                found: targets.iter().map(|&(t, w)| t == from && w >= 0.0).collect(),
                capped: false,
            };
        }

        let mut open: FxHashSet<VertexId> = targets.iter().map(|&(t, _)| t).collect();
        let mut dist: FxHashMap<VertexId, (Weight, u32)> = FxHashMap::default();
        let mut heap: BinaryHeap<Reverse<(OrderedFloat<Weight>, VertexId)>> = BinaryHeap::new();

        dist.insert(from, (0.0, 0));
        heap.push(Reverse((OrderedFloat(0.0), from)));

        let mut settled = 0usize;
        let mut limited = false;

        while let Some(Reverse((OrderedFloat(d), u))) = heap.pop() {
            let (best, hops) = dist[&u];
            if d > best {
                continue;
            }
            if d > limit {
                break;
            }
            open.remove(&u);
            if open.is_empty() {
                break;
            }
            settled += 1;
            if settled >= self.settle_limit {
                limited = true;
                break;
            }
            if hops >= self.hop_limit {
                limited = true;
                continue;
            }

            for e in self.graph.outgoing(u) {
                if e.target == via {
                    continue;
                }
                let nd = d + e.weight;
                if nd > limit {
                    continue;
                }
                let better = dist.get(&e.target).map_or(true, |&(old, _)| nd < old);
                if better {
                    dist.insert(e.target, (nd, hops + 1));
                    heap.push(Reverse((OrderedFloat(nd), e.target)));
                }
            }
        }

        let found: Vec<bool> = targets
            .iter()
            .map(|&(t, max_weight)| dist.get(&t).is_some_and(|&(d, _)| d <= max_weight))
            .collect();
        let capped = limited && found.iter().any(|f| !f);

        WitnessOutcome { found, capped }
    }
}
