//! CH preprocessing
//!
//! Sequential contraction loop with lazy priority updates:
//! 1. pop the lowest-priority vertex and recompute its priority; if another
//!    vertex is now cheaper, re-queue and retry
//! 2. plan the contraction (witness phase, read-only, optionally parallel)
//! 3. insert the required shortcuts
//! 4. detach the vertex from its neighbours; its own adjacency list stays
//!    behind as its hierarchy record
//! 5. assign the next level and re-score the neighbours
//!
//! Exactly one vertex is contracted per non-requeue iteration, so the loop
//! always terminates.

use std::cmp::Reverse;
use std::time::Instant;

use butterfly_common::{Error, Result};
use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;
use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::config::ContractionConfig;
use crate::graph::{check_weight, Coordinate, Direction, Graph, VertexId, Weight};
use crate::priority::{plan_contraction, ContractionPlan, HopCounts, PriorityCalculator};
use crate::witness::WitnessSearch;

/// Contraction state of one vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexState {
    Uncontracted,
    Contracted(u32),
}

/// Statistics from CH construction
#[derive(Debug, Clone, Default)]
pub struct ChStats {
    pub n_vertices: u32,
    pub n_original_arcs: u64,
    pub n_shortcuts: u64,
    pub lazy_requeues: u64,
    pub witness_searches: u64,
    /// Witness searches stopped by the hop or settle limit
    pub capped_searches: u64,
    pub max_level: u32,
    pub contraction_time_ms: u64,
}

/// One directed arc of a finished hierarchy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HierarchyArc {
    pub from: VertexId,
    pub to: VertexId,
    pub weight: Weight,
    pub contracted_via: Option<VertexId>,
}

/// Leveled graph produced by contraction; read-only from here on
#[derive(Debug, Clone)]
pub struct ContractionHierarchy {
    graph: Graph,
    levels: Vec<u32>,
    stats: ChStats,
}

impl ContractionHierarchy {
    /// Contract every vertex of `graph`.
    ///
    /// An empty graph is rejected before the loop starts (invalid weights
    /// never get into a [`Graph`]); past that point contraction cannot fail.
    pub fn build(graph: Graph, config: &ContractionConfig) -> Result<Self> {
        config.validate()?;
        graph.validate()?;
        Ok(Contractor::new(graph, config).run())
    }

    /// Contract vertices in the given order instead of by priority;
    /// `order[i]` receives level `i`. Witness searches still decide which
    /// shortcuts are needed.
    pub fn build_with_order(
        graph: Graph,
        order: &[VertexId],
        config: &ContractionConfig,
    ) -> Result<Self> {
        config.validate()?;
        graph.validate()?;
        let n = graph.vertex_count();
        if order.len() != n {
            return Err(Error::InvalidInput(format!(
                "order has {} entries for {n} vertices",
                order.len()
            )));
        }
        let mut seen = vec![false; n];
        for &v in order {
            match seen.get_mut(v as usize) {
                Some(s) if !*s => *s = true,
                Some(_) => return Err(Error::DuplicateVertex(v)),
                None => return Err(Error::UnknownVertex(v)),
            }
        }
        Ok(Contractor::new(graph, config).run_ordered(order))
    }

    /// Reload a hierarchy from the rows [`ContractionHierarchy::arcs`]
    /// yields plus vertex coordinates and levels. Each arc is stored on its
    /// lower-level endpoint, so the rows must satisfy the same checks as
    /// [`ContractionHierarchy::from_parts`].
    pub fn from_arcs<I>(coords: &[Coordinate], arcs: I, levels: Vec<u32>) -> Result<Self>
    where
        I: IntoIterator<Item = HierarchyArc>,
    {
        check_level_count(&levels, coords.len())?;
        let mut graph = Graph::with_capacity(coords.len());
        for c in coords {
            graph.add_vertex(c.lat, c.lon);
        }
        for arc in arcs {
            for v in [Some(arc.from), Some(arc.to), arc.contracted_via]
                .into_iter()
                .flatten()
            {
                if !graph.contains(v) {
                    return Err(Error::UnknownVertex(v));
                }
            }
            check_weight(arc.from, arc.to, arc.weight)?;
            if arc.from == arc.to {
                return Err(Error::InvalidInput(format!(
                    "self-loop at {} in hierarchy",
                    arc.from
                )));
            }
            if levels[arc.from as usize] <= levels[arc.to as usize] {
                graph.insert_one_sided(
                    arc.from,
                    arc.to,
                    arc.weight,
                    Direction::Forward,
                    arc.contracted_via,
                );
            } else {
                graph.insert_one_sided(
                    arc.to,
                    arc.from,
                    arc.weight,
                    Direction::Backward,
                    arc.contracted_via,
                );
            }
        }
        Self::from_parts(graph, levels)
    }

    /// Reassemble a hierarchy from a graph already in hierarchy layout and
    /// its levels. Every stored arc must point to a higher level and every
    /// shortcut must bypass a vertex below both of its endpoints, which
    /// keeps unpacking finite.
    pub fn from_parts(graph: Graph, levels: Vec<u32>) -> Result<Self> {
        check_level_count(&levels, graph.vertex_count())?;
        graph.validate()?;
        for (u, &level) in levels.iter().enumerate() {
            for e in graph.edges(u as VertexId) {
                if levels[e.target as usize] <= level {
                    return Err(Error::InvalidInput(format!(
                        "arc {u} - {} does not point upward",
                        e.target
                    )));
                }
                if let Some(via) = e.contracted_via {
                    match levels.get(via as usize) {
                        None => return Err(Error::UnknownVertex(via)),
                        Some(&l) if l >= level => {
                            return Err(Error::InvalidInput(format!(
                                "shortcut {u} - {} bypasses {via}, which is not below both ends",
                                e.target
                            )));
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        let stats = ChStats {
            n_vertices: graph.vertex_count() as u32,
            n_shortcuts: count_shortcuts(&graph),
            max_level: levels.iter().copied().max().unwrap_or(0),
            ..Default::default()
        };
        Ok(Self {
            graph,
            levels,
            stats,
        })
    }

    pub fn into_parts(self) -> (Graph, Vec<u32>) {
        (self.graph, self.levels)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.vertex_count()
    }

    pub fn levels(&self) -> &[u32] {
        &self.levels
    }

    #[inline]
    pub fn level(&self, v: VertexId) -> Option<u32> {
        self.levels.get(v as usize).copied()
    }

    pub fn vertex_state(&self, v: VertexId) -> Option<VertexState> {
        self.level(v).map(VertexState::Contracted)
    }

    pub fn stats(&self) -> &ChStats {
        &self.stats
    }

    /// Every arc of the hierarchy, original and shortcut
    pub fn arcs(&self) -> impl Iterator<Item = HierarchyArc> + '_ {
        (0..self.graph.vertex_count() as VertexId).flat_map(move |u| {
            self.graph.edges(u).iter().flat_map(move |e| {
                let forward = e.forward.then_some(HierarchyArc {
                    from: u,
                    to: e.target,
                    weight: e.weight,
                    contracted_via: e.contracted_via,
                });
                let backward = e.backward.then_some(HierarchyArc {
                    from: e.target,
                    to: u,
                    weight: e.weight,
                    contracted_via: e.contracted_via,
                });
                forward.into_iter().chain(backward)
            })
        })
    }

    pub fn shortcuts(&self) -> impl Iterator<Item = HierarchyArc> + '_ {
        self.arcs().filter(|a| a.contracted_via.is_some())
    }
}

fn check_level_count(levels: &[u32], n_vertices: usize) -> Result<()> {
    if levels.len() == n_vertices {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "{} levels for {n_vertices} vertices",
            levels.len()
        )))
    }
}

fn count_shortcuts(graph: &Graph) -> u64 {
    (0..graph.vertex_count() as VertexId)
        .flat_map(|u| graph.edges(u))
        .filter(|e| e.is_shortcut())
        .map(|e| e.forward as u64 + e.backward as u64)
        .sum()
}

type QueueKey = Reverse<(OrderedFloat<f64>, VertexId)>;

#[inline]
fn queue_key(priority: f64, v: VertexId) -> QueueKey {
    Reverse((OrderedFloat(priority), v))
}

struct Contractor<'c> {
    graph: Graph,
    config: &'c ContractionConfig,
    calc: PriorityCalculator<'c>,
    states: Vec<VertexState>,
    contracted_neighbors: Vec<u32>,
    hops: HopCounts,
    queue: PriorityQueue<VertexId, QueueKey>,
    stats: ChStats,
}

impl<'c> Contractor<'c> {
    fn new(graph: Graph, config: &'c ContractionConfig) -> Self {
        let n = graph.vertex_count();
        let stats = ChStats {
            n_vertices: n as u32,
            n_original_arcs: graph.edge_count() as u64,
            ..Default::default()
        };
        Self {
            graph,
            config,
            calc: PriorityCalculator::new(config),
            states: vec![VertexState::Uncontracted; n],
            contracted_neighbors: vec![0; n],
            hops: HopCounts::default(),
            queue: PriorityQueue::with_capacity(n),
            stats,
        }
    }

    fn run(mut self) -> ContractionHierarchy {
        let start = self.announce();
        self.seed_queue();
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "initial priorities computed"
        );

        let mut next_level = 0u32;
        while let Some((v, Reverse((OrderedFloat(stored), _)))) = self.queue.pop() {
            let plan = self.plan(v);
            let current = self.calc.score(&plan, self.contracted_neighbors[v as usize]);

            if let Some((_, &Reverse(next))) = self.queue.peek() {
                if (OrderedFloat(current), v) > next {
                    trace!(vertex = v, stored, current, "stale priority, re-queueing");
                    self.queue.push(v, queue_key(current, v));
                    self.stats.lazy_requeues += 1;
                    continue;
                }
            }

            let neighbors = self.contract(v, plan, next_level);
            for n in neighbors {
                let plan = self.plan(n);
                let priority = self.calc.score(&plan, self.contracted_neighbors[n as usize]);
                self.queue.push(n, queue_key(priority, n));
            }
            next_level += 1;
            self.progress(next_level);
        }

        self.finish(start, next_level)
    }

    fn run_ordered(mut self, order: &[VertexId]) -> ContractionHierarchy {
        let start = self.announce();
        for (level, &v) in order.iter().enumerate() {
            let plan = self.plan(v);
            self.contract(v, plan, level as u32);
            self.progress(level as u32 + 1);
        }
        self.finish(start, order.len() as u32)
    }

    fn announce(&self) -> Instant {
        info!(
            vertices = self.graph.vertex_count(),
            arcs = self.stats.n_original_arcs,
            hop_limit = self.config.witness_hop_limit,
            "starting contraction"
        );
        Instant::now()
    }

    fn progress(&self, contracted: u32) {
        let n = self.graph.vertex_count();
        if contracted as usize % (n / 10).max(1) == 0 {
            debug!(
                contracted,
                total = n,
                live_entries = self.graph.entry_count(),
                "contraction progress"
            );
        }
    }

    fn finish(mut self, start: Instant, contracted: u32) -> ContractionHierarchy {
        let n_shortcuts = count_shortcuts(&self.graph);
        self.stats.n_shortcuts = n_shortcuts;
        self.stats.max_level = contracted.saturating_sub(1);
        self.stats.contraction_time_ms = start.elapsed().as_millis() as u64;

        if self.stats.capped_searches > 0 {
            info!(
                capped = self.stats.capped_searches,
                searches = self.stats.witness_searches,
                "witness searches hit the hop/settle limit; some shortcuts may be redundant"
            );
        }
        info!(
            shortcuts = n_shortcuts,
            requeues = self.stats.lazy_requeues,
            elapsed_ms = self.stats.contraction_time_ms,
            "contraction complete"
        );

        let levels = self
            .states
            .iter()
            .map(|s| match s {
                VertexState::Contracted(level) => *level,
                VertexState::Uncontracted => unreachable!("contraction ended with live vertices"),
            })
            .collect();

        ContractionHierarchy {
            graph: self.graph,
            levels,
            stats: self.stats,
        }
    }

    fn witness(&self) -> WitnessSearch<'_> {
        WitnessSearch::new(
            &self.graph,
            self.config.witness_hop_limit,
            self.config.witness_settle_limit,
        )
    }

    fn plan(&mut self, v: VertexId) -> ContractionPlan {
        let plan = plan_contraction(&self.graph, v, &self.witness(), &self.hops, self.config);
        self.record(&plan);
        plan
    }

    fn record(&mut self, plan: &ContractionPlan) {
        self.stats.witness_searches += plan.witness_searches as u64;
        self.stats.capped_searches += plan.capped_searches as u64;
    }

    fn seed_queue(&mut self) {
        let n = self.graph.vertex_count() as VertexId;
        let witness = self.witness();
        let score = |v: VertexId| {
            let plan = plan_contraction(&self.graph, v, &witness, &self.hops, self.config);
            (self.calc.score(&plan, 0), plan)
        };
        let scored: Vec<(f64, ContractionPlan)> = if self.config.parallel_witness {
            (0..n).into_par_iter().map(score).collect()
        } else {
            (0..n).map(score).collect()
        };

        for (v, (priority, plan)) in scored.into_iter().enumerate() {
            self.record(&plan);
            self.queue.push(v as VertexId, queue_key(priority, v as VertexId));
        }
    }

    /// Apply a plan and retire `v`; returns its live neighbours
    fn contract(&mut self, v: VertexId, plan: ContractionPlan, level: u32) -> Vec<VertexId> {
        for s in &plan.shortcuts {
            let outcome = self
                .graph
                .insert_arc(s.from, s.to, s.weight, Direction::Forward, Some(v));
            if outcome.stored() {
                self.hops.set(s.from, s.to, s.hops);
            }
        }

        let mut neighbors: Vec<VertexId> = self.graph.edges(v).iter().map(|e| e.target).collect();
        neighbors.sort_unstable();
        neighbors.dedup();

        self.graph.detach_from_neighbors(v);
        self.states[v as usize] = VertexState::Contracted(level);
        trace!(
            vertex = v,
            level,
            shortcuts = plan.shortcuts.len(),
            "contracted"
        );

        for &n in &neighbors {
            debug_assert_eq!(self.states[n as usize], VertexState::Uncontracted);
            self.contracted_neighbors[n as usize] += 1;
        }
        neighbors
    }
}
