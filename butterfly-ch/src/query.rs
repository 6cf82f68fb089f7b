//! Bidirectional CH query
//!
//! Forward search from the source relaxes only `forward` entries, backward
//! search from the target only `backward` entries. Since a finished
//! hierarchy stores each arc in the list of its lower-level endpoint, both
//! searches climb strictly upward.
//!
//! Stall-on-demand: a vertex reached more cheaply through a higher neighbour
//! (found via the opposite-direction entries of its own list) is not
//! expanded. It cannot be the top of a shortest path.

use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};

use butterfly_common::{Error, Result};
use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;

use crate::contraction::ContractionHierarchy;
use crate::graph::{Direction, Graph, VertexId, Weight};
use crate::unpack::unpack_path;

/// Shortest path in the original graph
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub weight: Weight,
    /// Original vertices from source to target, both included
    pub vertices: Vec<VertexId>,
}

/// Search effort of one query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub settled_forward: usize,
    pub settled_backward: usize,
    pub stalled: usize,
    pub relaxed: usize,
}

type QueueKey = Reverse<(OrderedFloat<Weight>, VertexId)>;

/// One direction of the bidirectional search
struct SearchSide {
    direction: Direction,
    dist: Vec<Weight>,
    parent: Vec<Option<VertexId>>,
    queue: PriorityQueue<VertexId, QueueKey>,
    settled: usize,
    stalled: usize,
    relaxed: usize,
}

impl SearchSide {
    fn new(direction: Direction, n: usize, start: VertexId) -> Self {
        let mut dist = vec![Weight::INFINITY; n];
        dist[start as usize] = 0.0;
        let mut queue = PriorityQueue::new();
        queue.push(start, Reverse((OrderedFloat(0.0), start)));
        Self {
            direction,
            dist,
            parent: vec![None; n],
            queue,
            settled: 0,
            stalled: 0,
            relaxed: 0,
        }
    }

    fn min_key(&self) -> Option<Weight> {
        self.queue.peek().map(|(_, Reverse((d, _)))| d.0)
    }

    fn is_stalled(&self, graph: &Graph, u: VertexId, d: Weight) -> bool {
        let opposite = self.direction.reversed();
        graph
            .edges(u)
            .iter()
            .filter(|e| e.allows(opposite))
            .any(|e| self.dist[e.target as usize] + e.weight < d)
    }

    /// Settle the closest queued vertex. Returns it with its distance, or
    /// `None` if the queue was empty or the vertex got stalled.
    fn settle_next(&mut self, ch: &ContractionHierarchy) -> Option<(VertexId, Weight)> {
        let graph = ch.graph();
        let (u, Reverse((OrderedFloat(d), _))) = self.queue.pop()?;

        if self.is_stalled(graph, u, d) {
            self.stalled += 1;
            return None;
        }
        self.settled += 1;

        for e in graph.edges(u).iter().filter(|e| e.allows(self.direction)) {
            debug_assert!(ch.level(e.target) > ch.level(u), "arc points downward");
            self.relaxed += 1;
            let nd = d + e.weight;
            if nd < self.dist[e.target as usize] {
                self.dist[e.target as usize] = nd;
                self.parent[e.target as usize] = Some(u);
                self.queue.push(e.target, Reverse((OrderedFloat(nd), e.target)));
            }
        }
        Some((u, d))
    }

    /// Vertices from `start` up to `end`, in settle order
    fn chain(&self, end: VertexId) -> Vec<VertexId> {
        let mut chain = vec![end];
        let mut current = end;
        while let Some(prev) = self.parent[current as usize] {
            chain.push(prev);
            current = prev;
        }
        chain.reverse();
        chain
    }
}

struct Meeting {
    weight: Weight,
    vertex: VertexId,
    forward: SearchSide,
    backward: SearchSide,
}

/// Query engine over a finished hierarchy; cheap to create, holds no state
/// between queries.
#[derive(Debug, Clone, Copy)]
pub struct ChQuery<'a> {
    ch: &'a ContractionHierarchy,
}

impl<'a> ChQuery<'a> {
    pub fn new(ch: &'a ContractionHierarchy) -> Self {
        Self { ch }
    }

    /// Shortest route from `source` to `target`, `Ok(None)` if unreachable
    pub fn route(&self, source: VertexId, target: VertexId) -> Result<Option<Route>> {
        self.route_inner(source, target, None)
            .map(|(route, _)| route)
    }

    pub fn route_with_stats(
        &self,
        source: VertexId,
        target: VertexId,
    ) -> Result<(Option<Route>, QueryStats)> {
        self.route_inner(source, target, None)
    }

    /// Like [`route`](Self::route), but gives up with [`Error::Cancelled`]
    /// once `cancel` is set.
    pub fn route_cancellable(
        &self,
        source: VertexId,
        target: VertexId,
        cancel: &AtomicBool,
    ) -> Result<Option<Route>> {
        self.route_inner(source, target, Some(cancel))
            .map(|(route, _)| route)
    }

    /// Shortest-path weight only; skips unpacking
    pub fn distance(&self, source: VertexId, target: VertexId) -> Result<Option<Weight>> {
        Ok(self.search(source, target, None)?.map(|m| m.weight))
    }

    /// Distances from `source` to each of `targets`.
    ///
    /// The upward space of `source` is explored once; each target then only
    /// runs its own backward search against it.
    pub fn one_to_many(
        &self,
        source: VertexId,
        targets: &[VertexId],
    ) -> Result<Vec<Option<Weight>>> {
        self.check(source)?;
        for &t in targets {
            self.check(t)?;
        }

        let n = self.ch.vertex_count();
        let mut forward = SearchSide::new(Direction::Forward, n, source);
        while !forward.queue.is_empty() {
            forward.settle_next(self.ch);
        }

        let results = targets
            .iter()
            .map(|&t| {
                let mut backward = SearchSide::new(Direction::Backward, n, t);
                let mut best = forward.dist[t as usize];
                while backward.min_key().is_some_and(|k| k < best) {
                    if let Some((u, d)) = backward.settle_next(self.ch) {
                        best = best.min(d + forward.dist[u as usize]);
                    }
                }
                best.is_finite().then_some(best)
            })
            .collect();

        tracing::debug!(
            source,
            targets = targets.len(),
            forward_settled = forward.settled,
            "one-to-many complete"
        );
        Ok(results)
    }

    fn check(&self, v: VertexId) -> Result<()> {
        if (v as usize) < self.ch.vertex_count() {
            Ok(())
        } else {
            Err(Error::UnknownVertex(v))
        }
    }

    fn route_inner(
        &self,
        source: VertexId,
        target: VertexId,
        cancel: Option<&AtomicBool>,
    ) -> Result<(Option<Route>, QueryStats)> {
        let Some(meeting) = self.search(source, target, cancel)? else {
            return Ok((None, QueryStats::default()));
        };
        let stats = QueryStats {
            settled_forward: meeting.forward.settled,
            settled_backward: meeting.backward.settled,
            stalled: meeting.forward.stalled + meeting.backward.stalled,
            relaxed: meeting.forward.relaxed + meeting.backward.relaxed,
        };

        let mut hierarchy_path = meeting.forward.chain(meeting.vertex);
        let mut down = meeting.backward.chain(meeting.vertex);
        down.pop();
        hierarchy_path.extend(down.into_iter().rev());

        let vertices = unpack_path(self.ch.graph(), &hierarchy_path)?;
        tracing::trace!(
            source,
            target,
            weight = meeting.weight,
            hierarchy_hops = hierarchy_path.len() - 1,
            hops = vertices.len() - 1,
            "route found"
        );
        Ok((
            Some(Route {
                weight: meeting.weight,
                vertices,
            }),
            stats,
        ))
    }

    fn search(
        &self,
        source: VertexId,
        target: VertexId,
        cancel: Option<&AtomicBool>,
    ) -> Result<Option<Meeting>> {
        self.check(source)?;
        self.check(target)?;

        let n = self.ch.vertex_count();
        let mut forward = SearchSide::new(Direction::Forward, n, source);
        let mut backward = SearchSide::new(Direction::Backward, n, target);
        let mut best = Weight::INFINITY;
        let mut meet = None;

        if source == target {
            return Ok(Some(Meeting {
                weight: 0.0,
                vertex: source,
                forward,
                backward,
            }));
        }

        loop {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                return Err(Error::Cancelled);
            }

            let f_key = forward.min_key().filter(|&k| k < best);
            let b_key = backward.min_key().filter(|&k| k < best);
            let (this, other) = match (f_key, b_key) {
                (None, None) => break,
                (Some(f), Some(b)) if b < f => (&mut backward, &forward),
                (Some(_), _) => (&mut forward, &backward),
                (None, Some(_)) => (&mut backward, &forward),
            };

            if let Some((u, d)) = this.settle_next(self.ch) {
                let total = d + other.dist[u as usize];
                if total < best {
                    best = total;
                    meet = Some(u);
                }
            }
        }

        Ok(meet.map(|vertex| Meeting {
            weight: best,
            vertex,
            forward,
            backward,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContractionConfig;

    fn path_hierarchy() -> ContractionHierarchy {
        let mut g = Graph::new();
        for i in 0..5 {
            g.add_vertex(0.0, i as f32);
        }
        for i in 0..4 {
            g.add_edge(i, i + 1, 1.0, true, true, None).unwrap();
        }
        ContractionHierarchy::build(g, &ContractionConfig::default()).unwrap()
    }

    #[test]
    fn test_route_along_path() {
        let ch = path_hierarchy();
        let route = ChQuery::new(&ch).route(0, 4).unwrap().unwrap();
        assert_eq!(route.weight, 4.0);
        assert_eq!(route.vertices, vec![0, 1, 2, 3, 4]);

        let back = ChQuery::new(&ch).route(4, 1).unwrap().unwrap();
        assert_eq!(back.weight, 3.0);
        assert_eq!(back.vertices, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_same_source_and_target() {
        let ch = path_hierarchy();
        let route = ChQuery::new(&ch).route(2, 2).unwrap().unwrap();
        assert_eq!(route.weight, 0.0);
        assert_eq!(route.vertices, vec![2]);
    }

    #[test]
    fn test_unknown_vertex() {
        let ch = path_hierarchy();
        let err = ChQuery::new(&ch).route(0, 17).unwrap_err();
        assert!(matches!(err, Error::UnknownVertex(17)));
    }

    #[test]
    fn test_one_way_unreachable() {
        let mut g = Graph::new();
        for _ in 0..3 {
            g.add_vertex(0.0, 0.0);
        }
        g.add_edge(0, 1, 1.0, true, false, None).unwrap();
        g.add_edge(1, 2, 1.0, true, false, None).unwrap();
        let ch = ContractionHierarchy::build(g, &ContractionConfig::default()).unwrap();
        let query = ChQuery::new(&ch);

        assert_eq!(query.distance(0, 2).unwrap(), Some(2.0));
        assert_eq!(query.distance(2, 0).unwrap(), None);
        assert_eq!(query.route(2, 0).unwrap(), None);
    }

    #[test]
    fn test_cancelled_query() {
        let ch = path_hierarchy();
        let cancel = AtomicBool::new(true);
        let err = ChQuery::new(&ch).route_cancellable(0, 4, &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));

        let go = AtomicBool::new(false);
        assert!(ChQuery::new(&ch).route_cancellable(0, 4, &go).unwrap().is_some());
    }

    #[test]
    fn test_one_to_many() {
        let ch = path_hierarchy();
        let dists = ChQuery::new(&ch).one_to_many(1, &[0, 1, 4]).unwrap();
        assert_eq!(dists, vec![Some(1.0), Some(0.0), Some(3.0)]);
    }

    #[test]
    fn test_stats_count_settled() {
        let ch = path_hierarchy();
        let (route, stats) = ChQuery::new(&ch).route_with_stats(0, 4).unwrap();
        assert!(route.is_some());
        assert!(stats.settled_forward + stats.settled_backward >= 2);
    }
}
