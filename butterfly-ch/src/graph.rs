//! Mutable graph store
//!
//! Array-backed directed multigraph keyed by dense `u32` vertex ids. Every
//! vertex owns one adjacency list; an entry `(target, weight, forward,
//! backward)` in the list of `u` means `u → target` is traversable when
//! `forward` is set and `target → u` is traversable when `backward` is set.
//!
//! While both endpoints are live each arc is stored twice: once in the list
//! of its tail and once, mirrored, in the list of its head. The mirrored copy
//! doubles as the incoming index used by backward searches. Contraction drops
//! the mirror held by the surviving neighbour, so in a finished hierarchy an
//! arc lives only in the list of its lower-level endpoint.
//!
//! Within one list there is at most one entry per `(target, direction)`.
//! Adding an arc that already exists keeps the lower weight.

use butterfly_common::{Error, Result};
use rustc_hash::FxHashMap;

pub type VertexId = u32;
pub type Weight = f64;

/// Geographic position of a vertex
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coordinate {
    pub lat: f32,
    pub lon: f32,
}

/// Traversal direction relative to the vertex owning an adjacency entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// owner → target
    Forward,
    /// target → owner
    Backward,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Adjacency entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub target: VertexId,
    pub weight: Weight,
    pub forward: bool,
    pub backward: bool,
    /// Vertex bypassed by this shortcut, `None` for original edges
    pub contracted_via: Option<VertexId>,
}

impl Edge {
    pub fn is_shortcut(&self) -> bool {
        self.contracted_via.is_some()
    }

    #[inline]
    pub fn allows(&self, direction: Direction) -> bool {
        match direction {
            Direction::Forward => self.forward,
            Direction::Backward => self.backward,
        }
    }

    fn set(&mut self, direction: Direction, value: bool) {
        match direction {
            Direction::Forward => self.forward = value,
            Direction::Backward => self.backward = value,
        }
    }

    fn is_empty(&self) -> bool {
        !self.forward && !self.backward
    }
}

/// What the duplicate-edge comparator did with an inserted arc
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    /// No arc existed in this direction
    Inserted,
    /// A heavier arc existed and was replaced
    Replaced,
    /// An arc at most as heavy existed; the new one was discarded
    Kept,
}

impl EdgeInsert {
    pub fn stored(self) -> bool {
        !matches!(self, EdgeInsert::Kept)
    }
}

/// Per-direction outcome of [`Graph::add_edge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeOutcome {
    pub forward: Option<EdgeInsert>,
    pub backward: Option<EdgeInsert>,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    coords: Vec<Coordinate>,
    adjacency: Vec<Vec<Edge>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n_vertices: usize) -> Self {
        Self {
            coords: Vec::with_capacity(n_vertices),
            adjacency: Vec::with_capacity(n_vertices),
        }
    }

    pub fn add_vertex(&mut self, lat: f32, lon: f32) -> VertexId {
        let id = self.coords.len() as VertexId;
        self.coords.push(Coordinate { lat, lon });
        self.adjacency.push(Vec::new());
        id
    }

    pub fn vertex_count(&self) -> usize {
        self.coords.len()
    }

    #[inline]
    pub fn contains(&self, v: VertexId) -> bool {
        (v as usize) < self.coords.len()
    }

    pub fn coordinate(&self, v: VertexId) -> Option<Coordinate> {
        self.coords.get(v as usize).copied()
    }

    /// All adjacency entries of `v`, both directions
    #[inline]
    pub fn edges(&self, v: VertexId) -> &[Edge] {
        self.adjacency
            .get(v as usize)
            .map_or(&[][..], |list| list.as_slice())
    }

    /// Entries `v → e.target`
    pub fn outgoing(&self, v: VertexId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges(v).iter().filter(|e| e.forward)
    }

    /// Entries `e.target → v`
    pub fn incoming(&self, v: VertexId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges(v).iter().filter(|e| e.backward)
    }

    /// Total number of adjacency entries
    pub fn entry_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    /// Number of directed arcs, assuming every arc is still mirrored
    /// (true for an uncontracted graph).
    pub fn edge_count(&self) -> usize {
        self.adjacency
            .iter()
            .flatten()
            .filter(|e| e.forward)
            .count()
    }

    /// Add an edge between two existing vertices.
    ///
    /// `forward` allows `from → to`, `backward` allows `to → from`. Each
    /// direction goes through the duplicate comparator independently.
    /// Self-loops are dropped. A negative, NaN or infinite weight is
    /// rejected before anything is stored.
    pub fn add_edge(
        &mut self,
        from: VertexId,
        to: VertexId,
        weight: Weight,
        forward: bool,
        backward: bool,
        contracted_via: Option<VertexId>,
    ) -> Result<EdgeOutcome> {
        for v in [from, to] {
            if !self.contains(v) {
                return Err(Error::UnknownVertex(v));
            }
        }
        if let Some(via) = contracted_via {
            if !self.contains(via) {
                return Err(Error::UnknownVertex(via));
            }
        }
        check_weight(from, to, weight)?;

        let mut outcome = EdgeOutcome::default();
        if from == to {
            tracing::trace!(vertex = from, "dropping self-loop");
            return Ok(outcome);
        }
        if forward {
            outcome.forward =
                Some(self.insert_arc(from, to, weight, Direction::Forward, contracted_via));
        }
        if backward {
            outcome.backward =
                Some(self.insert_arc(from, to, weight, Direction::Backward, contracted_via));
        }
        Ok(outcome)
    }

    /// Insert one direction of an arc on both endpoints. Callers guarantee
    /// the endpoints exist and differ.
    pub(crate) fn insert_arc(
        &mut self,
        from: VertexId,
        to: VertexId,
        weight: Weight,
        direction: Direction,
        via: Option<VertexId>,
    ) -> EdgeInsert {
        debug_assert_ne!(from, to);
        match self.position(from, to, direction) {
            Some(i) if self.adjacency[from as usize][i].weight <= weight => EdgeInsert::Kept,
            Some(_) => {
                self.clear_direction(from, to, direction);
                self.attach(from, to, weight, direction, via);
                self.attach(to, from, weight, direction.reversed(), via);
                EdgeInsert::Replaced
            }
            None => {
                self.attach(from, to, weight, direction, via);
                self.attach(to, from, weight, direction.reversed(), via);
                EdgeInsert::Inserted
            }
        }
    }

    /// Store one direction in the list of `owner` only, the layout of a
    /// finished hierarchy. Same comparator as [`Graph::insert_arc`].
    pub(crate) fn insert_one_sided(
        &mut self,
        owner: VertexId,
        target: VertexId,
        weight: Weight,
        direction: Direction,
        via: Option<VertexId>,
    ) -> EdgeInsert {
        debug_assert_ne!(owner, target);
        match self.position(owner, target, direction) {
            Some(i) if self.adjacency[owner as usize][i].weight <= weight => EdgeInsert::Kept,
            Some(i) => {
                let list = &mut self.adjacency[owner as usize];
                list[i].set(direction, false);
                if list[i].is_empty() {
                    list.swap_remove(i);
                }
                self.attach(owner, target, weight, direction, via);
                EdgeInsert::Replaced
            }
            None => {
                self.attach(owner, target, weight, direction, via);
                EdgeInsert::Inserted
            }
        }
    }

    /// Remove the whole `from`/`to` pair: arcs in both directions, including
    /// an independent one-way `to → from` arc, on both endpoints. Returns
    /// true if anything was removed.
    pub fn remove_edge(&mut self, from: VertexId, to: VertexId) -> bool {
        if !self.contains(from) || !self.contains(to) {
            return false;
        }
        let before = self.adjacency[from as usize].len() + self.adjacency[to as usize].len();
        self.adjacency[from as usize].retain(|e| e.target != to);
        self.adjacency[to as usize].retain(|e| e.target != from);
        let after = self.adjacency[from as usize].len() + self.adjacency[to as usize].len();
        before != after
    }

    /// Drop every entry pointing at `v` from its neighbours' lists. The list
    /// owned by `v` is left untouched and becomes its frozen hierarchy record.
    pub(crate) fn detach_from_neighbors(&mut self, v: VertexId) {
        let neighbors: Vec<VertexId> = self.adjacency[v as usize]
            .iter()
            .map(|e| e.target)
            .collect();
        for n in neighbors {
            self.adjacency[n as usize].retain(|e| e.target != v);
        }
    }

    /// Lowest-weight arc traversable `from → to`, looked up in the list of
    /// `from` first and then in the mirrored list of `to`.
    pub fn find_edge(&self, from: VertexId, to: VertexId) -> Option<Edge> {
        let own = self
            .edges(from)
            .iter()
            .filter(|e| e.target == to && e.forward)
            .min_by(|a, b| a.weight.total_cmp(&b.weight));
        if let Some(edge) = own {
            return Some(*edge);
        }
        self.edges(to)
            .iter()
            .filter(|e| e.target == from && e.backward)
            .min_by(|a, b| a.weight.total_cmp(&b.weight))
            .map(|e| Edge {
                target: to,
                weight: e.weight,
                forward: true,
                backward: false,
                contracted_via: e.contracted_via,
            })
    }

    /// Reject graphs contraction cannot handle. Weights are already
    /// checked on insertion, so only an empty graph is left to catch.
    pub fn validate(&self) -> Result<()> {
        if self.coords.is_empty() {
            return Err(Error::EmptyGraph);
        }
        Ok(())
    }

    fn position(&self, owner: VertexId, target: VertexId, direction: Direction) -> Option<usize> {
        self.adjacency[owner as usize]
            .iter()
            .position(|e| e.target == target && e.allows(direction))
    }

    /// Clear one direction of the `from`/`to` arc on both endpoints,
    /// dropping entries left with no direction.
    fn clear_direction(&mut self, from: VertexId, to: VertexId, direction: Direction) {
        for (owner, target, dir) in [(from, to, direction), (to, from, direction.reversed())] {
            if let Some(i) = self.position(owner, target, dir) {
                let list = &mut self.adjacency[owner as usize];
                list[i].set(dir, false);
                if list[i].is_empty() {
                    list.swap_remove(i);
                }
            }
        }
    }

    /// Add one direction to the list of `owner`, folding it into an entry
    /// for the opposite direction when weight and via vertex match.
    fn attach(
        &mut self,
        owner: VertexId,
        target: VertexId,
        weight: Weight,
        direction: Direction,
        via: Option<VertexId>,
    ) {
        let list = &mut self.adjacency[owner as usize];
        let opposite = direction.reversed();
        let twin = list.iter_mut().find(|e| {
            e.target == target
                && e.allows(opposite)
                && !e.allows(direction)
                && e.weight == weight
                && e.contracted_via == via
        });
        match twin {
            Some(e) => e.set(direction, true),
            None => {
                let mut edge = Edge {
                    target,
                    weight,
                    forward: false,
                    backward: false,
                    contracted_via: via,
                };
                edge.set(direction, true);
                list.push(edge);
            }
        }
    }
}

/// Non-negative and finite, the only weights a graph stores
pub(crate) fn check_weight(from: VertexId, to: VertexId, weight: Weight) -> Result<()> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidWeight { from, to, weight })
    }
}

/// Builds a [`Graph`] from externally produced vertex and edge tuples.
///
/// Vertices may arrive in any order but their ids must cover `0..n`
/// without gaps.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    vertices: FxHashMap<VertexId, Coordinate>,
    edges: Vec<(VertexId, VertexId, Weight, bool, bool)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex(&mut self, id: VertexId, lat: f32, lon: f32) -> Result<&mut Self> {
        if self.vertices.contains_key(&id) {
            return Err(Error::DuplicateVertex(id));
        }
        self.vertices.insert(id, Coordinate { lat, lon });
        Ok(self)
    }

    pub fn edge(
        &mut self,
        from: VertexId,
        to: VertexId,
        weight: Weight,
        forward: bool,
        backward: bool,
    ) -> &mut Self {
        self.edges.push((from, to, weight, forward, backward));
        self
    }

    pub fn build(self) -> Result<Graph> {
        self.build_with(|_, _, weight| weight)
    }

    /// Build with every edge weight passed through `weigh(from, to, raw)`,
    /// e.g. a vehicle profile turning lengths into travel times.
    pub fn build_with<F>(self, mut weigh: F) -> Result<Graph>
    where
        F: FnMut(Coordinate, Coordinate, Weight) -> Weight,
    {
        for &(from, to, ..) in &self.edges {
            for v in [from, to] {
                if !self.vertices.contains_key(&v) {
                    return Err(Error::UnknownVertex(v));
                }
            }
        }

        // n distinct ids are dense exactly when each of 0..n is present
        let n = self.vertices.len();
        let mut graph = Graph::with_capacity(n);
        for id in 0..n as VertexId {
            let coord = self.vertices.get(&id).ok_or_else(|| {
                Error::InvalidInput(format!("vertex ids must be dense, id {id} is missing"))
            })?;
            graph.add_vertex(coord.lat, coord.lon);
        }
        for (from, to, raw, forward, backward) in self.edges {
            let weight = weigh(graph.coords[from as usize], graph.coords[to as usize], raw);
            graph.add_edge(from, to, weight, forward, backward, None)?;
        }
        tracing::debug!(
            vertices = graph.vertex_count(),
            arcs = graph.edge_count(),
            "graph built from tuples"
        );
        Ok(graph)
    }
}
