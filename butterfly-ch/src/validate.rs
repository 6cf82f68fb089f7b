//! Validation of CH correctness
//!
//! Compares CH distances against Dijkstra on the original graph and checks
//! every shortcut against the arcs it stands for.

use std::fmt;

use butterfly_common::{Error, Result};
use rand::prelude::*;
use rand::SeedableRng;

use crate::contraction::{ContractionHierarchy, HierarchyArc};
use crate::dijkstra;
use crate::graph::{Graph, VertexId, Weight};
use crate::query::ChQuery;

/// Distances closer than this count as equal
const WEIGHT_EPSILON: Weight = 1e-9;

/// Validate CH against Dijkstra on `n_tests` random pairs
pub fn validate_random_pairs(
    original: &Graph,
    ch: &ContractionHierarchy,
    n_tests: usize,
    seed: u64,
) -> Result<ValidationResult> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let n_vertices = original.vertex_count() as VertexId;
    if n_vertices == 0 {
        return Err(Error::EmptyGraph);
    }
    let query = ChQuery::new(ch);

    let mut result = ValidationResult {
        n_tests,
        ..Default::default()
    };

    tracing::info!(queries = n_tests, seed, "validating random queries");

    for i in 0..n_tests {
        let source = rng.random_range(0..n_vertices);
        let target = rng.random_range(0..n_vertices);

        let dijkstra_dist = dijkstra::distance(original, source, target)?;
        let ch_dist = query.distance(source, target)?;

        let agree = match (dijkstra_dist, ch_dist) {
            (None, None) => {
                result.unreachable_both += 1;
                true
            }
            (Some(a), Some(b)) => (a - b).abs() <= WEIGHT_EPSILON * a.max(1.0),
            _ => false,
        };
        if agree {
            result.correct += 1;
        } else {
            result.incorrect += 1;
            if result.errors.len() < 10 {
                result.errors.push(ValidationError {
                    source,
                    target,
                    dijkstra_dist,
                    ch_dist,
                });
            }
        }

        if (i + 1) % 100 == 0 {
            tracing::debug!(
                done = i + 1,
                total = n_tests,
                correct = result.correct,
                incorrect = result.incorrect,
                "validation progress"
            );
        }
    }

    Ok(result)
}

/// Check that every shortcut `u → w` via `v` has `v` below both endpoints
/// and weighs exactly `w(u, v) + w(v, w)`.
pub fn verify_shortcuts(ch: &ContractionHierarchy) -> ShortcutReport {
    let graph = ch.graph();
    let mut report = ShortcutReport::default();

    for arc in ch.shortcuts() {
        report.checked += 1;
        let Some(via) = arc.contracted_via else {
            continue;
        };
        let below = ch.level(via) < ch.level(arc.from) && ch.level(via) < ch.level(arc.to);
        let sound = below
            && match (graph.find_edge(arc.from, via), graph.find_edge(via, arc.to)) {
                (Some(first), Some(second)) => first.weight + second.weight == arc.weight,
                _ => false,
            };
        if !sound {
            report.unsound.push(arc);
        }
    }

    if !report.unsound.is_empty() {
        tracing::warn!(
            unsound = report.unsound.len(),
            checked = report.checked,
            "unsound shortcuts found"
        );
    }
    report
}

#[derive(Debug, Default)]
pub struct ValidationResult {
    pub n_tests: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub unreachable_both: usize,
    pub errors: Vec<ValidationError>,
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "CH vs Dijkstra over {} random pairs: {} agree, {} differ, {} unreachable in both",
            self.n_tests, self.correct, self.incorrect, self.unreachable_both
        )?;
        for err in &self.errors {
            writeln!(
                f,
                "  mismatch {} -> {}: dijkstra {:?}, ch {:?}",
                err.source, err.target, err.dijkstra_dist, err.ch_dist
            )?;
        }
        if self.is_valid() {
            write!(f, "distances agree")
        } else {
            write!(f, "distances disagree on {} pairs", self.incorrect)
        }
    }
}

impl ValidationResult {
    pub fn print(&self) {
        println!("{self}");
    }

    pub fn is_valid(&self) -> bool {
        self.incorrect == 0
    }
}

#[derive(Debug)]
pub struct ValidationError {
    pub source: VertexId,
    pub target: VertexId,
    pub dijkstra_dist: Option<Weight>,
    pub ch_dist: Option<Weight>,
}

#[derive(Debug, Default)]
pub struct ShortcutReport {
    pub checked: usize,
    pub unsound: Vec<HierarchyArc>,
}

impl ShortcutReport {
    pub fn is_sound(&self) -> bool {
        self.unsound.is_empty()
    }
}
