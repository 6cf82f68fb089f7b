//! CSV graph and hierarchy input
//!
//! Nodes: `id,lat,lon`. Edges: `from,to,weight,forward,backward` with
//! `true`/`false` flags. A stored hierarchy is read back from the arc and
//! level files written by [`crate::output`]. Every file needs a header row.

use std::path::Path;

use anyhow::{bail, Context, Result};
use butterfly_ch::{
    ContractionHierarchy, Coordinate, Graph, GraphBuilder, HierarchyArc, VertexId, Weight,
};
use butterfly_common::Error;
use serde::Deserialize;

use crate::output::{ArcRecord, LevelRecord};

#[derive(Debug, Deserialize)]
struct NodeRecord {
    id: VertexId,
    lat: f32,
    lon: f32,
}

#[derive(Debug, Deserialize)]
struct EdgeRecord {
    from: VertexId,
    to: VertexId,
    weight: Weight,
    forward: bool,
    backward: bool,
}

fn read_nodes(nodes: &Path, builder: &mut GraphBuilder) -> Result<usize> {
    let mut reader = csv::Reader::from_path(nodes)
        .with_context(|| format!("Failed to open {}", nodes.display()))?;
    let mut n_nodes = 0usize;
    for (row, record) in reader.deserialize::<NodeRecord>().enumerate() {
        let node = record.with_context(|| format!("{}: bad row {}", nodes.display(), row + 1))?;
        builder
            .vertex(node.id, node.lat, node.lon)
            .with_context(|| format!("{}: row {}", nodes.display(), row + 1))?;
        n_nodes += 1;
    }
    Ok(n_nodes)
}

/// Load a graph from node and edge CSV files
pub fn load_graph(nodes: &Path, edges: &Path) -> Result<Graph> {
    let mut builder = GraphBuilder::new();
    let n_nodes = read_nodes(nodes, &mut builder)?;

    let mut reader = csv::Reader::from_path(edges)
        .with_context(|| format!("Failed to open {}", edges.display()))?;
    let mut n_edges = 0usize;
    for (row, record) in reader.deserialize::<EdgeRecord>().enumerate() {
        let edge = record.with_context(|| format!("{}: bad row {}", edges.display(), row + 1))?;
        builder.edge(edge.from, edge.to, edge.weight, edge.forward, edge.backward);
        n_edges += 1;
    }

    tracing::info!(nodes = n_nodes, edges = n_edges, "read CSV input");
    let graph = builder.build().context("Invalid graph input")?;
    Ok(graph)
}

/// Load a hierarchy written by `build --arcs --levels`, skipping
/// contraction. Rows are checked the same way as
/// [`ContractionHierarchy::from_arcs`].
pub fn load_hierarchy(nodes: &Path, arcs: &Path, levels: &Path) -> Result<ContractionHierarchy> {
    let mut builder = GraphBuilder::new();
    read_nodes(nodes, &mut builder)?;
    let vertices = builder.build().context("Invalid node input")?;
    let n = vertices.vertex_count();
    let coords: Vec<Coordinate> = (0..n as VertexId)
        .filter_map(|v| vertices.coordinate(v))
        .collect();

    let mut slots: Vec<Option<u32>> = vec![None; n];
    let mut reader = csv::Reader::from_path(levels)
        .with_context(|| format!("Failed to open {}", levels.display()))?;
    for (row, record) in reader.deserialize::<LevelRecord>().enumerate() {
        let rec = record.with_context(|| format!("{}: bad row {}", levels.display(), row + 1))?;
        match slots.get_mut(rec.id as usize) {
            Some(slot) if slot.is_none() => *slot = Some(rec.level),
            Some(_) => return Err(Error::DuplicateVertex(rec.id).into()),
            None => return Err(Error::UnknownVertex(rec.id).into()),
        }
    }
    let Some(levels_by_id) = slots.into_iter().collect::<Option<Vec<u32>>>() else {
        bail!("{}: every vertex needs a level", levels.display());
    };

    let mut reader = csv::Reader::from_path(arcs)
        .with_context(|| format!("Failed to open {}", arcs.display()))?;
    let mut rows = Vec::new();
    for (row, record) in reader.deserialize::<ArcRecord>().enumerate() {
        let rec = record.with_context(|| format!("{}: bad row {}", arcs.display(), row + 1))?;
        rows.push(HierarchyArc {
            from: rec.from,
            to: rec.to,
            weight: rec.weight,
            contracted_via: rec.contracted_via,
        });
    }

    let n_arcs = rows.len();
    let ch = ContractionHierarchy::from_arcs(&coords, rows, levels_by_id)
        .context("Invalid hierarchy input")?;
    tracing::info!(vertices = n, arcs = n_arcs, "loaded stored hierarchy");
    Ok(ch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_graph() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = write(dir.path(), "nodes.csv", "id,lat,lon\n1,50.1,4.1\n0,50.0,4.0\n2,50.2,4.2\n");
        let edges = write(
            dir.path(),
            "edges.csv",
            "from,to,weight,forward,backward\n0,1,12.5,true,true\n1,2,3,true,false\n",
        );

        let g = load_graph(&nodes, &edges).unwrap();
        assert_eq!(g.vertex_count(), 3);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.find_edge(1, 0).map(|e| e.weight), Some(12.5));
        assert!(g.find_edge(2, 1).is_none());
    }

    #[test]
    fn test_unknown_vertex_in_edges() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = write(dir.path(), "nodes.csv", "id,lat,lon\n0,50.0,4.0\n");
        let edges = write(
            dir.path(),
            "edges.csv",
            "from,to,weight,forward,backward\n0,7,1,true,true\n",
        );

        let err = load_graph(&nodes, &edges).unwrap_err();
        let root = err.downcast_ref::<butterfly_common::Error>();
        assert!(matches!(root, Some(butterfly_common::Error::UnknownVertex(7))));
    }

    #[test]
    fn test_malformed_row() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = write(dir.path(), "nodes.csv", "id,lat,lon\nzero,50.0,4.0\n");
        let edges = write(dir.path(), "edges.csv", "from,to,weight,forward,backward\n");

        let err = load_graph(&nodes, &edges).unwrap_err();
        assert!(err.to_string().contains("bad row 1"));
    }

    #[test]
    fn test_nan_weight_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = write(dir.path(), "nodes.csv", "id,lat,lon\n0,50.0,4.0\n1,50.1,4.1\n");
        let edges = write(
            dir.path(),
            "edges.csv",
            "from,to,weight,forward,backward\n0,1,NaN,true,false\n0,1,2,true,false\n",
        );

        let err = load_graph(&nodes, &edges).unwrap_err();
        let root = err.downcast_ref::<butterfly_common::Error>();
        assert!(matches!(root, Some(butterfly_common::Error::InvalidWeight { .. })));
    }

    #[test]
    fn test_load_hierarchy_round_trip() {
        use butterfly_ch::{ChQuery, ContractionConfig};

        let dir = tempfile::tempdir().unwrap();
        let nodes = write(
            dir.path(),
            "nodes.csv",
            "id,lat,lon\n0,50.0,4.0\n1,50.0,4.1\n2,50.0,4.2\n3,50.0,4.3\n4,50.1,4.2\n",
        );
        let edges = write(
            dir.path(),
            "edges.csv",
            "from,to,weight,forward,backward\n0,1,1,true,true\n1,2,1,true,true\n2,3,1,true,true\n1,4,3,true,false\n4,3,1,true,true\n",
        );
        let graph = load_graph(&nodes, &edges).unwrap();
        let ch = ContractionHierarchy::build(graph, &ContractionConfig::default()).unwrap();

        let arcs = dir.path().join("arcs.csv");
        let levels = dir.path().join("levels.csv");
        crate::write_arcs(&ch, &arcs).unwrap();
        crate::write_levels(&ch, &levels).unwrap();

        let loaded = load_hierarchy(&nodes, &arcs, &levels).unwrap();
        assert_eq!(loaded.levels(), ch.levels());
        let (built, stored) = (ChQuery::new(&ch), ChQuery::new(&loaded));
        for s in 0..5 {
            for t in 0..5 {
                assert_eq!(
                    stored.distance(s, t).unwrap(),
                    built.distance(s, t).unwrap(),
                    "{s} -> {t}"
                );
            }
        }
    }

    #[test]
    fn test_load_hierarchy_rejects_bad_levels() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = write(dir.path(), "nodes.csv", "id,lat,lon\n0,50.0,4.0\n1,50.1,4.1\n");
        let arcs = write(dir.path(), "arcs.csv", "from,to,weight,contracted_via\n0,1,2,\n");

        let missing = write(dir.path(), "missing.csv", "id,level\n0,0\n");
        assert!(load_hierarchy(&nodes, &arcs, &missing).is_err());

        let unknown = write(dir.path(), "unknown.csv", "id,level\n0,0\n5,1\n");
        let err = load_hierarchy(&nodes, &arcs, &unknown).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<butterfly_common::Error>(),
            Some(butterfly_common::Error::UnknownVertex(5))
        ));

        let flat = write(dir.path(), "flat.csv", "id,level\n0,1\n1,1\n");
        assert!(load_hierarchy(&nodes, &arcs, &flat).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.csv");
        assert!(load_graph(&missing, &missing).is_err());
    }
}
