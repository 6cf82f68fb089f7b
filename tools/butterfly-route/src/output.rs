//! CSV hierarchy export
//!
//! Arcs: `from,to,weight,contracted_via` (empty via for original arcs).
//! Levels: `id,level`.

use std::path::Path;

use anyhow::{Context, Result};
use butterfly_ch::{ContractionHierarchy, VertexId, Weight};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ArcRecord {
    pub(crate) from: VertexId,
    pub(crate) to: VertexId,
    pub(crate) weight: Weight,
    pub(crate) contracted_via: Option<VertexId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct LevelRecord {
    pub(crate) id: VertexId,
    pub(crate) level: u32,
}

/// Write every hierarchy arc, one row per direction. Returns the row count.
pub fn write_arcs(ch: &ContractionHierarchy, path: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut rows = 0;
    for arc in ch.arcs() {
        writer.serialize(ArcRecord {
            from: arc.from,
            to: arc.to,
            weight: arc.weight,
            contracted_via: arc.contracted_via,
        })?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

pub fn write_levels(ch: &ContractionHierarchy, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for (id, &level) in ch.levels().iter().enumerate() {
        writer.serialize(LevelRecord {
            id: id as VertexId,
            level,
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use butterfly_ch::{ContractionConfig, Graph};

    fn triangle() -> ContractionHierarchy {
        let mut g = Graph::new();
        for _ in 0..3 {
            g.add_vertex(0.0, 0.0);
        }
        g.add_edge(0, 1, 1.0, true, true, None).unwrap();
        g.add_edge(1, 2, 1.0, true, false, None).unwrap();
        ContractionHierarchy::build(g, &ContractionConfig::default()).unwrap()
    }

    #[test]
    fn test_write_arcs() {
        let ch = triangle();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arcs.csv");

        let rows = write_arcs(&ch, &path).unwrap();
        assert_eq!(rows, ch.arcs().count());

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("from,to,weight,contracted_via\n"));
        assert_eq!(text.lines().count(), rows + 1);
    }

    #[test]
    fn test_write_levels() {
        let ch = triangle();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("levels.csv");

        write_levels(&ch, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert_eq!(text.lines().next(), Some("id,level"));
    }
}
