//! Contraction parameters
//!
//! Loaded from TOML by the command-line tools; every field has a default so
//! a partial file (or none at all) works.

use std::path::Path;

use butterfly_common::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContractionConfig {
    /// Maximum number of arcs on a witness path
    pub witness_hop_limit: u32,
    /// Maximum number of vertices settled by one witness search
    pub witness_settle_limit: usize,
    /// Weight of shortcuts-added minus arcs-removed
    pub edge_difference_factor: f64,
    /// Weight of the number of already contracted neighbours
    pub contracted_neighbors_factor: f64,
    /// Weight of original edges represented by new shortcuts minus those
    /// carried by the removed arcs
    pub original_edges_factor: f64,
    /// Run witness searches for one vertex on the rayon pool
    pub parallel_witness: bool,
    /// Minimum number of candidate pairs before going parallel
    pub parallel_threshold: usize,
}

impl Default for ContractionConfig {
    fn default() -> Self {
        Self {
            witness_hop_limit: 10,
            witness_settle_limit: 1000,
            edge_difference_factor: 1.0,
            contracted_neighbors_factor: 1.0,
            original_edges_factor: 1.0,
            parallel_witness: true,
            parallel_threshold: 32,
        }
    }
}

impl ContractionConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| Error::InvalidInput(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.witness_hop_limit == 0 {
            return Err(Error::InvalidInput(
                "witness_hop_limit must be at least 1".into(),
            ));
        }
        if self.witness_settle_limit == 0 {
            return Err(Error::InvalidInput(
                "witness_settle_limit must be at least 1".into(),
            ));
        }
        let factors = [
            ("edge_difference_factor", self.edge_difference_factor),
            ("contracted_neighbors_factor", self.contracted_neighbors_factor),
            ("original_edges_factor", self.original_edges_factor),
        ];
        for (name, value) in factors {
            if !value.is_finite() {
                return Err(Error::InvalidInput(format!("{name} must be finite")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ContractionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.witness_hop_limit, 10);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ContractionConfig::from_toml_str(
            "witness_hop_limit = 4\nparallel_witness = false\n",
        )
        .unwrap();
        assert_eq!(config.witness_hop_limit, 4);
        assert!(!config.parallel_witness);
        assert_eq!(config.witness_settle_limit, 1000);
    }

    #[test]
    fn test_rejects_zero_hop_limit() {
        let err = ContractionConfig::from_toml_str("witness_hop_limit = 0").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_unknown_key() {
        assert!(ContractionConfig::from_toml_str("hop_limit = 3").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ch.toml");
        std::fs::write(&path, "edge_difference_factor = 2.5\n").unwrap();

        let config = ContractionConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.edge_difference_factor, 2.5);
    }
}
