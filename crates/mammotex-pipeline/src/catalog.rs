//! The canonical feature order.
//!
//! A [`FeatureCatalog`] is built once per run and handed to every aggregation
//! call. Aggregators index features positionally through it and never sort or
//! rediscover names themselves.
use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Result};

use crate::config::NamingConvention;
use crate::error::PipelineError;
use crate::io::artifacts::{parse_artifact, sorted_entries, ArtifactKind};

pub const MEAN_PREFIX: &str = "mean_";
pub const STD_PREFIX: &str = "std_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureCatalog {
    names: Vec<String>,
}

impl FeatureCatalog {
    /// Sorted, de-duplicated catalog from arbitrary names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        Self {
            names: names.into_iter().collect(),
        }
    }

    /// Catalog from names that must already be in canonical order.
    pub fn from_ordered(names: Vec<String>) -> Result<Self> {
        if let Some(pair) = names.windows(2).find(|w| w[0] >= w[1]) {
            bail!(
                "feature names are not in canonical order: '{}' precedes '{}'",
                pair[0],
                pair[1]
            );
        }
        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `(index, name)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.names.iter().map(String::as_str).enumerate()
    }

    /// Tabular column names: every `mean_<f>` followed by every `std_<f>`.
    pub fn column_names(&self) -> Vec<String> {
        self.names
            .iter()
            .map(|n| format!("{}{}", MEAN_PREFIX, n))
            .chain(self.names.iter().map(|n| format!("{}{}", STD_PREFIX, n)))
            .collect()
    }
}

/// Discover the catalog from the feature volume file names of one sample directory.
pub fn discover_feature_names(sample_dir: &Path, naming: &NamingConvention) -> Result<FeatureCatalog> {
    let mut names = Vec::new();
    for path in sorted_entries(sample_dir)? {
        if !path.is_file() {
            continue;
        }
        if let Some(artifact) = parse_artifact(&path, naming)? {
            if let ArtifactKind::Feature(name) = artifact.kind {
                names.push(name);
            }
        }
    }

    if names.is_empty() {
        return Err(PipelineError::MissingArtifact {
            dir: sample_dir.to_path_buf(),
            expected: format!("feature volumes matching '*{}*{}'", naming.feature_marker, naming.feature_suffix),
        }
        .into());
    }

    let catalog = FeatureCatalog::from_names(names);
    log::info!(
        "Discovered {} features in {}",
        catalog.len(),
        sample_dir.display()
    );
    log::debug!("Canonical feature order: {:?}", catalog.names());
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_sorted_and_unique() {
        let catalog = FeatureCatalog::from_names(["c", "a", "b", "a"]);
        assert_eq!(catalog.names(), &["a", "b", "c"]);
        let indexed: Vec<_> = catalog.iter().collect();
        assert_eq!(indexed, vec![(0, "a"), (1, "b"), (2, "c")]);
    }

    #[test]
    fn column_names_put_all_means_before_stds() {
        let catalog = FeatureCatalog::from_names(["b", "a"]);
        assert_eq!(
            catalog.column_names(),
            vec!["mean_a", "mean_b", "std_a", "std_b"]
        );
    }

    #[test]
    fn from_ordered_rejects_unsorted_input() {
        assert!(FeatureCatalog::from_ordered(vec!["b".into(), "a".into()]).is_err());
        assert!(FeatureCatalog::from_ordered(vec!["a".into(), "a".into()]).is_err());
        assert!(FeatureCatalog::from_ordered(vec!["a".into(), "b".into()]).is_ok());
    }

    #[test]
    fn discovery_reads_feature_file_names() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "R_MLO_feature_zeta.npy",
            "R_MLO_feature_alpha.npy",
            "R_MLO_mask.npy",
            "R_MLO_mean.csv",
        ] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let catalog = discover_feature_names(dir.path(), &NamingConvention::default()).unwrap();
        assert_eq!(catalog.names(), &["alpha", "zeta"]);
    }

    #[test]
    fn discovery_fails_on_malformed_feature_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("R_MLO_feature_alpha.npy"), b"").unwrap();
        std::fs::write(dir.path().join("R_MLO_feature_beta.tif"), b"").unwrap();
        let err = discover_feature_names(dir.path(), &NamingConvention::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NamingConvention { .. })
        ));
    }
}
