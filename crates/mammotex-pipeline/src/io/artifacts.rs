//! Sample directory file naming.
//!
//! Every file in a sample directory is classified exactly once, by
//! [`parse_artifact`], into an [`Artifact`] descriptor. Everything downstream
//! dispatches on [`ArtifactKind`] and never looks at file names again.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::NamingConvention;
use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArtifactKind {
    Mean,
    Std,
    Mask,
    Feature(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

/// Classify one file name.
///
/// Returns `Ok(None)` for files that do not claim any artifact role. A name that
/// carries the feature marker but cannot yield a feature name is a
/// `PipelineError::NamingConvention` error rather than a skip, since dropping it
/// would silently change the catalog.
pub fn parse_artifact(path: &Path, naming: &NamingConvention) -> Result<Option<Artifact>> {
    let file_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => {
            return Err(PipelineError::NamingConvention {
                file_name: path.display().to_string(),
                reason: "file name is not valid UTF-8".to_string(),
            }
            .into())
        }
    };

    let kind = if let Some(marker_at) = file_name.find(naming.feature_marker.as_str()) {
        let rest = &file_name[marker_at + naming.feature_marker.len()..];
        let name = rest.strip_suffix(naming.feature_suffix.as_str()).ok_or_else(|| {
            PipelineError::NamingConvention {
                file_name: file_name.to_string(),
                reason: format!("expected suffix '{}'", naming.feature_suffix),
            }
        })?;
        if name.is_empty() {
            return Err(PipelineError::NamingConvention {
                file_name: file_name.to_string(),
                reason: "empty feature name".to_string(),
            }
            .into());
        }
        ArtifactKind::Feature(name.to_string())
    } else if file_name.ends_with(naming.mask_suffix.as_str()) {
        ArtifactKind::Mask
    } else if file_name.ends_with(naming.mean_suffix.as_str()) {
        ArtifactKind::Mean
    } else if file_name.ends_with(naming.std_suffix.as_str()) {
        ArtifactKind::Std
    } else {
        return Ok(None);
    };

    Ok(Some(Artifact {
        kind,
        path: path.to_path_buf(),
    }))
}

/// All artifacts of one sample directory, grouped by role.
#[derive(Debug, Clone, Default)]
pub struct SampleArtifacts {
    pub dir: PathBuf,
    pub mean: Option<PathBuf>,
    pub std: Option<PathBuf>,
    pub mask: Option<PathBuf>,
    pub features: BTreeMap<String, PathBuf>,
}

impl SampleArtifacts {
    pub fn mean_table(&self) -> Result<&Path> {
        self.require(self.mean.as_deref(), "mean statistics table")
    }

    pub fn std_table(&self) -> Result<&Path> {
        self.require(self.std.as_deref(), "std statistics table")
    }

    pub fn mask_volume(&self) -> Result<&Path> {
        self.require(self.mask.as_deref(), "mask volume")
    }

    pub fn feature_volume(&self, feature: &str) -> Result<&Path> {
        self.features
            .get(feature)
            .map(PathBuf::as_path)
            .ok_or_else(|| {
                PipelineError::MissingArtifact {
                    dir: self.dir.clone(),
                    expected: format!("feature volume '{}'", feature),
                }
                .into()
            })
    }

    fn require<'a>(&self, path: Option<&'a Path>, expected: &str) -> Result<&'a Path> {
        path.ok_or_else(|| {
            PipelineError::MissingArtifact {
                dir: self.dir.clone(),
                expected: expected.to_string(),
            }
            .into()
        })
    }
}

/// Classify every file of `dir`.
pub fn scan_sample_dir(dir: &Path, naming: &NamingConvention) -> Result<SampleArtifacts> {
    let mut artifacts = SampleArtifacts {
        dir: dir.to_path_buf(),
        ..Default::default()
    };

    for path in sorted_entries(dir)? {
        if !path.is_file() {
            continue;
        }
        let Some(artifact) = parse_artifact(&path, naming)? else {
            log::warn!("Ignoring unrecognized file {}", path.display());
            continue;
        };

        let role = describe_slot(&artifact.kind);
        let slot = match artifact.kind {
            ArtifactKind::Mean => &mut artifacts.mean,
            ArtifactKind::Std => &mut artifacts.std,
            ArtifactKind::Mask => &mut artifacts.mask,
            ArtifactKind::Feature(name) => {
                if artifacts.features.insert(name.clone(), artifact.path).is_some() {
                    return Err(PipelineError::AmbiguousArtifact {
                        dir: dir.to_path_buf(),
                        expected: format!("feature volume '{}'", name),
                    }
                    .into());
                }
                continue;
            }
        };
        if slot.replace(artifact.path).is_some() {
            return Err(PipelineError::AmbiguousArtifact {
                dir: dir.to_path_buf(),
                expected: role.to_string(),
            }
            .into());
        }
    }

    Ok(artifacts)
}

fn describe_slot(kind: &ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Mean => "mean statistics table",
        ArtifactKind::Std => "std statistics table",
        ArtifactKind::Mask => "mask volume",
        ArtifactKind::Feature(_) => "feature volume",
    }
}

/// Directory entries of `dir` in lexicographic path order.
pub(crate) fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("Failed to list directory: {}", dir.display()))?;
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(name: &str) -> Result<Option<ArtifactKind>> {
        let naming = NamingConvention::default();
        Ok(parse_artifact(Path::new(name), &naming)?.map(|a| a.kind))
    }

    #[test]
    fn classifies_each_role() {
        assert_eq!(
            kind_of("L_CC_feature_glcm_contrast.npy").unwrap(),
            Some(ArtifactKind::Feature("glcm_contrast".to_string()))
        );
        assert_eq!(kind_of("L_CC_mask.npy").unwrap(), Some(ArtifactKind::Mask));
        assert_eq!(kind_of("L_CC_mean.csv").unwrap(), Some(ArtifactKind::Mean));
        assert_eq!(kind_of("L_CC_std.csv").unwrap(), Some(ArtifactKind::Std));
        assert_eq!(kind_of("notes.txt").unwrap(), None);
    }

    #[test]
    fn malformed_feature_names_are_errors() {
        for name in ["L_CC_feature_contrast.png", "L_CC_feature_.npy"] {
            let err = kind_of(name).unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<PipelineError>(),
                    Some(PipelineError::NamingConvention { .. })
                ),
                "{} should violate the naming convention",
                name
            );
        }
    }

    #[test]
    fn missing_role_is_missing_artifact() {
        let artifacts = SampleArtifacts {
            dir: PathBuf::from("/data/7/L_CC"),
            ..Default::default()
        };
        let err = artifacts.mask_volume().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingArtifact { .. })
        ));
    }
}
