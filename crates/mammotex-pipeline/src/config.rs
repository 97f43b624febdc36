use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration for one pipeline run.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base directory laid out as `<patient_id>/<sample>/`.
    pub data_dir: PathBuf,
    pub labels: LabelSource,
    pub naming: NamingConvention,
    pub split: SplitConfig,
    pub imaging: ImagingConfig,
    pub evaluation: EvaluationConfig,
    /// Destination for feature tables, partition records, arrays and models.
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            labels: LabelSource::default(),
            naming: NamingConvention::default(),
            split: SplitConfig::default(),
            imaging: ImagingConfig::default(),
            evaluation: EvaluationConfig::default(),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl PipelineConfig {
    pub fn feature_table_path(&self) -> PathBuf {
        self.output_dir.join("features.csv")
    }

    pub fn train_record_path(&self) -> PathBuf {
        self.output_dir.join("train_patients.csv")
    }

    pub fn test_record_path(&self) -> PathBuf {
        self.output_dir.join("test_patients.csv")
    }

    pub fn evaluation_path(&self) -> PathBuf {
        self.output_dir.join("evaluation.csv")
    }

    pub fn model_dir(&self) -> PathBuf {
        self.output_dir.join("models")
    }

    pub fn tensor_dir(&self) -> PathBuf {
        self.output_dir.join("tensors")
    }
}

/// Load a pipeline configuration from a JSON file.
pub fn load_pipeline_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: PipelineConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

/// Where case/control labels come from.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct LabelSource {
    pub path: PathBuf,
    pub patient_id_column: String,
    pub label_column: String,
    pub delimiter: char,
}

impl Default for LabelSource {
    fn default() -> Self {
        Self {
            path: PathBuf::from("labels.csv"),
            patient_id_column: "patient_id".to_string(),
            label_column: "case_status".to_string(),
            delimiter: ',',
        }
    }
}

/// File name patterns inside a sample directory.
///
/// A feature volume is named `<anything><feature_marker><feature name><feature_suffix>`,
/// e.g. `L_CC_feature_glcm_contrast.npy`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct NamingConvention {
    pub feature_marker: String,
    pub feature_suffix: String,
    pub mask_suffix: String,
    pub mean_suffix: String,
    pub std_suffix: String,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            feature_marker: "_feature_".to_string(),
            feature_suffix: ".npy".to_string(),
            mask_suffix: "_mask.npy".to_string(),
            mean_suffix: "_mean.csv".to_string(),
            std_suffix: "_std.csv".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SplitConfig {
    pub train_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.8,
            seed: 42,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ImagingConfig {
    pub crop_height: usize,
    pub crop_width: usize,
    pub epsilon: f32,
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            crop_height: 512,
            crop_width: 256,
            epsilon: 1e-8,
        }
    }
}

impl ImagingConfig {
    pub fn crop_shape(&self) -> (usize, usize) {
        (self.crop_height, self.crop_width)
    }
}

/// Which model output the AUC is computed from.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AucSource {
    /// Predicted case probabilities.
    Scores,
    /// Hard 0/1 predictions at a 0.5 threshold.
    Labels,
}

/// Elastic-net based feature selection: columns whose coefficient is
/// driven to zero are dropped.
#[cfg(feature = "linfa")]
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ElasticNetSelection {
    pub penalty: f64,
    pub l1_ratio: f64,
}

#[cfg(feature = "linfa")]
impl Default for ElasticNetSelection {
    fn default() -> Self {
        Self {
            penalty: 0.01,
            l1_ratio: 0.5,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct EvaluationConfig {
    pub scale_features: bool,
    pub select_k_best: Option<usize>,
    #[cfg(feature = "linfa")]
    pub elastic_net: Option<ElasticNetSelection>,
    /// Number of principal components kept ahead of the classifier.
    #[cfg(feature = "linfa")]
    pub pca_components: Option<usize>,
    pub auc_source: AucSource,
    pub models: Vec<ModelConfig>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        let mut models = vec![ModelConfig::default()];
        #[cfg(feature = "linfa")]
        models.push(ModelConfig::new(0.1, ModelType::default_logistic()));
        Self {
            scale_features: true,
            select_k_best: None,
            #[cfg(feature = "linfa")]
            elastic_net: None,
            #[cfg(feature = "linfa")]
            pca_components: None,
            auc_source: AucSource::Labels,
            models,
        }
    }
}

/// Central configuration for one classifier.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModelConfig {
    pub learning_rate: f32,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported model types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    GBDT {
        max_depth: u32,
        num_boost_round: u32,
        debug: bool,
        training_optimization_level: u8,
        loss_type: String,
    },
    #[cfg(feature = "linfa")]
    Logistic {
        alpha: f64,
        max_iterations: u64,
        gradient_tolerance: f64,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::GBDT {
            max_depth: 6,
            num_boost_round: 50,
            debug: false,
            training_optimization_level: 2,
            loss_type: "LogLikelyhood".to_string(),
        }
    }
}

impl ModelType {
    #[cfg(feature = "linfa")]
    pub fn default_logistic() -> Self {
        ModelType::Logistic {
            alpha: 1.0,
            max_iterations: 100,
            gradient_tolerance: 1e-4,
        }
    }

    /// Short identifier used for artifact file names and reports.
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::GBDT { .. } => "gbdt",
            #[cfg(feature = "linfa")]
            ModelType::Logistic { .. } => "logistic",
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gbdt" => Ok(ModelType::default()),
            #[cfg(feature = "linfa")]
            "logistic" => Ok(ModelType::default_logistic()),
            _ => Err(format!(
                "Unknown model type: {}. To use logistic, please compile with `--features linfa`",
                s
            )),
        }
    }
}

impl ModelConfig {
    pub fn new(learning_rate: f32, model_type: ModelType) -> Self {
        Self {
            learning_rate,
            model_type,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            model_type: ModelType::default(),
        }
    }
}
