//! Fixed-split evaluation of classifier pipelines.
//!
//! Every configured model is fitted on the training rows only and scored on
//! the test rows. There is no hyper-parameter search and no cross-validation.
use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "linfa")]
use crate::config::ElasticNetSelection;
use crate::config::{AucSource, EvaluationConfig, ModelConfig};
use crate::data_handling::TabularDataset;
#[cfg(feature = "linfa")]
use crate::decomposition::PcaProjection;
use crate::error::PipelineError;
#[cfg(feature = "linfa")]
use crate::feature_selection::ElasticNetSelector;
use crate::feature_selection::SelectKBest;
use crate::metrics::{accuracy, roc_auc};
use crate::models::{build_model, ClassifierModel};
use crate::preprocessing::Scaler;

/// Optional scaling, feature selection and PCA ahead of a classifier.
///
/// Steps run in the order scaling, `SelectKBest`, elastic-net selection, PCA.
/// Transform steps are fitted during [`Pipeline::fit`] and reused unchanged
/// for prediction.
pub struct Pipeline {
    scale_features: bool,
    scaler: Option<Scaler>,
    selector: Option<SelectKBest>,
    #[cfg(feature = "linfa")]
    elastic_net: Option<ElasticNetSelector>,
    #[cfg(feature = "linfa")]
    pca: Option<PcaProjection>,
    model: Box<dyn ClassifierModel>,
}

impl Pipeline {
    pub fn new(model: Box<dyn ClassifierModel>, scale_features: bool, select_k_best: Option<usize>) -> Self {
        Self {
            scale_features,
            scaler: None,
            selector: select_k_best.map(SelectKBest::new),
            #[cfg(feature = "linfa")]
            elastic_net: None,
            #[cfg(feature = "linfa")]
            pca: None,
            model,
        }
    }

    #[cfg(feature = "linfa")]
    pub fn with_elastic_net(mut self, selection: Option<ElasticNetSelection>) -> Self {
        self.elastic_net = selection.map(ElasticNetSelector::new);
        self
    }

    #[cfg(feature = "linfa")]
    pub fn with_pca(mut self, n_components: Option<usize>) -> Self {
        self.pca = n_components.map(PcaProjection::new);
        self
    }

    pub fn from_config(model: &ModelConfig, evaluation: &EvaluationConfig) -> Self {
        let pipeline = Self::new(
            build_model(model),
            evaluation.scale_features,
            evaluation.select_k_best,
        );
        #[cfg(feature = "linfa")]
        let pipeline = pipeline
            .with_elastic_net(evaluation.elastic_net)
            .with_pca(evaluation.pca_components);
        pipeline
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    pub fn model(&self) -> &dyn ClassifierModel {
        self.model.as_ref()
    }

    pub fn fit(&mut self, x: &Array2<f32>, y: &[i32]) -> Result<()> {
        let mut x = x.to_owned();
        if self.scale_features {
            let scaler = Scaler::fit(&x)?;
            x = scaler.transform(&x)?;
            self.scaler = Some(scaler);
        }
        if let Some(selector) = self.selector.as_mut() {
            selector.fit(&x, y)?;
            x = selector.transform(&x)?;
        }
        #[cfg(feature = "linfa")]
        {
            if let Some(selector) = self.elastic_net.as_mut() {
                selector.fit(&x, y)?;
                x = selector.transform(&x)?;
            }
            if let Some(pca) = self.pca.as_mut() {
                pca.fit(&x)?;
                x = pca.transform(&x)?;
            }
        }
        self.model.fit(&x, y)
    }

    fn prepare(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        let mut x = x.to_owned();
        if self.scale_features {
            let scaler = self
                .scaler
                .as_ref()
                .ok_or_else(|| PipelineError::ModelNotFitted(self.name().to_string()))?;
            x = scaler.transform(&x)?;
        }
        if let Some(selector) = &self.selector {
            x = selector.transform(&x)?;
        }
        #[cfg(feature = "linfa")]
        {
            if let Some(selector) = &self.elastic_net {
                x = selector.transform(&x)?;
            }
            if let Some(pca) = &self.pca {
                x = pca.transform(&x)?;
            }
        }
        Ok(x)
    }

    pub fn predict_proba(&self, x: &Array2<f32>) -> Result<Vec<f32>> {
        self.model.predict_proba(&self.prepare(x)?)
    }

    pub fn predict(&self, x: &Array2<f32>) -> Result<Vec<i32>> {
        self.model.predict(&self.prepare(x)?)
    }

    /// Log what each fitted transform step kept.
    pub fn log_fitted_steps(&self) {
        if let Some(selector) = &self.selector {
            log::info!(
                "{}: SelectKBest (k = {}) kept columns {:?}",
                self.name(),
                selector.k(),
                selector.selected().unwrap_or_default()
            );
        }
        #[cfg(feature = "linfa")]
        {
            if let Some(selector) = &self.elastic_net {
                log::info!(
                    "{}: elastic net kept columns {:?}",
                    self.name(),
                    selector.selected().unwrap_or_default()
                );
            }
            if let Some(pca) = &self.pca {
                log::info!("{}: PCA with {} components", self.name(), pca.n_components());
            }
        }
    }
}

/// Fails with `NonFiniteValue` on the first NaN or infinite entry of `x`.
fn ensure_finite(x: &Array2<f32>, what: &str) -> Result<()> {
    if let Some(((row, col), _)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(PipelineError::NonFiniteValue(format!("{} row {} column {}", what, row, col)).into());
    }
    Ok(())
}

/// Test-set metrics of one fitted pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub model: String,
    pub accuracy: f64,
    pub auc: f64,
    pub n_train: usize,
    pub n_test: usize,
}

/// Fit `pipeline` on the training rows and score it on the test rows.
pub fn evaluate(
    pipeline: &mut Pipeline,
    train_x: &Array2<f32>,
    train_y: &[i32],
    test_x: &Array2<f32>,
    test_y: &[i32],
    auc_source: AucSource,
) -> Result<EvaluationResult> {
    if train_x.ncols() != test_x.ncols() {
        bail!(
            "train has {} columns but test has {}",
            train_x.ncols(),
            test_x.ncols()
        );
    }
    ensure_finite(train_x, "training features")?;
    ensure_finite(test_x, "test features")?;
    pipeline
        .fit(train_x, train_y)
        .with_context(|| format!("Failed to fit {}", pipeline.name()))?;

    let predicted = pipeline.predict(test_x)?;
    let accuracy = accuracy(test_y, &predicted)?;

    let scores: Vec<f64> = match auc_source {
        AucSource::Scores => pipeline
            .predict_proba(test_x)?
            .into_iter()
            .map(f64::from)
            .collect(),
        AucSource::Labels => predicted.iter().map(|&p| f64::from(p)).collect(),
    };
    let truth: Vec<bool> = test_y.iter().map(|&l| l == 1).collect();
    let auc = if truth.iter().all(|&t| t) || truth.iter().all(|&t| !t) {
        log::warn!(
            "{}: test labels hold a single class, AUC is undefined",
            pipeline.name()
        );
        f64::NAN
    } else {
        roc_auc(&scores, &truth)?
    };

    Ok(EvaluationResult {
        model: pipeline.name().to_string(),
        accuracy,
        auc,
        n_train: train_x.nrows(),
        n_test: test_x.nrows(),
    })
}

/// Evaluate every configured model on the same split.
///
/// When `model_dir` is given, each fitted model is saved there as
/// `<name>.model`; repeated names get a numeric suffix.
pub fn evaluate_models(
    config: &EvaluationConfig,
    train_x: &Array2<f32>,
    train_y: &[i32],
    test_x: &Array2<f32>,
    test_y: &[i32],
    model_dir: Option<&Path>,
) -> Result<Vec<EvaluationResult>> {
    if config.models.is_empty() {
        return Err(PipelineError::EmptyInput("no models configured".to_string()).into());
    }
    if let Some(dir) = model_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create model directory: {}", dir.display()))?;
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut results = Vec::with_capacity(config.models.len());
    for model_config in &config.models {
        let mut pipeline = Pipeline::from_config(model_config, config);
        log::info!(
            "Evaluating {} (scale: {}, select_k_best: {:?})",
            pipeline.name(),
            config.scale_features,
            config.select_k_best
        );
        let mut result = evaluate(
            &mut pipeline,
            train_x,
            train_y,
            test_x,
            test_y,
            config.auc_source,
        )?;
        pipeline.log_fitted_steps();

        let count = seen.entry(result.model.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            result.model = format!("{}_{}", result.model, count);
        }

        if let Some(dir) = model_dir {
            let path = dir.join(format!("{}.model", result.model));
            pipeline.model().save(&path)?;
            log::info!("Saved {} to {}", result.model, path.display());
        }
        results.push(result);
    }

    log_results(&results);
    Ok(results)
}

/// Evaluate every configured model on partitioned tabular datasets.
pub fn evaluate_tabular(
    config: &EvaluationConfig,
    train: &TabularDataset,
    test: &TabularDataset,
    model_dir: Option<&Path>,
) -> Result<Vec<EvaluationResult>> {
    if train.is_empty() || test.is_empty() {
        return Err(PipelineError::EmptyInput(format!(
            "need samples on both sides, got {} train and {} test",
            train.len(),
            test.len()
        ))
        .into());
    }
    let (train_x, train_y) = train.to_matrix()?;
    let (test_x, test_y) = test.to_matrix()?;
    evaluate_models(config, &train_x, &train_y, &test_x, &test_y, model_dir)
}

pub fn log_results(results: &[EvaluationResult]) {
    log::info!("----- Evaluation -----");
    for r in results {
        log::info!(
            "{}: accuracy {:.4}, AUC {:.4} (train {}, test {})",
            r.model,
            r.accuracy,
            r.auc,
            r.n_train,
            r.n_test
        );
    }
}

pub fn write_evaluation_report(path: &Path, results: &[EvaluationResult]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create evaluation report: {}", path.display()))?;
    for result in results {
        writer.serialize(result)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write evaluation report: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelType;

    fn split_data() -> (Array2<f32>, Vec<i32>, Array2<f32>, Vec<i32>) {
        let make = |n: usize, offset: usize| {
            let x = Array2::from_shape_fn((n, 3), |(r, c)| {
                let case = (r + offset) % 2 == 0;
                match c {
                    0 => (if case { 3.0 } else { -3.0 }) + (r % 3) as f32 * 0.1,
                    1 => 100.0 + r as f32,
                    _ => 0.5,
                }
            });
            let y = (0..n).map(|r| i32::from((r + offset) % 2 == 0)).collect::<Vec<_>>();
            (x, y)
        };
        let (train_x, train_y) = make(24, 0);
        let (test_x, test_y) = make(8, 1);
        (train_x, train_y, test_x, test_y)
    }

    fn gbdt_only() -> EvaluationConfig {
        EvaluationConfig {
            models: vec![ModelConfig::new(
                0.1,
                ModelType::GBDT {
                    max_depth: 3,
                    num_boost_round: 20,
                    debug: false,
                    training_optimization_level: 2,
                    loss_type: "LogLikelyhood".to_string(),
                },
            )],
            ..EvaluationConfig::default()
        }
    }

    #[test]
    fn separable_split_scores_perfectly() {
        let (train_x, train_y, test_x, test_y) = split_data();
        let config = gbdt_only();
        let mut pipeline = Pipeline::from_config(&config.models[0], &config);
        let result = evaluate(&mut pipeline, &train_x, &train_y, &test_x, &test_y, AucSource::Scores).unwrap();
        assert_eq!(result.n_train, 24);
        assert_eq!(result.n_test, 8);
        assert!((result.accuracy - 1.0).abs() < 1e-12);
        assert!((result.auc - 1.0).abs() < 1e-12);
    }

    #[test]
    fn selection_keeps_pipeline_consistent() {
        let (train_x, train_y, test_x, test_y) = split_data();
        let config = EvaluationConfig {
            select_k_best: Some(1),
            ..gbdt_only()
        };
        let mut pipeline = Pipeline::from_config(&config.models[0], &config);
        let result = evaluate(&mut pipeline, &train_x, &train_y, &test_x, &test_y, AucSource::Labels).unwrap();
        assert!((result.auc - 1.0).abs() < 1e-12);

        let selector = pipeline.selector.as_ref().unwrap();
        assert_eq!(selector.k(), 1);
        assert_eq!(selector.selected(), Some(&[0usize][..]));
        pipeline.log_fitted_steps();
    }

    #[test]
    fn repeated_models_are_saved_under_distinct_names() {
        let (train_x, train_y, test_x, test_y) = split_data();
        let mut config = gbdt_only();
        config.models.push(config.models[0].clone());

        let dir = tempfile::tempdir().unwrap();
        let results =
            evaluate_models(&config, &train_x, &train_y, &test_x, &test_y, Some(dir.path())).unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.model.as_str()).collect();
        assert_eq!(names, vec!["gbdt", "gbdt_2"]);
        assert!(dir.path().join("gbdt.model").exists());
        assert!(dir.path().join("gbdt_2.model").exists());

        let report = dir.path().join("evaluation.csv");
        write_evaluation_report(&report, &results).unwrap();
        let text = std::fs::read_to_string(&report).unwrap();
        assert!(text.starts_with("model,accuracy,auc,n_train,n_test\n"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn infinite_feature_is_rejected_before_fitting() {
        let (mut train_x, train_y, test_x, test_y) = split_data();
        train_x[[3, 1]] = f32::INFINITY;
        let config = gbdt_only();
        let mut pipeline = Pipeline::from_config(&config.models[0], &config);
        let err = evaluate(&mut pipeline, &train_x, &train_y, &test_x, &test_y, AucSource::Labels).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NonFiniteValue(_))
        ));
    }

    #[cfg(feature = "linfa")]
    #[test]
    fn pca_step_feeds_the_classifier() {
        let (train_x, train_y, test_x, test_y) = split_data();
        let config = EvaluationConfig {
            pca_components: Some(2),
            ..gbdt_only()
        };
        let mut pipeline = Pipeline::from_config(&config.models[0], &config);
        let result = evaluate(&mut pipeline, &train_x, &train_y, &test_x, &test_y, AucSource::Labels).unwrap();
        assert_eq!(result.n_test, 8);
        assert!((0.0..=1.0).contains(&result.accuracy));
    }

    #[cfg(feature = "linfa")]
    #[test]
    fn elastic_net_step_drops_the_constant_column() {
        let (train_x, train_y, test_x, test_y) = split_data();
        let config = EvaluationConfig {
            elastic_net: Some(ElasticNetSelection::default()),
            ..gbdt_only()
        };
        let mut pipeline = Pipeline::from_config(&config.models[0], &config);
        let result = evaluate(&mut pipeline, &train_x, &train_y, &test_x, &test_y, AucSource::Labels).unwrap();
        assert!((result.accuracy - 1.0).abs() < 1e-12);

        let kept = pipeline.elastic_net.as_ref().and_then(|s| s.selected()).unwrap();
        assert!(kept.contains(&0));
        assert!(!kept.contains(&2));
    }

    #[test]
    fn predicting_before_fit_fails() {
        let (_, _, test_x, _) = split_data();
        let config = gbdt_only();
        let pipeline = Pipeline::from_config(&config.models[0], &config);
        assert!(pipeline.predict(&test_x).is_err());
    }
}
