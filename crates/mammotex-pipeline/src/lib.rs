//! mammotex-pipeline: patient-aware aggregation of mammographic texture features.
//!
//! This crate turns per-image radiomic artifacts (mean/std statistic tables,
//! a breast mask and per-feature texture maps) into model-ready datasets:
//! fixed-length tabular vectors for classical classifiers, and cropped, masked,
//! normalized tensors for convolutional models. Samples are partitioned by
//! patient, never by image, so no patient contributes to both training and test
//! data.
//!
//! The canonical feature order ([`catalog::FeatureCatalog`]) and the patient
//! partition ([`splitter::Partition`]) are computed once per run and passed
//! explicitly to every stage that needs them.
pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod data_handling;
#[cfg(feature = "linfa")]
pub mod decomposition;
pub mod error;
pub mod evaluation;
pub mod feature_selection;
pub mod io;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod preprocessing;
pub mod registry;
pub mod splitter;

pub use error::PipelineError;
