pub mod classifier_trait;
pub mod factory;
pub mod gbdt;
#[cfg(feature = "linfa")]
pub mod logistic;

pub use classifier_trait::ClassifierModel;
pub use factory::build_model;
