//! Feature selection utilities.
//!
//! This module contains univariate selection routines (a la scikit-learn)
//! for scoring and ranking feature columns against the case/control label,
//! and an elastic-net based selector when the `linfa` feature is enabled.
#[cfg(feature = "linfa")]
pub mod elastic_net;
pub mod univariate_selection;

#[cfg(feature = "linfa")]
pub use elastic_net::ElasticNetSelector;
pub use univariate_selection::{f_regression, r_regression, SelectKBest};
