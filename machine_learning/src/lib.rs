//! Convolutional classifiers over NHWC image batches: the layers they're made of, the
//! serializable graphs describing them, how they're compiled and trained batch by batch, and
//! a sampler driven builder for hyperparameter searches.

pub mod arch;
pub mod error;
pub mod models;
pub mod optimization;
pub mod specs;
pub mod training;
pub mod tuning;

pub use error::{MlErr, Result};
