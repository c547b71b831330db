mod batch_norm;
mod conv;
mod dense;
mod dropout;
mod flatten;
mod init;
mod layer;
mod pooling;

use ndarray::{Array, ArrayD, Dimension};

pub use batch_norm::BatchNorm;
pub use conv::Conv2d;
pub use dense::Dense;
pub use dropout::Dropout;
pub use flatten::Flatten;
pub use layer::Layer;
pub use pooling::{GlobalAvgPool, Pool2d};

use crate::{MlErr, Result};

/// Converts a dynamic array into the fixed rank a layer works with.
fn into_rank<D: Dimension>(x: ArrayD<f32>, layer: &'static str) -> Result<Array<f32, D>> {
    let got = x.ndim();
    x.into_dimensionality::<D>().map_err(|_| MlErr::RankMismatch {
        layer,
        got,
        expected: D::NDIM.unwrap_or(0),
    })
}
