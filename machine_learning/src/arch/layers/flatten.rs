use ndarray::{ArrayD, IxDyn};

use crate::{MlErr, Result};

/// Flattens every sample into a row, `(n, h, w, c) -> (n, h * w * c)`.
#[derive(Clone, Debug, Default)]
pub struct Flatten {
    input_dim: Option<IxDyn>,
}

impl Flatten {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, x: ArrayD<f32>, training: bool) -> Result<ArrayD<f32>> {
        let n = x.shape().first().copied().unwrap_or_default();
        let features = x.shape().iter().skip(1).product::<usize>();
        let y = x.to_shape((n, features))?.into_owned();

        if training {
            self.input_dim = Some(x.raw_dim());
        }

        Ok(y.into_dyn())
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let Some(dim) = self.input_dim.take() else {
            return Err(MlErr::NoForwardPass { layer: "flatten" });
        };

        Ok(d.to_shape(dim)?.into_owned())
    }
}
