use ndarray::prelude::*;

use crate::{MlErr, Result};

const MOMENTUM: f32 = 0.99;
const EPSILON: f32 = 1e-3;

/// Normalizes its input over the last axis.
///
/// While training the batch statistics are used and the moving statistics are updated,
/// otherwise the moving statistics are used. The parameters are laid out as `[gamma, beta]`.
#[derive(Clone, Debug)]
pub struct BatchNorm {
    features: Option<usize>,
    params: Vec<f32>,
    grad: Vec<f32>,
    moving_mean: Array1<f32>,
    moving_var: Array1<f32>,
    cache: Option<Cache>,
}

#[derive(Clone, Debug)]
struct Cache {
    x_hat: Array2<f32>,
    inv_std: Array1<f32>,
    input_dim: IxDyn,
}

impl Default for BatchNorm {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchNorm {
    pub fn new() -> Self {
        Self {
            features: None,
            params: Vec::new(),
            grad: Vec::new(),
            moving_mean: Array1::zeros(0),
            moving_var: Array1::zeros(0),
            cache: None,
        }
    }

    pub fn size(&self) -> usize {
        self.params.len()
    }

    pub fn moving_mean(&self) -> ArrayView1<'_, f32> {
        self.moving_mean.view()
    }

    pub fn moving_variance(&self) -> ArrayView1<'_, f32> {
        self.moving_var.view()
    }

    pub fn forward(&mut self, x: ArrayD<f32>, training: bool) -> Result<ArrayD<f32>> {
        let input_dim = x.raw_dim();
        let features = x.shape().last().copied().unwrap_or_default();
        if x.ndim() < 2 || features == 0 {
            return Err(MlErr::RankMismatch {
                layer: "batch_normalization",
                got: x.ndim(),
                expected: 2,
            });
        }

        self.build(features)?;
        let rows = x.len() / features;
        if training && rows == 0 {
            return Err(MlErr::InputTooSmall {
                layer: "batch_normalization",
                got: (rows, features),
                min: (1, features),
            });
        }
        let x = x.into_shape_with_order((rows, features))?;

        let (mean, var) = if training {
            let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(features));
            let var = x.var_axis(Axis(0), 0.);

            self.moving_mean.zip_mut_with(&mean, |m, &b| *m = *m * MOMENTUM + b * (1. - MOMENTUM));
            self.moving_var.zip_mut_with(&var, |m, &b| *m = *m * MOMENTUM + b * (1. - MOMENTUM));
            (mean, var)
        } else {
            (self.moving_mean.clone(), self.moving_var.clone())
        };

        let inv_std = var.mapv(|v| 1. / (v + EPSILON).sqrt());
        let x_hat = (x - &mean) * &inv_std;

        let (gamma, beta) = self.params.split_at(features);
        let gamma = ArrayView1::from(gamma);
        let beta = ArrayView1::from(beta);
        let y = &x_hat * &gamma + &beta;

        if training {
            self.cache = Some(Cache {
                x_hat,
                inv_std,
                input_dim: input_dim.clone(),
            });
        }

        Ok(y.into_shape_with_order(input_dim)?)
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let (Some(Cache { x_hat, inv_std, input_dim }), Some(features)) =
            (self.cache.take(), self.features)
        else {
            return Err(MlErr::NoForwardPass {
                layer: "batch_normalization",
            });
        };

        let rows = x_hat.nrows() as f32;
        let d = d.into_shape_with_order(x_hat.raw_dim())?;

        let (dgamma, dbeta) = self.grad.split_at_mut(features);
        let dgamma_acc = (&d * &x_hat).sum_axis(Axis(0));
        let dbeta_acc = d.sum_axis(Axis(0));
        ArrayViewMut1::from(dgamma).zip_mut_with(&dgamma_acc, |g, &v| *g += v);
        ArrayViewMut1::from(dbeta).zip_mut_with(&dbeta_acc, |g, &v| *g += v);

        let gamma = ArrayView1::from(&self.params[..features]);
        let dx_hat = &d * &gamma;
        let sum_dx_hat = dx_hat.sum_axis(Axis(0));
        let sum_dx_hat_x_hat = (&dx_hat * &x_hat).sum_axis(Axis(0));

        // dx = inv_std / m * (m * dx_hat - sum(dx_hat) - x_hat * sum(dx_hat * x_hat))
        let dx = (&dx_hat * rows - &sum_dx_hat - &x_hat * &sum_dx_hat_x_hat) * &(inv_std / rows);

        Ok(dx.into_shape_with_order(input_dim)?)
    }

    pub fn params_and_grad(&mut self) -> (&mut [f32], &[f32]) {
        (&mut self.params, &self.grad)
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.);
    }

    fn build(&mut self, features: usize) -> Result<()> {
        match self.features {
            Some(built) if built != features => Err(MlErr::ShapeMismatch {
                what: "batch normalization features",
                got: vec![features],
                expected: vec![built],
            }),
            Some(_) => Ok(()),
            None => {
                let mut params = vec![1.; features];
                params.resize(2 * features, 0.);

                self.grad = vec![0.; params.len()];
                self.params = params;
                self.moving_mean = Array1::zeros(features);
                self.moving_var = Array1::ones(features);
                self.features = Some(features);
                Ok(())
            }
        }
    }
}
