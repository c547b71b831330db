use ndarray::ArrayD;
use rand::Rng;

use super::{BatchNorm, Conv2d, Dense, Dropout, Flatten, GlobalAvgPool, Pool2d};
use crate::{
    Result,
    arch::activations::ActFn,
    specs::{LayerSpec, PoolKind},
};

/// Every layer a classifier can be made of.
#[derive(Clone, Debug)]
pub enum Layer {
    Conv2d(Conv2d),
    Pool2d(Pool2d),
    GlobalAvgPool(GlobalAvgPool),
    Flatten(Flatten),
    Dense(Dense),
    Dropout(Dropout),
    BatchNorm(BatchNorm),
}
use Layer::*;

impl Layer {
    pub fn conv2d(filters: usize, kernel_size: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Conv2d(Conv2d::new(filters, kernel_size, act_fn))
    }

    pub fn pooling(kind: PoolKind, pool_size: (usize, usize)) -> Self {
        Self::Pool2d(Pool2d::new(kind, pool_size))
    }

    pub fn global_average_pooling() -> Self {
        Self::GlobalAvgPool(GlobalAvgPool::new())
    }

    pub fn flatten() -> Self {
        Self::Flatten(Flatten::new())
    }

    pub fn dense(units: usize, act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(units, act_fn))
    }

    pub fn dropout(rate: f32) -> Result<Self> {
        Ok(Self::Dropout(Dropout::new(rate)?))
    }

    pub fn batch_normalization() -> Self {
        Self::BatchNorm(BatchNorm::new())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Conv2d(_) => "conv2d",
            Pool2d(l) => match l.kind() {
                PoolKind::Max => "max_pooling2d",
                PoolKind::Average => "average_pooling2d",
            },
            GlobalAvgPool(_) => "global_average_pooling2d",
            Flatten(_) => "flatten",
            Dense(_) => "dense",
            Dropout(_) => "dropout",
            BatchNorm(_) => "batch_normalization",
        }
    }

    /// Describes this layer's hyperparameters.
    pub fn spec(&self) -> LayerSpec {
        match self {
            Conv2d(l) => LayerSpec::Conv2d {
                filters: l.filters(),
                kernel_size: l.kernel_size(),
                activation: l.act_fn().map(|a| a.spec()),
            },
            Pool2d(l) => LayerSpec::Pooling {
                kind: l.kind(),
                pool_size: l.pool_size(),
            },
            GlobalAvgPool(_) => LayerSpec::GlobalAveragePooling,
            Flatten(_) => LayerSpec::Flatten,
            Dense(l) => LayerSpec::Dense {
                units: l.units(),
                activation: l.act_fn().map(|a| a.spec()),
            },
            Dropout(l) => LayerSpec::Dropout { rate: l.rate() },
            BatchNorm(_) => LayerSpec::BatchNormalization,
        }
    }

    pub fn forward<R: Rng + ?Sized>(
        &mut self,
        x: ArrayD<f32>,
        training: bool,
        rng: &mut R,
    ) -> Result<ArrayD<f32>> {
        match self {
            Conv2d(l) => l.forward(x, training, rng),
            Pool2d(l) => l.forward(x, training),
            GlobalAvgPool(l) => l.forward(x, training),
            Flatten(l) => l.forward(x, training),
            Dense(l) => l.forward(x, training, rng),
            Dropout(l) => Ok(l.forward(x, training, rng)),
            BatchNorm(l) => l.forward(x, training),
        }
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        match self {
            Conv2d(l) => l.backward(d),
            Pool2d(l) => l.backward(d),
            GlobalAvgPool(l) => l.backward(d),
            Flatten(l) => l.backward(d),
            Dense(l) => l.backward(d),
            Dropout(l) => l.backward(d),
            BatchNorm(l) => l.backward(d),
        }
    }

    /// Calls `f` with the parameters and gradient of this layer, if it has any.
    pub fn visit_params(&mut self, f: &mut dyn FnMut(&mut [f32], &[f32])) {
        let (params, grad) = match self {
            Conv2d(l) => l.params_and_grad(),
            Dense(l) => l.params_and_grad(),
            BatchNorm(l) => l.params_and_grad(),
            _ => return,
        };

        if !params.is_empty() {
            f(params, grad);
        }
    }

    pub fn zero_grad(&mut self) {
        match self {
            Conv2d(l) => l.zero_grad(),
            Dense(l) => l.zero_grad(),
            BatchNorm(l) => l.zero_grad(),
            _ => {}
        }
    }

    /// Returns the amount of parameters of this layer, zero for parameterless or unbuilt layers.
    pub fn size(&self) -> usize {
        match self {
            Conv2d(l) => l.size(),
            Dense(l) => l.size(),
            BatchNorm(l) => l.size(),
            _ => 0,
        }
    }

    /// Whether this layer produces 2D (per-sample flat) outputs.
    pub fn is_flat(&self) -> bool {
        matches!(self, GlobalAvgPool(_) | Flatten(_) | Dense(_))
    }
}
