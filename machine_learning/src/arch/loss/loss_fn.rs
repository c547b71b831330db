use ndarray::{Array2, ArrayView2};

use super::{CategoricalCrossentropy, Mse};
use crate::specs::LossFnSpec;

pub trait LossFn {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32;
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32>;
}

/// Every loss function a model can be compiled with.
#[derive(Clone, Copy, Debug)]
pub enum LossKind {
    CategoricalCrossentropy(CategoricalCrossentropy),
    Mse(Mse),
}

impl LossFn for LossKind {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        match self {
            Self::CategoricalCrossentropy(l) => l.loss(y_pred, y),
            Self::Mse(l) => l.loss(y_pred, y),
        }
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        match self {
            Self::CategoricalCrossentropy(l) => l.loss_prime(y_pred, y),
            Self::Mse(l) => l.loss_prime(y_pred, y),
        }
    }
}

impl From<LossFnSpec> for LossKind {
    fn from(spec: LossFnSpec) -> Self {
        match spec {
            LossFnSpec::CategoricalCrossentropy => {
                Self::CategoricalCrossentropy(CategoricalCrossentropy::new())
            }
            LossFnSpec::Mse => Self::Mse(Mse::new()),
        }
    }
}
