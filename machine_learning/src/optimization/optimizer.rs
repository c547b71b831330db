use super::{Adam, GradientDescent};
use crate::specs::OptimizerSpec;

pub trait Optimizer {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]);
}

/// Every optimizer a model can be compiled with.
///
/// A compiled model keeps one of these per parameter tensor, cloned from a prototype, so
/// stateful optimizers size their buffers on the first update.
#[derive(Clone, Debug)]
pub enum OptimizerKind {
    Adam(Adam),
    GradientDescent(GradientDescent),
}

impl Optimizer for OptimizerKind {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) {
        match self {
            Self::Adam(o) => o.update_params(params, grad),
            Self::GradientDescent(o) => o.update_params(params, grad),
        }
    }
}

impl From<OptimizerSpec> for OptimizerKind {
    fn from(spec: OptimizerSpec) -> Self {
        match spec {
            OptimizerSpec::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => Self::Adam(Adam::new(learning_rate, beta1, beta2, epsilon)),
            OptimizerSpec::GradientDescent { learning_rate } => {
                Self::GradientDescent(GradientDescent::new(learning_rate))
            }
        }
    }
}
