use ndarray::{Array, ArrayView, Dimension};

use super::{Relu, Softmax};
use crate::specs::ActFnSpec;

#[derive(Clone, Copy, Debug)]
pub enum ActFn {
    Relu(Relu),
    Softmax(Softmax),
}

impl ActFn {
    pub fn relu() -> Self {
        Self::Relu(Relu::new())
    }

    pub fn softmax() -> Self {
        Self::Softmax(Softmax::new())
    }

    /// Applies the activation to the weighted sums `z`.
    pub fn forward<D: Dimension>(&self, z: ArrayView<f32, D>) -> Array<f32, D> {
        match self {
            Self::Relu(a) => a.forward(z),
            Self::Softmax(a) => a.forward(z),
        }
    }

    /// Turns the delta with respect to the activations into the delta with respect to the
    /// weighted sums.
    ///
    /// # Arguments
    /// * `d` - The incoming delta, overwritten in place.
    /// * `z` - The weighted sums of the forward pass.
    /// * `a` - The activations of the forward pass.
    pub fn backward<D: Dimension>(
        &self,
        d: &mut Array<f32, D>,
        z: ArrayView<f32, D>,
        a: ArrayView<f32, D>,
    ) {
        match self {
            Self::Relu(f) => f.backward(d, z),
            Self::Softmax(f) => f.backward(d, a),
        }
    }

    pub fn spec(&self) -> ActFnSpec {
        match self {
            Self::Relu(_) => ActFnSpec::Relu,
            Self::Softmax(_) => ActFnSpec::Softmax,
        }
    }
}

impl From<ActFnSpec> for ActFn {
    fn from(spec: ActFnSpec) -> Self {
        match spec {
            ActFnSpec::Relu => Self::relu(),
            ActFnSpec::Softmax => Self::softmax(),
        }
    }
}
