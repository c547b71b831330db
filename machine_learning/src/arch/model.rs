use ndarray::{ArrayD, ArrayViewD};

use crate::Result;

/// Anything that maps a batch of inputs to a batch of outputs.
pub trait Model {
    /// Runs a forward pass.
    ///
    /// # Arguments
    /// * `x` - The input batch.
    /// * `training` - Whether training-only behavior (dropout, batch statistics) applies.
    ///
    /// # Returns
    /// The output batch or an error if the input doesn't fit the model.
    fn call(&mut self, x: ArrayViewD<f32>, training: bool) -> Result<ArrayD<f32>>;
}

/// A model whose parameters can be learnt.
pub trait Trainable: Model {
    /// Backpropagates `d`, the gradient of the loss with respect to the last output of a
    /// training `call`, accumulating the gradient of every parameter.
    fn backward(&mut self, d: ArrayD<f32>) -> Result<()>;

    /// Calls `f` once per parameter tensor with its accumulated gradient.
    fn visit_params(&mut self, f: &mut dyn FnMut(&mut [f32], &[f32]));

    fn zero_grad(&mut self);

    /// Returns the amount of trainable parameters.
    fn size(&mut self) -> usize {
        let mut size = 0;
        self.visit_params(&mut |params, _| size += params.len());
        size
    }
}
