use log::debug;
use ndarray::{ArrayD, ArrayViewD};
use rand::rngs::StdRng;

use super::{Model, Trainable, layers::Layer};
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    input_shape: Option<(usize, usize, usize)>,
    layers: Vec<Layer>,
    rng: StdRng,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    /// * `rng` - The source of randomness for parameter initialization and dropout masks.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I, rng: StdRng) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            input_shape: None,
            layers: layers.into_iter().collect(),
            rng,
        }
    }

    /// Declares the (height, width, channels) every input sample must have.
    pub fn with_input_shape(mut self, input_shape: (usize, usize, usize)) -> Self {
        self.input_shape = Some(input_shape);
        self
    }

    pub fn input_shape(&self) -> Option<(usize, usize, usize)> {
        self.input_shape
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    fn check_input(&self, x: &ArrayViewD<f32>) -> Result<()> {
        let Some((h, w, c)) = self.input_shape else {
            return Ok(());
        };

        match x.shape() {
            [_, xh, xw, xc] if (*xh, *xw, *xc) == (h, w, c) => Ok(()),
            shape => Err(MlErr::ShapeMismatch {
                what: "sequential input",
                got: shape.to_vec(),
                expected: vec![shape.first().copied().unwrap_or_default(), h, w, c],
            }),
        }
    }
}

impl Model for Sequential {
    fn call(&mut self, x: ArrayViewD<f32>, training: bool) -> Result<ArrayD<f32>> {
        self.check_input(&x)?;

        let mut x = x.to_owned();
        for layer in self.layers.iter_mut() {
            x = layer.forward(x, training, &mut self.rng)?;
            debug!("{} -> {:?}", layer.name(), x.shape());
        }

        Ok(x)
    }
}

impl Trainable for Sequential {
    fn backward(&mut self, mut d: ArrayD<f32>) -> Result<()> {
        for layer in self.layers.iter_mut().rev() {
            d = layer.backward(d)?;
        }

        Ok(())
    }

    fn visit_params(&mut self, f: &mut dyn FnMut(&mut [f32], &[f32])) {
        for layer in self.layers.iter_mut() {
            layer.visit_params(f);
        }
    }

    fn zero_grad(&mut self) {
        self.layers.iter_mut().for_each(Layer::zero_grad);
    }
}
