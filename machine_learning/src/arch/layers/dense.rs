use ndarray::{linalg, prelude::*};
use rand::Rng;

use super::{init, into_rank};
use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer, `a = act_fn(x · w + b)`.
///
/// The input size is only known on the first forward pass, that's when the parameters are
/// materialized.
#[derive(Clone, Debug)]
pub struct Dense {
    units: usize,
    act_fn: Option<ActFn>,
    dim: Option<(usize, usize)>,
    params: Vec<f32>,
    grad: Vec<f32>,

    // Forward metadata, only kept while training
    cache: Option<Cache>,
}

#[derive(Clone, Debug)]
struct Cache {
    x: Array2<f32>,
    z: Array2<f32>,
    a: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `units` - The amount of outputs of the layer.
    /// * `act_fn` - The activation function applied to the weighted sums, if any.
    pub fn new(units: usize, act_fn: Option<ActFn>) -> Self {
        Self {
            units,
            act_fn,
            dim: None,
            params: Vec::new(),
            grad: Vec::new(),
            cache: None,
        }
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn act_fn(&self) -> Option<ActFn> {
        self.act_fn
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has, zero until it's built.
    pub fn size(&self) -> usize {
        self.params.len()
    }

    pub fn forward<R: Rng + ?Sized>(
        &mut self,
        x: ArrayD<f32>,
        training: bool,
        rng: &mut R,
    ) -> Result<ArrayD<f32>> {
        let x = into_rank::<Ix2>(x, "dense")?;
        let dim = self.build(x.ncols(), rng)?;

        let z = {
            let (w, b) = view_params(dim, &self.params)?;
            let mut z = x.dot(&w);
            z += &b;
            z
        };

        let a = match &self.act_fn {
            Some(act_fn) => act_fn.forward(z.view()),
            None => z.clone(),
        };

        if training {
            self.cache = Some(Cache {
                x,
                z,
                a: a.clone(),
            });
        }

        Ok(a.into_dyn())
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let (Some(Cache { x, z, a }), Some(dim)) = (self.cache.take(), self.dim) else {
            return Err(MlErr::NoForwardPass { layer: "dense" });
        };

        let mut d = into_rank::<Ix2>(d, "dense")?;
        if let Some(act_fn) = &self.act_fn {
            act_fn.backward(&mut d, z.view(), a.view());
        }

        let (mut dw, mut db) = view_grad(dim, &mut self.grad)?;
        linalg::general_mat_mul(1.0, &x.t(), &d, 1.0, &mut dw);
        db += &d.sum_axis(Axis(0));

        let (w, _) = view_params(dim, &self.params)?;
        Ok(d.dot(&w.t()).into_dyn())
    }

    pub fn params_and_grad(&mut self) -> (&mut [f32], &[f32]) {
        (&mut self.params, &self.grad)
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.);
    }

    /// Materializes the parameters the first time an input size is seen.
    ///
    /// # Returns
    /// The weights dimension or an error if `input_dim` differs from the built one.
    fn build<R: Rng + ?Sized>(&mut self, input_dim: usize, rng: &mut R) -> Result<(usize, usize)> {
        if let Some(dim) = self.dim {
            if dim.0 != input_dim {
                return Err(MlErr::ShapeMismatch {
                    what: "dense input",
                    got: vec![input_dim],
                    expected: vec![dim.0],
                });
            }

            return Ok(dim);
        }

        let dim = (input_dim, self.units);
        let w_size = dim.0 * dim.1;
        let mut params = init::glorot_uniform(rng, dim.0, dim.1, w_size)?;
        params.resize(w_size + dim.1, 0.);

        self.grad = vec![0.; params.len()];
        self.params = params;
        self.dim = Some(dim);
        Ok(dim)
    }
}

/// Gives a view of the raw parameter slice as the weights and biases of a layer.
///
/// # Arguments
/// * `dim` - The weights dimension.
/// * `params` - A slice of parameters.
///
/// # Returns
/// A tuple containing the weights and biases.
fn view_params(dim: (usize, usize), params: &[f32]) -> Result<(ArrayView2<'_, f32>, ArrayView1<'_, f32>)> {
    let (w_raw, b_raw) = params.split_at(dim.0 * dim.1);
    let weights = ArrayView2::from_shape(dim, w_raw)?;
    let biases = ArrayView1::from_shape(dim.1, b_raw)?;
    Ok((weights, biases))
}

/// Gives a view of the raw gradient slice as the delta weights and delta biases of a layer.
fn view_grad(
    dim: (usize, usize),
    grad: &mut [f32],
) -> Result<(ArrayViewMut2<'_, f32>, ArrayViewMut1<'_, f32>)> {
    let (dw_raw, db_raw) = grad.split_at_mut(dim.0 * dim.1);
    let dw = ArrayViewMut2::from_shape(dim, dw_raw)?;
    let db = ArrayViewMut1::from_shape(dim.1, db_raw)?;
    Ok((dw, db))
}
