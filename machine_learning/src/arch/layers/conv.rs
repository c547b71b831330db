use ndarray::{linalg, prelude::*};
use rand::Rng;
use rayon::prelude::*;

use super::{init, into_rank};
use crate::{MlErr, Result, arch::activations::ActFn};

/// A 2D convolution over NHWC inputs with `valid` padding and unit strides.
///
/// The kernel is stored as a `(kh * kw * channels, filters)` matrix so the forward pass is a
/// single product against the im2col expansion of the input. The amount of input channels is
/// only known on the first forward pass.
#[derive(Clone, Debug)]
pub struct Conv2d {
    filters: usize,
    kernel_size: (usize, usize),
    act_fn: Option<ActFn>,
    channels: Option<usize>,
    params: Vec<f32>,
    grad: Vec<f32>,

    // Forward metadata, only kept while training
    cache: Option<Cache>,
}

#[derive(Clone, Debug)]
struct Cache {
    input_dim: (usize, usize, usize, usize),
    cols: Array2<f32>,
    z: Array4<f32>,
    a: Array4<f32>,
}

impl Conv2d {
    /// Creates a new `Conv2d` layer.
    ///
    /// # Arguments
    /// * `filters` - The amount of output channels.
    /// * `kernel_size` - The (height, width) of the kernel.
    /// * `act_fn` - The activation function applied to the feature maps, if any.
    pub fn new(filters: usize, kernel_size: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            filters,
            kernel_size,
            act_fn,
            channels: None,
            params: Vec::new(),
            grad: Vec::new(),
            cache: None,
        }
    }

    pub fn filters(&self) -> usize {
        self.filters
    }

    pub fn kernel_size(&self) -> (usize, usize) {
        self.kernel_size
    }

    pub fn act_fn(&self) -> Option<ActFn> {
        self.act_fn
    }

    pub fn size(&self) -> usize {
        self.params.len()
    }

    pub fn forward<R: Rng + ?Sized>(
        &mut self,
        x: ArrayD<f32>,
        training: bool,
        rng: &mut R,
    ) -> Result<ArrayD<f32>> {
        let x = into_rank::<Ix4>(x, "conv2d")?;
        let (n, h, w, c) = x.dim();
        let (kh, kw) = self.kernel_size;

        if h < kh || w < kw {
            return Err(MlErr::InputTooSmall {
                layer: "conv2d",
                got: (h, w),
                min: (kh, kw),
            });
        }

        let dim = self.build(c, rng)?;
        let (oh, ow) = (h - kh + 1, w - kw + 1);

        let cols = im2col(x.view(), self.kernel_size).into_shape_with_order((n * oh * ow, dim.0))?;
        let z = {
            let (kernel, bias) = view_params(dim, &self.params)?;
            let mut z = cols.dot(&kernel);
            z += &bias;
            z.into_shape_with_order((n, oh, ow, self.filters))?
        };

        let a = match &self.act_fn {
            Some(act_fn) => act_fn.forward(z.view()),
            None => z.clone(),
        };

        if training {
            self.cache = Some(Cache {
                input_dim: (n, h, w, c),
                cols,
                z,
                a: a.clone(),
            });
        }

        Ok(a.into_dyn())
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let Some(Cache {
            input_dim,
            cols,
            z,
            a,
        }) = self.cache.take()
        else {
            return Err(MlErr::NoForwardPass { layer: "conv2d" });
        };

        let (n, h, w, c) = input_dim;
        let (kh, kw) = self.kernel_size;
        let (oh, ow) = (h - kh + 1, w - kw + 1);
        let dim = (kh * kw * c, self.filters);

        let mut d = into_rank::<Ix4>(d, "conv2d")?;
        if let Some(act_fn) = &self.act_fn {
            act_fn.backward(&mut d, z.view(), a.view());
        }
        let d = d.to_shape((n * oh * ow, self.filters))?;

        let (mut dk, mut db) = view_grad(dim, &mut self.grad)?;
        linalg::general_mat_mul(1.0, &cols.t(), &d, 1.0, &mut dk);
        db += &d.sum_axis(Axis(0));

        let (kernel, _) = view_params(dim, &self.params)?;
        let dcols = d.dot(&kernel.t()).into_shape_with_order((n, oh * ow, dim.0))?;

        Ok(col2im(dcols.view(), input_dim, self.kernel_size).into_dyn())
    }

    pub fn params_and_grad(&mut self) -> (&mut [f32], &[f32]) {
        (&mut self.params, &self.grad)
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.);
    }

    fn build<R: Rng + ?Sized>(&mut self, channels: usize, rng: &mut R) -> Result<(usize, usize)> {
        let (kh, kw) = self.kernel_size;

        if let Some(built) = self.channels {
            if built != channels {
                return Err(MlErr::ShapeMismatch {
                    what: "conv2d input channels",
                    got: vec![channels],
                    expected: vec![built],
                });
            }

            return Ok((kh * kw * channels, self.filters));
        }

        let dim = (kh * kw * channels, self.filters);
        let k_size = dim.0 * dim.1;
        let fan_in = kh * kw * channels;
        let fan_out = kh * kw * self.filters;
        let mut params = init::glorot_uniform(rng, fan_in, fan_out, k_size)?;
        params.resize(k_size + self.filters, 0.);

        self.grad = vec![0.; params.len()];
        self.params = params;
        self.channels = Some(channels);
        Ok(dim)
    }
}

/// Expands every receptive field of `x` into a row.
///
/// # Returns
/// An array of shape `(n, oh * ow, kh * kw * c)`, the row of output pixel `(i, j)` being
/// `i * ow + j` and the column of input pixel `(i + di, j + dj, ch)` being
/// `(di * kw + dj) * c + ch`.
fn im2col(x: ArrayView4<f32>, (kh, kw): (usize, usize)) -> Array3<f32> {
    let (n, h, w, c) = x.dim();
    let (oh, ow) = (h - kh + 1, w - kw + 1);
    let mut cols = Array3::zeros((n, oh * ow, kh * kw * c));

    cols.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(x.axis_iter(Axis(0)))
        .for_each(|(mut img_cols, img)| {
            for i in 0..oh {
                for j in 0..ow {
                    let mut row = img_cols.row_mut(i * ow + j);
                    for di in 0..kh {
                        for dj in 0..kw {
                            let start = (di * kw + dj) * c;
                            row.slice_mut(s![start..start + c])
                                .assign(&img.slice(s![i + di, j + dj, ..]));
                        }
                    }
                }
            }
        });

    cols
}

/// Folds the rows produced by `im2col` back into an image, adding overlapping contributions.
fn col2im(
    dcols: ArrayView3<f32>,
    (n, h, w, c): (usize, usize, usize, usize),
    (kh, kw): (usize, usize),
) -> Array4<f32> {
    let ow = w - kw + 1;
    let oh = h - kh + 1;
    let mut dx = Array4::zeros((n, h, w, c));

    dx.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(dcols.axis_iter(Axis(0)))
        .for_each(|(mut img, img_cols)| {
            for i in 0..oh {
                for j in 0..ow {
                    let row = img_cols.row(i * ow + j);
                    for di in 0..kh {
                        for dj in 0..kw {
                            let start = (di * kw + dj) * c;
                            let mut pixel = img.slice_mut(s![i + di, j + dj, ..]);
                            pixel += &row.slice(s![start..start + c]);
                        }
                    }
                }
            }
        });

    dx
}

fn view_params(dim: (usize, usize), params: &[f32]) -> Result<(ArrayView2<'_, f32>, ArrayView1<'_, f32>)> {
    let (k_raw, b_raw) = params.split_at(dim.0 * dim.1);
    Ok((
        ArrayView2::from_shape(dim, k_raw)?,
        ArrayView1::from_shape(dim.1, b_raw)?,
    ))
}

fn view_grad(
    dim: (usize, usize),
    grad: &mut [f32],
) -> Result<(ArrayViewMut2<'_, f32>, ArrayViewMut1<'_, f32>)> {
    let (dk_raw, db_raw) = grad.split_at_mut(dim.0 * dim.1);
    Ok((
        ArrayViewMut2::from_shape(dim, dk_raw)?,
        ArrayViewMut1::from_shape(dim.1, db_raw)?,
    ))
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn valid_convolution_shrinks_the_feature_maps() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut conv = Conv2d::new(8, (3, 3), Some(ActFn::relu()));

        let y = conv
            .forward(Array4::ones((2, 10, 12, 3)).into_dyn(), false, &mut rng)
            .unwrap();

        assert_eq!(y.shape(), &[2, 8, 10, 8]);
        assert_eq!(conv.size(), 3 * 3 * 3 * 8 + 8);
        assert!(y.iter().all(|&v| v >= 0.));
    }

    #[test]
    fn convolution_matches_a_direct_sum() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut conv = Conv2d::new(1, (2, 2), None);
        let x = Array4::from_shape_fn((1, 3, 3, 2), |(_, i, j, c)| (i * 6 + j * 2 + c) as f32);

        let y = conv.forward(x.clone().into_dyn(), false, &mut rng).unwrap();
        let (params, _) = conv.params_and_grad();

        let mut expected = 0.;
        for di in 0..2 {
            for dj in 0..2 {
                for c in 0..2 {
                    expected += x[[0, 1 + di, dj, c]] * params[(di * 2 + dj) * 2 + c];
                }
            }
        }

        assert!((y[[0, 1, 0, 0]] - expected).abs() < 1e-4);
    }

    #[test]
    fn batched_images_are_convolved_independently() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut conv = Conv2d::new(3, (2, 2), Some(ActFn::relu()));
        let x = Array4::from_shape_fn((5, 4, 4, 2), |(n, i, j, c)| {
            ((n * 7 + i * 3 + j + c) % 5) as f32 - 2.
        });

        let batch = conv.forward(x.clone().into_dyn(), false, &mut rng).unwrap();

        for (n, img) in x.axis_iter(Axis(0)).enumerate() {
            let single = conv
                .forward(img.insert_axis(Axis(0)).to_owned().into_dyn(), false, &mut rng)
                .unwrap();
            let diff = &single.index_axis(Axis(0), 0) - &batch.index_axis(Axis(0), n);
            assert!(diff.iter().all(|v| v.abs() < 1e-5));
        }
    }

    #[test]
    fn too_small_inputs_are_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut conv = Conv2d::new(4, (3, 3), None);

        let err = conv.forward(Array4::ones((1, 2, 5, 1)).into_dyn(), false, &mut rng);
        assert!(matches!(err, Err(MlErr::InputTooSmall { got: (2, 5), .. })));
    }

    #[test]
    fn input_gradient_of_a_single_pixel_kernel_is_the_kernel() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut conv = Conv2d::new(1, (1, 1), None);
        conv.forward(Array4::ones((1, 2, 2, 1)).into_dyn(), true, &mut rng)
            .unwrap();

        let dx = conv.backward(Array4::ones((1, 2, 2, 1)).into_dyn()).unwrap();
        let (params, grad) = conv.params_and_grad();

        assert!(dx.iter().all(|&v| v == params[0]));
        assert_eq!(grad, &[4.0, 4.0]);
    }
}
