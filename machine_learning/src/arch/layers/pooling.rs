use ndarray::prelude::*;
use rayon::prelude::*;

use super::into_rank;
use crate::{MlErr, Result, specs::PoolKind};

/// A 2D pooling layer whose strides equal its pool size (`valid` padding), so the output
/// spatial size is `floor(input / pool_size)`.
#[derive(Clone, Debug)]
pub struct Pool2d {
    kind: PoolKind,
    pool_size: (usize, usize),

    // The input of the last training forward pass
    x: Option<Array4<f32>>,
}

impl Pool2d {
    pub fn new(kind: PoolKind, pool_size: (usize, usize)) -> Self {
        Self {
            kind,
            pool_size,
            x: None,
        }
    }

    pub fn max(pool_size: (usize, usize)) -> Self {
        Self::new(PoolKind::Max, pool_size)
    }

    pub fn average(pool_size: (usize, usize)) -> Self {
        Self::new(PoolKind::Average, pool_size)
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn pool_size(&self) -> (usize, usize) {
        self.pool_size
    }

    pub fn forward(&mut self, x: ArrayD<f32>, training: bool) -> Result<ArrayD<f32>> {
        let x = into_rank::<Ix4>(x, "pooling")?;
        let (n, h, w, c) = x.dim();
        let (ph, pw) = self.pool_size;

        if h < ph || w < pw {
            return Err(MlErr::InputTooSmall {
                layer: "pooling",
                got: (h, w),
                min: (ph, pw),
            });
        }

        let (oh, ow) = (h / ph, w / pw);
        let mut y = Array4::zeros((n, oh, ow, c));
        let kind = self.kind;

        y.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(x.axis_iter(Axis(0)))
            .for_each(|(mut out, img)| {
                for i in 0..oh {
                    for j in 0..ow {
                        let window = img.slice(s![i * ph..(i + 1) * ph, j * pw..(j + 1) * pw, ..]);
                        for ch in 0..c {
                            let lane = window.slice(s![.., .., ch]);
                            out[[i, j, ch]] = match kind {
                                PoolKind::Max => lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v)),
                                PoolKind::Average => lane.sum() / (ph * pw) as f32,
                            };
                        }
                    }
                }
            });

        if training {
            self.x = Some(x);
        }

        Ok(y.into_dyn())
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let Some(x) = self.x.take() else {
            return Err(MlErr::NoForwardPass { layer: "pooling" });
        };

        let d = into_rank::<Ix4>(d, "pooling")?;
        let (_, oh, ow, c) = d.dim();
        let (ph, pw) = self.pool_size;
        let mut dx = Array4::zeros(x.raw_dim());
        let kind = self.kind;

        dx.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(x.axis_iter(Axis(0)))
            .zip(d.axis_iter(Axis(0)))
            .for_each(|((mut dimg, img), dout)| {
                for i in 0..oh {
                    for j in 0..ow {
                        for ch in 0..c {
                            let delta = dout[[i, j, ch]];
                            match kind {
                                PoolKind::Max => {
                                    let (mut at, mut max) = ((0, 0), f32::NEG_INFINITY);
                                    for di in 0..ph {
                                        for dj in 0..pw {
                                            let v = img[[i * ph + di, j * pw + dj, ch]];
                                            if v > max {
                                                (at, max) = ((di, dj), v);
                                            }
                                        }
                                    }
                                    dimg[[i * ph + at.0, j * pw + at.1, ch]] += delta;
                                }
                                PoolKind::Average => {
                                    let share = delta / (ph * pw) as f32;
                                    dimg.slice_mut(s![
                                        i * ph..(i + 1) * ph,
                                        j * pw..(j + 1) * pw,
                                        ch
                                    ])
                                    .mapv_inplace(|v| v + share);
                                }
                            }
                        }
                    }
                }
            });

        Ok(dx.into_dyn())
    }
}

/// Averages every feature map over its spatial dimensions, `(n, h, w, c) -> (n, c)`.
#[derive(Clone, Debug, Default)]
pub struct GlobalAvgPool {
    input_dim: Option<(usize, usize, usize, usize)>,
}

impl GlobalAvgPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, x: ArrayD<f32>, training: bool) -> Result<ArrayD<f32>> {
        let x = into_rank::<Ix4>(x, "global_average_pooling")?;
        let (n, h, w, c) = x.dim();

        if h == 0 || w == 0 {
            return Err(MlErr::InputTooSmall {
                layer: "global_average_pooling",
                got: (h, w),
                min: (1, 1),
            });
        }

        let y = x
            .to_shape((n, h * w, c))?
            .mean_axis(Axis(1))
            .ok_or(MlErr::InputTooSmall {
                layer: "global_average_pooling",
                got: (h, w),
                min: (1, 1),
            })?;

        if training {
            self.input_dim = Some((n, h, w, c));
        }

        Ok(y.into_dyn())
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let Some((n, h, w, c)) = self.input_dim.take() else {
            return Err(MlErr::NoForwardPass {
                layer: "global_average_pooling",
            });
        };

        let d = into_rank::<Ix2>(d, "global_average_pooling")? / (h * w) as f32;
        let mut dx = Array4::zeros((n, h, w, c));
        dx += &d.insert_axis(Axis(1)).insert_axis(Axis(1));
        Ok(dx.into_dyn())
    }
}
