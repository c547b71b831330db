use ndarray::{Array3, ArrayView3, Axis};
use rand::Rng;

/// A centred zoom, `zx` scaling the rows and `zy` the columns.
///
/// A factor below 1 zooms in, above 1 zooms out. Pixels sampled from outside the image take
/// the value of the nearest edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zoom {
    pub zx: f32,
    pub zy: f32,
}

impl Zoom {
    /// Draws both factors independently from `[1 - range, 1 + range]`.
    pub fn sample<R: Rng + ?Sized>(rng: &mut R, range: f32) -> Self {
        let (lo, hi) = (1. - range, 1. + range);
        Self {
            zx: rng.random_range(lo..=hi),
            zy: rng.random_range(lo..=hi),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.zx == 1. && self.zy == 1.
    }

    /// Applies the zoom to an (height, width, channels) image using bilinear interpolation.
    pub fn apply(&self, x: ArrayView3<f32>) -> Array3<f32> {
        let (h, w, c) = x.dim();
        if h == 0 || w == 0 || self.is_identity() {
            return x.to_owned();
        }

        let (cy, cx) = ((h - 1) as f32 / 2., (w - 1) as f32 / 2.);
        let (max_y, max_x) = ((h - 1) as f32, (w - 1) as f32);
        let mut out = Array3::zeros((h, w, c));

        for (i, mut row) in out.axis_iter_mut(Axis(0)).enumerate() {
            let src_y = (cy + (i as f32 - cy) * self.zx).clamp(0., max_y);
            let y0 = src_y.floor() as usize;
            let y1 = (y0 + 1).min(h - 1);
            let dy = src_y - y0 as f32;

            for (j, mut pixel) in row.axis_iter_mut(Axis(0)).enumerate() {
                let src_x = (cx + (j as f32 - cx) * self.zy).clamp(0., max_x);
                let x0 = src_x.floor() as usize;
                let x1 = (x0 + 1).min(w - 1);
                let dx = src_x - x0 as f32;

                for ch in 0..c {
                    let v00 = x[[y0, x0, ch]];
                    let v01 = x[[y0, x1, ch]];
                    let v10 = x[[y1, x0, ch]];
                    let v11 = x[[y1, x1, ch]];

                    pixel[ch] = v00 * (1. - dx) * (1. - dy)
                        + v01 * dx * (1. - dy)
                        + v10 * (1. - dx) * dy
                        + v11 * dx * dy;
                }
            }
        }

        out
    }
}
