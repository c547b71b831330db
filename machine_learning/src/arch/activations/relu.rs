use ndarray::{Array, ArrayView, Dimension};

/// Rectified linear unit, `max(0, z)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Relu;

impl Relu {
    pub fn new() -> Self {
        Self
    }

    pub fn f(&self, z: f32) -> f32 {
        z.max(0.)
    }

    pub fn df(&self, z: f32) -> f32 {
        if z > 0. { 1. } else { 0. }
    }

    pub fn forward<D: Dimension>(&self, z: ArrayView<f32, D>) -> Array<f32, D> {
        z.mapv(|z| self.f(z))
    }

    pub fn backward<D: Dimension>(&self, d: &mut Array<f32, D>, z: ArrayView<f32, D>) {
        d.zip_mut_with(&z, |d, &z| *d *= self.df(z));
    }
}
