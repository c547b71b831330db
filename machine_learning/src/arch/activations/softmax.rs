use ndarray::{Array, ArrayView, Axis, Dimension, Zip};

/// Softmax over the last axis of its input, each lane becomes a probability distribution.
#[derive(Clone, Copy, Debug, Default)]
pub struct Softmax;

impl Softmax {
    pub fn new() -> Self {
        Self
    }

    pub fn forward<D: Dimension>(&self, z: ArrayView<f32, D>) -> Array<f32, D> {
        let mut a = z.to_owned();
        let axis = Axis(a.ndim() - 1);

        for mut lane in a.lanes_mut(axis) {
            // Shifting by the max keeps `exp` from overflowing.
            let max = lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            lane.mapv_inplace(|v| (v - max).exp());
            let sum = lane.sum();
            lane.mapv_inplace(|v| v / sum);
        }

        a
    }

    /// Multiplies `d` by the softmax jacobian, `a` being the forward output.
    pub fn backward<D: Dimension>(&self, d: &mut Array<f32, D>, a: ArrayView<f32, D>) {
        let axis = Axis(a.ndim() - 1);

        Zip::from(d.lanes_mut(axis))
            .and(a.lanes(axis))
            .for_each(|mut d, a| {
                let dot = d.dot(&a);
                d.zip_mut_with(&a, |d, &a| *d = a * (*d - dot));
            });
    }
}
