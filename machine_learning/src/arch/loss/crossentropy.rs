use ndarray::{Array2, ArrayView2, Zip};

use super::LossFn;

const EPSILON: f32 = 1e-7;

/// Categorical cross-entropy over probability outputs, averaged over the batch.
///
/// Predictions are clipped to `[EPSILON, 1 - EPSILON]` so the loss stays finite, clipped
/// predictions get no gradient.
#[derive(Default, Clone, Copy, Debug)]
pub struct CategoricalCrossentropy;

impl CategoricalCrossentropy {
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for CategoricalCrossentropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let n = y_pred.nrows().max(1) as f32;
        let total = Zip::from(&y_pred)
            .and(&y)
            .fold(0., |acc, &p, &t| acc - t * p.clamp(EPSILON, 1. - EPSILON).ln());

        total / n
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let n = y_pred.nrows().max(1) as f32;

        Zip::from(&y_pred).and(&y).map_collect(|&p, &t| {
            if (EPSILON..=1. - EPSILON).contains(&p) {
                -t / (p * n)
            } else {
                0.
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn loss_is_the_mean_negative_log_likelihood() {
        let y_pred = array![[0.7, 0.2, 0.1], [0.25, 0.25, 0.5]];
        let y = array![[1., 0., 0.], [0., 0., 1.]];

        let loss = CategoricalCrossentropy.loss(y_pred.view(), y.view());
        let expected = -(0.7f32.ln() + 0.5f32.ln()) / 2.;

        assert!((loss - expected).abs() < 1e-6);
    }

    #[test]
    fn certain_mistakes_stay_finite() {
        let y_pred = array![[1., 0.]];
        let y = array![[0., 1.]];

        let loss = CategoricalCrossentropy.loss(y_pred.view(), y.view());
        assert!(loss.is_finite());
        assert!((loss + EPSILON.ln()).abs() < 1e-3);
    }

    #[test]
    fn gradient_only_flows_through_the_true_class() {
        let y_pred = array![[0.5, 0.5]];
        let y = array![[0., 1.]];

        let d = CategoricalCrossentropy.loss_prime(y_pred.view(), y.view());
        assert_eq!(d, array![[0., -2.]]);
    }
}
