use ndarray::{Array2, ArrayView2, Zip};

use super::LossFn;

/// Mean squared error, averaged over every output of the batch.
#[derive(Default, Clone, Copy, Debug)]
pub struct Mse;

impl Mse {
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for Mse {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let n = y_pred.len().max(1) as f32;
        let total = Zip::from(&y_pred)
            .and(&y)
            .fold(0., |acc, &p, &t| acc + (p - t).powi(2));

        total / n
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let scale = 2. / y_pred.len().max(1) as f32;
        Zip::from(&y_pred)
            .and(&y)
            .map_collect(|&p, &t| scale * (p - t))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn mse_averages_over_every_output() {
        let y_pred = array![[1., 2.], [3., 5.]];
        let y = array![[1., 0.], [3., 4.]];

        assert_eq!(Mse.loss(y_pred.view(), y.view()), 5. / 4.);
        assert_eq!(
            Mse.loss_prime(y_pred.view(), y.view()),
            array![[0., 1.], [0., 0.5]]
        );
    }
}
