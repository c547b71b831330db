use ndarray::ArrayD;
use rand::Rng;

use crate::{MlErr, Result};

/// Inverted dropout: while training each activation is zeroed with probability `rate` and
/// the survivors are scaled by `1 / (1 - rate)`, otherwise the input passes through.
#[derive(Clone, Debug)]
pub struct Dropout {
    rate: f32,
    mask: Option<Mask>,
}

#[derive(Clone, Debug)]
enum Mask {
    Passthrough,
    Scaled(ArrayD<f32>),
}

impl Dropout {
    /// Creates a new `Dropout` layer.
    ///
    /// # Returns
    /// An error if `rate` is not in `[0, 1)`.
    pub fn new(rate: f32) -> Result<Self> {
        if !(0. ..1.).contains(&rate) {
            return Err(MlErr::InvalidLayer {
                layer: "dropout",
                reason: format!("rate must be in [0, 1), got {rate}"),
            });
        }

        Ok(Self { rate, mask: None })
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn forward<R: Rng + ?Sized>(
        &mut self,
        x: ArrayD<f32>,
        training: bool,
        rng: &mut R,
    ) -> ArrayD<f32> {
        if !training {
            return x;
        }

        if self.rate == 0. {
            self.mask = Some(Mask::Passthrough);
            return x;
        }

        let rate = self.rate;
        let scale = 1. / (1. - rate);
        let mask = ArrayD::from_shape_simple_fn(x.raw_dim(), || {
            if rng.random::<f32>() < rate { 0. } else { scale }
        });

        let y = x * &mask;
        self.mask = Some(Mask::Scaled(mask));
        y
    }

    pub fn backward(&mut self, d: ArrayD<f32>) -> Result<ArrayD<f32>> {
        match self.mask.take() {
            Some(Mask::Passthrough) => Ok(d),
            Some(Mask::Scaled(mask)) => Ok(d * &mask),
            None => Err(MlErr::NoForwardPass { layer: "dropout" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::ArrayD;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn invalid_rates_are_rejected() {
        assert!(Dropout::new(1.0).is_err());
        assert!(Dropout::new(-0.1).is_err());
        assert!(Dropout::new(0.0).is_ok());
    }

    #[test]
    fn dropout_is_the_identity_at_inference() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut dropout = Dropout::new(0.3).unwrap();
        let x = ArrayD::from_shape_fn(vec![4, 10], |i| i[1] as f32);

        assert_eq!(dropout.forward(x.clone(), false, &mut rng), x);
    }

    #[test]
    fn training_dropout_zeroes_and_rescales() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut dropout = Dropout::new(0.5).unwrap();
        let x = ArrayD::<f32>::ones(vec![64, 64]);

        let y = dropout.forward(x, true, &mut rng);
        let zeros = y.iter().filter(|&&v| v == 0.).count();

        assert!(y.iter().all(|&v| v == 0. || v == 2.));
        assert!((1500..2600).contains(&zeros));

        let d = dropout.backward(ArrayD::ones(vec![64, 64])).unwrap();
        assert_eq!(d, y);
    }
}
