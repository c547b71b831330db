use super::Optimizer;

/// Plain gradient descent, `w -= learning_rate * g`. Stateless, so every parameter tensor can
/// share the same instance.
#[derive(Clone, Debug)]
pub struct GradientDescent {
    learning_rate: f32,
}

impl GradientDescent {
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }
}

impl Optimizer for GradientDescent {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) {
        let lr = self.learning_rate;
        params
            .iter_mut()
            .zip(grad)
            .for_each(|(w, g)| *w -= lr * g);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_against_the_gradient() {
        let mut gd = GradientDescent::new(0.5);
        let mut params = [1., 1., 1.];

        gd.update_params(&mut params, &[2., -2., 0.]);

        assert_eq!(params, [0., 2., 1.]);
    }
}
