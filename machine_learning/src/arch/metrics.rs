use std::fmt::{self, Display};

use ndarray::{ArrayView1, ArrayView2, Zip};

use crate::specs::MetricSpec;

/// A quality measure tracked alongside the loss.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    /// The rate of samples whose most probable class is the true one.
    Accuracy,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
        }
    }

    pub fn compute(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        match self {
            Self::Accuracy => {
                let n = y_pred.nrows();
                if n == 0 {
                    return 0.;
                }

                let hits = Zip::from(y_pred.rows())
                    .and(y.rows())
                    .fold(0, |hits, p, t| hits + usize::from(argmax(p) == argmax(t)));

                hits as f32 / n as f32
            }
        }
    }
}

impl From<MetricSpec> for Metric {
    fn from(spec: MetricSpec) -> Self {
        match spec {
            MetricSpec::Accuracy => Self::Accuracy,
        }
    }
}

fn argmax(row: ArrayView1<f32>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, max), (i, &v)| {
            if v > max { (i, v) } else { (best, max) }
        })
        .0
}

/// The outcome of running a model over one batch.
#[derive(Clone, Debug, PartialEq)]
pub struct Logs {
    pub loss: f32,
    pub metrics: Vec<(Metric, f32)>,
}

impl Logs {
    /// Returns the value of `metric`, if it was tracked.
    pub fn get(&self, metric: Metric) -> Option<f32> {
        self.metrics
            .iter()
            .find_map(|&(m, v)| (m == metric).then_some(v))
    }
}

impl Display for Logs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loss: {:.4}", self.loss)?;
        for (metric, value) in &self.metrics {
            write!(f, " - {}: {value:.4}", metric.name())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn accuracy_compares_the_most_probable_classes() {
        let y_pred = array![[0.1, 0.9], [0.8, 0.2], [0.3, 0.7], [0.6, 0.4]];
        let y = array![[0., 1.], [0., 1.], [0., 1.], [1., 0.]];

        assert_eq!(Metric::Accuracy.compute(y_pred.view(), y.view()), 0.75);
    }

    #[test]
    fn logs_render_like_a_progress_line() {
        let logs = Logs {
            loss: 0.5,
            metrics: vec![(Metric::Accuracy, 0.25)],
        };

        assert_eq!(logs.to_string(), "loss: 0.5000 - accuracy: 0.2500");
        assert_eq!(logs.get(Metric::Accuracy), Some(0.25));
    }
}
