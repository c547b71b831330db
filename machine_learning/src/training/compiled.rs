use log::debug;
use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, Ix2};

use crate::{
    MlErr, Result,
    arch::{
        Model, Trainable,
        loss::{LossFn, LossKind},
        metrics::{Logs, Metric},
    },
    optimization::{Optimizer, OptimizerKind},
};

/// A model compiled with the resolved optimizer and loss kinds.
pub type Compiled<M> = CompiledModel<M, OptimizerKind, LossKind>;

/// A trainable model bundled with how it learns: an optimizer, a loss function and the
/// metrics tracked on every batch.
///
/// Every parameter tensor gets its own optimizer, cloned from the prototype the first time
/// the tensor is updated.
#[derive(Clone, Debug)]
pub struct CompiledModel<M, O, L> {
    model: M,
    optimizer: O,
    optimizers: Vec<O>,
    loss: L,
    metrics: Vec<Metric>,
}

impl<M, O, L> CompiledModel<M, O, L>
where
    M: Trainable,
    O: Optimizer + Clone,
    L: LossFn,
{
    /// Creates a new `CompiledModel`.
    ///
    /// # Arguments
    /// * `model` - The model to train.
    /// * `optimizer` - The optimizer prototype.
    /// * `loss` - The loss function to minimize.
    /// * `metrics` - The metrics reported besides the loss.
    pub fn new(model: M, optimizer: O, loss: L, metrics: Vec<Metric>) -> Self {
        Self {
            model,
            optimizer,
            optimizers: Vec::new(),
            loss,
            metrics,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_inner(self) -> M {
        self.model
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Runs an inference forward pass.
    pub fn predict(&mut self, x: ArrayViewD<f32>) -> Result<ArrayD<f32>> {
        self.model.call(x, false)
    }

    /// Makes a single optimization step over a batch.
    ///
    /// # Arguments
    /// * `x` - The input batch.
    /// * `y` - The expected outputs, one row per sample.
    ///
    /// # Returns
    /// The loss and metrics of the batch, computed on the predictions before the update.
    pub fn train_on_batch(&mut self, x: ArrayViewD<f32>, y: ArrayView2<f32>) -> Result<Logs> {
        self.model.zero_grad();

        let y_pred = self.model.call(x, true)?;
        let y_pred = into_predictions(y_pred, y)?;
        let logs = self.logs(y_pred.view(), y);

        let d = self.loss.loss_prime(y_pred.view(), y);
        self.model.backward(d.into_dyn())?;

        let Self {
            model,
            optimizer,
            optimizers,
            ..
        } = self;

        let mut i = 0;
        model.visit_params(&mut |params, grad| {
            if i == optimizers.len() {
                optimizers.push(optimizer.clone());
            }

            optimizers[i].update_params(params, grad);
            i += 1;
        });

        debug!("updated {i} parameter tensors, {logs}");
        Ok(logs)
    }

    /// Evaluates the model over a batch without updating it.
    pub fn test_on_batch(&mut self, x: ArrayViewD<f32>, y: ArrayView2<f32>) -> Result<Logs> {
        let y_pred = self.model.call(x, false)?;
        let y_pred = into_predictions(y_pred, y)?;
        Ok(self.logs(y_pred.view(), y))
    }

    fn logs(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Logs {
        Logs {
            loss: self.loss.loss(y_pred, y),
            metrics: self
                .metrics
                .iter()
                .map(|metric| (*metric, metric.compute(y_pred, y)))
                .collect(),
        }
    }
}

fn into_predictions(y_pred: ArrayD<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>> {
    if y_pred.shape() != y.shape() {
        return Err(MlErr::ShapeMismatch {
            what: "predictions and targets",
            got: y_pred.shape().to_vec(),
            expected: y.shape().to_vec(),
        });
    }

    Ok(y_pred.into_dimensionality::<Ix2>()?)
}

impl<M: Model, O, L> Model for CompiledModel<M, O, L> {
    fn call(&mut self, x: ArrayViewD<f32>, training: bool) -> Result<ArrayD<f32>> {
        self.model.call(x, training)
    }
}
