use ndarray::{ArrayD, ArrayViewD};

use crate::{
    Result,
    arch::{Model, Sequential, Trainable},
    specs::{ActFnSpec, ClassifierGraph, LayerSpec, PoolKind},
    training::ModelBuilder,
};

const DROPOUT: f32 = 0.3;

/// A small LeNet-5 style convolutional classifier.
///
/// conv(32, 3x3, relu) → max pool → conv(64, 3x3, relu) → average pool → flatten →
/// dense(120, relu) → dropout → dense(84, relu) → dropout → dense(classes, softmax).
#[derive(Clone, Debug)]
pub struct LeNet {
    net: Sequential,
}

impl LeNet {
    /// Creates a new `LeNet`.
    ///
    /// # Arguments
    /// * `num_classes` - The amount of classes to tell apart.
    /// * `seed` - The seed for parameter initialization and dropout, OS entropy if `None`.
    pub fn new(num_classes: usize, seed: Option<u64>) -> Result<Self> {
        let graph = Self::graph(num_classes, None)?;
        let net = ModelBuilder::new().build(&graph, seed)?;
        Ok(Self { net })
    }

    /// Same as `new`, but every input must be `(height, width, channels)` shaped.
    pub fn with_input_shape(
        num_classes: usize,
        input_shape: (usize, usize, usize),
        seed: Option<u64>,
    ) -> Result<Self> {
        let graph = Self::graph(num_classes, Some(input_shape))?;
        let net = ModelBuilder::new().build(&graph, seed)?;
        Ok(Self { net })
    }

    /// Returns the layers of a `LeNet` over `num_classes` classes.
    pub fn graph(
        num_classes: usize,
        input_shape: Option<(usize, usize, usize)>,
    ) -> Result<ClassifierGraph> {
        let relu = Some(ActFnSpec::Relu);
        let layers = vec![
            LayerSpec::Conv2d {
                filters: 32,
                kernel_size: (3, 3),
                activation: relu,
            },
            LayerSpec::Pooling {
                kind: PoolKind::Max,
                pool_size: (2, 2),
            },
            LayerSpec::Conv2d {
                filters: 64,
                kernel_size: (3, 3),
                activation: relu,
            },
            LayerSpec::Pooling {
                kind: PoolKind::Average,
                pool_size: (2, 2),
            },
            LayerSpec::Flatten,
            LayerSpec::Dense {
                units: 120,
                activation: relu,
            },
            LayerSpec::Dropout { rate: DROPOUT },
            LayerSpec::Dense {
                units: 84,
                activation: relu,
            },
            LayerSpec::Dropout { rate: DROPOUT },
            LayerSpec::Dense {
                units: num_classes,
                activation: Some(ActFnSpec::Softmax),
            },
        ];

        ClassifierGraph::new(input_shape, layers)
    }

    pub fn net(&self) -> &Sequential {
        &self.net
    }
}

impl Model for LeNet {
    fn call(&mut self, x: ArrayViewD<f32>, training: bool) -> Result<ArrayD<f32>> {
        self.net.call(x, training)
    }
}

impl Trainable for LeNet {
    fn backward(&mut self, d: ArrayD<f32>) -> Result<()> {
        self.net.backward(d)
    }

    fn visit_params(&mut self, f: &mut dyn FnMut(&mut [f32], &[f32])) {
        self.net.visit_params(f);
    }

    fn zero_grad(&mut self) {
        self.net.zero_grad();
    }
}
