use ndarray::{ArrayD, ArrayViewD};

use crate::{
    Result,
    arch::{Model, Sequential, Trainable},
    specs::{ActFnSpec, ClassifierGraph, LayerSpec},
    training::ModelBuilder,
};

const DROPOUT: f32 = 0.3;

/// A transfer learning classifier: a pretrained feature extractor followed by a small dense
/// head.
///
/// The base is always called in inference mode, so its batch normalization statistics never
/// drift, and it receives no gradient. Only the head learns.
#[derive(Clone, Debug)]
pub struct DeepNet<B> {
    base: B,
    head: Sequential,
}

impl<B: Model> DeepNet<B> {
    /// Creates a new `DeepNet`.
    ///
    /// # Arguments
    /// * `base` - The feature extractor, producing (batch, height, width, channels) maps.
    /// * `num_classes` - The amount of classes to tell apart.
    /// * `seed` - The seed for the head's initialization and dropout, OS entropy if `None`.
    pub fn new(base: B, num_classes: usize, seed: Option<u64>) -> Result<Self> {
        let head = ModelBuilder::new().build(&transfer_head(num_classes)?, seed)?;
        Ok(Self { base, head })
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    pub fn head(&self) -> &Sequential {
        &self.head
    }

    pub fn into_base(self) -> B {
        self.base
    }
}

/// Returns the classification head a `DeepNet` places on top of its base.
pub fn transfer_head(num_classes: usize) -> Result<ClassifierGraph> {
    let relu = Some(ActFnSpec::Relu);
    let layers = vec![
        LayerSpec::GlobalAveragePooling,
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

    ClassifierGraph::new(None, layers)
}

impl<B: Model> Model for DeepNet<B> {
    fn call(&mut self, x: ArrayViewD<f32>, training: bool) -> Result<ArrayD<f32>> {
        let features = self.base.call(x, false)?;
        self.head.call(features.view(), training)
    }
}

impl<B: Model> Trainable for DeepNet<B> {
    fn backward(&mut self, d: ArrayD<f32>) -> Result<()> {
        self.head.backward(d)
    }

    fn visit_params(&mut self, f: &mut dyn FnMut(&mut [f32], &[f32])) {
        self.head.visit_params(f);
    }

    fn zero_grad(&mut self) {
        self.head.zero_grad();
    }
}
