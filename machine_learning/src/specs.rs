use serde::{Deserialize, Serialize};

use crate::{MlErr, Result, optimization::adam};

/// The specification for the `ActFn` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Relu,
    Softmax,
}

/// The reduction a pooling layer applies over each window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    Max,
    Average,
}

/// The specification for the `Layer` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Conv2d {
        filters: usize,
        kernel_size: (usize, usize),
        activation: Option<ActFnSpec>,
    },
    Pooling {
        kind: PoolKind,
        pool_size: (usize, usize),
    },
    GlobalAveragePooling,
    Flatten,
    Dense {
        units: usize,
        activation: Option<ActFnSpec>,
    },
    Dropout {
        rate: f32,
    },
    BatchNormalization,
}

impl LayerSpec {
    /// Whether the layer works on (batch, height, width, channels) inputs.
    pub fn is_spatial(&self) -> bool {
        matches!(
            self,
            Self::Conv2d { .. } | Self::Pooling { .. } | Self::GlobalAveragePooling
        )
    }

    /// Whether the layer leaves its outputs as (batch, features).
    pub fn is_flat(&self) -> bool {
        matches!(
            self,
            Self::GlobalAveragePooling | Self::Flatten | Self::Dense { .. }
        )
    }

    fn is_softmax_dense(&self) -> bool {
        matches!(
            self,
            Self::Dense {
                activation: Some(ActFnSpec::Softmax),
                ..
            }
        )
    }

    fn validate(&self, i: usize) -> Result<()> {
        let reason = match *self {
            Self::Conv2d {
                filters,
                kernel_size: (kh, kw),
                ..
            } if filters == 0 || kh == 0 || kw == 0 => {
                "convolutions need at least one filter and a non empty kernel".to_string()
            }
            Self::Pooling {
                pool_size: (ph, pw),
                ..
            } if ph == 0 || pw == 0 => "pool sizes must be positive".to_string(),
            Self::Dense { units: 0, .. } => "dense layers need at least one unit".to_string(),
            Self::Dropout { rate } if !(0. ..1.).contains(&rate) => {
                format!("dropout rate must be in [0, 1), got {rate}")
            }
            _ => return Ok(()),
        };

        Err(MlErr::InvalidGraph(format!("layer {i}: {reason}")))
    }
}

/// The specification for the `Optimizer` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adam {
        learning_rate: f32,
        #[serde(default = "default_beta1")]
        beta1: f32,
        #[serde(default = "default_beta2")]
        beta2: f32,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
    },
    GradientDescent {
        learning_rate: f32,
    },
}

fn default_beta1() -> f32 {
    adam::BETA1
}

fn default_beta2() -> f32 {
    adam::BETA2
}

fn default_epsilon() -> f32 {
    adam::EPSILON
}

impl OptimizerSpec {
    /// An Adam specification with the usual moment decays.
    pub fn adam(learning_rate: f32) -> Self {
        Self::Adam {
            learning_rate,
            beta1: adam::BETA1,
            beta2: adam::BETA2,
            epsilon: adam::EPSILON,
        }
    }
}

/// The specification for the `LossFn` trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFnSpec {
    CategoricalCrossentropy,
    Mse,
}

/// The specification for the `Metric` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricSpec {
    Accuracy,
}

/// How a model is turned into something trainable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileSpec {
    pub optimizer: OptimizerSpec,
    pub loss: LossFnSpec,
    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
}

impl CompileSpec {
    /// Adam with the given learning rate, categorical cross-entropy and accuracy.
    pub fn classifier(learning_rate: f32) -> Self {
        Self {
            optimizer: OptimizerSpec::adam(learning_rate),
            loss: LossFnSpec::CategoricalCrossentropy,
            metrics: vec![MetricSpec::Accuracy],
        }
    }
}

/// An ordered sequence of layers ending in a probability distribution over classes.
///
/// The graph always ends in exactly one softmax dense layer, and every spatial stage precedes
/// every flat one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GraphRepr", into = "GraphRepr")]
pub struct ClassifierGraph {
    input_shape: Option<(usize, usize, usize)>,
    layers: Vec<LayerSpec>,
}

#[derive(Serialize, Deserialize)]
struct GraphRepr {
    #[serde(default)]
    input_shape: Option<(usize, usize, usize)>,
    layers: Vec<LayerSpec>,
}

impl ClassifierGraph {
    /// Creates a new `ClassifierGraph`.
    ///
    /// # Arguments
    /// * `input_shape` - The (height, width, channels) of a sample, if known ahead of time.
    /// * `layers` - The layers from input to output.
    ///
    /// # Returns
    /// The graph or `MlErr::InvalidGraph` if the layers don't form a classifier.
    pub fn new(input_shape: Option<(usize, usize, usize)>, layers: Vec<LayerSpec>) -> Result<Self> {
        let graph = Self {
            input_shape,
            layers,
        };

        graph.validate()?;
        Ok(graph)
    }

    pub fn input_shape(&self) -> Option<(usize, usize, usize)> {
        self.input_shape
    }

    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    /// Returns the amount of classes the graph predicts.
    pub fn num_classes(&self) -> usize {
        match self.layers.last() {
            Some(LayerSpec::Dense { units, .. }) => *units,
            _ => 0,
        }
    }

    fn validate(&self) -> Result<()> {
        let Some((last, body)) = self.layers.split_last() else {
            return Err(MlErr::InvalidGraph("the graph has no layers".to_string()));
        };

        if !last.is_softmax_dense() {
            return Err(MlErr::InvalidGraph(
                "the last layer must be a dense layer with a softmax activation".to_string(),
            ));
        }

        if let Some(i) = body.iter().position(LayerSpec::is_softmax_dense) {
            return Err(MlErr::InvalidGraph(format!(
                "layer {i} is a softmax dense layer but only the last one may be"
            )));
        }

        let mut flat = false;
        for (i, layer) in self.layers.iter().enumerate() {
            layer.validate(i)?;

            if flat && layer.is_spatial() {
                return Err(MlErr::InvalidGraph(format!(
                    "layer {i} is spatial but comes after a flattened stage"
                )));
            }
            flat |= layer.is_flat();
        }

        if let Some(shape) = self.input_shape {
            self.check_spatial_dims(shape)?;
        }

        Ok(())
    }

    /// Walks the spatial dimensions through the graph so undersized inputs fail early.
    fn check_spatial_dims(&self, (h, w, c): (usize, usize, usize)) -> Result<()> {
        if h == 0 || w == 0 || c == 0 {
            return Err(MlErr::InvalidGraph(format!(
                "input shape ({h}, {w}, {c}) has an empty dimension"
            )));
        }

        let (mut h, mut w) = (h, w);
        for (i, layer) in self.layers.iter().enumerate() {
            let (kh, kw) = match *layer {
                LayerSpec::Conv2d { kernel_size, .. } => kernel_size,
                LayerSpec::Pooling { pool_size, .. } => pool_size,
                _ => continue,
            };

            if h < kh || w < kw {
                return Err(MlErr::InvalidGraph(format!(
                    "layer {i} needs at least a {kh}x{kw} input but gets {h}x{w}"
                )));
            }

            (h, w) = match layer {
                LayerSpec::Conv2d { .. } => (h - kh + 1, w - kw + 1),
                _ => (h / kh, w / kw),
            };
        }

        Ok(())
    }
}

impl TryFrom<GraphRepr> for ClassifierGraph {
    type Error = MlErr;

    fn try_from(repr: GraphRepr) -> Result<Self> {
        Self::new(repr.input_shape, repr.layers)
    }
}

impl From<ClassifierGraph> for GraphRepr {
    fn from(graph: ClassifierGraph) -> Self {
        Self {
            input_shape: graph.input_shape,
            layers: graph.layers,
        }
    }
}
