use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;
use rand_distr::uniform::Error as UniformError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    ShapeMismatch {
        what: &'static str,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    RankMismatch {
        layer: &'static str,
        got: usize,
        expected: usize,
    },
    InputTooSmall {
        layer: &'static str,
        got: (usize, usize),
        min: (usize, usize),
    },
    NoForwardPass {
        layer: &'static str,
    },
    InvalidLayer {
        layer: &'static str,
        reason: String,
    },
    InvalidGraph(String),
    InvalidHyperParameter {
        name: String,
        reason: String,
    },
    Shape(ShapeError),
    Init(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a shape mismatch in {what}, got {got:?} and expected {expected:?}"
            ),
            MlErr::RankMismatch {
                layer,
                got,
                expected,
            } => write!(
                f,
                "The {layer} layer expects a rank {expected} input, got rank {got}"
            ),
            MlErr::InputTooSmall { layer, got, min } => write!(
                f,
                "The {layer} layer needs at least a {}x{} input, got {}x{}",
                min.0, min.1, got.0, got.1
            ),
            MlErr::NoForwardPass { layer } => write!(
                f,
                "Tried to run the backward pass of a {layer} layer without a training forward pass"
            ),
            MlErr::InvalidLayer { layer, reason } => write!(f, "Invalid {layer} layer: {reason}"),
            MlErr::InvalidGraph(reason) => write!(f, "Invalid classifier graph: {reason}"),
            MlErr::InvalidHyperParameter { name, reason } => {
                write!(f, "Invalid hyperparameter '{name}': {reason}")
            }
            MlErr::Shape(e) => write!(f, "shape error: {e}"),
            MlErr::Init(msg) => write!(f, "failed to initialize parameters: {msg}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<UniformError> for MlErr {
    fn from(value: UniformError) -> Self {
        Self::Init(value.to_string())
    }
}
