mod hyperparameters;
mod space;
mod tunable;

pub use hyperparameters::{HyperParameters, Sampler};
pub use space::{FloatRange, HyperParameter, HyperparameterSpace, IntRange, Knob, Sampling, Value};
pub use tunable::{build_graph, build_model_seq, compile_spec};
