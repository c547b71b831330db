use log::info;

use super::{
    Sampler,
    space::{FloatRange, IntRange, Sampling, invalid},
};
use crate::{
    Result,
    arch::Sequential,
    specs::{ActFnSpec, ClassifierGraph, CompileSpec, LayerSpec, PoolKind},
    training::{Compiled, ModelBuilder},
};

pub const CONV_BLOCKS: IntRange = IntRange::new(1, 4).with_default(3);
pub const FILTERS: IntRange = IntRange::new(32, 128).with_step(32);
pub const POOLING: [&str; 2] = ["avg", "max"];
pub const DROPOUT: FloatRange = FloatRange::new(0., 0.5).with_step(0.1).with_default(0.3);
pub const N_LAYERS: IntRange = IntRange::new(1, 3).with_default(2);
pub const HID_NODES: IntRange = IntRange::new(20, 180).with_step(10).with_default(60);
pub const LEARNING_RATE: FloatRange = FloatRange::new(1e-4, 1e-2)
    .with_sampling(Sampling::Log)
    .with_default(1e-3);

/// Draws a searchable convolutional classifier from `hp`.
///
/// Every convolutional block is conv(filters_i, 3x3, relu) → batch normalization →
/// pooling_i(2x2), the stack is followed by one dropout and a flatten. Then come the dense
/// blocks, dense(hid_nodes_j, relu) → batch normalization → dropout, and the softmax head.
/// Both dense and convolutional dropouts reuse a single knob each, so a sampler that caches
/// by name shares one rate across every dense block.
pub fn build_graph<S: Sampler + ?Sized>(
    hp: &mut S,
    input_shape: (usize, usize, usize),
    num_classes: usize,
) -> Result<ClassifierGraph> {
    let mut layers = Vec::new();

    let conv_blocks = count(hp, "conv_blocks", CONV_BLOCKS)?;
    for i in 0..conv_blocks {
        let filters = count(hp, &format!("filters_{i}"), FILTERS)?;
        layers.push(LayerSpec::Conv2d {
            filters,
            kernel_size: (3, 3),
            activation: Some(ActFnSpec::Relu),
        });
        layers.push(LayerSpec::BatchNormalization);

        let kind = match hp.choice(&format!("pooling_{i}"), &POOLING)?.as_str() {
            "max" => PoolKind::Max,
            _ => PoolKind::Average,
        };
        layers.push(LayerSpec::Pooling {
            kind,
            pool_size: (2, 2),
        });
    }

    let rate = hp.float("dropoutConv", DROPOUT)? as f32;
    layers.push(LayerSpec::Dropout { rate });
    layers.push(LayerSpec::Flatten);

    let n_layers = count(hp, "n_layers", N_LAYERS)?;
    for j in 0..n_layers {
        let units = count(hp, &format!("hid_nodes_{j}"), HID_NODES)?;
        layers.push(LayerSpec::Dense {
            units,
            activation: Some(ActFnSpec::Relu),
        });
        layers.push(LayerSpec::BatchNormalization);

        let rate = hp.float("dropoutDense", DROPOUT)? as f32;
        layers.push(LayerSpec::Dropout { rate });
    }

    layers.push(LayerSpec::Dense {
        units: num_classes,
        activation: Some(ActFnSpec::Softmax),
    });

    ClassifierGraph::new(Some(input_shape), layers)
}

/// Draws how a searchable classifier is compiled: Adam with a log-sampled learning rate,
/// categorical cross-entropy and accuracy.
pub fn compile_spec<S: Sampler + ?Sized>(hp: &mut S) -> Result<CompileSpec> {
    let learning_rate = hp.float("learning_rate", LEARNING_RATE)? as f32;
    Ok(CompileSpec::classifier(learning_rate))
}

/// Draws a searchable classifier from `hp`, materializes it and compiles it.
///
/// # Arguments
/// * `hp` - The source of every hyperparameter.
/// * `input_shape` - The (height, width, channels) of a sample.
/// * `num_classes` - The amount of classes to tell apart.
/// * `seed` - The seed for parameter initialization and dropout, OS entropy if `None`.
pub fn build_model_seq<S: Sampler + ?Sized>(
    hp: &mut S,
    input_shape: (usize, usize, usize),
    num_classes: usize,
    seed: Option<u64>,
) -> Result<Compiled<Sequential>> {
    let graph = build_graph(hp, input_shape, num_classes)?;
    let spec = compile_spec(hp)?;

    let builder = ModelBuilder::new();
    let model = builder.build(&graph, seed)?;
    info!("compiled a searchable classifier with {:?}", spec.optimizer);
    Ok(builder.compile(model, &spec))
}

fn count<S: Sampler + ?Sized>(hp: &mut S, name: &str, range: IntRange) -> Result<usize> {
    let value = hp.int(name, range)?;
    usize::try_from(value).map_err(|_| invalid(name, format!("{value} is not a valid count")))
}
