use log::info;
use rand::{SeedableRng, rngs::StdRng};

use super::{Compiled, CompiledModel};
use crate::{
    Result,
    arch::{Sequential, Trainable, activations::ActFn, layers::Layer},
    specs::{ActFnSpec, ClassifierGraph, CompileSpec, LayerSpec},
};

/// Builds models given their specification.
#[derive(Default)]
pub struct ModelBuilder;

impl ModelBuilder {
    /// Creates a new `ModelBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds the `Sequential` described by a classifier graph.
    ///
    /// # Arguments
    /// * `graph` - The already validated graph.
    /// * `seed` - The seed for parameter initialization and dropout, OS entropy if `None`.
    pub fn build(&self, graph: &ClassifierGraph, seed: Option<u64>) -> Result<Sequential> {
        let model = self.build_sequential(graph.input_shape(), graph.layers(), seed)?;
        info!(
            "built a {} layer classifier over {} classes",
            graph.layers().len(),
            graph.num_classes()
        );
        Ok(model)
    }

    /// Builds a `Sequential` out of arbitrary layers, such as a feature extractor without a
    /// classification head.
    pub fn build_sequential(
        &self,
        input_shape: Option<(usize, usize, usize)>,
        layers: &[LayerSpec],
        seed: Option<u64>,
    ) -> Result<Sequential> {
        let layers = layers
            .iter()
            .map(|spec| self.resolve_layer(*spec))
            .collect::<Result<Vec<_>>>()?;

        let model = Sequential::new(layers, self.generate_rng(seed));
        Ok(match input_shape {
            Some(shape) => model.with_input_shape(shape),
            None => model,
        })
    }

    /// Compiles a model following a spec.
    pub fn compile<M: Trainable>(&self, model: M, spec: &CompileSpec) -> Compiled<M> {
        CompiledModel::new(
            model,
            spec.optimizer.into(),
            spec.loss.into(),
            spec.metrics.iter().map(|&m| m.into()).collect(),
        )
    }

    fn resolve_layer(&self, spec: LayerSpec) -> Result<Layer> {
        let layer = match spec {
            LayerSpec::Conv2d {
                filters,
                kernel_size,
                activation,
            } => {
                let factory = |act_fn| Layer::conv2d(filters, kernel_size, act_fn);
                self.resolve_act_fn(activation, factory)
            }
            LayerSpec::Pooling { kind, pool_size } => Layer::pooling(kind, pool_size),
            LayerSpec::GlobalAveragePooling => Layer::global_average_pooling(),
            LayerSpec::Flatten => Layer::flatten(),
            LayerSpec::Dense { units, activation } => {
                let factory = |act_fn| Layer::dense(units, act_fn);
                self.resolve_act_fn(activation, factory)
            }
            LayerSpec::Dropout { rate } => Layer::dropout(rate)?,
            LayerSpec::BatchNormalization => Layer::batch_normalization(),
        };

        Ok(layer)
    }

    fn resolve_act_fn<F>(&self, spec: Option<ActFnSpec>, layer_factory: F) -> Layer
    where
        F: FnOnce(Option<ActFn>) -> Layer,
    {
        layer_factory(spec.map(ActFn::from))
    }

    fn generate_rng(&self, seed: Option<u64>) -> StdRng {
        generate_rng(seed)
    }
}

/// Seeds a generator from `seed`, or from OS entropy if there's none.
pub fn generate_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::PoolKind;

    #[test]
    fn layers_are_resolved_in_order() {
        let specs = [
            LayerSpec::Conv2d {
                filters: 4,
                kernel_size: (3, 3),
                activation: Some(ActFnSpec::Relu),
            },
            LayerSpec::BatchNormalization,
            LayerSpec::Pooling {
                kind: PoolKind::Average,
                pool_size: (2, 2),
            },
            LayerSpec::Flatten,
            LayerSpec::Dropout { rate: 0.2 },
            LayerSpec::Dense {
                units: 3,
                activation: Some(ActFnSpec::Softmax),
            },
        ];
        let graph = ClassifierGraph::new(Some((8, 8, 1)), specs.to_vec()).unwrap();

        let model = ModelBuilder::new().build(&graph, Some(0)).unwrap();
        let resolved: Vec<_> = model.layers().iter().map(Layer::spec).collect();

        assert_eq!(resolved, specs);
        assert_eq!(model.input_shape(), Some((8, 8, 1)));
    }
}
