use machine_learning::{
    arch::{Model, Sequential, Trainable, layers::Layer, metrics::Metric},
    models::{DeepNet, LeNet},
    specs::{
        ActFnSpec, ClassifierGraph, CompileSpec, LayerSpec, LossFnSpec, MetricSpec, OptimizerSpec,
    },
    training::ModelBuilder,
    tuning::{HyperParameters, build_model_seq},
};
use ndarray::{Array2, Array4, ArrayD, Axis, array};
use ndarray_rand::{RandomExt, rand_distr::Uniform};
use rand::{SeedableRng, rngs::StdRng};

fn images(n: usize, h: usize, w: usize, c: usize, seed: u64) -> ArrayD<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Uniform::new(0f32, 1.).unwrap();
    Array4::random_using((n, h, w, c), dist, &mut rng).into_dyn()
}

fn assert_distributions(y: &ArrayD<f32>, num_classes: usize) {
    assert_eq!(y.shape()[1], num_classes);
    for row in y.axis_iter(Axis(0)) {
        assert!(row.iter().all(|&p| p >= 0.));
        assert!((row.sum() - 1.).abs() < 1e-4);
    }
}

fn base_extractor(seed: u64) -> Sequential {
    let layers = [
        LayerSpec::Conv2d {
            filters: 8,
            kernel_size: (3, 3),
            activation: Some(ActFnSpec::Relu),
        },
        LayerSpec::BatchNormalization,
    ];

    ModelBuilder::new()
        .build_sequential(None, &layers, Some(seed))
        .unwrap()
}

fn moving_stats(model: &Sequential) -> Vec<f32> {
    model
        .layers()
        .iter()
        .filter_map(|layer| match layer {
            Layer::BatchNorm(bn) => Some(
                bn.moving_mean()
                    .iter()
                    .chain(bn.moving_variance())
                    .copied()
                    .collect::<Vec<_>>(),
            ),
            _ => None,
        })
        .flatten()
        .collect()
}

#[test]
fn lenet_outputs_class_distributions() {
    let mut lenet = LeNet::new(4, Some(0)).unwrap();
    let x = images(3, 28, 28, 3, 1);

    let y = lenet.call(x.view(), false).unwrap();

    assert_eq!(y.shape(), &[3, 4]);
    assert_distributions(&y, 4);
}

#[test]
fn dropout_is_inert_at_inference() {
    let x = images(2, 20, 20, 1, 2);

    let mut lenet = LeNet::new(3, Some(5)).unwrap();
    let first = lenet.call(x.view(), false).unwrap();
    assert_eq!(first, lenet.call(x.view(), false).unwrap());

    let mut hp = HyperParameters::random(9);
    hp.fix("conv_blocks", 2_i64);
    let mut tunable = build_model_seq(&mut hp, (20, 20, 1), 3, Some(5)).unwrap();
    let first = tunable.predict(x.view()).unwrap();
    assert_eq!(first, tunable.predict(x.view()).unwrap());
    assert_distributions(&first, 3);

    let mut deepnet = DeepNet::new(base_extractor(1), 3, Some(5)).unwrap();
    let first = deepnet.call(x.view(), false).unwrap();
    assert_eq!(first, deepnet.call(x.view(), false).unwrap());
}

#[test]
fn training_calls_drop_units() {
    let x = images(2, 20, 20, 1, 6);
    let assert_dropout = |model: &mut dyn Model| {
        let inference = model.call(x.view(), false).unwrap();
        let first = model.call(x.view(), true).unwrap();
        let second = model.call(x.view(), true).unwrap();

        assert_ne!(first, second);
        assert_ne!(first, inference);
        assert_distributions(&first, 3);
    };

    assert_dropout(&mut LeNet::new(3, Some(5)).unwrap());
    assert_dropout(&mut DeepNet::new(base_extractor(1), 3, Some(5)).unwrap());

    let mut hp = HyperParameters::random(9);
    hp.fix("conv_blocks", 1_i64)
        .fix("n_layers", 1_i64)
        .fix("dropoutConv", 0.5)
        .fix("dropoutDense", 0.5);
    let mut tunable = build_model_seq(&mut hp, (20, 20, 1), 3, Some(5)).unwrap();
    assert_dropout(tunable.model_mut());
}

#[test]
fn empty_training_batches_keep_the_model_usable() {
    let mut hp = HyperParameters::new();
    hp.fix("conv_blocks", 1_i64).fix("n_layers", 1_i64);
    let mut model = build_model_seq(&mut hp, (8, 8, 1), 2, Some(0)).unwrap();

    let empty = ArrayD::zeros(vec![0, 8, 8, 1]);
    assert!(model.model_mut().call(empty.view(), true).is_err());

    let y = model.predict(images(2, 8, 8, 1, 3).view()).unwrap();
    assert!(y.iter().all(|p| p.is_finite()));
    assert_distributions(&y, 2);
}

#[test]
fn deepnet_never_trains_its_base() {
    let mut base = base_extractor(3);
    let x = images(4, 12, 12, 3, 4);
    base.call(x.view(), false).unwrap();
    let stats = moving_stats(&base);
    assert_eq!(stats.len(), 16);

    let deepnet = DeepNet::new(base, 2, Some(0)).unwrap();
    let mut model = ModelBuilder::new().compile(deepnet, &CompileSpec::classifier(1e-2));
    let y = array![[1., 0.], [0., 1.], [1., 0.], [0., 1.]];

    let probs = model.model_mut().call(x.view(), true).unwrap();
    assert_distributions(&probs, 2);
    for _ in 0..3 {
        model.train_on_batch(x.view(), y.view()).unwrap();
    }

    assert_eq!(moving_stats(model.model().base()), stats);
    let head_size: usize = model.model().head().layers().iter().map(Layer::size).sum();
    assert_eq!(model.model_mut().size(), head_size);
}

#[test]
fn searchable_models_end_in_a_distribution() {
    for seed in 0..4 {
        let mut hp = HyperParameters::random(seed);
        let mut model = build_model_seq(&mut hp, (64, 64, 3), 5, Some(seed)).unwrap();

        let y = model.predict(images(2, 64, 64, 3, seed).view()).unwrap();
        assert_distributions(&y, 5);
        assert_eq!(model.metrics(), &[Metric::Accuracy]);
    }
}

#[test]
fn training_steps_reduce_the_loss() {
    let graph = ClassifierGraph::new(
        Some((2, 2, 1)),
        vec![
            LayerSpec::Flatten,
            LayerSpec::Dense {
                units: 2,
                activation: Some(ActFnSpec::Softmax),
            },
        ],
    )
    .unwrap();
    let spec = CompileSpec {
        optimizer: OptimizerSpec::GradientDescent { learning_rate: 0.5 },
        loss: LossFnSpec::CategoricalCrossentropy,
        metrics: vec![MetricSpec::Accuracy],
    };

    let builder = ModelBuilder::new();
    let mut model = builder.compile(builder.build(&graph, Some(0)).unwrap(), &spec);

    // Bright images are class 0, dark ones class 1
    let x = Array4::from_shape_fn((4, 2, 2, 1), |(n, ..)| if n % 2 == 0 { 1. } else { -1. })
        .into_dyn();
    let y: Array2<f32> = array![[1., 0.], [0., 1.], [1., 0.], [0., 1.]];

    let before = model.test_on_batch(x.view(), y.view()).unwrap();
    for _ in 0..50 {
        model.train_on_batch(x.view(), y.view()).unwrap();
    }
    let after = model.test_on_batch(x.view(), y.view()).unwrap();

    assert!(after.loss < before.loss);
    assert_eq!(after.get(Metric::Accuracy), Some(1.));
}

#[test]
fn mismatched_targets_are_rejected() {
    let lenet = LeNet::new(3, Some(0)).unwrap();
    let mut model = ModelBuilder::new().compile(lenet, &CompileSpec::classifier(1e-3));
    let x = images(2, 16, 16, 1, 0);

    assert!(model.train_on_batch(x.view(), Array2::zeros((2, 4)).view()).is_err());
}
