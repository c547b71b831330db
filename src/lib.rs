//! Reads a labelled image directory and evaluates a convolutional classifier over it.

pub mod config;

use anyhow::{Context, bail};
use image_data::{ClassMode, DirectoryIterator};
use log::{debug, info};
use machine_learning::{
    arch::{Trainable, metrics::Metric},
    models::{DeepNet, LeNet},
    training::{Compiled, ModelBuilder},
    tuning::{HyperParameters, build_model_seq},
};

use config::{ModelConfig, RunConfig};

/// The outcome of evaluating a classifier over one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub samples: usize,
    pub loss: f32,
    pub accuracy: Option<f32>,
}

/// Builds the configured classifier, trains it for `train_steps` batches and then evaluates
/// it over one epoch of the batch source.
pub fn run(config: &RunConfig) -> anyhow::Result<Report> {
    let data = &config.data;
    if data.flow.class_mode != ClassMode::Categorical {
        bail!(
            "classifiers need categorical labels, got {:?}",
            data.flow.class_mode
        );
    }

    let generator = image_data::configure(data.rescale, data.zoom_range, data.validation_split)?;
    let batches = image_data::open(&generator, &data.directory, data.flow)
        .with_context(|| format!("cannot read images from '{}'", data.directory.display()))?;

    if batches.is_empty() {
        bail!("there are no images in '{}'", data.directory.display());
    }

    let (h, w) = data.flow.target_size;
    let input_shape = (h as usize, w as usize, data.flow.color_mode.channels());
    let num_classes = batches.num_classes();
    let builder = ModelBuilder::new();

    match &config.model {
        ModelConfig::Lenet => {
            let model = LeNet::with_input_shape(num_classes, input_shape, config.seed)?;
            drive(builder.compile(model, &config.compile), batches, config)
        }
        ModelConfig::Transfer { base } => {
            let base = builder.build_sequential(Some(input_shape), base, config.seed)?;
            let model = DeepNet::new(base, num_classes, config.seed)?;
            drive(builder.compile(model, &config.compile), batches, config)
        }
        ModelConfig::Tunable {
            hyperparameters,
            random_seed,
        } => {
            let mut hp = match random_seed {
                Some(seed) => HyperParameters::random(*seed),
                None => HyperParameters::new(),
            };
            for (name, value) in hyperparameters {
                hp.fix(name.clone(), value.clone());
            }

            let model = build_model_seq(&mut hp, input_shape, num_classes, config.seed)?;
            let unknown = hp.unrequested();
            if !unknown.is_empty() {
                bail!("the searchable model has no hyperparameters named {unknown:?}");
            }
            info!("hyperparameters: {:?}", hp.values());
            drive(model, batches, config)
        }
    }
}

fn drive<M: Trainable>(
    mut model: Compiled<M>,
    mut batches: DirectoryIterator,
    config: &RunConfig,
) -> anyhow::Result<Report> {
    for step in 0..config.train_steps {
        let batch = batches.next().context("the batch source is empty")??;
        let y = batch.one_hot().context("batch without one-hot labels")?;
        let logs = model.train_on_batch(batch.x.view().into_dyn(), y)?;
        info!("step {}/{} - {logs}", step + 1, config.train_steps);
    }

    batches.reset();
    let (mut samples, mut loss, mut hits) = (0, 0., 0.);
    for i in 0..batches.len() {
        let batch = batches.get(i)?;
        let y = batch.one_hot().context("batch without one-hot labels")?;
        let logs = model.test_on_batch(batch.x.view().into_dyn(), y)?;
        debug!("batch {i} - {logs}");

        let n = batch.len() as f32;
        samples += batch.len();
        loss += logs.loss * n;
        hits += logs.get(Metric::Accuracy).unwrap_or_default() * n;
    }

    let report = Report {
        samples,
        loss: loss / samples as f32,
        accuracy: model
            .metrics()
            .contains(&Metric::Accuracy)
            .then(|| hits / samples as f32),
    };

    info!(
        "evaluated {samples} samples with {} trainable parameters - loss: {:.4}",
        model.model_mut().size(),
        report.loss
    );
    Ok(report)
}
