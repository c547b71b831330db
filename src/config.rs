use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use image_data::FlowOptions;
use machine_learning::{
    specs::{CompileSpec, LayerSpec},
    tuning::Value,
};
use serde::{Deserialize, Serialize};

/// Everything a run needs: where the images are, which classifier to build and how long to
/// train it before evaluating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub data: DataConfig,
    pub model: ModelConfig,
    /// How `lenet` and `transfer` models are compiled, searchable models draw their own.
    #[serde(default = "default_compile")]
    pub compile: CompileSpec,
    /// Single batch optimization steps made before evaluating.
    #[serde(default)]
    pub train_steps: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_compile() -> CompileSpec {
    CompileSpec::classifier(1e-3)
}

impl RunConfig {
    /// Loads a `RunConfig` from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read '{}'", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("invalid run config in '{}'", path.display()))
    }
}

/// The batch source: an augmentation policy over a directory with one subdirectory per class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub directory: PathBuf,
    #[serde(default = "default_rescale")]
    pub rescale: f32,
    #[serde(default = "default_zoom_range")]
    pub zoom_range: f32,
    #[serde(default)]
    pub validation_split: f32,
    #[serde(default)]
    pub flow: FlowOptions,
}

fn default_rescale() -> f32 {
    1. / 255.
}

fn default_zoom_range() -> f32 {
    0.2
}

/// The classifier a run builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelConfig {
    Lenet,
    /// A dense head on top of a frozen feature extractor made of `base`.
    Transfer { base: Vec<LayerSpec> },
    /// A searchable classifier. Knobs missing from `hyperparameters` take their defaults, or
    /// random values when there's a `random_seed`.
    Tunable {
        #[serde(default)]
        hyperparameters: BTreeMap<String, Value>,
        #[serde(default)]
        random_seed: Option<u64>,
    },
}
