use std::fs;

use convnets::{
    config::{ModelConfig, RunConfig},
    run,
};
use image::{Rgb, RgbImage};
use serde_json::{Value, json};
use tempfile::TempDir;

/// Writes six solid 24x24 images for each of two classes.
fn dataset() -> TempDir {
    let dir = tempfile::tempdir().unwrap();

    for (class, shade) in [("roses", 30), ("tulips", 220)] {
        let class_dir = dir.path().join(class);
        fs::create_dir(&class_dir).unwrap();

        for i in 0..6u8 {
            RgbImage::from_pixel(24, 24, Rgb([shade, shade / 2, i * 10]))
                .save(class_dir.join(format!("{i}.png")))
                .unwrap();
        }
    }

    dir
}

fn config(dir: &TempDir, model: Value) -> RunConfig {
    serde_json::from_value(json!({
        "data": {
            "directory": dir.path(),
            "flow": { "target_size": [24, 24], "batch_size": 4, "shuffle": true, "seed": 5 }
        },
        "model": model,
        "seed": 11
    }))
    .unwrap()
}

#[test]
fn lenet_is_evaluated_over_every_sample() {
    let dir = dataset();
    let report = run(&config(&dir, json!({ "kind": "lenet" }))).unwrap();

    assert_eq!(report.samples, 12);
    assert!(report.loss.is_finite() && report.loss > 0.);

    let accuracy = report.accuracy.unwrap();
    assert!((0. ..=1.).contains(&accuracy));
}

#[test]
fn seeded_runs_are_reproducible() {
    let dir = dataset();
    let config = config(&dir, json!({ "kind": "lenet" }));

    assert_eq!(run(&config).unwrap(), run(&config).unwrap());
}

#[test]
fn transfer_models_train_their_head() {
    let dir = dataset();
    let mut config = config(
        &dir,
        json!({
            "kind": "transfer",
            "base": [
                { "conv2d": { "filters": 4, "kernel_size": [3, 3], "activation": "relu" } },
                "batch_normalization"
            ]
        }),
    );
    config.train_steps = 3;

    assert!(matches!(config.model, ModelConfig::Transfer { ref base } if base.len() == 2));
    assert_eq!(run(&config).unwrap().samples, 12);
}

#[test]
fn tunable_models_take_fixed_and_random_knobs() {
    let dir = dataset();
    let mut config = config(
        &dir,
        json!({
            "kind": "tunable",
            "hyperparameters": { "conv_blocks": 1, "filters_0": 32, "n_layers": 1, "hid_nodes_0": 20 },
            "random_seed": 7
        }),
    );
    config.train_steps = 2;

    let report = run(&config).unwrap();
    assert_eq!(report.samples, 12);
    assert!(report.accuracy.is_some());
}

#[test]
fn unknown_hyperparameters_are_rejected() {
    let dir = dataset();
    let tunable = |hyperparameters: Value| {
        let mut config = config(
            &dir,
            json!({ "kind": "tunable", "hyperparameters": hyperparameters }),
        );
        config.train_steps = 1;
        run(&config)
    };

    let knobs = json!({ "conv_blocks": 1, "n_layers": 1, "dropoutConv": 0.1, "dropoutDense": 0.0 });
    assert!(tunable(knobs).is_ok());

    let err = tunable(json!({ "conv_blocks": 1, "n_layers": 1, "dropout_conv": 0.1 })).unwrap_err();
    assert!(err.to_string().contains("dropout_conv"));
}

#[test]
fn configs_are_loaded_from_json_files() {
    let dir = dataset();
    let path = dir.path().join("run.json");
    let content = json!({
        "data": {
            "directory": dir.path(),
            "zoom_range": 0.0,
            "flow": { "target_size": [24, 24], "batch_size": 5 }
        },
        "model": { "kind": "lenet" },
        "compile": {
            "optimizer": { "gradient_descent": { "learning_rate": 0.01 } },
            "loss": "categorical_crossentropy"
        },
        "train_steps": 1
    });
    fs::write(&path, content.to_string()).unwrap();

    let config = RunConfig::from_file(&path).unwrap();
    let report = run(&config).unwrap();

    assert_eq!(report.samples, 12);
    assert_eq!(report.accuracy, None);
}

#[test]
fn bad_inputs_are_reported() {
    let dir = dataset();

    let mut missing = config(&dir, json!({ "kind": "lenet" }));
    missing.data.directory = dir.path().join("nowhere");
    assert!(run(&missing).is_err());

    let mut sparse = config(&dir, json!({ "kind": "lenet" }));
    sparse.data.flow.class_mode = image_data::ClassMode::Sparse;
    assert!(run(&sparse).is_err());

    assert!(RunConfig::from_file(dir.path().join("absent.json")).is_err());
}
