use std::{collections::HashSet, fs, path::Path};

use image::{Rgb, RgbImage};
use image_data::{
    ClassMode, ColorMode, DataErr, FlowOptions, ImageDataGenerator, Subset, configure, open,
};
use ndarray::{Axis, array};
use tempfile::TempDir;

/// Writes `per_class` solid images per class, each class with its own shade.
fn dataset(classes: &[(&str, u8)], per_class: usize, (w, h): (u32, u32)) -> TempDir {
    let dir = tempfile::tempdir().unwrap();

    for &(class, shade) in classes {
        let class_dir = dir.path().join(class);
        fs::create_dir(&class_dir).unwrap();

        for i in 0..per_class {
            RgbImage::from_pixel(w, h, Rgb([shade, shade, shade]))
                .save(class_dir.join(format!("{i:03}.png")))
                .unwrap();
        }
    }

    dir
}

fn two_classes(per_class: usize) -> TempDir {
    dataset(&[("cats", 10), ("dogs", 200)], per_class, (40, 30))
}

fn options(batch_size: usize) -> FlowOptions {
    FlowOptions {
        batch_size: batch_size.try_into().unwrap(),
        target_size: (8, 8),
        ..FlowOptions::default()
    }
}

fn raw() -> ImageDataGenerator {
    ImageDataGenerator::new(0., 0., 0.).unwrap()
}

#[test]
fn batches_cover_the_directory_and_then_restart() {
    let dir = two_classes(50);
    let generator = ImageDataGenerator::default();
    let mut batches = open(&generator, dir.path(), FlowOptions::default()).unwrap();

    assert_eq!(batches.samples(), 100);
    assert_eq!(batches.len(), 7);
    assert_eq!(batches.class_indices()["cats"], 0);
    assert_eq!(batches.class_indices()["dogs"], 1);

    let mut per_class = [0.; 2];
    for i in 0..7 {
        let batch = batches.next().unwrap().unwrap();
        let expected = if i < 6 { 16 } else { 4 };

        assert_eq!(batch.x.shape(), &[expected, 160, 160, 3]);
        let y = batch.one_hot().unwrap();
        assert_eq!(y.shape(), &[expected, 2]);
        per_class[0] += y.column(0).sum();
        per_class[1] += y.column(1).sum();
    }
    assert_eq!(per_class, [50., 50.]);

    let restarted = batches.next().unwrap().unwrap();
    assert_eq!(restarted.len(), 16);
}

#[test]
fn validation_split_partitions_every_class() {
    let dir = two_classes(50);
    let generator = configure(1. / 255., 0.2, 0.2).unwrap();

    let training = open(&generator, dir.path(), options(16)).unwrap();
    let validation = open(
        &generator,
        dir.path(),
        FlowOptions {
            subset: Subset::Validation,
            ..options(16)
        },
    )
    .unwrap();

    assert_eq!(training.samples(), 80);
    assert_eq!(validation.samples(), 20);

    let train_files: HashSet<_> = training.filenames().iter().collect();
    assert!(validation.filenames().iter().all(|f| !train_files.contains(f)));
    assert_eq!(validation.classes().iter().filter(|&&c| c == 0).count(), 10);
    assert!(validation.filenames()[0].starts_with("cats"));
}

#[test]
fn validation_subset_needs_a_split() {
    let dir = two_classes(2);
    let options = FlowOptions {
        subset: Subset::Validation,
        ..options(2)
    };

    let err = open(&ImageDataGenerator::default(), dir.path(), options);
    assert!(matches!(err, Err(DataErr::MissingValidationSplit)));
}

#[test]
fn empty_target_sizes_are_rejected() {
    let dir = two_classes(2);

    for target_size in [(0, 0), (0, 8), (8, 0)] {
        let options = FlowOptions {
            target_size,
            ..options(2)
        };
        let err = open(&raw(), dir.path(), options);
        assert!(matches!(err, Err(DataErr::InvalidTargetSize(size)) if size == target_size));
    }
}

#[test]
fn pixels_are_rescaled() {
    let dir = dataset(&[("white", 255), ("black", 0)], 3, (8, 8));
    let generator = ImageDataGenerator::new(1. / 255., 0.2, 0.).unwrap();
    let mut batches = open(&generator, dir.path(), options(6)).unwrap();

    let batch = batches.next().unwrap().unwrap();
    assert!(batch.x.iter().all(|&v| (0. ..=1.).contains(&v)));

    // Solid images stay solid under zoom
    let white = batch.x.index_axis(Axis(0), 3);
    assert!(white.iter().all(|&v| (v - 1.).abs() < 1e-6));
}

#[test]
fn shuffled_labels_follow_their_images() {
    let dir = two_classes(10);
    let options = FlowOptions {
        shuffle: true,
        seed: 3,
        ..options(5)
    };

    let mut a = open(&raw(), dir.path(), options).unwrap();
    let mut b = open(&raw(), dir.path(), options).unwrap();

    for _ in 0..8 {
        let batch = a.next().unwrap().unwrap();
        assert_eq!(batch, b.next().unwrap().unwrap());

        let y = batch.one_hot().unwrap();
        for (img, label) in batch.x.axis_iter(Axis(0)).zip(y.rows()) {
            let expected = if img[[0, 0, 0]] == 10. {
                array![1f32, 0.]
            } else {
                array![0f32, 1.]
            };
            assert_eq!(label, expected);
        }
    }
}

#[test]
fn random_access_matches_iteration() {
    let dir = two_classes(5);
    let mut batches = open(&raw(), dir.path(), options(4)).unwrap();

    let second = batches.get(1).unwrap();
    batches.next().unwrap().unwrap();
    assert_eq!(batches.next().unwrap().unwrap(), second);

    assert!(matches!(
        batches.get(3),
        Err(DataErr::BatchOutOfRange { index: 3, len: 3 })
    ));

    batches.reset();
    assert_eq!(batches.next().unwrap().unwrap().x, batches.get(0).unwrap().x);
}

#[test]
fn color_modes_set_the_channels() {
    let dir = two_classes(2);

    for (color_mode, channels) in [(ColorMode::Grayscale, 1), (ColorMode::Rgba, 4)] {
        let options = FlowOptions {
            color_mode,
            ..options(4)
        };
        let mut batches = open(&raw(), dir.path(), options).unwrap();
        let batch = batches.next().unwrap().unwrap();
        assert_eq!(batch.x.shape(), &[4, 8, 8, channels]);
    }
}

#[test]
fn class_modes_shape_the_labels() {
    let dir = two_classes(3);
    let mode = |class_mode| FlowOptions {
        class_mode,
        ..options(6)
    };

    let first_batch = |class_mode| {
        let mut batches = open(&raw(), dir.path(), mode(class_mode)).unwrap();
        batches.next().unwrap().unwrap()
    };

    let sparse = first_batch(ClassMode::Sparse).y.unwrap();
    assert_eq!(sparse.shape(), &[6]);
    assert_eq!(sparse.into_raw_vec_and_offset().0, vec![0., 0., 0., 1., 1., 1.]);

    let input = first_batch(ClassMode::Input);
    assert_eq!(input.y.unwrap(), input.x.into_dyn());

    assert!(first_batch(ClassMode::None).y.is_none());
}

#[test]
fn binary_labels_need_two_classes() {
    let dir = dataset(&[("a", 0), ("b", 100), ("c", 200)], 1, (4, 4));
    let options = FlowOptions {
        class_mode: ClassMode::Binary,
        ..options(1)
    };

    let err = open(&raw(), dir.path(), options);
    assert!(matches!(err, Err(DataErr::BinaryClassCount(3))));
}

#[test]
fn non_images_and_missing_directories_are_handled() {
    let dir = two_classes(2);
    fs::write(dir.path().join("cats").join("notes.txt"), "not an image").unwrap();
    fs::write(dir.path().join("README.md"), "top level file").unwrap();

    let batches = open(&raw(), dir.path(), options(4)).unwrap();
    assert_eq!(batches.samples(), 4);
    assert_eq!(batches.num_classes(), 2);

    let missing = open(&raw(), Path::new("/definitely/not/here"), options(4));
    assert!(matches!(missing, Err(DataErr::NotADirectory(_))));
}
