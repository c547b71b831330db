//! Labelled image batches read from a directory tree, one subdirectory per class, with
//! rescaling and random zoom augmentation.

pub mod augment;
mod batch;
mod directory;
pub mod error;
mod generator;
pub mod options;

use std::path::Path;

pub use batch::Batch;
pub use directory::DirectoryIterator;
pub use error::{DataErr, Result};
pub use generator::ImageDataGenerator;
pub use options::{ClassMode, ColorMode, FlowOptions, Interpolation, Subset};

/// Creates the augmentation policy batches are drawn with.
///
/// # Arguments
/// * `rescale` - The factor pixel values are multiplied by, usually `1 / 255`.
/// * `zoom_range` - The maximum relative zoom applied to each image.
/// * `validation_split` - The fraction of every class reserved for validation.
pub fn configure(rescale: f32, zoom_range: f32, validation_split: f32) -> Result<ImageDataGenerator> {
    ImageDataGenerator::new(rescale, zoom_range, validation_split)
}

/// Opens an endless batch source over `directory` following `generator`'s policy.
pub fn open(
    generator: &ImageDataGenerator,
    directory: impl AsRef<Path>,
    options: FlowOptions,
) -> Result<DirectoryIterator> {
    generator.flow_from_directory(directory, options)
}
