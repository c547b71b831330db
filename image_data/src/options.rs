use std::num::NonZeroUsize;

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// The color channels images are loaded with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    Grayscale,
    #[default]
    Rgb,
    Rgba,
}

impl ColorMode {
    pub fn channels(&self) -> usize {
        match self {
            ColorMode::Grayscale => 1,
            ColorMode::Rgb => 3,
            ColorMode::Rgba => 4,
        }
    }
}

/// The kind of labels yielded alongside every batch of images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassMode {
    /// One-hot rows, `(n, classes)`.
    #[default]
    Categorical,
    /// The class index of each of two classes, `(n,)`.
    Binary,
    /// The class index, `(n,)`.
    Sparse,
    /// The images themselves, for autoencoders.
    Input,
    /// No labels.
    None,
}

/// Which partition of a split directory is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subset {
    #[default]
    Training,
    Validation,
}

/// The filter used when resizing images to the target size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Nearest,
    Bilinear,
}

impl From<Interpolation> for FilterType {
    fn from(value: Interpolation) -> Self {
        match value {
            Interpolation::Nearest => FilterType::Nearest,
            Interpolation::Bilinear => FilterType::Triangle,
        }
    }
}

/// How a directory of images is turned into batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowOptions {
    pub color_mode: ColorMode,
    pub batch_size: NonZeroUsize,
    /// The (height, width) every image is resized to.
    pub target_size: (u32, u32),
    pub class_mode: ClassMode,
    pub seed: u64,
    pub shuffle: bool,
    pub subset: Subset,
    pub interpolation: Interpolation,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::Rgb,
            batch_size: NonZeroUsize::new(16).unwrap_or(NonZeroUsize::MIN),
            target_size: (160, 160),
            class_mode: ClassMode::Categorical,
            seed: 0,
            shuffle: false,
            subset: Subset::Training,
            interpolation: Interpolation::Nearest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_their_defaults() {
        let options: FlowOptions =
            serde_json::from_str(r#"{ "batch_size": 4, "class_mode": "sparse" }"#).unwrap();

        assert_eq!(options.batch_size.get(), 4);
        assert_eq!(options.class_mode, ClassMode::Sparse);
        assert_eq!(options.target_size, (160, 160));
        assert_eq!(options.color_mode.channels(), 3);
        assert!(!options.shuffle);
    }

    #[test]
    fn zero_sized_batches_are_rejected() {
        assert!(serde_json::from_str::<FlowOptions>(r#"{ "batch_size": 0 }"#).is_err());
    }
}
