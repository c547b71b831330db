use std::path::Path;

use ndarray::Array3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    DataErr, Result,
    augment::Zoom,
    directory::DirectoryIterator,
    options::FlowOptions,
};

/// An augmentation policy: every loaded image is rescaled and then randomly zoomed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageDataGenerator {
    rescale: f32,
    zoom_range: f32,
    validation_split: f32,
}

impl Default for ImageDataGenerator {
    /// Maps 8 bit channels to `[0, 1]`, zooms by up to 20% and keeps no validation split.
    fn default() -> Self {
        Self {
            rescale: 1. / 255.,
            zoom_range: 0.2,
            validation_split: 0.,
        }
    }
}

impl ImageDataGenerator {
    /// Creates a new `ImageDataGenerator`.
    ///
    /// # Arguments
    /// * `rescale` - The factor pixel values are multiplied by, 0 leaves them untouched.
    /// * `zoom_range` - Zoom factors are drawn from `[1 - zoom_range, 1 + zoom_range]`.
    /// * `validation_split` - The fraction of every class reserved for validation, either 0 or
    ///   strictly between 0 and 1.
    ///
    /// # Returns
    /// The generator or an error if any argument is out of range.
    pub fn new(rescale: f32, zoom_range: f32, validation_split: f32) -> Result<Self> {
        if !rescale.is_finite() {
            return Err(DataErr::InvalidRescale(rescale));
        }

        if !(0. ..1.).contains(&zoom_range) {
            return Err(DataErr::InvalidZoomRange(zoom_range));
        }

        if validation_split != 0. && !(validation_split > 0. && validation_split < 1.) {
            return Err(DataErr::InvalidValidationSplit(validation_split));
        }

        Ok(Self {
            rescale,
            zoom_range,
            validation_split,
        })
    }

    pub fn rescale(&self) -> f32 {
        self.rescale
    }

    pub fn zoom_range(&self) -> f32 {
        self.zoom_range
    }

    pub fn validation_split(&self) -> f32 {
        self.validation_split
    }

    /// Draws the random transform of one image, `None` if the policy doesn't zoom.
    pub fn random_transform<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Zoom> {
        (self.zoom_range > 0.).then(|| Zoom::sample(rng, self.zoom_range))
    }

    /// Rescales an (height, width, channels) image and then applies `zoom` to it.
    pub fn transform(&self, mut x: Array3<f32>, zoom: Option<Zoom>) -> Array3<f32> {
        if self.rescale != 0. {
            x *= self.rescale;
        }

        match zoom {
            Some(zoom) => zoom.apply(x.view()),
            None => x,
        }
    }

    /// Reads batches of augmented images out of a directory with one subdirectory per class.
    pub fn flow_from_directory(
        &self,
        directory: impl AsRef<Path>,
        options: FlowOptions,
    ) -> Result<DirectoryIterator> {
        DirectoryIterator::new(*self, directory.as_ref(), options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_arguments_are_rejected() {
        assert!(matches!(
            ImageDataGenerator::new(1., 0.2, 1.),
            Err(DataErr::InvalidValidationSplit(_))
        ));
        assert!(ImageDataGenerator::new(1., 0.2, -0.1).is_err());
        assert!(matches!(
            ImageDataGenerator::new(1., 1.5, 0.),
            Err(DataErr::InvalidZoomRange(_))
        ));
        assert!(ImageDataGenerator::new(f32::NAN, 0., 0.).is_err());
        assert!(ImageDataGenerator::new(1. / 255., 0., 0.2).is_ok());
    }

    #[test]
    fn rescaling_happens_before_zooming() {
        let generator = ImageDataGenerator::new(0.5, 0.1, 0.).unwrap();
        let x = Array3::from_elem((4, 4, 3), 200.);

        let y = generator.transform(x, Some(Zoom { zx: 0.9, zy: 1.1 }));
        assert!(y.iter().all(|&v| (v - 100.).abs() < 1e-4));
    }

    #[test]
    fn no_zoom_range_means_no_transform() {
        let generator = ImageDataGenerator::new(0., 0., 0.).unwrap();
        let mut rng = rand::rng();

        assert_eq!(generator.random_transform(&mut rng), None);
    }
}
