use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use image::{GenericImageView, imageops::FilterType};
use log::{debug, info};
use ndarray::{Array1, Array2, Array3, Array4, ArrayD, Axis, stack};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::{
    DataErr, Result,
    augment::Zoom,
    batch::Batch,
    generator::ImageDataGenerator,
    options::{ClassMode, ColorMode, FlowOptions, Subset},
};

const EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "ppm", "tif", "tiff"];

/// Batches of images read from a directory with one subdirectory per class.
///
/// Iterating never ends: once every sample has been yielded the next epoch starts, reshuffled
/// if shuffling is on. The last batch of an epoch may be shorter than the batch size.
#[derive(Debug)]
pub struct DirectoryIterator {
    generator: ImageDataGenerator,
    options: FlowOptions,
    directory: PathBuf,
    class_indices: BTreeMap<String, usize>,
    filenames: Vec<PathBuf>,
    classes: Vec<usize>,

    index_array: Vec<usize>,
    batch_index: usize,
    total_batches_seen: u64,
}

impl DirectoryIterator {
    pub(crate) fn new(
        generator: ImageDataGenerator,
        directory: &Path,
        options: FlowOptions,
    ) -> Result<Self> {
        if !directory.is_dir() {
            return Err(DataErr::NotADirectory(directory.to_path_buf()));
        }

        let (h, w) = options.target_size;
        if h == 0 || w == 0 {
            return Err(DataErr::InvalidTargetSize(options.target_size));
        }

        let split = generator.validation_split();
        let (start, stop) = match options.subset {
            Subset::Validation if split == 0. => return Err(DataErr::MissingValidationSplit),
            Subset::Validation => (0., split),
            Subset::Training => (split, 1.),
        };

        let class_names = list_classes(directory)?;
        if options.class_mode == ClassMode::Binary && class_names.len() != 2 {
            return Err(DataErr::BinaryClassCount(class_names.len()));
        }

        let mut filenames = Vec::new();
        let mut classes = Vec::new();
        for (class, name) in class_names.iter().enumerate() {
            let files = list_images(directory, name)?;
            let n = files.len() as f32;
            let (lo, hi) = ((start * n) as usize, (stop * n) as usize);

            debug!("class {name} has {} images, taking [{lo}, {hi})", files.len());
            classes.extend(std::iter::repeat_n(class, hi - lo));
            filenames.extend(files.into_iter().skip(lo).take(hi - lo));
        }

        info!(
            "Found {} images belonging to {} classes.",
            filenames.len(),
            class_names.len()
        );

        let class_indices = class_names
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name, i))
            .collect();

        Ok(Self {
            generator,
            options,
            directory: directory.to_path_buf(),
            class_indices,
            filenames,
            classes,
            index_array: Vec::new(),
            batch_index: 0,
            total_batches_seen: 0,
        })
    }

    /// Returns the amount of batches per epoch.
    pub fn len(&self) -> usize {
        self.samples().div_ceil(self.options.batch_size.get())
    }

    pub fn is_empty(&self) -> bool {
        self.samples() == 0
    }

    pub fn samples(&self) -> usize {
        self.filenames.len()
    }

    pub fn num_classes(&self) -> usize {
        self.class_indices.len()
    }

    /// Maps every class name to its index.
    pub fn class_indices(&self) -> &BTreeMap<String, usize> {
        &self.class_indices
    }

    /// Returns the path of every sample, relative to the directory.
    pub fn filenames(&self) -> &[PathBuf] {
        &self.filenames
    }

    /// Returns the class index of every sample.
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    pub fn options(&self) -> &FlowOptions {
        &self.options
    }

    /// Restarts the epoch on the next batch.
    pub fn reset(&mut self) {
        self.batch_index = 0;
    }

    /// Returns the `index`th batch of the current epoch ordering.
    pub fn get(&mut self, index: usize) -> Result<Batch> {
        let len = self.len();
        if index >= len {
            return Err(DataErr::BatchOutOfRange { index, len });
        }

        let seed = self.options.seed;
        if self.index_array.is_empty() {
            self.set_index_array(&mut StdRng::seed_from_u64(seed));
        }

        let bs = self.options.batch_size.get();
        let stop = (bs * (index + 1)).min(self.samples());
        let indices = self.index_array[bs * index..stop].to_vec();

        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
        self.load_batch(&indices, &mut rng)
    }

    fn set_index_array(&mut self, rng: &mut StdRng) {
        self.index_array = (0..self.samples()).collect();
        if self.options.shuffle {
            self.index_array.shuffle(rng);
        }
    }

    /// Advances the epoch cursor, returning the samples of the next batch.
    fn next_indices(&mut self, rng: &mut StdRng) -> Vec<usize> {
        let n = self.samples();
        let bs = self.options.batch_size.get();

        if self.batch_index == 0 {
            self.set_index_array(rng);
        }

        let current = (self.batch_index * bs) % n;
        if n > current + bs {
            self.batch_index += 1;
        } else {
            self.batch_index = 0;
        }
        self.total_batches_seen += 1;

        self.index_array[current..(current + bs).min(n)].to_vec()
    }

    fn load_batch(&self, indices: &[usize], rng: &mut StdRng) -> Result<Batch> {
        // Random transforms are drawn in order so batches don't depend on thread scheduling
        let zooms: Vec<Option<Zoom>> = indices
            .iter()
            .map(|_| self.generator.random_transform(rng))
            .collect();

        let images = indices
            .par_iter()
            .zip(zooms)
            .map(|(&i, zoom)| {
                let x = load_image(&self.directory.join(&self.filenames[i]), &self.options)?;
                Ok(self.generator.transform(x, zoom))
            })
            .collect::<Result<Vec<_>>>()?;

        let views: Vec<_> = images.iter().map(|img| img.view()).collect();
        let x = stack(Axis(0), &views)?;
        let y = self.labels(indices, &x);

        Ok(Batch { x, y })
    }

    fn labels(&self, indices: &[usize], x: &Array4<f32>) -> Option<ArrayD<f32>> {
        let classes = indices.iter().map(|&i| self.classes[i]);

        let y = match self.options.class_mode {
            ClassMode::Categorical => {
                let mut y = Array2::zeros((indices.len(), self.num_classes()));
                for (row, class) in classes.enumerate() {
                    y[[row, class]] = 1.;
                }
                y.into_dyn()
            }
            ClassMode::Binary | ClassMode::Sparse => {
                Array1::from_iter(classes.map(|c| c as f32)).into_dyn()
            }
            ClassMode::Input => x.clone().into_dyn(),
            ClassMode::None => return None,
        };

        Some(y)
    }
}

impl Iterator for DirectoryIterator {
    type Item = Result<Batch>;

    /// Yields the next batch, `None` only if there are no samples at all.
    fn next(&mut self) -> Option<Self::Item> {
        if self.is_empty() {
            return None;
        }

        let seed = self.options.seed.wrapping_add(self.total_batches_seen);
        let mut rng = StdRng::seed_from_u64(seed);
        let indices = self.next_indices(&mut rng);

        Some(self.load_batch(&indices, &mut rng))
    }
}

/// Lists the class subdirectories of `directory`, sorted by name.
fn list_classes(directory: &Path) -> Result<Vec<String>> {
    let mut classes = Vec::new();

    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if entry.file_type().is_dir() {
            classes.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    Ok(classes)
}

/// Lists every image under a class subdirectory, relative to `directory` and sorted.
fn list_images(directory: &Path, class: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(directory.join(class)).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || !has_image_extension(entry.path()) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(directory)
            .unwrap_or(entry.path())
            .to_path_buf();
        files.push(relative);
    }

    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Decodes an image into an (height, width, channels) array of raw channel values.
fn load_image(path: &Path, options: &FlowOptions) -> Result<Array3<f32>> {
    let img = image::open(path).map_err(|source| DataErr::Image {
        path: path.to_path_buf(),
        source,
    })?;

    let (h, w) = options.target_size;
    let img = if img.dimensions() != (w, h) {
        let filter: FilterType = options.interpolation.into();
        img.resize_exact(w, h, filter)
    } else {
        img
    };

    let raw = match options.color_mode {
        ColorMode::Grayscale => img.into_luma8().into_raw(),
        ColorMode::Rgb => img.into_rgb8().into_raw(),
        ColorMode::Rgba => img.into_rgba8().into_raw(),
    };

    let shape = (h as usize, w as usize, options.color_mode.channels());
    Ok(Array3::from_shape_vec(shape, raw.into_iter().map(f32::from).collect())?)
}
