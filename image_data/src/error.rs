use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

use ndarray::ShapeError;

/// The result type used in the entire image data module.
pub type Result<T> = std::result::Result<T, DataErr>;

/// The image data module's error type.
#[derive(Debug)]
pub enum DataErr {
    InvalidRescale(f32),
    InvalidZoomRange(f32),
    InvalidValidationSplit(f32),
    MissingValidationSplit,
    NotADirectory(PathBuf),
    InvalidTargetSize((u32, u32)),
    BinaryClassCount(usize),
    BatchOutOfRange { index: usize, len: usize },
    Io { path: PathBuf, source: io::Error },
    Image { path: PathBuf, source: image::ImageError },
    Shape(ShapeError),
}

impl Display for DataErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataErr::InvalidRescale(v) => write!(f, "rescale must be finite, got {v}"),
            DataErr::InvalidZoomRange(v) => write!(f, "zoom range must be in [0, 1), got {v}"),
            DataErr::InvalidValidationSplit(v) => write!(
                f,
                "validation split must be 0 or strictly between 0 and 1, got {v}"
            ),
            DataErr::MissingValidationSplit => write!(
                f,
                "the validation subset was requested but the generator has no validation split"
            ),
            DataErr::NotADirectory(path) => write!(f, "{} is not a directory", path.display()),
            DataErr::InvalidTargetSize((h, w)) => {
                write!(f, "images can't be resized to {h}x{w}")
            }
            DataErr::BinaryClassCount(n) => {
                write!(f, "binary labels need exactly 2 classes, found {n}")
            }
            DataErr::BatchOutOfRange { index, len } => {
                write!(f, "batch {index} is out of range, there are {len} batches")
            }
            DataErr::Io { path, source } => write!(f, "failed to read {}: {source}", path.display()),
            DataErr::Image { path, source } => {
                write!(f, "failed to load image {}: {source}", path.display())
            }
            DataErr::Shape(e) => write!(f, "shape error: {e}"),
        }
    }
}

impl Error for DataErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DataErr::Io { source, .. } => Some(source),
            DataErr::Image { source, .. } => Some(source),
            DataErr::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for DataErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<walkdir::Error> for DataErr {
    fn from(value: walkdir::Error) -> Self {
        let path = value.path().map(|p| p.to_path_buf()).unwrap_or_default();
        let source = io::Error::other(value.to_string());
        Self::Io { path, source }
    }
}
