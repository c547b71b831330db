use ndarray::{Array4, ArrayD, ArrayView2, Ix2};

/// A batch of images and their labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// The images, `(n, height, width, channels)`.
    pub x: Array4<f32>,
    /// The labels, shaped according to the class mode, `None` if there are none.
    pub y: Option<ArrayD<f32>>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.x.len_of(ndarray::Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the labels as rows, if they're one-hot encoded.
    pub fn one_hot(&self) -> Option<ArrayView2<'_, f32>> {
        self.y
            .as_ref()
            .and_then(|y| y.view().into_dimensionality::<Ix2>().ok())
    }
}
