use ndarray::prelude::*;

use crate::error::Error;

/// One decoded frame, stored as a `height x width x 3` RGB array
pub struct Frame {
    pub index: u64,
    pub dims: (u32, u32),
    pub image: Array3<u8>,
}

impl Frame {
    pub fn new(index: u64, image: Array3<u8>) -> Self {
        let shape = image.shape();
        let dims = (shape[1] as u32, shape[0] as u32);

        Self { index, dims, image }
    }

    pub fn from_rgb(index: u64, img: image::RgbImage) -> Result<Self, Error> {
        let (w, h) = img.dimensions();
        let raw = img.into_raw();
        let image = Array3::from_shape_vec((h as usize, w as usize, 3), raw)
            .map_err(|_| Error::EmptyFrame { index })?;

        Ok(Self::new(index, image))
    }

    /// Blank frame of the given size, for sources that only carry geometry.
    pub fn blank(index: u64, dims: (u32, u32)) -> Self {
        let image = Array3::zeros((dims.1 as usize, dims.0 as usize, 3));

        Self { index, dims, image }
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.dims.0 as f32 * self.dims.1 as f32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.0 == 0 || self.dims.1 == 0
    }

    /// Frames with no pixels break the source contract and end the session.
    pub fn ensure_not_empty(&self) -> Result<(), Error> {
        if self.is_empty() {
            Err(Error::EmptyFrame { index: self.index })
        } else {
            Ok(())
        }
    }
}
