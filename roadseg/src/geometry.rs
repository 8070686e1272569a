//! Pixel coordinates, scan order and image padding.
//!
//! Every stage that walks the pixels of an image, both when collecting training
//! coordinates from a mask and when stitching per-patch predictions back into a
//! label grid, goes through [`scan_order`]. Images are `[height, width, channels]`
//! tensors; `row` indexes the first axis and `col` the second.

use burn::prelude::*;

use crate::error::{RoadSegError, RoadSegResult};

/// Value written into the border of a padded image.
pub const PAD_VALUE: f32 = 0.5;

/// A pixel position in unpadded image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelCoord {
    pub row: usize,
    pub col: usize,
}

impl PixelCoord {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// A pixel of one specific training image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleCoord {
    /// Position of the image in the loaded training list.
    pub image: usize,
    pub pixel: PixelCoord,
}

impl SampleCoord {
    pub const fn new(image: usize, row: usize, col: usize) -> Self {
        Self {
            image,
            pixel: PixelCoord::new(row, col),
        }
    }
}

/// Visits every pixel of a `height` x `width` image, columns outermost.
///
/// The row advances fastest: `(0,0), (1,0), ..., (height-1,0), (0,1), ...`.
pub fn scan_order(height: usize, width: usize) -> impl Iterator<Item = PixelCoord> {
    (0..width).flat_map(move |col| (0..height).map(move |row| PixelCoord::new(row, col)))
}

/// An image surrounded by a border of [`PAD_VALUE`].
///
/// The padded tensor has shape `[height + 2 * margin, width + 2 * margin, channels]`
/// and the original content starts at `(margin, margin)`.
#[derive(Debug, Clone)]
pub struct PaddedImage<B: Backend> {
    tensor: Tensor<B, 3>,
    margin: usize,
    height: usize,
    width: usize,
}

impl<B: Backend> PaddedImage<B> {
    /// The padded `[height, width, channels]` tensor.
    pub const fn tensor(&self) -> &Tensor<B, 3> {
        &self.tensor
    }

    pub const fn margin(&self) -> usize {
        self.margin
    }

    /// Height of the original image.
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Width of the original image.
    pub const fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.tensor.dims()[2]
    }

    /// Converts an unpadded pixel position to padded coordinates.
    pub const fn to_padded(&self, pixel: PixelCoord) -> PixelCoord {
        PixelCoord::new(pixel.row + self.margin, pixel.col + self.margin)
    }
}

/// Pads a `[height, width, channels]` image by `margin` on every side.
///
/// # Errors
///
/// Returns [`RoadSegError::EmptyImage`] when both spatial dimensions are zero
/// or the image has no channels.
pub fn pad<B: Backend>(image: Tensor<B, 3>, margin: usize) -> RoadSegResult<PaddedImage<B>> {
    let [height, width, channels] = image.dims();
    if (height == 0 && width == 0) || channels == 0 {
        return Err(RoadSegError::EmptyImage {
            height,
            width,
            channels,
        });
    }

    let canvas = Tensor::<B, 3>::full(
        [height + 2 * margin, width + 2 * margin, channels],
        PAD_VALUE,
        &image.device(),
    );
    let tensor = if height == 0 || width == 0 {
        canvas
    } else {
        canvas.slice_assign(
            [margin..margin + height, margin..margin + width, 0..channels],
            image,
        )
    };

    Ok(PaddedImage {
        tensor,
        margin,
        height,
        width,
    })
}

/// Pads a single-plane `[height, width]` array by `margin` on every side.
///
/// Planes cannot feed the patch workflow, which always extracts
/// `[size, size, channels]` windows; use [`pad`] for images.
/// No pipeline stage calls this; masks are indexed unpadded.
///
/// # Errors
///
/// Returns [`RoadSegError::EmptyImage`] when both dimensions are zero.
pub fn pad_plane<B: Backend>(plane: Tensor<B, 2>, margin: usize) -> RoadSegResult<Tensor<B, 2>> {
    let [height, width] = plane.dims();
    if height == 0 && width == 0 {
        return Err(RoadSegError::EmptyImage {
            height,
            width,
            channels: 1,
        });
    }

    let canvas = Tensor::<B, 2>::full(
        [height + 2 * margin, width + 2 * margin],
        PAD_VALUE,
        &plane.device(),
    );
    if height == 0 || width == 0 {
        return Ok(canvas);
    }
    Ok(canvas.slice_assign([margin..margin + height, margin..margin + width], plane))
}
