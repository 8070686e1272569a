//! Fixed-size patch extraction from padded images.

use burn::prelude::*;

use crate::geometry::{PaddedImage, PixelCoord};

/// Extracts the `patch_size` x `patch_size` window centred on `pixel`.
///
/// `pixel` is in unpadded coordinates. The window covers
/// `[row - size/2, row + size/2)` x `[col - size/2, col + size/2)` of the padded
/// image and always has shape `[patch_size, patch_size, channels]`.
///
/// # Panics
///
/// Panics when `patch_size` is odd, when the image margin is smaller than half
/// the patch, or when the window would leave the padded image. All of these
/// point at a coordinate bug in the caller.
pub fn extract_patch<B: Backend>(
    image: &PaddedImage<B>,
    pixel: PixelCoord,
    patch_size: usize,
) -> Tensor<B, 3> {
    assert!(
        patch_size % 2 == 0,
        "patch size must be even, got {patch_size}"
    );
    let half = patch_size / 2;
    assert!(
        half <= image.margin(),
        "patch size {patch_size} needs a margin of at least {half}, image has {}",
        image.margin()
    );

    let centre = image.to_padded(pixel);
    let [padded_height, padded_width, channels] = image.tensor().dims();
    assert!(
        centre.row + half <= padded_height && centre.col + half <= padded_width,
        "patch centred at (row {}, col {}) leaves the {}x{} image (padded centre ({}, {}))",
        pixel.row,
        pixel.col,
        image.height(),
        image.width(),
        centre.row,
        centre.col
    );

    let patch = image.tensor().clone().slice([
        centre.row - half..centre.row + half,
        centre.col - half..centre.col + half,
        0..channels,
    ]);
    assert_eq!(
        patch.dims(),
        [patch_size, patch_size, channels],
        "patch at (row {}, col {}) has the wrong shape",
        pixel.row,
        pixel.col
    );

    patch
}
