//! Visual outputs of a prediction: side-by-side comparisons and red overlays.
//!
//! These helpers only read the [`LabelGrid`]; they never change it.

use image::{
    imageops, DynamicImage, GenericImageView, GrayImage, Luma, Rgb, Rgb32FImage, RgbImage, Rgba,
    RgbaImage,
};

use crate::{
    error::{RoadSegError, RoadSegResult},
    geometry::PixelCoord,
    grid::LabelGrid,
};

const PIXEL_DEPTH: f32 = 255.0;

/// Rescales `values` so the minimum maps to 0 and the maximum to 255.
///
/// A constant input maps to 0 everywhere.
fn stretch(values: &[f32]) -> Vec<u8> {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    values
        .iter()
        .map(|&v| {
            if range > 0.0 {
                ((v - min) / range * PIXEL_DEPTH).round() as u8
            } else {
                0
            }
        })
        .collect()
}

/// Min-max stretches a float RGB image to 8 bits, over all channels at once.
pub fn stretch_to_u8(image: &Rgb32FImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let raw = stretch(image.as_raw());
    RgbImage::from_raw(width, height, raw).unwrap_or_else(|| RgbImage::new(width, height))
}

/// Min-max stretches a float single-channel image to 8 bits.
pub fn stretch_luma_to_u8(values: &[f32], width: u32, height: u32) -> GrayImage {
    GrayImage::from_raw(width, height, stretch(values))
        .unwrap_or_else(|| GrayImage::new(width, height))
}

/// Places `other` to the right of `original`.
///
/// A colour `other` is copied as is and `original` is scaled linearly from
/// `[0, 1]`. A grayscale `other` is replicated into three channels; both
/// halves are then min-max stretched.
///
/// # Errors
///
/// Returns [`RoadSegError::ShapeMismatch`] when the heights differ.
pub fn concatenate_images(
    original: &Rgb32FImage,
    other: &DynamicImage,
) -> RoadSegResult<RgbImage> {
    let (width, height) = original.dimensions();
    if other.height() != height {
        return Err(RoadSegError::ShapeMismatch {
            expected: format!("height {height}"),
            actual: format!("height {}", other.height()),
        });
    }

    let (left, right) = if other.color().has_color() {
        let left: RgbImage = DynamicImage::ImageRgb32F(original.clone()).to_rgb8();
        (left, other.to_rgb8())
    } else {
        let gray = other.to_luma32f();
        let gray = stretch_luma_to_u8(gray.as_raw(), gray.width(), gray.height());
        let right = RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
            let Luma([v]) = *gray.get_pixel(x, y);
            Rgb([v, v, v])
        });
        (stretch_to_u8(original), right)
    };

    let mut canvas = RgbImage::new(width + right.width(), height);
    imageops::replace(&mut canvas, &left, 0, 0);
    imageops::replace(&mut canvas, &right, i64::from(width), 0);
    Ok(canvas)
}

/// Blends a red mask of the set cells of `mask` over `original`.
///
/// Every channel becomes `background + alpha * (overlay - background)`,
/// truncated to an integer; the overlay is pure red where the mask is set and
/// black elsewhere. The result is opaque.
///
/// # Errors
///
/// Returns [`RoadSegError::ShapeMismatch`] when the mask and image sizes differ.
pub fn make_overlay(
    original: &Rgb32FImage,
    mask: &LabelGrid,
    alpha: f32,
) -> RoadSegResult<RgbaImage> {
    let (width, height) = original.dimensions();
    if mask.dims() != (height as usize, width as usize) {
        return Err(RoadSegError::ShapeMismatch {
            expected: format!("{height}x{width} mask"),
            actual: format!("{}x{} mask", mask.height(), mask.width()),
        });
    }

    let background = stretch_to_u8(original);
    let blend = |bg: u8, ov: u8| -> u8 {
        let (bg, ov) = (f32::from(bg), f32::from(ov));
        (bg + alpha * (ov - bg)).clamp(0.0, PIXEL_DEPTH) as u8
    };

    Ok(RgbaImage::from_fn(width, height, |x, y| {
        let Rgb([r, g, b]) = *background.get_pixel(x, y);
        let red = if mask.get(PixelCoord::new(y as usize, x as usize)) == 0 {
            0
        } else {
            255
        };
        Rgba([blend(r, red), blend(g, 0), blend(b, 0), 255])
    }))
}
