//! Image loading utilities.

use std::path::Path;

use image::{imageops::FilterType, DynamicImage, Rgb32FImage};
use ndarray::Array3;

use crate::error::{Error, Result};

use super::{normalize_channels, Patch, PatchShape, RGB_CHANNELS};

/// Load an image from disk and turn it into a normalized montage patch.
///
/// The image is:
/// 1. Loaded from the specified path
/// 2. Converted to RGB, dropping any alpha channel
/// 3. Resized to `shape`, keeping its native value range
/// 4. Contrast-normalized per channel into [0, 255]
///
/// # Errors
///
/// Returns an error if the image cannot be loaded or `shape` is invalid.
pub fn load_and_normalize<P: AsRef<Path>>(path: P, shape: PatchShape) -> Result<Patch> {
    let path = path.as_ref();

    let img = image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        "Loaded {} ({}x{}, {:?})",
        path.display(),
        img.width(),
        img.height(),
        img.color()
    );

    normalize_image(&img, shape)
}

/// Resize an in-memory image to `shape` and normalize it.
///
/// # Errors
///
/// Returns an error if `shape` is invalid.
pub fn normalize_image(img: &DynamicImage, shape: PatchShape) -> Result<Patch> {
    shape.validate()?;
    Ok(normalize_channels(resize_native(img, shape)))
}

/// Full-scale value of the image's sample type.
fn native_scale(img: &DynamicImage) -> f32 {
    match img {
        DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_) => f32::from(u16::MAX),
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => 1.0,
        _ => f32::from(u8::MAX),
    }
}

/// Resize to `shape` with bilinear filtering, values in the image's native range.
///
/// The resampler clamps float samples to [0, 1], so every channel is mapped
/// onto that interval by its own min/max first and mapped back afterwards.
#[allow(clippy::cast_possible_truncation)]
fn resize_native(img: &DynamicImage, shape: PatchShape) -> Patch {
    let scale = native_scale(img);

    // Integer samples arrive divided by their maximum; float samples unchanged.
    let mut unit = img.to_rgb32f();
    let ranges = channel_ranges(&unit);
    for px in unit.pixels_mut() {
        for (v, &(lo, span)) in px.0.iter_mut().zip(&ranges) {
            *v = (*v - lo) / span;
        }
    }

    // Safe: shape.validate() guarantees both sides fit in u32
    let resized = image::imageops::resize(
        &unit,
        shape.width as u32,
        shape.height as u32,
        FilterType::Triangle,
    );

    Array3::from_shape_fn((shape.height, shape.width, RGB_CHANNELS), |(y, x, c)| {
        let (lo, span) = ranges[c];
        resized.get_pixel(x as u32, y as u32)[c].mul_add(span, lo) * scale
    })
}

/// `(min, max - min)` of every channel. Flat or empty channels get a span of 1.
fn channel_ranges(img: &Rgb32FImage) -> [(f32, f32); RGB_CHANNELS] {
    let mut bounds = [(f32::INFINITY, f32::NEG_INFINITY); RGB_CHANNELS];
    for px in img.pixels() {
        for (bound, &v) in bounds.iter_mut().zip(&px.0) {
            bound.0 = bound.0.min(v);
            bound.1 = bound.1.max(v);
        }
    }

    bounds.map(|(lo, hi)| {
        let span = hi - lo;
        if !lo.is_finite() {
            (0.0, 1.0)
        } else if span > 0.0 && span.is_finite() {
            (lo, span)
        } else {
            (lo, 1.0)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_patch_shape() {
        let img = DynamicImage::new_rgb8(100, 40);
        let patch = normalize_image(&img, PatchShape::new(16, 24)).unwrap();

        assert_eq!(patch.shape(), &[16, 24, 3]);
    }

    #[test]
    fn test_resize_keeps_native_range() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([200, 100, 0])));
        let resized = resize_native(&img, PatchShape::new(4, 4));

        assert!((resized[[0, 0, 0]] - 200.0).abs() < 0.5);
        assert!((resized[[3, 3, 1]] - 100.0).abs() < 0.5);
        assert!(resized[[2, 2, 2]].abs() < 0.5);
    }

    #[test]
    fn test_float_range_survives_resize() {
        let img = DynamicImage::ImageRgb32F(Rgb32FImage::from_fn(16, 16, |x, _| {
            #[allow(clippy::cast_precision_loss)]
            let ramp = x as f32 * 10.0 / 15.0;
            Rgb([ramp, -3.0, 2.5])
        }));

        let resized = resize_native(&img, PatchShape::new(8, 8));
        let row: Vec<f32> = (0..8).map(|x| resized[[0, x, 0]]).collect();

        assert!(row[0] < 1.5, "left edge {}", row[0]);
        assert!(row[7] > 9.0 && row[7] < 10.001, "right edge {}", row[7]);
        assert!(row.windows(2).all(|w| w[0] < w[1]), "ramp lost: {row:?}");
        assert!((resized[[4, 4, 1]] + 3.0).abs() < 1e-4);
        assert!((resized[[4, 4, 2]] - 2.5).abs() < 1e-4);

        let normalized = normalize_channels(resized);
        assert!(normalized[[0, 7, 0]] > normalized[[0, 3, 0]]);
        assert!(normalized[[0, 3, 0]] > normalized[[0, 0, 0]]);
    }

    #[test]
    fn test_sixteen_bit_scale() {
        let img = DynamicImage::new_rgb16(4, 4);
        assert!((native_scale(&img) - 65_535.0).abs() < f32::EPSILON);
        assert!((native_scale(&DynamicImage::new_luma8(4, 4)) - 255.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_grayscale_becomes_rgb() {
        let img = DynamicImage::new_luma8(8, 8);
        let patch = normalize_image(&img, PatchShape::new(8, 8)).unwrap();

        assert_eq!(patch.dim(), (8, 8, RGB_CHANNELS));
        assert!(patch.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_missing_file() {
        let result = load_and_normalize("/definitely/not/here.png", PatchShape::default());
        assert!(matches!(result, Err(Error::ImageLoad { .. })));
    }

    #[test]
    fn test_invalid_shape() {
        let img = DynamicImage::new_rgb8(4, 4);
        assert!(normalize_image(&img, PatchShape::new(0, 4)).is_err());
    }
}
