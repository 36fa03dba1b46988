//! Per-channel contrast normalization of image patches.

use ndarray::Axis;

use super::Patch;

/// Normalized values are clipped to this many standard deviations.
const CLIP_SIGMA: f64 = 4.0;

/// Contrast-normalize every channel of a patch and map it into [0, 255].
///
/// Each channel is standardized with its own mean and a robust standard
/// deviation `max(std, 1 / sqrt(height * width))`, clipped to ±4 sigma and
/// then rescaled with `255 * (z + 1) / 5`, clipped to [0, 255].
///
/// The floor on the standard deviation keeps constant channels finite: they
/// come out as a flat 51.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn normalize_channels(mut patch: Patch) -> Patch {
    let (height, width, _) = patch.dim();
    let n_pixels = height * width;
    if n_pixels == 0 {
        return patch;
    }

    let n = n_pixels as f64;
    let std_floor = 1.0 / n.sqrt();

    for mut channel in patch.axis_iter_mut(Axis(2)) {
        let mean = channel.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
        let variance = channel
            .iter()
            .map(|&v| {
                let d = f64::from(v) - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        let std = variance.sqrt().max(std_floor);

        channel.mapv_inplace(|v| {
            let z = ((f64::from(v) - mean) / std).clamp(-CLIP_SIGMA, CLIP_SIGMA);
            rescale(z) as f32
        });
    }

    patch
}

/// Map a clipped z-score onto the display range.
#[inline]
fn rescale(z: f64) -> f64 {
    // f64::max drops NaN, so NaN maps to 0
    (255.0 * ((z + 1.0) / 5.0)).max(0.0).min(255.0)
}
