//! Assembly of per-bin averaged patches into one canvas.

use std::ops::Range;

use ndarray::{s, Array3, ArrayView3, Axis};

use crate::error::{Error, Result};
use crate::image::{PatchShape, RGB_CHANNELS};

use super::binning::Binning;
use super::progress_bar;
use super::store::{ImageStore, PatchLoader};

/// Canvas dimensions `(rows, cols, 3)` for `bins` bins of `shape` patches.
///
/// # Errors
///
/// Returns an error if the canvas size overflows.
pub fn canvas_dim(shape: PatchShape, bins: usize) -> Result<(usize, usize, usize)> {
    let side = |patch: usize| {
        let stride = patch.checked_add(1)?;
        stride.checked_mul(bins)?.checked_add(patch / 2)
    };
    let too_large = || Error::invalid_parameter("bins", format!("{bins} bins overflow the canvas"));

    let rows = side(shape.height).ok_or_else(too_large)?;
    let cols = side(shape.width).ok_or_else(too_large)?;
    let pixels = rows.checked_mul(cols).ok_or_else(too_large)?;
    let len = pixels.checked_mul(RGB_CHANNELS).ok_or_else(too_large)?;
    if isize::try_from(len).is_err() {
        return Err(too_large());
    }

    Ok((rows, cols, RGB_CHANNELS))
}

/// Top-left canvas pixel of bin `(bx, by)` as `(row, col)`.
///
/// The origin is shifted back by half a patch, so it can be negative for
/// bin 0.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn tile_origin(shape: PatchShape, (bx, by): (usize, usize)) -> (i64, i64) {
    let (h, w) = (shape.height as i64, shape.width as i64);
    (bx as i64 * h - h / 2, by as i64 * w - w / 2)
}

/// Average the members of every occupied bin and paint them onto a canvas.
///
/// # Errors
///
/// Returns an error if the canvas size overflows or a member patch cannot be
/// loaded.
pub fn assemble<L: PatchLoader>(store: &ImageStore<L>, binning: &Binning) -> Result<Array3<u8>> {
    let shape = store.patch_shape();
    let mut canvas = Array3::<u8>::zeros(canvas_dim(shape, binning.bins())?);

    let groups = binning.groups();
    tracing::info!(
        "Assembling {} occupied bins onto a {}x{} canvas",
        groups.len(),
        canvas.dim().0,
        canvas.dim().1
    );

    let pb = progress_bar(groups.len(), "Building montage");
    for (&bin, members) in &groups {
        let tile = average_patches(store, members)?;
        let (top, left) = tile_origin(shape, bin);
        place_tile(&mut canvas, tile.view(), top, left);
        pb.inc(1);
    }
    pb.finish_with_message("Montage built");

    Ok(canvas)
}

/// Per-pixel mean of the listed patches, truncated to 8 bits.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn average_patches<L: PatchLoader>(
    store: &ImageStore<L>,
    members: &[usize],
) -> Result<Array3<u8>> {
    let shape = store.patch_shape();
    let mut sum = Array3::<f64>::zeros((shape.height, shape.width, store.channels()));

    for &idx in members {
        let patch = store.get_patch(idx)?;
        sum.zip_mut_with(&patch, |acc, &v| *acc += f64::from(v));
    }

    let n = members.len().max(1) as f64;
    // Saturating cast: values are already within [0, 255]
    Ok(sum.mapv(|v| (v / n) as u8))
}

/// Copy `tile` onto `canvas` with its top-left corner at `(top, left)`.
///
/// Parts of the tile outside the canvas are dropped. Single-channel tiles are
/// written to every canvas channel.
fn place_tile(canvas: &mut Array3<u8>, tile: ArrayView3<'_, u8>, top: i64, left: i64) {
    let (canvas_rows, canvas_cols, _) = canvas.dim();
    let (tile_rows, tile_cols, tile_channels) = tile.dim();

    let (Some((dst_rows, src_rows)), Some((dst_cols, src_cols))) = (
        clip_span(top, tile_rows, canvas_rows),
        clip_span(left, tile_cols, canvas_cols),
    ) else {
        tracing::debug!("Tile at ({top}, {left}) falls outside the canvas");
        return;
    };

    let src = tile.slice(s![src_rows, src_cols, ..]);
    let mut dst = canvas.slice_mut(s![dst_rows, dst_cols, ..]);

    if tile_channels == RGB_CHANNELS {
        dst.assign(&src);
    } else {
        let plane = src.index_axis(Axis(2), 0);
        for mut channel in dst.axis_iter_mut(Axis(2)) {
            channel.assign(&plane);
        }
    }
}

/// Intersect `[start, start + len)` with `[0, limit)`.
///
/// Returns the destination range and the matching range within the tile, or
/// `None` when they do not overlap.
#[allow(
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation
)]
fn clip_span(start: i64, len: usize, limit: usize) -> Option<(Range<usize>, Range<usize>)> {
    let end = start + len as i64;
    let lo = start.max(0);
    let hi = end.min(limit as i64);
    if lo >= hi {
        return None;
    }
    Some((
        lo as usize..hi as usize,
        (lo - start) as usize..(hi - start) as usize,
    ))
}
