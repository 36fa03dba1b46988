//! Montages of image patches arranged by a 2D manifold projection.

mod binning;
mod montage;
mod store;

pub use binning::{bin_manifold, BinIndex, Binning};
pub use montage::{assemble, canvas_dim, tile_origin};
pub use store::{FileLoader, ImageSource, ImageStore, PatchLoader};

use image::{Rgb, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array3, ArrayView2};

use crate::error::{Error, Result};
use crate::image::PatchShape;

/// Default number of bins per axis.
pub const DEFAULT_BINS: usize = 32;

/// Parameters of a single projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionConfig {
    /// Bins per axis; the montage is a `bins` x `bins` grid.
    pub bins: usize,

    /// Manifold columns used for the vertical and horizontal canvas axes.
    pub components: (usize, usize),
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            bins: DEFAULT_BINS,
            components: (0, 1),
        }
    }
}

impl ProjectionConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `bins` is zero or the `bins` x `bins` grid
    /// cannot be indexed.
    pub fn validate(&self) -> Result<()> {
        if self.bins == 0 {
            return Err(Error::invalid_parameter("bins", "must be greater than 0"));
        }
        if self.bins.checked_mul(self.bins).is_none() {
            return Err(Error::invalid_parameter(
                "bins",
                format!("{} bins per axis overflow the grid", self.bins),
            ));
        }
        Ok(())
    }
}

/// Coordinate range spanned by the bin edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Extent {
    /// `(x_min, x_max, y_min, y_max)`.
    #[must_use]
    pub const fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.x_min, self.x_max, self.y_min, self.y_max)
    }
}

/// Output of a projection: the montage canvas and the manifold range it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct Montage {
    /// RGB canvas in HWC layout. Rows follow the first component, columns the second.
    pub canvas: Array3<u8>,
    pub extent: Extent,
}

impl Montage {
    /// Canvas height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.canvas.dim().0
    }

    /// Canvas width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.canvas.dim().1
    }

    /// Copy the canvas into an `RgbImage`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_rgb_image(&self) -> RgbImage {
        // Safe: canvas sides come from u32-sized patch shapes
        RgbImage::from_fn(self.width() as u32, self.height() as u32, |x, y| {
            let (row, col) = (y as usize, x as usize);
            Rgb([
                self.canvas[[row, col, 0]],
                self.canvas[[row, col, 1]],
                self.canvas[[row, col, 2]],
            ])
        })
    }
}

/// Builds montages of image patches from manifold coordinates.
///
/// Every image is assigned to a bin of a 2D grid laid over two manifold
/// components. Images sharing a bin are averaged and the result is drawn at
/// the bin's position on the canvas, offset by half a patch.
#[derive(Debug)]
pub struct ManifoldProjection2D<L = FileLoader> {
    store: ImageStore<L>,
}

impl ManifoldProjection2D<FileLoader> {
    /// Create a projection over image files or in-memory patches.
    ///
    /// # Errors
    ///
    /// Returns an error if the image store cannot be built.
    pub fn new(images: impl Into<ImageSource>, shape: PatchShape, preload: bool) -> Result<Self> {
        Ok(Self {
            store: ImageStore::new(images.into(), shape, preload)?,
        })
    }
}

impl<L: PatchLoader> ManifoldProjection2D<L> {
    /// Create a projection over an existing store.
    #[must_use]
    pub const fn from_store(store: ImageStore<L>) -> Self {
        Self { store }
    }

    /// The underlying image store.
    #[must_use]
    pub const fn store(&self) -> &ImageStore<L> {
        &self.store
    }

    /// Mutable access to the store, e.g. to release cached patches.
    pub fn store_mut(&mut self) -> &mut ImageStore<L> {
        &mut self.store
    }

    /// Build the montage for `manifold`, one row per image in store order.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of rows differs from the number of
    /// images, the configuration is invalid, the canvas would not fit in
    /// memory, or a patch fails to load.
    pub fn project(
        &self,
        manifold: ArrayView2<'_, f64>,
        config: &ProjectionConfig,
    ) -> Result<Montage> {
        if manifold.nrows() != self.store.len() {
            return Err(Error::ManifoldMismatch {
                images: self.store.len(),
                rows: manifold.nrows(),
            });
        }
        config.validate()?;
        canvas_dim(self.store.patch_shape(), config.bins)?;

        tracing::info!(
            "Projecting {} images on components {:?} with {} bins",
            self.store.len(),
            config.components,
            config.bins
        );

        let binning = bin_manifold(manifold, config.bins, config.components)?;
        let canvas = assemble(&self.store, &binning)?;
        let extent = binning.extent();

        tracing::info!("Projection complete, extent {:?}", extent.as_tuple());
        Ok(Montage { canvas, extent })
    }
}

/// Progress bar in the crate's house style.
pub(crate) fn progress_bar(len: usize, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(u64::try_from(len).unwrap_or(u64::MAX));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb.set_message(message);
    pb
}
