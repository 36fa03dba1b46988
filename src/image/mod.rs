//! Image loading, normalization, and saving utilities.

mod load;
mod normalize;
mod save;

pub use load::{load_and_normalize, normalize_image};
pub use normalize::normalize_channels;
pub use save::save_montage;

use ndarray::Array3;

use crate::error::{Error, Result};

/// Image patch in HWC layout (height, width, channels).
/// Values lie in the [0, 255] display range but are kept as floats until the
/// montage is rendered.
pub type Patch = Array3<f32>;

/// Number of channels in RGB images.
pub const RGB_CHANNELS: usize = 3;

/// Default patch edge length used for montage tiles.
pub const DEFAULT_PATCH_SIZE: usize = 64;

/// Target size every image is resized to before it joins the montage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchShape {
    /// Patch height in pixels.
    pub height: usize,
    /// Patch width in pixels.
    pub width: usize,
}

impl PatchShape {
    #[must_use]
    pub const fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    /// Number of pixels in a single channel of the patch.
    #[must_use]
    pub const fn pixels(&self) -> usize {
        self.height * self.width
    }

    /// Validate the shape.
    ///
    /// # Errors
    ///
    /// Returns an error if either side is zero or does not fit an image dimension.
    pub fn validate(&self) -> Result<()> {
        for (name, side) in [("height", self.height), ("width", self.width)] {
            if side == 0 {
                return Err(Error::invalid_parameter(name, "must be greater than 0"));
            }
            if u32::try_from(side).is_err() {
                return Err(Error::invalid_parameter(name, "does not fit in u32"));
            }
        }
        Ok(())
    }
}

impl Default for PatchShape {
    fn default() -> Self {
        Self::new(DEFAULT_PATCH_SIZE, DEFAULT_PATCH_SIZE)
    }
}
