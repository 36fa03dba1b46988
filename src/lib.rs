//! # `manifold-montage`
//!
//! Render montages of image patches arranged by a 2D manifold projection.
//!
//! Each image gets a point in a low-dimensional embedding (for example the
//! latent space of an autoencoder). Two components of that embedding are
//! binned on a uniform grid, images falling into the same bin are averaged,
//! and every occupied bin is drawn as one tile of a single canvas.
//!
//! ## Example
//!
//! ```no_run
//! use manifold_montage::{ManifoldProjection2D, PatchShape, ProjectionConfig};
//! use ndarray::array;
//! use std::path::PathBuf;
//!
//! # fn main() -> manifold_montage::Result<()> {
//! let files: Vec<PathBuf> = vec!["a.png".into(), "b.png".into(), "c.png".into()];
//! let projection = ManifoldProjection2D::new(files, PatchShape::default(), true)?;
//!
//! let manifold = array![[0.0, 0.1], [0.5, 0.9], [1.0, 0.2]];
//! let montage = projection.project(manifold.view(), &ProjectionConfig::default())?;
//!
//! manifold_montage::save_montage(&montage, "montage.png", 95)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod image;
pub mod manifest;
pub mod projection;

pub use crate::error::{Error, Result};
pub use crate::image::{save_montage, Patch, PatchShape};
pub use crate::manifest::{read_manifest, Manifest};
pub use crate::projection::{
    Extent, ImageSource, ImageStore, ManifoldProjection2D, Montage, ProjectionConfig,
};
