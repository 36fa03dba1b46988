//! Storage for the image patches that make up a montage.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

use ndarray::{Array4, ArrayView3, Axis};

use crate::error::{Error, Result};
use crate::image::{load_and_normalize, Patch, PatchShape, RGB_CHANNELS};

use super::progress_bar;

/// Images handed to the store.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Image files, loaded and normalized by the store.
    Paths(Vec<PathBuf>),
    /// Ready-made patches in NHWC layout, used as-is.
    Patches(Array4<f32>),
}

impl From<Vec<PathBuf>> for ImageSource {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self::Paths(paths)
    }
}

impl From<Array4<f32>> for ImageSource {
    fn from(patches: Array4<f32>) -> Self {
        Self::Patches(patches)
    }
}

/// Turns an image file into a normalized patch.
pub trait PatchLoader {
    /// Load the image at `path` as a `(height, width, 3)` patch.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be read or decoded.
    fn load(&self, path: &Path, shape: PatchShape) -> Result<Patch>;
}

/// Loads patches from disk with [`load_and_normalize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl PatchLoader for FileLoader {
    fn load(&self, path: &Path, shape: PatchShape) -> Result<Patch> {
        load_and_normalize(path, shape)
    }
}

#[derive(Debug)]
enum Storage {
    /// Patches held in memory, `(n, height, width, channels)`.
    Loaded(Array4<f32>),
    /// Files loaded on first access; each slot is filled at most once.
    Deferred {
        paths: Vec<PathBuf>,
        cache: Vec<Slot>,
    },
}

/// Cache entry for one deferred image. `loading` is held while the loader
/// runs, so concurrent first reads wait for a single load.
#[derive(Debug, Default)]
struct Slot {
    patch: OnceLock<Patch>,
    loading: Mutex<()>,
}

/// Image patches backing a projection, either in memory or loaded on demand.
#[derive(Debug)]
pub struct ImageStore<L = FileLoader> {
    shape: PatchShape,
    channels: usize,
    storage: Storage,
    loader: L,
}

impl ImageStore<FileLoader> {
    /// Create a store that reads image files with [`FileLoader`].
    ///
    /// # Errors
    ///
    /// See [`ImageStore::with_loader`].
    pub fn new(source: ImageSource, shape: PatchShape, preload: bool) -> Result<Self> {
        Self::with_loader(source, shape, preload, FileLoader)
    }
}

impl<L: PatchLoader> ImageStore<L> {
    /// Create a store using a custom patch loader.
    ///
    /// With `ImageSource::Paths` and `preload` set, every image is loaded
    /// immediately. Without `preload`, images load the first time they are
    /// requested. `preload` is ignored for `ImageSource::Patches`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is empty, the patch array does not
    /// match `shape` or has a channel count other than 1 or 3, or a
    /// preloaded image fails to load.
    pub fn with_loader(
        source: ImageSource,
        shape: PatchShape,
        preload: bool,
        loader: L,
    ) -> Result<Self> {
        shape.validate()?;

        let storage = match source {
            ImageSource::Patches(patches) => {
                validate_patches(&patches, shape)?;
                tracing::info!("Using {} in-memory patches", patches.len_of(Axis(0)));
                Storage::Loaded(patches)
            }
            ImageSource::Paths(paths) => {
                if paths.is_empty() {
                    return Err(Error::InvalidImages {
                        reason: "no image paths given".to_string(),
                    });
                }
                if preload {
                    Storage::Loaded(preload_all(&loader, &paths, shape)?)
                } else {
                    tracing::info!("Deferring load of {} images", paths.len());
                    let cache = paths.iter().map(|_| Slot::default()).collect();
                    Storage::Deferred { paths, cache }
                }
            }
        };

        let channels = match &storage {
            Storage::Loaded(patches) => patches.len_of(Axis(3)),
            Storage::Deferred { .. } => RGB_CHANNELS,
        };

        Ok(Self {
            shape,
            channels,
            storage,
            loader,
        })
    }

    /// Return the patch at `index`, loading it first if it is deferred.
    ///
    /// A deferred image is loaded once, also when several threads ask for it
    /// at the same time; later calls return the cached patch.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range or loading fails.
    pub fn get_patch(&self, index: usize) -> Result<ArrayView3<'_, f32>> {
        if index >= self.len() {
            return Err(Error::invalid_parameter(
                "index",
                format!("{index} is out of range for {} images", self.len()),
            ));
        }

        match &self.storage {
            Storage::Loaded(patches) => Ok(patches.index_axis(Axis(0), index)),
            Storage::Deferred { paths, cache } => {
                let slot = &cache[index];
                if let Some(patch) = slot.patch.get() {
                    return Ok(patch.view());
                }

                let _loading = slot.loading.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(patch) = slot.patch.get() {
                    return Ok(patch.view());
                }

                let path = &paths[index];
                tracing::debug!("Loading deferred image {index}: {}", path.display());
                let patch = self.loader.load(path, self.shape)?;
                check_patch_dim(&patch, self.shape)?;

                Ok(slot.patch.get_or_init(|| patch).view())
            }
        }
    }

    /// Number of images in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Loaded(patches) => patches.len_of(Axis(0)),
            Storage::Deferred { paths, .. } => paths.len(),
        }
    }

    /// Whether the store holds no images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Height and width of every patch.
    #[must_use]
    pub const fn patch_shape(&self) -> PatchShape {
        self.shape
    }

    /// Channels per patch (1 or 3).
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Number of patches currently held in memory.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        match &self.storage {
            Storage::Loaded(patches) => patches.len_of(Axis(0)),
            Storage::Deferred { cache, .. } => {
                cache.iter().filter(|s| s.patch.get().is_some()).count()
            }
        }
    }

    /// Drop lazily loaded patches. Preloaded and in-memory patches are kept.
    pub fn clear_cache(&mut self) {
        if let Storage::Deferred { cache, .. } = &mut self.storage {
            for slot in cache.iter_mut() {
                slot.patch.take();
            }
        }
    }

    /// The loader used for deferred images.
    #[must_use]
    pub const fn loader(&self) -> &L {
        &self.loader
    }
}

/// Load every image up front, in input order.
fn preload_all<L: PatchLoader>(
    loader: &L,
    paths: &[PathBuf],
    shape: PatchShape,
) -> Result<Array4<f32>> {
    tracing::info!(
        "Preloading {} images at {}x{}",
        paths.len(),
        shape.height,
        shape.width
    );

    let mut patches = Array4::<f32>::zeros((paths.len(), shape.height, shape.width, RGB_CHANNELS));
    let pb = progress_bar(paths.len(), "Loading images");

    for (path, mut slot) in paths.iter().zip(patches.axis_iter_mut(Axis(0))) {
        let patch = loader.load(path, shape)?;
        check_patch_dim(&patch, shape)?;
        slot.assign(&patch);
        pb.inc(1);
    }

    pb.finish_with_message("Images loaded");
    Ok(patches)
}

fn validate_patches(patches: &Array4<f32>, shape: PatchShape) -> Result<()> {
    let (n, height, width, channels) = patches.dim();

    if n == 0 {
        return Err(Error::InvalidImages {
            reason: "patch array is empty".to_string(),
        });
    }
    if channels != 1 && channels != RGB_CHANNELS {
        return Err(Error::InvalidImages {
            reason: format!("patches must have 1 or 3 channels, found {channels}"),
        });
    }
    if (height, width) != (shape.height, shape.width) {
        return Err(Error::ShapeMismatch {
            expected: format!("{}x{} patches", shape.height, shape.width),
            actual: format!("{height}x{width}"),
        });
    }

    Ok(())
}

fn check_patch_dim(patch: &Patch, shape: PatchShape) -> Result<()> {
    let expected = (shape.height, shape.width, RGB_CHANNELS);
    if patch.dim() == expected {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            expected: format!("{expected:?}"),
            actual: format!("{:?}", patch.dim()),
        })
    }
}
