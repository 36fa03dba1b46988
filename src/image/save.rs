//! Image saving utilities.

use std::path::Path;

use crate::error::{Error, Result};
use crate::projection::Montage;

/// Save a montage canvas as an image file.
///
/// The format is inferred from the extension. Parent directories are created
/// as needed.
///
/// # Arguments
///
/// * `montage` - Montage returned by a projection
/// * `path` - Output file path
/// * `quality` - JPEG quality (1-100), ignored for other formats
///
/// # Errors
///
/// Returns an error if `quality` is out of range or the image cannot be saved.
pub fn save_montage<P: AsRef<Path>>(montage: &Montage, path: P, quality: u8) -> Result<()> {
    let path = path.as_ref();

    if !(1..=100).contains(&quality) {
        return Err(Error::invalid_parameter("quality", "must be between 1 and 100"));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let img = montage.to_rgb_image();

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png")
        .to_lowercase();

    tracing::info!(
        "Writing {}x{} montage to {}",
        img.width(),
        img.height(),
        path.display()
    );

    match extension.as_str() {
        "jpg" | "jpeg" => {
            let mut output = std::fs::File::create(path)?;
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
            img.write_with_encoder(encoder)
                .map_err(|source| Error::ImageSave {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        _ => {
            img.save(path).map_err(|source| Error::ImageSave {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Extent;
    use ndarray::Array3;

    fn small_montage() -> Montage {
        let mut canvas = Array3::<u8>::zeros((6, 4, 3));
        canvas[[1, 2, 0]] = 250;
        canvas[[5, 3, 2]] = 17;
        Montage {
            canvas,
            extent: Extent {
                x_min: 0.0,
                x_max: 1.0,
                y_min: -1.0,
                y_max: 1.0,
            },
        }
    }

    #[test]
    fn test_png_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("montage.png");

        save_montage(&small_montage(), &path, 95).unwrap();

        let loaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(loaded.dimensions(), (4, 6));
        assert_eq!(loaded.get_pixel(2, 1)[0], 250);
        assert_eq!(loaded.get_pixel(3, 5)[2], 17);
    }

    #[test]
    fn test_jpeg_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("montage.JPG");

        save_montage(&small_montage(), &path, 80).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_quality_validated() {
        let dir = tempfile::tempdir().unwrap();
        let result = save_montage(&small_montage(), dir.path().join("m.jpg"), 0);
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }
}
