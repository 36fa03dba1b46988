//! CSV manifests pairing image files with their manifold coordinates.
//!
//! Each row is `path,c0,c1,...` with no header. Lines starting with `#` are
//! ignored and relative paths resolve against the manifest's directory.

use std::path::{Path, PathBuf};

use ndarray::Array2;

use crate::error::{Error, Result};

/// Image paths and their manifold coordinates, row for row.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub paths: Vec<PathBuf>,
    /// One row per path.
    pub manifold: Array2<f64>,
}

impl Manifest {
    /// Number of images listed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of coordinates per image.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.manifold.ncols()
    }
}

/// Read a manifest file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a row has no path, a
/// coordinate does not parse, rows disagree on the number of coordinates, or
/// the file has no rows.
pub fn read_manifest<P: AsRef<Path>>(path: P) -> Result<Manifest> {
    let path = path.as_ref();
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_path(path)?;

    let mut paths = Vec::new();
    let mut coords = Vec::new();
    let mut dims: Option<usize> = None;

    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, csv::Position::line);
        let invalid = |reason: String| Error::Manifest {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut fields = record.iter();
        let image = fields
            .next()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| invalid("missing image path".to_string()))?;

        let row = fields
            .map(|field| {
                field
                    .parse::<f64>()
                    .map_err(|e| invalid(format!("invalid coordinate {field:?}: {e}")))
            })
            .collect::<Result<Vec<f64>>>()?;

        match dims {
            _ if row.is_empty() => return Err(invalid("row has no coordinates".to_string())),
            Some(expected) if expected != row.len() => {
                return Err(invalid(format!(
                    "expected {expected} coordinates, found {}",
                    row.len()
                )));
            }
            _ => dims = Some(row.len()),
        }

        // Joining onto the base keeps absolute paths unchanged.
        paths.push(base.join(image));
        coords.extend(row);
    }

    let Some(dims) = dims else {
        return Err(Error::Manifest {
            path: path.to_path_buf(),
            line: 0,
            reason: "no rows".to_string(),
        });
    };

    tracing::info!(
        "Read {} images with {dims}-dimensional coordinates from {}",
        paths.len(),
        path.display()
    );

    let manifold = Array2::from_shape_vec((paths.len(), dims), coords).map_err(|e| {
        Error::ShapeMismatch {
            expected: format!("{} x {dims} manifold", paths.len()),
            actual: e.to_string(),
        }
    })?;

    Ok(Manifest { paths, manifold })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::fs;

    fn write_manifest(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.csv");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_reads_rows() {
        let (dir, path) = write_manifest("# path,x,y\na.png, 0.5, -1\n/abs/b.png,2,3e1\n");

        let manifest = read_manifest(&path).unwrap();

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.dimensions(), 2);
        assert_eq!(manifest.paths[0], dir.path().join("a.png"));
        assert_eq!(manifest.paths[1], PathBuf::from("/abs/b.png"));
        assert_eq!(manifest.manifold, array![[0.5, -1.0], [2.0, 30.0]]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let (_dir, path) = write_manifest("a.png,0,1\nb.png,0,1,2\n");

        let err = read_manifest(&path).unwrap_err();
        assert!(matches!(err, Error::Manifest { line: 2, .. }), "got {err}");
    }

    #[test]
    fn test_bad_coordinate() {
        let (_dir, path) = write_manifest("a.png,0,one\n");
        assert!(matches!(read_manifest(&path), Err(Error::Manifest { line: 1, .. })));
    }

    #[test]
    fn test_missing_parts() {
        let (_dir, path) = write_manifest("a.png\n");
        assert!(matches!(read_manifest(&path), Err(Error::Manifest { .. })));

        let (_dir, path) = write_manifest(",1,2\n");
        assert!(matches!(read_manifest(&path), Err(Error::Manifest { .. })));

        let (_dir, path) = write_manifest("# only a comment\n");
        assert!(matches!(read_manifest(&path), Err(Error::Manifest { line: 0, .. })));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(read_manifest("/no/such/manifest.csv"), Err(Error::Csv(_))));
    }
}
