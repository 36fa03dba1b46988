//! Two-dimensional binning of manifold coordinates.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::error::{Error, Result};

use super::Extent;

/// 1-indexed `(x, y)` bin, each coordinate in `[1, bins]`.
pub type BinIndex = (usize, usize);

/// Result of binning two manifold components on a uniform grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Binning {
    /// `bins + 1` edges along the first component.
    pub x_edges: Vec<f64>,
    /// `bins + 1` edges along the second component.
    pub y_edges: Vec<f64>,
    /// Bin of every manifold row, in row order.
    pub assignments: Vec<BinIndex>,
    /// Number of rows per bin, indexed `[x - 1, y - 1]`.
    pub counts: Array2<usize>,
}

impl Binning {
    /// Bins per axis.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.x_edges.len().saturating_sub(1)
    }

    /// Row indices grouped by bin. Indices keep their row order within a group.
    #[must_use]
    pub fn groups(&self) -> BTreeMap<BinIndex, Vec<usize>> {
        let mut groups: BTreeMap<BinIndex, Vec<usize>> = BTreeMap::new();
        for (idx, &bin) in self.assignments.iter().enumerate() {
            groups.entry(bin).or_default().push(idx);
        }
        groups
    }

    /// Coordinate range covered by the bin edges.
    #[must_use]
    pub fn extent(&self) -> Extent {
        let (x_min, x_max) = min_max(self.x_edges.iter().copied());
        let (y_min, y_max) = min_max(self.y_edges.iter().copied());
        Extent {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }
}

/// Bin two columns of `manifold` on a `bins` x `bins` grid.
///
/// Each axis spans the range of its column (widened by 0.5 on both sides
/// when the column is constant) split into `bins` equal intervals. An
/// interval includes its lower edge; the last one also includes the upper
/// edge.
///
/// # Errors
///
/// Returns an error if `bins` is zero or its square overflows, the manifold
/// has no rows, a component index is out of range, or a selected coordinate
/// is not finite.
pub fn bin_manifold(
    manifold: ArrayView2<'_, f64>,
    bins: usize,
    components: (usize, usize),
) -> Result<Binning> {
    if bins == 0 {
        return Err(Error::invalid_parameter("bins", "must be greater than 0"));
    }
    let Some(cells) = bins.checked_mul(bins) else {
        return Err(Error::invalid_parameter(
            "bins",
            format!("{bins} bins per axis overflow the grid"),
        ));
    };

    let (rows, dims) = manifold.dim();
    if rows == 0 {
        return Err(Error::invalid_parameter("manifold", "has no rows"));
    }
    let named = [("components.0", components.0), ("components.1", components.1)];
    for (name, component) in named {
        if component >= dims {
            return Err(Error::invalid_parameter(
                name,
                format!("component {component} out of range for a {dims}-dimensional manifold"),
            ));
        }
    }

    let xs = manifold.column(components.0);
    let ys = manifold.column(components.1);
    if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
        return Err(Error::invalid_parameter("manifold", "contains non-finite coordinates"));
    }

    let x_edges = axis_edges(xs, bins);
    let y_edges = axis_edges(ys, bins);

    let mut counts = Array2::<usize>::zeros((bins, bins));
    let assignments: Vec<BinIndex> = xs
        .iter()
        .zip(ys.iter())
        .map(|(&x, &y)| {
            let bin = (locate(&x_edges, x), locate(&y_edges, y));
            counts[[bin.0 - 1, bin.1 - 1]] += 1;
            bin
        })
        .collect();

    let occupied = counts.iter().filter(|&&c| c > 0).count();
    tracing::debug!("Binned {rows} points into {occupied} of {cells} bins");

    Ok(Binning {
        x_edges,
        y_edges,
        assignments,
        counts,
    })
}

/// Evenly spaced edges over the range of `values`.
#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
fn axis_edges(values: ArrayView1<'_, f64>, bins: usize) -> Vec<f64> {
    let (mut lo, mut hi) = min_max(values.iter().copied());
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let step = (hi - lo) / bins as f64;
    (0..=bins)
        .map(|i| if i == bins { hi } else { lo + step * i as f64 })
        .collect()
}

/// 1-indexed bin of `value`: the number of edges not above it, capped at the
/// last bin so the upper edge is inclusive.
fn locate(edges: &[f64], value: f64) -> usize {
    let bins = edges.len() - 1;
    edges.partition_point(|&e| e <= value).clamp(1, bins)
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_unit_square() {
        let manifold = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let binning = bin_manifold(manifold.view(), 2, (0, 1)).unwrap();

        assert_eq!(binning.x_edges, vec![0.0, 0.5, 1.0]);
        assert_eq!(binning.y_edges, vec![0.0, 0.5, 1.0]);
        assert_eq!(binning.assignments, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
        assert_eq!(binning.counts, Array2::from_elem((2, 2), 1));
    }

    #[test]
    fn test_interior_edge_goes_up() {
        // 0.5 sits on the middle edge and belongs to the upper interval.
        let manifold = array![[0.0, 0.0], [0.5, 0.5], [1.0, 1.0]];
        let binning = bin_manifold(manifold.view(), 2, (0, 1)).unwrap();

        assert_eq!(binning.assignments[1], (2, 2));
        assert_eq!(binning.counts[[1, 1]], 2);
    }

    #[test]
    fn test_constant_axis_widened() {
        let manifold = array![[3.0, 0.0], [3.0, 4.0], [3.0, 8.0]];
        let binning = bin_manifold(manifold.view(), 4, (0, 1)).unwrap();

        assert!((binning.x_edges[0] - 2.5).abs() < 1e-12);
        assert!((binning.x_edges[4] - 3.5).abs() < 1e-12);
        assert!(binning.assignments.iter().all(|&(x, _)| x == 3));
        assert_eq!(binning.assignments[2].1, 4);
    }

    #[test]
    fn test_component_selection() {
        let manifold = array![[9.0, 0.0, 10.0], [9.0, 1.0, 20.0], [9.0, 2.0, 30.0]];
        let binning = bin_manifold(manifold.view(), 3, (2, 1)).unwrap();

        assert_eq!(binning.x_edges.first().copied(), Some(10.0));
        assert_eq!(binning.x_edges.last().copied(), Some(30.0));
        assert_eq!(binning.assignments, vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_all_assignments_in_range() {
        let manifold = Array2::from_shape_fn((200, 2), |(i, j)| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f64 * 0.37 + j as f64;
            (t * 1.7).sin() * 5.0 + t.cos()
        });
        let binning = bin_manifold(manifold.view(), 7, (0, 1)).unwrap();

        let in_range = |&(x, y): &BinIndex| (1..=7).contains(&x) && (1..=7).contains(&y);
        assert!(binning.assignments.iter().all(in_range));
        assert_eq!(binning.counts.sum(), 200);
        assert_eq!(binning.groups().values().map(Vec::len).sum::<usize>(), 200);
    }

    #[test]
    fn test_extent_matches_edges() {
        let manifold = array![[-2.0, 5.0], [4.0, 7.5], [1.0, 6.0]];
        let binning = bin_manifold(manifold.view(), 5, (0, 1)).unwrap();
        let extent = binning.extent();

        assert_eq!(extent.x_min, binning.x_edges[0]);
        assert_eq!(extent.x_max, binning.x_edges[5]);
        assert_eq!(extent.y_min, binning.y_edges[0]);
        assert_eq!(extent.y_max, binning.y_edges[5]);
        assert_eq!(extent.as_tuple(), (-2.0, 4.0, 5.0, 7.5));
    }

    #[test]
    fn test_groups_keep_row_order() {
        let manifold = array![[0.0, 0.0], [1.0, 1.0], [0.1, 0.1], [0.2, 0.0]];
        let groups = bin_manifold(manifold.view(), 2, (0, 1)).unwrap().groups();

        assert_eq!(groups[&(1, 1)], vec![0, 2, 3]);
        assert_eq!(groups[&(2, 2)], vec![1]);
    }

    #[test]
    fn test_invalid_arguments() {
        let manifold = array![[0.0, 1.0], [2.0, 3.0]];

        assert!(bin_manifold(manifold.view(), 0, (0, 1)).is_err());
        assert!(bin_manifold(manifold.view(), 2, (0, 2)).is_err());
        let empty = Array2::<f64>::zeros((0, 2));
        assert!(bin_manifold(empty.view(), 2, (0, 1)).is_err());
        assert!(matches!(
            bin_manifold(manifold.view(), usize::MAX / 2, (0, 1)),
            Err(Error::InvalidParameter { .. })
        ));

        let with_nan = array![[0.0, f64::NAN], [2.0, 3.0]];
        assert!(matches!(
            bin_manifold(with_nan.view(), 2, (0, 1)),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
