//! Cubic resampling of scattered `(x, y, z)` samples onto a regular grid.
//!
//! The interpolant is a polyharmonic spline with kernel `r^3` plus a linear
//! term. It passes exactly through every sample and needs at least three
//! non-collinear points to be well defined; four are required here so that the
//! surface has some curvature to show.

use itertools::Itertools;

use crate::error::ReportError;

pub const MIN_SURFACE_POINTS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    /// `z[j][i]` is the value at `(xs[i], ys[j])`
    pub z: Vec<Vec<f64>>,
}

impl Grid {
    pub fn z_range(&self) -> (f64, f64) {
        self.z
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| {
                (min.min(v), max.max(v))
            })
    }

    /// Value at the grid node closest to `(x, y)`
    pub fn nearest(&self, x: f64, y: f64) -> f64 {
        let i = nearest_index(&self.xs, x);
        let j = nearest_index(&self.ys, y);
        self.z[j][i]
    }
}

fn nearest_index(axis: &[f64], value: f64) -> usize {
    if axis.len() < 2 {
        return 0;
    }
    let step = (axis[axis.len() - 1] - axis[0]) / (axis.len() - 1) as f64;
    let idx = ((value - axis[0]) / step).round();
    (idx.max(0.0) as usize).min(axis.len() - 1)
}

/// Evaluates `n` evenly spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => (0..n)
            .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

struct CubicSpline {
    centers: Vec<(f64, f64)>,
    weights: Vec<f64>,
    linear: [f64; 3],
    offset: (f64, f64),
    scale: (f64, f64),
}

impl CubicSpline {
    fn fit(points: &[(f64, f64, f64)]) -> Result<Self, ReportError> {
        let (x_min, x_max) = points.iter().map(|p| p.0).minmax().into_option().unwrap_or_default();
        let (y_min, y_max) = points.iter().map(|p| p.1).minmax().into_option().unwrap_or_default();
        let scale = ((x_max - x_min).max(f64::EPSILON), (y_max - y_min).max(f64::EPSILON));
        let offset = (x_min, y_min);
        let centers = points
            .iter()
            .map(|p| ((p.0 - offset.0) / scale.0, (p.1 - offset.1) / scale.1))
            .collect::<Vec<_>>();

        let n = centers.len();
        let size = n + 3;
        let mut a = vec![vec![0.0; size]; size];
        let mut b = vec![0.0; size];
        for i in 0..n {
            for j in 0..n {
                a[i][j] = kernel(centers[i], centers[j]);
            }
            let poly = [1.0, centers[i].0, centers[i].1];
            for (k, value) in poly.into_iter().enumerate() {
                a[i][n + k] = value;
                a[n + k][i] = value;
            }
            b[i] = points[i].2;
        }

        let solution = solve(a, b).ok_or_else(|| {
            ReportError::Render("surface samples do not determine a cubic interpolant".to_owned())
        })?;
        Ok(Self {
            centers,
            weights: solution[..n].to_vec(),
            linear: [solution[n], solution[n + 1], solution[n + 2]],
            offset,
            scale,
        })
    }

    fn eval(&self, x: f64, y: f64) -> f64 {
        let p = ((x - self.offset.0) / self.scale.0, (y - self.offset.1) / self.scale.1);
        let radial = self
            .centers
            .iter()
            .zip(&self.weights)
            .map(|(c, w)| w * kernel(p, *c))
            .sum::<f64>();
        radial + self.linear[0] + self.linear[1] * p.0 + self.linear[2] * p.1
    }
}

fn kernel(a: (f64, f64), b: (f64, f64)) -> f64 {
    let r = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
    r * r * r
}

/// Gaussian elimination with partial pivoting, `None` when singular
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let sum = (row + 1..n).map(|k| a[row][k] * x[k]).sum::<f64>();
        x[row] = (b[row] - sum) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Averages samples sharing the same `(x, y)`, sorted by position
fn merge_duplicates(points: &[(f64, f64, f64)]) -> Vec<(f64, f64, f64)> {
    points
        .iter()
        .into_group_map_by(|p| (p.0.to_bits(), p.1.to_bits()))
        .into_iter()
        .map(|(_, group)| {
            let z = group.iter().map(|p| p.2).sum::<f64>() / group.len() as f64;
            (group[0].0, group[0].1, z)
        })
        .sorted_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)))
        .collect()
}

fn collinear(points: &[(f64, f64, f64)]) -> bool {
    let first = points[0];
    let Some(second) = points
        .iter()
        .find(|p| (p.0, p.1) != (first.0, first.1))
        .copied()
    else {
        return true;
    };
    let span = points
        .iter()
        .map(|p| (p.0 - first.0).abs().max((p.1 - first.1).abs()))
        .fold(0.0, f64::max);
    points.iter().all(|p| {
        let cross = (second.0 - first.0) * (p.1 - first.1) - (second.1 - first.1) * (p.0 - first.0);
        cross.abs() <= 1e-9 * span * span
    })
}

/// Resamples the scattered `points` onto a `resolution` x `resolution` grid
/// spanning their bounding box.
pub fn resample_cubic(
    points: &[(f64, f64, f64)],
    resolution: usize,
) -> Result<Grid, ReportError> {
    if points.iter().any(|p| !(p.0.is_finite() && p.1.is_finite() && p.2.is_finite())) {
        return Err(ReportError::Render("surface samples must be finite".to_owned()));
    }
    let points = merge_duplicates(points);
    if points.len() < MIN_SURFACE_POINTS {
        return Err(ReportError::Render(format!(
            "cubic interpolation needs at least {MIN_SURFACE_POINTS} distinct points, got {}",
            points.len()
        )));
    }
    if collinear(&points) {
        return Err(ReportError::Render(
            "cubic interpolation needs points that are not all on one line".to_owned(),
        ));
    }
    if resolution < 2 {
        return Err(ReportError::Render("grid resolution must be at least 2".to_owned()));
    }

    let spline = CubicSpline::fit(&points)?;
    let (x_min, x_max) = points.iter().map(|p| p.0).minmax().into_option().unwrap_or_default();
    let (y_min, y_max) = points.iter().map(|p| p.1).minmax().into_option().unwrap_or_default();
    let xs = linspace(x_min, x_max, resolution);
    let ys = linspace(y_min, y_max, resolution);
    let z = ys
        .iter()
        .map(|&y| xs.iter().map(|&x| spline.eval(x, y)).collect())
        .collect();
    Ok(Grid { xs, ys, z })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice() -> Vec<(f64, f64, f64)> {
        let mut points = Vec::new();
        for threads in [1.0, 2.0, 4.0, 8.0] {
            for memory in [256.0, 1024.0, 4096.0] {
                points.push((threads, memory, 10.0 / threads + memory / 1024.0));
            }
        }
        points
    }

    #[test]
    fn passes_through_samples() {
        let points = lattice();
        let grid = resample_cubic(&points, 8).unwrap();
        assert_eq!(grid.xs.len(), 8);
        assert_eq!(grid.z.len(), 8);
        assert_eq!(grid.xs[0], 1.0);
        assert_eq!(grid.xs[7], 8.0);
        assert_eq!(grid.ys[7], 4096.0);

        // corners of the grid coincide with samples
        assert!((grid.z[0][0] - (10.0 + 0.25)).abs() < 1e-6);
        assert!((grid.z[7][7] - (1.25 + 4.0)).abs() < 1e-6);
        let (min, max) = grid.z_range();
        assert!(min.is_finite() && max.is_finite() && min < max);
    }

    #[test]
    fn reproduces_planes() {
        let points = [
            (0.0, 0.0, 1.0),
            (1.0, 0.0, 3.0),
            (0.0, 1.0, 4.0),
            (1.0, 1.0, 6.0),
            (0.5, 0.2, 2.6),
        ];
        let grid = resample_cubic(&points, 5).unwrap();
        for (j, y) in grid.ys.iter().enumerate() {
            for (i, x) in grid.xs.iter().enumerate() {
                assert!((grid.z[j][i] - (1.0 + 2.0 * x + 3.0 * y)).abs() < 1e-6);
            }
        }
        assert!((grid.nearest(0.98, 0.01) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn duplicates_are_averaged() {
        let mut points = lattice();
        let (x, y, z) = points[0];
        points.push((x, y, z + 2.0));
        let grid = resample_cubic(&points, 4).unwrap();
        assert!((grid.z[0][0] - (z + 1.0)).abs() < 1e-6);
    }

    #[test]
    fn too_few_points() {
        let points = [(1.0, 1.0, 1.0), (2.0, 1.0, 1.0), (1.0, 2.0, 1.0)];
        assert!(matches!(
            resample_cubic(&points, 10),
            Err(ReportError::Render(_))
        ));
        // duplicates do not count twice
        let points = [(1.0, 1.0, 1.0), (1.0, 1.0, 2.0), (2.0, 1.0, 1.0), (1.0, 2.0, 1.0)];
        assert!(resample_cubic(&points, 10).is_err());
    }

    #[test]
    fn collinear_points() {
        let points = (0..6)
            .map(|i| (i as f64, 2.0 * i as f64, 1.0))
            .collect::<Vec<_>>();
        assert!(matches!(
            resample_cubic(&points, 10),
            Err(ReportError::Render(_))
        ));
    }

    #[test]
    fn linspace_endpoints() {
        assert_eq!(linspace(1.0, 16.0, 2), [1.0, 16.0]);
        assert_eq!(linspace(0.0, 1.0, 5), [0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }
}
