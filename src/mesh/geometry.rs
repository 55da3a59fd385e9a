use nalgebra::{DMatrix, DVector};

use crate::error::{ElasticError, ElasticResult};

/// Point coordinates, one row per point (`npt × d`)
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub points: DMatrix<f64>,
}

impl Grid {
    pub fn new(points: DMatrix<f64>) -> Self {
        Self { points }
    }

    /// Build from row slices; every row must have the same length
    pub fn from_rows(rows: &[Vec<f64>]) -> ElasticResult<Self> {
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);
        if let Some((i, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != dim) {
            return Err(ElasticError::InvalidConfiguration(format!(
                "grid row {} has {} coordinates, expected {}",
                i,
                r.len(),
                dim
            )));
        }
        let points = DMatrix::from_fn(rows.len(), dim, |i, j| rows[i][j]);
        Ok(Self { points })
    }

    pub fn num_points(&self) -> usize {
        self.points.nrows()
    }

    pub fn dimension(&self) -> usize {
        self.points.ncols()
    }

    /// Coordinates of one point as an owned vector
    pub fn point(&self, idx: usize) -> DVector<f64> {
        self.points.row(idx).transpose()
    }

    /// Coordinates of one point as a plain `Vec`, for callbacks
    pub fn point_coords(&self, idx: usize) -> Vec<f64> {
        self.points.row(idx).iter().copied().collect()
    }

    pub fn set_point(&mut self, idx: usize, coords: &[f64]) {
        debug_assert_eq!(coords.len(), self.dimension());
        for (j, &c) in coords.iter().enumerate() {
            self.points[(idx, j)] = c;
        }
    }

    /// Edge vector `x[to] - x[from]`
    pub fn edge(&self, from: usize, to: usize) -> DVector<f64> {
        (self.points.row(to) - self.points.row(from)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let grid = Grid::from_rows(&[vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 2.0]]).unwrap();

        assert_eq!(grid.num_points(), 3);
        assert_eq!(grid.dimension(), 2);
        assert_eq!(grid.point_coords(2), vec![0.0, 2.0]);
        assert_eq!(grid.edge(0, 1), DVector::from_vec(vec![1.0, 0.0]));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = Grid::from_rows(&[vec![0.0, 0.0], vec![1.0]]);
        assert!(matches!(result, Err(ElasticError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_set_point() {
        let mut grid = Grid::from_rows(&[vec![0.0, 0.0], vec![1.0, 0.0]]).unwrap();
        grid.set_point(1, &[3.0, 4.0]);
        assert_eq!(grid.point(1), DVector::from_vec(vec![3.0, 4.0]));
    }
}
