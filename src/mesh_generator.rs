use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::ElasticResult;
use crate::mesh::{Grid, SimplexMesh};

/// Structured triangle meshes for drivers and tests
pub struct MeshGenerator;

impl MeshGenerator {
    /// Triangulate the rectangle [0, lx] × [0, ly]
    ///
    /// Points are numbered row by row (x fastest). Each cell is split along
    /// its lower-left to upper-right diagonal into two counter-clockwise
    /// triangles, so every element has positive orientation.
    ///
    /// # Arguments
    /// * `nx`, `ny` - Number of cells in each direction
    /// * `lx`, `ly` - Domain dimensions
    pub fn rectangle(nx: usize, ny: usize, lx: f64, ly: f64) -> ElasticResult<(SimplexMesh, Grid)> {
        let dx = lx / nx as f64;
        let dy = ly / ny as f64;
        let npt = (nx + 1) * (ny + 1);

        let points = DMatrix::from_fn(npt, 2, |i, j| {
            let (ix, iy) = (i % (nx + 1), i / (nx + 1));
            if j == 0 { ix as f64 * dx } else { iy as f64 * dy }
        });

        let node = |ix: usize, iy: usize| iy * (nx + 1) + ix;
        let mut indices = Vec::with_capacity(6 * nx * ny);
        for iy in 0..ny {
            for ix in 0..nx {
                let (n00, n10) = (node(ix, iy), node(ix + 1, iy));
                let (n01, n11) = (node(ix, iy + 1), node(ix + 1, iy + 1));
                indices.extend_from_slice(&[n00, n10, n11]);
                indices.extend_from_slice(&[n00, n11, n01]);
            }
        }

        let mesh = SimplexMesh::from_flat(2, npt, &indices)?;
        Ok((mesh, Grid::new(points)))
    }

    /// Randomly displace interior points by up to `amplitude` per coordinate
    ///
    /// Boundary points (on the bounding box) stay put. Keep `amplitude`
    /// below a quarter of the cell size to avoid inverting elements.
    pub fn jitter_interior(grid: &mut Grid, amplitude: f64, seed: u64) {
        if amplitude <= 0.0 {
            return;
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let dim = grid.dimension();
        let tol = 1e-12;

        let lo: Vec<f64> = (0..dim).map(|j| grid.points.column(j).min()).collect();
        let hi: Vec<f64> = (0..dim).map(|j| grid.points.column(j).max()).collect();

        for i in 0..grid.num_points() {
            let on_boundary = (0..dim).any(|j| {
                let x = grid.points[(i, j)];
                (x - lo[j]).abs() < tol || (x - hi[j]).abs() < tol
            });
            if on_boundary {
                continue;
            }
            for j in 0..dim {
                grid.points[(i, j)] += rng.gen_range(-amplitude..amplitude);
            }
        }
    }
}
