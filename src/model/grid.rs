use ndarray::Array3;

/// Geometry of the voxel grid shared by every structure of a simulation.
///
/// Voxel `(i, j, k)` covers `[i·s, (i+1)·s) × [j·s, (j+1)·s) × [k·s, (k+1)·s)`
/// millimetres, where `s` is the spacing. The z axis grows with depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    /// Edge length of a cubic voxel in millimetres.
    pub spacing_mm: f64,
    /// Physical extent of the volume along x, y and z in millimetres.
    pub extent_mm: [f64; 3],
    /// Number of voxels along x, y and z.
    pub dims: [usize; 3],
}

impl GridGeometry {
    /// Builds the grid for a volume of `extent_mm` sampled at `spacing_mm`.
    ///
    /// Voxel counts are rounded half away from zero. Callers validate that
    /// both inputs are positive and produce at least one voxel per axis.
    pub fn new(spacing_mm: f64, extent_mm: [f64; 3]) -> Self {
        let dims = extent_mm.map(|extent| (extent / spacing_mm).round() as usize);
        Self {
            spacing_mm,
            extent_mm,
            dims,
        }
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.dims[0], self.dims[1], self.dims[2])
    }

    #[inline]
    pub fn voxel_count(&self) -> usize {
        self.dims.iter().product()
    }

    /// Centre of the voxel at `index` in millimetres.
    #[inline]
    pub fn voxel_center_mm(&self, index: [usize; 3]) -> [f64; 3] {
        index.map(|i| (i as f64 + 0.5) * self.spacing_mm)
    }

    #[inline]
    pub fn mm_to_voxels(&self, mm: f64) -> f64 {
        mm / self.spacing_mm
    }

    pub fn zeros(&self) -> Array3<f64> {
        Array3::zeros(self.shape())
    }

    pub fn filled(&self, value: f64) -> Array3<f64> {
        Array3::from_elem(self.shape(), value)
    }

    /// Horizontal bounds of the volume as `[[x0, x1], [y0, y1]]` in millimetres.
    pub fn horizontal_bounds_mm(&self) -> [[f64; 2]; 2] {
        [[0.0, self.extent_mm[0]], [0.0, self.extent_mm[1]]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dims_round_half_away_from_zero() {
        let grid = GridGeometry::new(0.4, [1.0, 2.0, 0.6]);
        assert_eq!(grid.dims, [3, 5, 2]);
    }

    #[test]
    fn voxel_centers_sit_half_a_voxel_in() {
        let grid = GridGeometry::new(0.5, [2.0, 2.0, 2.0]);
        assert_eq!(grid.voxel_center_mm([0, 1, 3]), [0.25, 0.75, 1.75]);
        assert_eq!(grid.voxel_count(), 64);
    }

    #[test]
    fn filled_grid_matches_shape() {
        let grid = GridGeometry::new(1.0, [3.0, 4.0, 5.0]);
        let arr = grid.filled(0.5);
        assert_eq!(arr.shape(), &[3, 4, 5]);
        assert!(arr.iter().all(|&v| v == 0.5));
    }
}
