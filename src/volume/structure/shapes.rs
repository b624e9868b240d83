use super::{Footprint, RasterContext, radial_fraction};
use crate::model::vector::{Vec3, norm, sub};
use crate::volume::error::Error;
use nalgebra::{Matrix3, Vector3};

/// Supersamples per axis for partial-volume estimates of boxes.
const SUPERSAMPLES: usize = 4;
/// Edge triples whose normalized volume falls below this are coplanar.
const COPLANAR_TOLERANCE: f64 = 1e-12;

/// Box spanned by three edge vectors from an origin corner.
#[derive(Debug, Clone)]
pub(crate) struct Parallelepiped {
    origin: Vector3<f64>,
    /// Inverse of the matrix whose columns are the edges; maps `p − origin`
    /// to its coordinates along each edge in units of that edge.
    inverse: Matrix3<f64>,
}

impl Parallelepiped {
    /// Returns `None` when the edges are coplanar.
    pub fn new(origin: Vec3, edges: [Vec3; 3]) -> Option<Self> {
        let columns = edges.map(Vector3::from);
        let volume_scale: f64 = columns.iter().map(|c| c.norm()).product();
        let edge_matrix = Matrix3::from_columns(&columns);
        if volume_scale == 0.0
            || (edge_matrix.determinant() / volume_scale).abs() < COPLANAR_TOLERANCE
        {
            return None;
        }
        Some(Self {
            origin: Vector3::from(origin),
            inverse: edge_matrix.try_inverse()?,
        })
    }

    pub fn axis_aligned(origin: Vec3, size: Vec3) -> Self {
        Self {
            origin: Vector3::from(origin),
            inverse: Matrix3::from_diagonal(&Vector3::from(size.map(|edge| 1.0 / edge))),
        }
    }

    fn contains_point(&self, point: Vec3) -> bool {
        let coordinates = self.inverse * (Vector3::from(point) - self.origin);
        coordinates.iter().all(|c| (0.0..1.0).contains(c))
    }
}

impl Footprint for Parallelepiped {
    fn fraction_at(&self, index: [usize; 3], ctx: &RasterContext<'_>) -> Result<f64, Error> {
        let s = ctx.grid.spacing_mm;
        if !ctx.partial_volume {
            let center = ctx.undeformed_center(index)?;
            return Ok(if self.contains_point(center) { 1.0 } else { 0.0 });
        }

        let mut corner = index.map(|i| i as f64 * s);
        corner[2] -= ctx.elevation_at(index[0], index[1])?;
        let step = s / SUPERSAMPLES as f64;
        let offsets: Vec<f64> = (0..SUPERSAMPLES).map(|q| (q as f64 + 0.5) * step).collect();
        let mut inside = 0usize;
        for &dx in &offsets {
            for &dy in &offsets {
                for &dz in &offsets {
                    let p = [corner[0] + dx, corner[1] + dy, corner[2] + dz];
                    if self.contains_point(p) {
                        inside += 1;
                    }
                }
            }
        }
        Ok(inside as f64 / SUPERSAMPLES.pow(3) as f64)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Sphere {
    center: Vec3,
    radius: f64,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f64) -> Self {
        Self { center, radius }
    }
}

impl Footprint for Sphere {
    fn fraction_at(&self, index: [usize; 3], ctx: &RasterContext<'_>) -> Result<f64, Error> {
        let voxel = ctx.undeformed_center(index)?;
        let distance = norm(sub(voxel, self.center));
        Ok(radial_fraction(distance - self.radius, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::grid::GridGeometry;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() <= eps
    }

    fn ctx(grid: &GridGeometry, partial_volume: bool) -> RasterContext<'_> {
        RasterContext {
            grid,
            partial_volume,
            deformation: None,
        }
    }

    #[test]
    fn cuboid_center_test_counts_whole_voxels() {
        let grid = GridGeometry::new(1.0, [6.0, 6.0, 6.0]);
        let cuboid = Parallelepiped::axis_aligned([1.0, 1.0, 1.0], [2.0, 3.0, 1.0]);
        let out = cuboid.rasterize(&ctx(&grid, false)).unwrap();
        assert_eq!(out.sum(), 6.0);
        assert_eq!(out[[1, 1, 1]], 1.0);
        assert_eq!(out[[3, 1, 1]], 0.0);
    }

    #[test]
    fn cuboid_partial_volume_by_supersampling() {
        let grid = GridGeometry::new(1.0, [4.0, 4.0, 4.0]);
        let cuboid = Parallelepiped::axis_aligned([0.5, 0.0, 0.0], [2.0, 4.0, 4.0]);
        let c = ctx(&grid, true);
        assert!(approx_eq(cuboid.fraction_at([0, 0, 0], &c).unwrap(), 0.5, 1e-12));
        assert!(approx_eq(cuboid.fraction_at([1, 0, 0], &c).unwrap(), 1.0, 1e-12));
        assert!(approx_eq(cuboid.fraction_at([2, 0, 0], &c).unwrap(), 0.5, 1e-12));
        assert!(approx_eq(cuboid.rasterize(&c).unwrap().sum(), 32.0, 1e-9));
    }

    #[test]
    fn rotated_parallelepiped_contains_its_center() {
        let edges = [[2.0, 2.0, 0.0], [-2.0, 2.0, 0.0], [0.0, 0.0, 2.0]];
        let box_ = Parallelepiped::new([4.0, 0.0, 0.0], edges).unwrap();
        assert!(box_.contains_point([4.0, 2.0, 1.0]));
        assert!(!box_.contains_point([1.0, 0.5, 1.0]));
        assert!(!box_.contains_point([4.0, 2.0, 2.5]));
    }

    #[test]
    fn coplanar_edges_are_rejected() {
        let edges = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [2.0, 3.0, 0.0]];
        assert!(Parallelepiped::new([0.0; 3], edges).is_none());
    }

    #[test]
    fn sphere_binary_and_partial() {
        let grid = GridGeometry::new(1.0, [10.0, 10.0, 10.0]);
        let sphere = Sphere::new([5.0, 5.0, 5.0], 2.0);
        let binary = sphere.rasterize(&ctx(&grid, false)).unwrap();
        assert_eq!(binary[[4, 4, 4]], 1.0);
        assert_eq!(binary[[0, 0, 0]], 0.0);
        let partial = sphere.rasterize(&ctx(&grid, true)).unwrap();
        assert!(partial.iter().all(|v| (0.0..=1.0).contains(v)));
        let volume = 4.0 / 3.0 * std::f64::consts::PI * 8.0;
        assert!((partial.sum() - volume).abs() / volume < 0.1);
    }
}
