use super::{Footprint, RasterContext, radial_fraction};
use crate::model::vector::{Vec3, cross, dot, norm, normalize, perpendicular, scale, sub};
use crate::volume::error::Error;

/// Tube around the segment `start → end` with an elliptical cross-section.
///
/// The semi-major axis lies along the direction perpendicular to both the
/// tube axis and the depth axis (along x for a tube running along y), so
/// flattened tubes lie flat in the horizontal plane. Ends are rounded: the
/// distance beyond an end is measured to the nearest axis point.
#[derive(Debug, Clone)]
pub(crate) struct Tube {
    start: Vec3,
    axis: Vec3,
    length: f64,
    semi_major: f64,
    semi_minor: f64,
    major_dir: Vec3,
    minor_dir: Vec3,
}

impl Tube {
    pub fn circular(start: Vec3, end: Vec3, radius_mm: f64) -> Option<Self> {
        Self::elliptical(start, end, radius_mm, 0.0)
    }

    /// Returns `None` when `start` and `end` coincide.
    pub fn elliptical(start: Vec3, end: Vec3, radius_mm: f64, eccentricity: f64) -> Option<Self> {
        let delta = sub(end, start);
        let axis = normalize(delta)?;
        let major_dir = perpendicular(axis);
        let minor_dir = cross(axis, major_dir);
        Some(Self {
            start,
            axis,
            length: norm(delta),
            semi_major: radius_mm,
            semi_minor: radius_mm * (1.0 - eccentricity * eccentricity).sqrt(),
            major_dir,
            minor_dir,
        })
    }

    /// Signed distance from `point` to the tube surface along the direction
    /// from the nearest axis point; negative inside.
    fn signed_distance(&self, point: Vec3) -> f64 {
        let w = sub(point, self.start);
        let along = dot(w, self.axis);
        let clamped = along.clamp(0.0, self.length);
        let beyond = along - clamped;

        let radial = sub(w, scale(self.axis, along));
        let pu = dot(radial, self.major_dir);
        let pv = dot(radial, self.minor_dir);
        let rho = pu.hypot(pv);

        let (a, b) = (self.semi_major, self.semi_minor);
        let boundary = if rho <= f64::EPSILON {
            b
        } else {
            a * b * rho / ((b * pu).powi(2) + (a * pv).powi(2)).sqrt()
        };
        rho.hypot(beyond) - boundary
    }
}

impl Footprint for Tube {
    fn fraction_at(&self, index: [usize; 3], ctx: &RasterContext<'_>) -> Result<f64, Error> {
        let center = ctx.undeformed_center(index)?;
        Ok(radial_fraction(self.signed_distance(center), ctx))
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
    fn circular_distance_to_axis() {
        let tube = Tube::circular([0.0, 0.0, 5.0], [0.0, 10.0, 5.0], 2.0).unwrap();
        assert!(approx_eq(tube.signed_distance([0.0, 5.0, 5.0]), -2.0, 1e-12));
        assert!(approx_eq(tube.signed_distance([3.0, 5.0, 5.0]), 1.0, 1e-12));
        assert!(approx_eq(tube.signed_distance([0.0, 5.0, 8.0]), 1.0, 1e-12));
    }

    #[test]
    fn projection_is_clipped_to_the_segment() {
        let tube = Tube::circular([0.0, 0.0, 0.0], [0.0, 10.0, 0.0], 1.0).unwrap();
        assert!(approx_eq(tube.signed_distance([0.0, 12.0, 0.0]), 1.0, 1e-12));
        assert!(approx_eq(tube.signed_distance([0.0, -0.5, 0.0]), -0.5, 1e-12));
    }

    #[test]
    fn elliptical_cross_section_is_flattened_in_depth() {
        let e: f64 = 0.8;
        let tube = Tube::elliptical([0.0, 0.0, 5.0], [0.0, 10.0, 5.0], 2.0, e).unwrap();
        let semi_minor = 2.0 * (1.0 - e * e).sqrt();
        assert!(approx_eq(tube.signed_distance([2.0, 5.0, 5.0]), 0.0, 1e-12));
        assert!(approx_eq(tube.signed_distance([0.0, 5.0, 5.0 + semi_minor]), 0.0, 1e-12));
        assert!(tube.signed_distance([0.0, 5.0, 5.0 + 1.5]) > 0.0);
        assert!(tube.signed_distance([1.5, 5.0, 5.0]) < 0.0);
    }

    #[test]
    fn partial_volume_ramps_across_the_boundary() {
        let grid = GridGeometry::new(1.0, [10.0, 10.0, 10.0]);
        let tube = Tube::circular([0.5, 0.0, 0.5], [0.5, 10.0, 0.5], 2.0).unwrap();
        let c = ctx(&grid, true);
        assert!(approx_eq(tube.fraction_at([0, 3, 0], &c).unwrap(), 1.0, 1e-12));
        assert!(approx_eq(tube.fraction_at([2, 3, 0], &c).unwrap(), 0.5, 1e-12));
        assert!(approx_eq(tube.fraction_at([4, 3, 0], &c).unwrap(), 0.0, 1e-12));

        let binary = ctx(&grid, false);
        assert_eq!(tube.fraction_at([2, 3, 0], &binary).unwrap(), 1.0);
        assert_eq!(tube.fraction_at([3, 3, 0], &binary).unwrap(), 0.0);
    }

    #[test]
    fn coincident_endpoints_are_rejected() {
        assert!(Tube::circular([1.0; 3], [1.0; 3], 1.0).is_none());
    }
}
