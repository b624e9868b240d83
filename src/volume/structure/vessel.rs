use super::{Footprint, RasterContext, radial_fraction};
use crate::model::grid::GridGeometry;
use crate::model::vector::{Vec3, add, cross, norm, normalize, perpendicular, scale, sub};
use crate::volume::config::VesselSettings;
use crate::volume::error::Error;
use log::debug;
use ndarray::{Array2, Array3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use std::f64::consts::{FRAC_PI_6, SQRT_2};

const MAX_BIFURCATION_DEPTH: usize = 3;
const MAX_SAMPLES: usize = 50_000;
/// Branches thinner than this fraction of a voxel stop growing.
const MIN_RADIUS_VOXELS: f64 = 0.1;

struct Branch {
    position: Vec3,
    direction: Vec3,
    radius: f64,
    depth: usize,
    travelled: f64,
}

/// Vessel tree grown by a seeded random walk, stored as sphere samples
/// one voxel apart along each branch.
#[derive(Debug, Clone)]
pub(crate) struct Vessel {
    samples: Vec<(Vec3, f64)>,
}

impl Vessel {
    /// Grows the tree. Returns `None` for a zero direction vector.
    pub fn grow(settings: &VesselSettings, grid: &GridGeometry, seed: u64) -> Option<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let step = grid.spacing_mm;
        let min_radius = MIN_RADIUS_VOXELS * step;

        let mut stack = vec![Branch {
            position: settings.start_mm,
            direction: normalize(settings.direction_mm)?,
            radius: settings.radius_mm,
            depth: 0,
            travelled: 0.0,
        }];
        let mut samples = Vec::new();

        while let Some(mut branch) = stack.pop() {
            while samples.len() < MAX_SAMPLES
                && branch.radius >= min_radius
                && within_reach(branch.position, branch.radius, grid)
            {
                samples.push((branch.position, branch.radius));
                branch.position = add(branch.position, scale(branch.direction, step));
                branch.travelled += step;

                let jitter = random_unit_normal(&mut rng);
                branch.direction = normalize(add(
                    branch.direction,
                    scale(jitter, settings.curvature_factor),
                ))
                .unwrap_or(branch.direction);
                if settings.radius_variation_factor > 0.0 {
                    branch.radius *=
                        1.0 + settings.radius_variation_factor * (rng.random::<f64>() - 0.5);
                }

                let splits = settings
                    .bifurcation_length_mm
                    .is_some_and(|length| branch.travelled >= length)
                    && branch.depth < MAX_BIFURCATION_DEPTH;
                if splits {
                    let side = normalize(cross(branch.direction, random_unit_normal(&mut rng)))
                        .unwrap_or_else(|| perpendicular(branch.direction));
                    let tilt = FRAC_PI_6.tan();
                    for sign in [1.0, -1.0] {
                        let direction = normalize(add(branch.direction, scale(side, sign * tilt)))
                            .unwrap_or(branch.direction);
                        stack.push(Branch {
                            position: branch.position,
                            direction,
                            radius: branch.radius / SQRT_2,
                            depth: branch.depth + 1,
                            travelled: 0.0,
                        });
                    }
                    break;
                }
            }
        }

        debug!("Grew vessel tree with {} samples (seed {seed})", samples.len());
        Some(Self { samples })
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

fn random_unit_normal(rng: &mut ChaCha8Rng) -> Vec3 {
    [
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
    ]
}

/// Whether a sphere at `position` can still touch the volume.
fn within_reach(position: Vec3, radius: f64, grid: &GridGeometry) -> bool {
    position
        .iter()
        .zip(grid.extent_mm)
        .all(|(&p, extent)| p >= -radius && p <= extent + radius)
}

impl Footprint for Vessel {
    fn fraction_at(&self, index: [usize; 3], ctx: &RasterContext<'_>) -> Result<f64, Error> {
        let voxel = ctx.undeformed_center(index)?;
        Ok(self
            .samples
            .iter()
            .map(|&(center, radius)| radial_fraction(norm(sub(voxel, center)) - radius, ctx))
            .fold(0.0, f64::max))
    }

    fn rasterize(&self, ctx: &RasterContext<'_>) -> Result<Array3<f64>, Error> {
        let s = ctx.grid.spacing_mm;
        let [nx, ny, _] = ctx.grid.dims;
        let mut elevation = Array2::<f64>::zeros((nx, ny));
        if ctx.deformation.is_some() {
            for ((i, j), e) in elevation.indexed_iter_mut() {
                *e = ctx.elevation_at(i, j)?;
            }
        }

        let mut out = ctx.grid.zeros();
        for &(center, radius) in &self.samples {
            let reach = radius + s;
            let range = |axis: usize, at: f64| {
                let n = ctx.grid.dims[axis] as f64;
                let lo = ((at - reach) / s).floor().clamp(0.0, n) as usize;
                let hi = ((at + reach) / s).ceil().clamp(0.0, n) as usize;
                lo..hi
            };
            for i in range(0, center[0]) {
                for j in range(1, center[1]) {
                    let e = elevation[[i, j]];
                    for k in range(2, center[2] + e) {
                        let mut voxel = ctx.grid.voxel_center_mm([i, j, k]);
                        voxel[2] -= e;
                        let f = radial_fraction(norm(sub(voxel, center)) - radius, ctx);
                        let cell = &mut out[[i, j, k]];
                        if f > *cell {
                            *cell = f;
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> GridGeometry {
        GridGeometry::new(0.5, [10.0, 20.0, 10.0])
    }

    fn straight() -> VesselSettings {
        let mut settings = VesselSettings::new([5.0, 0.0, 5.0], [0.0, 1.0, 0.0], 1.0);
        settings.curvature_factor = 0.0;
        settings
    }

    #[test]
    fn straight_vessel_without_curvature_is_a_tube() {
        let vessel = Vessel::grow(&straight(), &grid(), 1).unwrap();
        for &(center, radius) in &vessel.samples {
            assert!((center[0] - 5.0).abs() < 1e-12);
            assert!((center[2] - 5.0).abs() < 1e-12);
            assert_eq!(radius, 1.0);
        }
        assert_eq!(vessel.sample_count(), 43);
    }

    #[test]
    fn equal_seeds_grow_equal_trees() {
        let mut settings = straight();
        settings.curvature_factor = 0.2;
        settings.radius_variation_factor = 0.1;
        let a = Vessel::grow(&settings, &grid(), 17).unwrap();
        let b = Vessel::grow(&settings, &grid(), 17).unwrap();
        let c = Vessel::grow(&settings, &grid(), 18).unwrap();
        assert_eq!(a.samples, b.samples);
        assert_ne!(a.samples, c.samples);
    }

    #[test]
    fn bifurcation_halves_the_cross_section() {
        let mut settings = straight();
        settings.bifurcation_length_mm = Some(4.0);
        let vessel = Vessel::grow(&settings, &grid(), 3).unwrap();
        let child = 1.0 / SQRT_2;
        assert!(vessel.samples.iter().any(|&(_, r)| (r - child).abs() < 1e-12));
        assert!(vessel.samples.iter().all(|&(_, r)| r <= 1.0));
    }

    #[test]
    fn zero_direction_is_rejected() {
        let settings = VesselSettings::new([0.0; 3], [0.0; 3], 1.0);
        assert!(Vessel::grow(&settings, &grid(), 0).is_none());
    }

    #[test]
    fn fast_rasterization_matches_per_voxel_evaluation() {
        let mut settings = straight();
        settings.curvature_factor = 0.3;
        settings.bifurcation_length_mm = Some(3.0);
        let grid = GridGeometry::new(1.0, [10.0, 20.0, 10.0]);
        let vessel = Vessel::grow(&settings, &grid, 5).unwrap();
        for partial_volume in [false, true] {
            let ctx = RasterContext {
                grid: &grid,
                partial_volume,
                deformation: None,
            };
            let fast = vessel.rasterize(&ctx).unwrap();
            for ((i, j, k), value) in fast.indexed_iter() {
                let slow = vessel.fraction_at([i, j, k], &ctx).unwrap();
                assert!((value - slow).abs() < 1e-12, "voxel ({i}, {j}, {k})");
            }
        }
    }
}
