use super::{Footprint, RasterContext};
use crate::model::grid::GridGeometry;
use crate::volume::error::Error;
use ndarray::Array3;

/// Depth interval `[start_z_mm, end_z_mm)` spanning the whole x/y plane.
#[derive(Debug, Clone)]
pub(crate) struct HorizontalLayer {
    start_z_mm: f64,
    end_z_mm: f64,
}

impl HorizontalLayer {
    pub fn new(start_z_mm: f64, end_z_mm: f64) -> Self {
        Self {
            start_z_mm,
            end_z_mm,
        }
    }

    /// Voxel indices `[z0, z1)` of the undeformed layer, clipped to the grid.
    pub fn clipped_voxel_span(&self, grid: &GridGeometry) -> (usize, usize) {
        let nz = grid.dims[2] as f64;
        let to_index = |mm: f64| grid.mm_to_voxels(mm).round().clamp(0.0, nz) as usize;
        (to_index(self.start_z_mm), to_index(self.end_z_mm))
    }

    fn coverage(&self, k: usize, offset_mm: f64, ctx: &RasterContext<'_>) -> f64 {
        let s = ctx.grid.spacing_mm;
        let lo = self.start_z_mm + offset_mm;
        let hi = self.end_z_mm + offset_mm;
        if ctx.partial_volume {
            let top = k as f64 * s;
            let bottom = top + s;
            ((hi.min(bottom) - lo.max(top)) / s).clamp(0.0, 1.0)
        } else {
            let center = (k as f64 + 0.5) * s;
            if center >= lo && center < hi { 1.0 } else { 0.0 }
        }
    }
}

impl Footprint for HorizontalLayer {
    fn fraction_at(&self, index: [usize; 3], ctx: &RasterContext<'_>) -> Result<f64, Error> {
        let offset = ctx.elevation_at(index[0], index[1])?;
        Ok(self.coverage(index[2], offset, ctx))
    }

    fn rasterize(&self, ctx: &RasterContext<'_>) -> Result<Array3<f64>, Error> {
        let [nx, ny, nz] = ctx.grid.dims;
        let mut out = ctx.grid.zeros();
        for i in 0..nx {
            for j in 0..ny {
                let offset = ctx.elevation_at(i, j)?;
                for k in 0..nz {
                    out[[i, j, k]] = self.coverage(k, offset, ctx);
                }
            }
        }
        Ok(out)
    }
}
