//! Surface deformation fields.
//!
//! A deformation is a smooth elevation map over the horizontal plane, given by
//! a small grid of control points and interpolated with tensor-product natural
//! cubic splines. Layers that adhere to the deformation shift their depth
//! interval by the elevation of each column.
//!
//! Generated maps are non-positive: the highest control point sits exactly at
//! zero and every elevation lies in `[−max_elevation_mm, 0]`, so a deformed
//! layer only ever moves towards the surface.

use super::error::Error;
use super::spline::NaturalCubicSpline;
use log::debug;
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use std::f64::consts::PI;

pub const DEFAULT_MAX_ELEVATION_MM: f64 = 1.0;
pub const DEFAULT_FILTER_SIGMA: f64 = 1.0;
pub const DEFAULT_COSINE_SCALING_FACTOR: f64 = 4.0;

const BOUNDS_TOLERANCE_MM: f64 = 1e-9;
const GAUSSIAN_TRUNCATE: f64 = 4.0;

/// Control points of a deformation.
///
/// All three arrays are required to build a [`DeformationField`]; the
/// fields are optional so that incomplete user input can be reported
/// precisely.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeformationSettings {
    /// Control-point positions along x in millimetres.
    pub x_mm: Option<Vec<f64>>,
    /// Control-point positions along y in millimetres.
    pub y_mm: Option<Vec<f64>>,
    /// Elevations in millimetres, shaped `len(x_mm) × len(y_mm)`.
    pub z_mm: Option<Array2<f64>>,
    /// Largest elevation before the map was shifted to a zero maximum.
    pub max_deformation_mm: Option<f64>,
}

/// Generates a random smooth deformation over `bounds_mm`.
///
/// # Arguments
///
/// * `bounds_mm` — Horizontal extent `[[x0, x1], [y0, y1]]` in millimetres
/// * `max_elevation_mm` — Scale of the elevation map
/// * `filter_sigma` — Gaussian blur sigma in control-point units
/// * `cosine_scaling_factor` — Strength of the squared-cosine edge taper
/// * `rng` — Source of randomness; equal seeds give equal maps
///
/// # Errors
///
/// Returns [`Error::Configuration`] for negative scales, a non-positive
/// scaling factor or empty bounds.
pub fn generate(
    bounds_mm: [[f64; 2]; 2],
    max_elevation_mm: f64,
    filter_sigma: f64,
    cosine_scaling_factor: f64,
    rng: &mut impl Rng,
) -> Result<DeformationSettings, Error> {
    if !(max_elevation_mm >= 0.0) {
        return Err(Error::configuration(
            "deformation.max_elevation_mm",
            format!("must be non-negative, got {max_elevation_mm}"),
        ));
    }
    if !(filter_sigma >= 0.0) {
        return Err(Error::configuration(
            "deformation.filter_sigma",
            format!("must be non-negative, got {filter_sigma}"),
        ));
    }
    if !(cosine_scaling_factor > 0.0) {
        return Err(Error::configuration(
            "deformation.cosine_scaling_factor",
            format!("must be positive, got {cosine_scaling_factor}"),
        ));
    }
    for (axis, [lo, hi]) in ["x", "y"].iter().zip(bounds_mm) {
        if !(hi > lo) {
            return Err(Error::configuration(
                "deformation",
                format!("{axis} bounds [{lo}, {hi}] are empty"),
            ));
        }
    }

    let nx = rng.random_range(4..=5usize);
    let ny = rng.random_range(4..=5usize);
    let noise = Array2::from_shape_fn((nx, ny), |_| rng.random::<f64>());

    let mut z = gaussian_filter(&noise, filter_sigma);
    let peak = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if peak > 0.0 {
        z.mapv_inplace(|v| v / peak);
    }

    let x = linspace(bounds_mm[0], nx);
    let y = linspace(bounds_mm[1], ny);
    apply_cosine_taper(&mut z, &x, &y, bounds_mm, cosine_scaling_factor);

    z.mapv_inplace(|v| v * max_elevation_mm);
    let de_facto_max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    z.mapv_inplace(|v| v - de_facto_max);

    debug!(
        "Generated {nx}x{ny} deformation control grid, de-facto maximum {de_facto_max:.4} mm"
    );

    Ok(DeformationSettings {
        x_mm: Some(x),
        y_mm: Some(y),
        z_mm: Some(z),
        max_deformation_mm: Some(de_facto_max),
    })
}

fn linspace([lo, hi]: [f64; 2], n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64)
        .collect()
}

/// Squared-cosine taper weights for positions inside `[lo, hi]`.
fn taper_weights(positions: &[f64], [lo, hi]: [f64; 2], c: f64) -> Array1<f64> {
    positions
        .iter()
        .map(|&p| {
            let t = (p - lo) / (hi - lo);
            (t * PI / c - PI / (2.0 * c)).cos().powi(2)
        })
        .collect()
}

/// Multiplies `z` by the outer product of the per-axis taper weights.
fn apply_cosine_taper(z: &mut Array2<f64>, x: &[f64], y: &[f64], bounds: [[f64; 2]; 2], c: f64) {
    let wx = taper_weights(x, bounds[0], c).insert_axis(Axis(1));
    let wy = taper_weights(y, bounds[1], c).insert_axis(Axis(0));
    *z *= &(&wx * &wy);
}

/// Separable Gaussian blur with reflecting boundaries, truncated at 4 sigma.
pub(crate) fn gaussian_filter(input: &Array2<f64>, sigma: f64) -> Array2<f64> {
    if sigma <= 0.0 {
        return input.clone();
    }
    let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5) as isize;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|d| (-0.5 * (d as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= total);

    let mut out = input.clone();
    for axis in [Axis(0), Axis(1)] {
        let source = out.clone();
        for (mut dst, src) in out.lanes_mut(axis).into_iter().zip(source.lanes(axis)) {
            let n = src.len() as isize;
            for i in 0..n {
                dst[i as usize] = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| w * src[reflect(i + k as isize - radius, n)])
                    .sum();
            }
        }
    }
    out
}

/// Index into `[0, n)` mirrored about the edges, repeating the edge sample.
fn reflect(index: isize, n: isize) -> usize {
    let period = 2 * n;
    let m = index.rem_euclid(period);
    (if m < n { m } else { period - 1 - m }) as usize
}

/// Interpolating evaluator over a deformation's control points.
///
/// Immutable after construction and cheap to share between structures.
#[derive(Debug, Clone)]
pub struct DeformationField {
    x_mm: Vec<f64>,
    y_mm: Vec<f64>,
    z_mm: Array2<f64>,
    rows: Vec<NaturalCubicSpline>,
    max_deformation_mm: f64,
}

impl DeformationField {
    /// Builds the evaluator from a complete set of control points.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingField`] naming the first absent array, and
    /// [`Error::Configuration`] for unsorted knots, fewer than two knots per
    /// axis or an elevation matrix of the wrong shape.
    pub fn from_settings(settings: &DeformationSettings) -> Result<Self, Error> {
        let x_mm = settings.x_mm.as_ref().ok_or(Error::MissingField("x_mm"))?;
        let y_mm = settings.y_mm.as_ref().ok_or(Error::MissingField("y_mm"))?;
        let z_mm = settings.z_mm.as_ref().ok_or(Error::MissingField("z_mm"))?;

        validate_knots("deformation.x_mm", x_mm)?;
        validate_knots("deformation.y_mm", y_mm)?;
        if z_mm.dim() != (x_mm.len(), y_mm.len()) {
            return Err(Error::configuration(
                "deformation.z_mm",
                format!(
                    "expected {}x{} elevations, got {}x{}",
                    x_mm.len(),
                    y_mm.len(),
                    z_mm.nrows(),
                    z_mm.ncols()
                ),
            ));
        }
        if z_mm.iter().any(|v| !v.is_finite()) {
            return Err(Error::configuration(
                "deformation.z_mm",
                "elevations must be finite",
            ));
        }

        let rows = z_mm
            .rows()
            .into_iter()
            .map(|row| NaturalCubicSpline::new(y_mm, &row.to_vec()))
            .collect();
        let max_deformation_mm = settings
            .max_deformation_mm
            .unwrap_or_else(|| z_mm.iter().copied().fold(0.0, |acc, v| acc.max(-v)));

        Ok(Self {
            x_mm: x_mm.clone(),
            y_mm: y_mm.clone(),
            z_mm: z_mm.clone(),
            rows,
            max_deformation_mm,
        })
    }

    /// Elevation offset in millimetres at `(x_mm, y_mm)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] outside the control-point rectangle.
    pub fn evaluate(&self, x_mm: f64, y_mm: f64) -> Result<f64, Error> {
        let x_range = self.x_range();
        let y_range = self.y_range();
        let inside = |v: f64, (lo, hi): (f64, f64)| {
            v >= lo - BOUNDS_TOLERANCE_MM && v <= hi + BOUNDS_TOLERANCE_MM
        };
        if !inside(x_mm, x_range) || !inside(y_mm, y_range) {
            return Err(Error::OutOfBounds {
                x_mm,
                y_mm,
                x_range,
                y_range,
            });
        }
        let x = x_mm.clamp(x_range.0, x_range.1);
        let y = y_mm.clamp(y_range.0, y_range.1);

        let column: Vec<f64> = self.rows.iter().map(|row| row.evaluate(y)).collect();
        Ok(NaturalCubicSpline::new(&self.x_mm, &column).evaluate(x))
    }

    pub fn x_range(&self) -> (f64, f64) {
        (self.x_mm[0], self.x_mm[self.x_mm.len() - 1])
    }

    pub fn y_range(&self) -> (f64, f64) {
        (self.y_mm[0], self.y_mm[self.y_mm.len() - 1])
    }

    pub fn control_points(&self) -> (&[f64], &[f64], &Array2<f64>) {
        (&self.x_mm, &self.y_mm, &self.z_mm)
    }

    pub fn max_deformation_mm(&self) -> f64 {
        self.max_deformation_mm
    }
}

fn validate_knots(key: &str, knots: &[f64]) -> Result<(), Error> {
    if knots.len() < 2 {
        return Err(Error::configuration(
            key,
            format!("needs at least 2 control points, got {}", knots.len()),
        ));
    }
    if knots.iter().any(|k| !k.is_finite()) || knots.windows(2).any(|w| w[1] <= w[0]) {
        return Err(Error::configuration(
            key,
            "control points must be finite and strictly increasing",
        ));
    }
    Ok(())
}
