use crate::volume::deformation::{
    DEFAULT_COSINE_SCALING_FACTOR, DEFAULT_FILTER_SIGMA, DEFAULT_MAX_ELEVATION_MM,
    DeformationSettings,
};
use crate::volume::error::Error;
use ndarray::Array2;
use serde::Deserialize;

/// How the surface deformation of a run is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum DeformationConfig {
    /// Random smooth map drawn from the run's RNG.
    Generated {
        max_elevation_mm: f64,
        filter_sigma: f64,
        cosine_scaling_factor: f64,
    },
    /// Fixed control points supplied by the user.
    Explicit(DeformationSettings),
}

impl Default for DeformationConfig {
    fn default() -> Self {
        DeformationConfig::Generated {
            max_elevation_mm: DEFAULT_MAX_ELEVATION_MM,
            filter_sigma: DEFAULT_FILTER_SIGMA,
            cosine_scaling_factor: DEFAULT_COSINE_SCALING_FACTOR,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDeformation {
    #[serde(default = "default_max_elevation_mm")]
    max_elevation_mm: f64,
    #[serde(default = "default_filter_sigma")]
    filter_sigma: f64,
    #[serde(default = "default_cosine_scaling_factor")]
    cosine_scaling_factor: f64,
    x_mm: Option<Vec<f64>>,
    y_mm: Option<Vec<f64>>,
    z_mm: Option<Vec<Vec<f64>>>,
}

fn default_max_elevation_mm() -> f64 {
    DEFAULT_MAX_ELEVATION_MM
}
fn default_filter_sigma() -> f64 {
    DEFAULT_FILTER_SIGMA
}
fn default_cosine_scaling_factor() -> f64 {
    DEFAULT_COSINE_SCALING_FACTOR
}

impl RawDeformation {
    pub(crate) fn into_config(self) -> Result<DeformationConfig, Error> {
        if self.x_mm.is_none() && self.y_mm.is_none() && self.z_mm.is_none() {
            return Ok(DeformationConfig::Generated {
                max_elevation_mm: self.max_elevation_mm,
                filter_sigma: self.filter_sigma,
                cosine_scaling_factor: self.cosine_scaling_factor,
            });
        }
        let z_mm = self.z_mm.map(rows_to_matrix).transpose()?;
        Ok(DeformationConfig::Explicit(DeformationSettings {
            x_mm: self.x_mm,
            y_mm: self.y_mm,
            z_mm,
            max_deformation_mm: None,
        }))
    }
}

fn rows_to_matrix(rows: Vec<Vec<f64>>) -> Result<Array2<f64>, Error> {
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != ncols) {
        return Err(Error::configuration(
            "deformation.z_mm",
            "all rows must have the same length",
        ));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((nrows, ncols), flat)
        .map_err(|e| Error::configuration("deformation.z_mm", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_generates_with_defaults() {
        let raw: RawDeformation = toml::from_str("").expect("empty table");
        assert_eq!(raw.into_config().unwrap(), DeformationConfig::default());
    }

    #[test]
    fn control_points_produce_explicit_settings() {
        let raw: RawDeformation = toml::from_str(
            "x_mm = [0.0, 1.0]\ny_mm = [0.0, 2.0, 4.0]\nz_mm = [[0.0, -0.1, 0.0], [-0.2, 0.0, -0.3]]\n",
        )
        .expect("valid table");
        match raw.into_config().unwrap() {
            DeformationConfig::Explicit(settings) => {
                assert_eq!(settings.z_mm.unwrap().dim(), (2, 3));
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn partial_control_points_stay_incomplete() {
        let raw: RawDeformation = toml::from_str("x_mm = [0.0, 1.0]\n").expect("valid table");
        match raw.into_config().unwrap() {
            DeformationConfig::Explicit(settings) => {
                assert!(settings.y_mm.is_none());
                assert!(settings.z_mm.is_none());
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let raw: RawDeformation =
            toml::from_str("z_mm = [[0.0, 1.0], [0.0]]\n").expect("valid table");
        assert!(matches!(
            raw.into_config(),
            Err(Error::Configuration { ref key, .. }) if key == "deformation.z_mm"
        ));
    }
}
