//! Error types for volume construction.
//!
//! Every failure aborts the run: settings are validated before any grid is
//! allocated, and structures are built before anything is blended.

use thiserror::Error;

/// Errors that can occur while building a tissue volume.
///
/// This enum covers all failure modes of [`compose`](super::compose) and
/// [`create_volume`](super::create_volume): settings validation, structure
/// construction, deformation evaluation and property derivation.
#[derive(Debug, Error)]
pub enum Error {
    /// A required setting is missing or malformed.
    #[error("invalid setting '{key}': {detail}")]
    Configuration {
        /// Dotted path of the offending key, e.g. `simulation.spacing_mm`.
        key: String,
        /// Description of the problem.
        detail: String,
    },

    /// The settings document is not valid TOML or does not match the schema.
    #[error("failed to parse settings: {0}")]
    SettingsParse(#[from] toml::de::Error),

    /// A field-valued composition does not fit its structure.
    #[error(
        "composition of structure '{structure}' has shape {composition_shape:?}, expected {structure_shape:?}"
    )]
    GeometryMismatch {
        structure: String,
        structure_shape: [usize; 3],
        composition_shape: [usize; 3],
    },

    /// Volume fractions of a mixture exceed 1.
    #[error("volume fractions of {context} sum to {total:.6} (must not exceed 1)")]
    VolumeFraction { context: String, total: f64 },

    /// A deformation control-point array is absent.
    #[error("deformation settings are missing '{0}'")]
    MissingField(&'static str),

    /// The deformation evaluator was queried outside its control points.
    #[error(
        "deformation queried at ({x_mm}, {y_mm}) mm outside x {x_range:?} mm and y {y_range:?} mm"
    )]
    OutOfBounds {
        x_mm: f64,
        y_mm: f64,
        x_range: (f64, f64),
        y_range: (f64, f64),
    },

    /// Molecule lookup or spectrum evaluation failed.
    #[error(transparent)]
    Library(#[from] crate::library::Error),
}

impl Error {
    /// Creates a [`Configuration`](Error::Configuration) error.
    ///
    /// # Arguments
    ///
    /// * `key` — Dotted path of the offending setting
    /// * `detail` — Description of the problem
    pub fn configuration(key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            detail: detail.into(),
        }
    }

    /// Creates a [`Configuration`](Error::Configuration) error for a missing key.
    pub fn missing_setting(key: impl Into<String>) -> Self {
        Self::configuration(key, "required setting is missing")
    }

    pub fn geometry_mismatch(
        structure: &str,
        structure_shape: [usize; 3],
        composition_shape: [usize; 3],
    ) -> Self {
        Self::GeometryMismatch {
            structure: structure.to_string(),
            structure_shape,
            composition_shape,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_names_the_key() {
        let err = Error::missing_setting("simulation.spacing_mm");
        let message = err.to_string();
        assert!(message.contains("simulation.spacing_mm"));
        assert!(message.contains("missing"));
    }

    #[test]
    fn geometry_mismatch_reports_both_shapes() {
        let err = Error::geometry_mismatch("skin", [10, 10, 2], [10, 10, 3]);
        let message = err.to_string();
        assert!(message.contains("[10, 10, 2]"));
        assert!(message.contains("[10, 10, 3]"));
        assert!(message.contains("skin"));
    }
}
