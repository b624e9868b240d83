use crate::model::field::DataField;
use thiserror::Error;

/// Errors raised by processing components.
#[derive(Debug, Error)]
pub enum Error {
    /// A field the component needs is not in the store.
    #[error(transparent)]
    Store(#[from] crate::io::Error),

    /// A component setting is missing or out of range.
    #[error("invalid setting '{key}' for {component}: {detail}")]
    Configuration {
        component: String,
        key: String,
        detail: String,
    },

    /// The processing settings document is not valid TOML.
    #[error("failed to parse processing settings: {0}")]
    SettingsParse(#[from] toml::de::Error),

    /// A noise distribution rejected its parameters.
    #[error("invalid {component} distribution: {detail}")]
    Distribution {
        component: &'static str,
        detail: String,
    },

    /// Molecule lookup or spectrum evaluation failed.
    #[error(transparent)]
    Library(#[from] crate::library::Error),

    /// The unmixing system has no unique least-squares solution.
    #[error("endmember matrix of {chromophores:?} is singular")]
    Singular { chromophores: Vec<String> },

    /// Volumes that must be combined voxel by voxel differ in shape.
    #[error("'{field}' at {wavelength_nm} nm has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        field: DataField,
        wavelength_nm: u32,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
}

impl Error {
    pub fn configuration(
        component: &str,
        key: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            component: component.to_string(),
            key: key.into(),
            detail: detail.into(),
        }
    }

    pub fn distribution(component: &'static str, source: impl std::fmt::Display) -> Self {
        Self::Distribution {
            component,
            detail: source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_helper_names_component_and_key() {
        let err = Error::configuration("gaussian_noise", "std", "must be non-negative");
        assert_eq!(
            err.to_string(),
            "invalid setting 'std' for gaussian_noise: must be non-negative"
        );
    }

    #[test]
    fn store_errors_pass_through() {
        let err: Error = crate::io::Error::missing_field(&DataField::Fluence, Some(700)).into();
        assert_eq!(err.to_string(), "field store has no 'fluence' volume at 700 nm");
    }
}
