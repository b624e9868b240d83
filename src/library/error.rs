//! Error types for the molecule and tissue library.

use crate::model::composition::CompositionError;
use crate::model::spectrum::SpectrumError;
use thiserror::Error;

/// Errors raised while loading molecules or assembling tissue presets.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to parse a molecule library TOML document.
    #[error("failed to parse molecule library: {0}")]
    ParameterParse(#[from] toml::de::Error),

    /// A molecule name was requested that the library does not define.
    #[error("unknown molecule '{0}'")]
    UnknownMolecule(String),

    /// A spectrum lookup fell outside the tabulated wavelength range.
    #[error("absorption spectrum of '{molecule}' cannot be evaluated: {source}")]
    WavelengthOutOfRange {
        molecule: String,
        #[source]
        source: SpectrumError,
    },

    /// A tissue preset produced an invalid mixture.
    #[error("tissue '{tissue}' has an invalid composition: {source}")]
    VolumeFraction {
        tissue: String,
        #[source]
        source: CompositionError,
    },

    /// A preset or molecule parameter lies outside its valid range.
    #[error("invalid {parameter} = {value} for '{owner}': {detail}")]
    InvalidParameter {
        owner: String,
        parameter: &'static str,
        value: f64,
        detail: String,
    },
}

impl Error {
    /// Creates an [`InvalidParameter`](Error::InvalidParameter) error.
    pub fn invalid_parameter(
        owner: &str,
        parameter: &'static str,
        value: f64,
        detail: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            owner: owner.to_string(),
            parameter,
            value,
            detail: detail.into(),
        }
    }

    pub fn wavelength_out_of_range(molecule: &str, source: SpectrumError) -> Self {
        Self::WavelengthOutOfRange {
            molecule: molecule.to_string(),
            source,
        }
    }
}
