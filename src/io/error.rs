use crate::model::field::DataField;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize field store: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("field store has no '{field}' volume{}", wavelength_suffix(*.wavelength_nm))]
    MissingField {
        field: DataField,
        wavelength_nm: Option<u32>,
    },

    #[error("unsupported field store format '{format}' version {version}")]
    UnsupportedFormat { format: String, version: u32 },
}

fn wavelength_suffix(wavelength_nm: Option<u32>) -> String {
    match wavelength_nm {
        Some(nm) => format!(" at {nm} nm"),
        None => String::new(),
    }
}

impl Error {
    pub fn missing_field(field: &DataField, wavelength_nm: Option<u32>) -> Self {
        Self::MissingField {
            field: field.clone(),
            wavelength_nm,
        }
    }
}
