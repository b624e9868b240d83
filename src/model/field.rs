use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid or unsupported data field: '{0}'")]
pub struct ParseDataFieldError(String);

/// Name of a volume stored in the field store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataField {
    Absorption,
    Scattering,
    Anisotropy,
    Oxygenation,
    BloodVolumeFraction,
    Segmentation,
    SpeedOfSound,
    Density,
    AlphaCoefficient,
    Gruneisen,
    /// Optical fluence written back by an external photon-transport solver.
    Fluence,
    /// Initial pressure written back by an external photon-transport solver.
    InitialPressure,
    UnmixedConcentration(String),
    UnmixedSo2,
}

impl DataField {
    /// Whether the field carries one volume per simulated wavelength.
    pub fn is_wavelength_dependent(&self) -> bool {
        matches!(
            self,
            DataField::Absorption
                | DataField::Scattering
                | DataField::Anisotropy
                | DataField::Fluence
                | DataField::InitialPressure
        )
    }
}

impl fmt::Display for DataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataField::Absorption => f.write_str("absorption"),
            DataField::Scattering => f.write_str("scattering"),
            DataField::Anisotropy => f.write_str("anisotropy"),
            DataField::Oxygenation => f.write_str("oxygenation"),
            DataField::BloodVolumeFraction => f.write_str("blood_volume_fraction"),
            DataField::Segmentation => f.write_str("segmentation"),
            DataField::SpeedOfSound => f.write_str("speed_of_sound"),
            DataField::Density => f.write_str("density"),
            DataField::AlphaCoefficient => f.write_str("alpha_coefficient"),
            DataField::Gruneisen => f.write_str("gruneisen"),
            DataField::Fluence => f.write_str("fluence"),
            DataField::InitialPressure => f.write_str("initial_pressure"),
            DataField::UnmixedConcentration(name) => write!(f, "unmixed_concentration:{name}"),
            DataField::UnmixedSo2 => f.write_str("unmixed_so2"),
        }
    }
}

impl FromStr for DataField {
    type Err = ParseDataFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(name) = trimmed.strip_prefix("unmixed_concentration:") {
            if name.is_empty() {
                return Err(ParseDataFieldError(s.to_string()));
            }
            return Ok(DataField::UnmixedConcentration(name.to_string()));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "absorption" | "mua" => Ok(DataField::Absorption),
            "scattering" | "mus" => Ok(DataField::Scattering),
            "anisotropy" | "g" => Ok(DataField::Anisotropy),
            "oxygenation" => Ok(DataField::Oxygenation),
            "blood_volume_fraction" => Ok(DataField::BloodVolumeFraction),
            "segmentation" => Ok(DataField::Segmentation),
            "speed_of_sound" => Ok(DataField::SpeedOfSound),
            "density" => Ok(DataField::Density),
            "alpha_coefficient" => Ok(DataField::AlphaCoefficient),
            "gruneisen" => Ok(DataField::Gruneisen),
            "fluence" => Ok(DataField::Fluence),
            "initial_pressure" => Ok(DataField::InitialPressure),
            "unmixed_so2" => Ok(DataField::UnmixedSo2),
            _ => Err(ParseDataFieldError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() {
        for field in [
            DataField::Absorption,
            DataField::BloodVolumeFraction,
            DataField::InitialPressure,
            DataField::UnmixedConcentration("melanin".to_string()),
            DataField::UnmixedSo2,
        ] {
            assert_eq!(field.to_string().parse::<DataField>(), Ok(field));
        }
    }

    #[test]
    fn short_aliases_parse() {
        assert_eq!("mua".parse::<DataField>(), Ok(DataField::Absorption));
        assert_eq!(" G ".parse::<DataField>(), Ok(DataField::Anisotropy));
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!("temperature".parse::<DataField>().is_err());
        assert!("unmixed_concentration:".parse::<DataField>().is_err());
    }

    #[test]
    fn only_optical_fields_depend_on_wavelength() {
        assert!(DataField::Absorption.is_wavelength_dependent());
        assert!(DataField::InitialPressure.is_wavelength_dependent());
        assert!(!DataField::Oxygenation.is_wavelength_dependent());
        assert!(!DataField::Segmentation.is_wavelength_dependent());
        assert!(!DataField::UnmixedSo2.is_wavelength_dependent());
    }
}
