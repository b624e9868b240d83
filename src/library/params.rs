use super::error::Error;
use crate::model::molecule::{AcousticProperties, ScatteringModel};
use crate::model::spectrum::Spectrum;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

const DEFAULT_MOLECULES_TOML: &str = include_str!("../../resources/molecules.toml");

static DEFAULT_MOLECULES: OnceLock<MoleculeParamsFile> = OnceLock::new();

#[derive(Debug, Clone, Deserialize)]
pub struct MoleculeParamsFile {
    #[serde(default)]
    pub molecules: BTreeMap<String, MoleculeParams>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoleculeParams {
    pub absorption: Spectrum,
    pub scattering: ScatteringModel,
    #[serde(default = "default_anisotropy")]
    pub anisotropy: f64,
    #[serde(default)]
    pub acoustic: AcousticProperties,
}

fn default_anisotropy() -> f64 {
    0.9
}

pub fn load_parameters(custom_toml: Option<&str>) -> Result<MoleculeParamsFile, Error> {
    match custom_toml {
        Some(toml) => {
            let params: MoleculeParamsFile = toml::from_str(toml)?;
            validate(&params)?;
            Ok(params)
        }
        None => Ok(get_default_parameters().clone()),
    }
}

pub fn get_default_parameters() -> &'static MoleculeParamsFile {
    DEFAULT_MOLECULES.get_or_init(|| {
        toml::from_str(DEFAULT_MOLECULES_TOML)
            .expect("Failed to parse embedded molecule library. This is a library bug.")
    })
}

fn validate(params: &MoleculeParamsFile) -> Result<(), Error> {
    for (name, molecule) in &params.molecules {
        if !(0.0..=1.0).contains(&molecule.anisotropy) {
            return Err(Error::invalid_parameter(
                name,
                "anisotropy",
                molecule.anisotropy,
                "must lie in [0, 1]",
            ));
        }
        if molecule.acoustic.speed_of_sound <= 0.0 {
            return Err(Error::invalid_parameter(
                name,
                "speed_of_sound",
                molecule.acoustic.speed_of_sound,
                "must be positive",
            ));
        }
    }
    Ok(())
}
