use super::error::Error;
use super::params::{self, MoleculeParamsFile};
use crate::model::molecule::Molecule;
use std::sync::OnceLock;

pub const WATER: &str = "water";
pub const OXYHEMOGLOBIN: &str = "oxyhemoglobin";
pub const DEOXYHEMOGLOBIN: &str = "deoxyhemoglobin";
pub const MELANIN: &str = "melanin";
pub const FAT: &str = "fat";
pub const BONE: &str = "bone";
pub const HEAVY_WATER: &str = "heavy_water";
pub const MEDIPRENE: &str = "mediprene";
pub const ULTRASOUND_GEL: &str = "ultrasound_gel";
pub const AIR: &str = "air";
pub const SOFT_TISSUE_SCATTERER: &str = "soft_tissue_scatterer";
pub const MUSCLE_SCATTERER: &str = "muscle_scatterer";
pub const EPIDERMAL_SCATTERER: &str = "epidermal_scatterer";
pub const DERMAL_SCATTERER: &str = "dermal_scatterer";

static BUILTIN: OnceLock<MoleculeLibrary> = OnceLock::new();

/// Named molecules with their optical and acoustic descriptors.
///
/// The built-in library is parsed once from the embedded resource; a custom
/// TOML document with the same layout replaces it entirely.
#[derive(Debug, Clone)]
pub struct MoleculeLibrary {
    params: MoleculeParamsFile,
}

impl MoleculeLibrary {
    /// The embedded library, parsed on first use.
    pub fn builtin() -> &'static MoleculeLibrary {
        BUILTIN.get_or_init(|| MoleculeLibrary {
            params: params::get_default_parameters().clone(),
        })
    }

    /// Loads a library from `custom_toml`, or clones the built-in one.
    pub fn load(custom_toml: Option<&str>) -> Result<Self, Error> {
        Ok(Self {
            params: params::load_parameters(custom_toml)?,
        })
    }

    pub fn from_toml(toml: &str) -> Result<Self, Error> {
        Self::load(Some(toml))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.molecules.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.molecules.contains_key(name)
    }

    pub fn molecule(&self, name: &str) -> Result<Molecule, Error> {
        let params = self
            .params
            .molecules
            .get(name)
            .ok_or_else(|| Error::UnknownMolecule(name.to_string()))?;
        Ok(Molecule {
            name: name.to_string(),
            absorption: params.absorption.clone(),
            scattering: params.scattering.clone(),
            anisotropy: params.anisotropy,
            acoustic: params.acoustic,
        })
    }

    pub fn water(&self) -> Result<Molecule, Error> {
        self.molecule(WATER)
    }

    pub fn oxyhemoglobin(&self) -> Result<Molecule, Error> {
        self.molecule(OXYHEMOGLOBIN)
    }

    pub fn deoxyhemoglobin(&self) -> Result<Molecule, Error> {
        self.molecule(DEOXYHEMOGLOBIN)
    }

    pub fn melanin(&self) -> Result<Molecule, Error> {
        self.molecule(MELANIN)
    }

    pub fn fat(&self) -> Result<Molecule, Error> {
        self.molecule(FAT)
    }

    pub fn bone(&self) -> Result<Molecule, Error> {
        self.molecule(BONE)
    }

    pub fn heavy_water(&self) -> Result<Molecule, Error> {
        self.molecule(HEAVY_WATER)
    }

    pub fn mediprene(&self) -> Result<Molecule, Error> {
        self.molecule(MEDIPRENE)
    }

    pub fn ultrasound_gel(&self) -> Result<Molecule, Error> {
        self.molecule(ULTRASOUND_GEL)
    }

    pub fn air(&self) -> Result<Molecule, Error> {
        self.molecule(AIR)
    }

    pub fn soft_tissue_scatterer(&self) -> Result<Molecule, Error> {
        self.molecule(SOFT_TISSUE_SCATTERER)
    }

    pub fn muscle_scatterer(&self) -> Result<Molecule, Error> {
        self.molecule(MUSCLE_SCATTERER)
    }

    pub fn epidermal_scatterer(&self) -> Result<Molecule, Error> {
        self.molecule(EPIDERMAL_SCATTERER)
    }

    pub fn dermal_scatterer(&self) -> Result<Molecule, Error> {
        self.molecule(DERMAL_SCATTERER)
    }

    /// Absorption of `name` at `wavelength_nm` in 1/cm.
    pub fn absorption_per_cm(&self, name: &str, wavelength_nm: f64) -> Result<f64, Error> {
        self.molecule(name)?
            .absorption_per_cm(wavelength_nm)
            .map_err(|e| Error::wavelength_out_of_range(name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_library_provides_every_named_constructor() {
        let lib = MoleculeLibrary::builtin();
        for name in [
            WATER,
            OXYHEMOGLOBIN,
            DEOXYHEMOGLOBIN,
            MELANIN,
            FAT,
            BONE,
            HEAVY_WATER,
            MEDIPRENE,
            ULTRASOUND_GEL,
            AIR,
            SOFT_TISSUE_SCATTERER,
            MUSCLE_SCATTERER,
            EPIDERMAL_SCATTERER,
            DERMAL_SCATTERER,
        ] {
            let molecule = lib.molecule(name).expect("built-in molecule");
            assert_eq!(molecule.name, name);
        }
    }

    #[test]
    fn hemoglobin_spectra_cross_near_800nm() {
        let lib = MoleculeLibrary::builtin();
        let oxy_700 = lib.absorption_per_cm(OXYHEMOGLOBIN, 700.0).unwrap();
        let deoxy_700 = lib.absorption_per_cm(DEOXYHEMOGLOBIN, 700.0).unwrap();
        let oxy_900 = lib.absorption_per_cm(OXYHEMOGLOBIN, 900.0).unwrap();
        let deoxy_900 = lib.absorption_per_cm(DEOXYHEMOGLOBIN, 900.0).unwrap();
        assert!(deoxy_700 > oxy_700);
        assert!(oxy_900 > deoxy_900);
    }

    #[test]
    fn unknown_molecule_is_reported_by_name() {
        let err = MoleculeLibrary::builtin().molecule("unobtainium").unwrap_err();
        assert!(matches!(err, Error::UnknownMolecule(ref name) if name == "unobtainium"));
    }

    #[test]
    fn out_of_range_wavelength_names_the_molecule() {
        let err = MoleculeLibrary::builtin()
            .absorption_per_cm(WATER, 1200.0)
            .unwrap_err();
        assert!(err.to_string().contains("water"));
    }

    #[test]
    fn custom_library_replaces_builtin() {
        let lib = MoleculeLibrary::from_toml(
            r#"
            [molecules.ink]
            absorption = 2.0
            scattering = { model = "constant", mus_per_cm = 5.0 }
            "#,
        )
        .expect("valid custom library");
        assert!(lib.contains("ink"));
        assert!(!lib.contains(WATER));
        assert_eq!(lib.names().collect::<Vec<_>>(), vec!["ink"]);
    }
}
