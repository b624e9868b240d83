//! Settings for volume construction.
//!
//! Settings are validated once, at the TOML boundary or when assembled in
//! code, so that every component downstream can rely on complete records.
//!
//! # Overview
//!
//! - [`SimulationSettings`] — Grid, wavelengths, seed, deformation and structures
//! - [`StructureSettings`] — One named structure with its shape and composition
//! - [`ShapeSettings`] — Geometry parameters per structure kind
//! - [`VesselSettings`] — Random-walk parameters of a vessel tree
//! - [`DeformationConfig`] — Generated or explicit surface deformation

mod deformation;
mod structure;

pub use deformation::DeformationConfig;
pub use structure::{ShapeSettings, StructureSettings, VesselSettings};

use super::deformation::DeformationField;
use super::error::Error;
use super::structure::StructureKind;
use crate::library::{MoleculeLibrary, TissueLibrary};
use crate::model::grid::GridGeometry;
use deformation::RawDeformation;
use serde::Deserialize;
use std::collections::HashSet;
use structure::StructureTable;

/// Complete description of one simulation run.
///
/// # Examples
///
/// ```
/// use pa_forge::{ShapeSettings, SimulationSettings, StructureSettings, TissueLibrary};
///
/// let tissues = TissueLibrary::builtin();
/// let settings = SimulationSettings::new(0.5, [10.0, 10.0, 10.0], vec![800])?
///     .with_seed(42)
///     .with_structure(StructureSettings::new(
///         "background",
///         ShapeSettings::Background,
///         tissues.water()?,
///     ));
///
/// assert_eq!(settings.grid.dims, [20, 20, 20]);
/// settings.validate()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    /// Free-form run name, used in logs and output metadata.
    pub name: String,

    /// Seed of the run's random number generator.
    pub random_seed: u64,

    /// Voxel grid shared by all structures.
    pub grid: GridGeometry,

    /// Wavelengths in nm for which optical properties are derived.
    pub wavelengths: Vec<u32>,

    /// Surface deformation, if layers should follow one.
    pub deformation: Option<DeformationConfig>,

    /// Structures in insertion order.
    pub structures: Vec<StructureSettings>,
}

impl SimulationSettings {
    /// Creates settings for an empty volume.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for non-positive spacing or extents,
    /// an extent smaller than half a voxel, or an empty wavelength list.
    pub fn new(spacing_mm: f64, extent_mm: [f64; 3], wavelengths: Vec<u32>) -> Result<Self, Error> {
        let grid = build_grid(spacing_mm, extent_mm)?;
        validate_wavelengths(&wavelengths)?;
        Ok(Self {
            name: default_name(),
            random_seed: 0,
            grid,
            wavelengths,
            deformation: None,
            structures: Vec::new(),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_deformation(mut self, deformation: DeformationConfig) -> Self {
        self.deformation = Some(deformation);
        self
    }

    pub fn with_structure(mut self, structure: StructureSettings) -> Self {
        self.structures.push(structure);
        self
    }

    /// Parses settings from TOML, resolving tissues from the built-in library.
    pub fn from_toml_str(toml: &str) -> Result<Self, Error> {
        Self::from_toml_str_with_library(toml, MoleculeLibrary::builtin())
    }

    /// Parses settings from TOML, resolving tissues from `molecules`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SettingsParse`] for malformed TOML and
    /// [`Error::Configuration`] naming the first missing or invalid key.
    pub fn from_toml_str_with_library(
        toml: &str,
        molecules: &MoleculeLibrary,
    ) -> Result<Self, Error> {
        let raw: RawSettingsFile = toml::from_str(toml)?;
        let simulation = raw
            .simulation
            .ok_or_else(|| Error::missing_setting("simulation"))?;

        let spacing_mm = simulation
            .spacing_mm
            .ok_or_else(|| Error::missing_setting("simulation.spacing_mm"))?;
        let extent_mm = [
            simulation
                .volume_x_mm
                .ok_or_else(|| Error::missing_setting("simulation.volume_x_mm"))?,
            simulation
                .volume_y_mm
                .ok_or_else(|| Error::missing_setting("simulation.volume_y_mm"))?,
            simulation
                .volume_z_mm
                .ok_or_else(|| Error::missing_setting("simulation.volume_z_mm"))?,
        ];
        let wavelengths = simulation
            .wavelengths
            .ok_or_else(|| Error::missing_setting("simulation.wavelengths"))?;

        let mut settings = Self::new(spacing_mm, extent_mm, wavelengths)?
            .with_seed(simulation.random_seed.unwrap_or(0));
        if let Some(name) = simulation.name {
            settings.name = name;
        }
        settings.deformation = raw.deformation.map(RawDeformation::into_config).transpose()?;

        let tissues = TissueLibrary::new(molecules);
        for (name, entry) in raw.structures.0 {
            settings.structures.push(entry.into_settings(name, &tissues)?);
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Checks cross-entry invariants: a usable wavelength list, exactly one
    /// background, unique names, valid shape parameters and complete explicit
    /// deformations.
    pub fn validate(&self) -> Result<(), Error> {
        validate_wavelengths(&self.wavelengths)?;

        let mut seen = HashSet::new();
        for structure in &self.structures {
            if !seen.insert(structure.name.as_str()) {
                return Err(Error::configuration(
                    format!("structures.{}", structure.name),
                    "structure names must be unique",
                ));
            }
            structure.shape.validate(&structure.name)?;
        }

        let backgrounds = self
            .structures
            .iter()
            .filter(|s| s.kind() == StructureKind::Background)
            .count();
        if backgrounds != 1 {
            return Err(Error::configuration(
                "structures",
                format!("exactly one background structure is required, found {backgrounds}"),
            ));
        }

        if let Some(DeformationConfig::Explicit(points)) = &self.deformation {
            DeformationField::from_settings(points)?;
        }
        Ok(())
    }
}

fn default_name() -> String {
    "volume".to_string()
}

fn build_grid(spacing_mm: f64, extent_mm: [f64; 3]) -> Result<GridGeometry, Error> {
    if !(spacing_mm > 0.0 && spacing_mm.is_finite()) {
        return Err(Error::configuration(
            "simulation.spacing_mm",
            format!("must be positive, got {spacing_mm}"),
        ));
    }
    let keys = [
        "simulation.volume_x_mm",
        "simulation.volume_y_mm",
        "simulation.volume_z_mm",
    ];
    for (key, extent) in keys.iter().zip(extent_mm) {
        if !(extent > 0.0 && extent.is_finite()) {
            return Err(Error::configuration(
                *key,
                format!("must be positive, got {extent}"),
            ));
        }
    }

    let grid = GridGeometry::new(spacing_mm, extent_mm);
    if let Some(axis) = grid.dims.iter().position(|&n| n == 0) {
        return Err(Error::configuration(
            keys[axis],
            format!(
                "extent {} mm is smaller than half a voxel at spacing {spacing_mm} mm",
                extent_mm[axis]
            ),
        ));
    }
    Ok(grid)
}

fn validate_wavelengths(wavelengths: &[u32]) -> Result<(), Error> {
    if wavelengths.is_empty() {
        return Err(Error::configuration(
            "simulation.wavelengths",
            "at least one wavelength is required",
        ));
    }
    if wavelengths.contains(&0) {
        return Err(Error::configuration(
            "simulation.wavelengths",
            "wavelengths must be positive",
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RawSettingsFile {
    simulation: Option<RawSimulation>,
    deformation: Option<RawDeformation>,
    #[serde(default)]
    structures: StructureTable,
}

#[derive(Debug, Deserialize)]
struct RawSimulation {
    name: Option<String>,
    random_seed: Option<u64>,
    spacing_mm: Option<f64>,
    volume_x_mm: Option<f64>,
    volume_y_mm: Option<f64>,
    volume_z_mm: Option<f64>,
    wavelengths: Option<Vec<u32>>,
}
