//! Processing components that operate on a [`FieldStore`].
//!
//! Components run after the external solvers have added their fields
//! (fluence, initial pressure, ...) to the store. Each one reads the fields
//! it needs and writes its results back into the same store.
//!
//! # Overview
//!
//! - [`PoissonNoise`] and [`GaussianNoise`] — Additive or multiplicative noise
//! - [`FieldOfViewCropping`] — Restrict volumes to a field of view
//! - [`LinearUnmixing`] — Per-voxel least-squares chromophore concentrations
//!
//! Pipelines are described in TOML as an array of `[[processing]]` tables,
//! each naming its `component`:
//!
//! ```
//! use pa_forge::processing::ProcessingSettings;
//!
//! let settings = ProcessingSettings::from_toml_str(r#"
//!     [[processing]]
//!     component = "gaussian_noise"
//!     field = "initial_pressure"
//!     std = 0.1
//!
//!     [[processing]]
//!     component = "linear_unmixing"
//!     chromophores = ["oxyhemoglobin", "deoxyhemoglobin"]
//!     compute_so2 = true
//! "#)?;
//! assert_eq!(settings.steps.len(), 2);
//! # Ok::<(), pa_forge::processing::Error>(())
//! ```

mod crop;
mod error;
mod noise;
mod unmixing;

pub use crop::FieldOfViewCropping;
pub use error::Error;
pub use noise::{GaussianNoise, NoiseMode, PoissonNoise};
pub use unmixing::LinearUnmixing;

use crate::io::FieldStore;
use crate::library::MoleculeLibrary;
use crate::model::field::DataField;
use crate::volume::RunContext;
use log::info;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;

/// An operation on the fields of a store.
pub trait ProcessingComponent {
    /// Identifier used in settings and logs.
    fn name(&self) -> &'static str;

    /// Applies the component to `store`, drawing randomness from `rng`.
    fn run(&self, store: &mut FieldStore, rng: &mut ChaCha8Rng) -> Result<(), Error>;
}

/// One configured pipeline step.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingStep {
    PoissonNoise(PoissonNoise),
    GaussianNoise(GaussianNoise),
    FieldOfViewCropping(FieldOfViewCropping),
    LinearUnmixing(LinearUnmixing),
}

impl ProcessingStep {
    pub fn component(&self) -> &dyn ProcessingComponent {
        match self {
            ProcessingStep::PoissonNoise(c) => c,
            ProcessingStep::GaussianNoise(c) => c,
            ProcessingStep::FieldOfViewCropping(c) => c,
            ProcessingStep::LinearUnmixing(c) => c,
        }
    }

    fn from_table(
        index: usize,
        mut table: toml::Table,
        molecules: &MoleculeLibrary,
    ) -> Result<Self, Error> {
        let key = format!("processing.{index}.component");
        let component = match table.remove("component") {
            Some(toml::Value::String(name)) => name,
            Some(_) => {
                return Err(Error::configuration("processing", key, "must be a string"));
            }
            None => {
                return Err(Error::configuration(
                    "processing",
                    key,
                    "required setting is missing",
                ));
            }
        };

        match component.as_str() {
            PoissonNoise::NAME => PoissonNoise::from_table(table).map(Self::PoissonNoise),
            GaussianNoise::NAME => GaussianNoise::from_table(table).map(Self::GaussianNoise),
            FieldOfViewCropping::NAME => {
                FieldOfViewCropping::from_table(table).map(Self::FieldOfViewCropping)
            }
            LinearUnmixing::NAME => {
                LinearUnmixing::from_table(table, molecules).map(Self::LinearUnmixing)
            }
            other => Err(Error::configuration(
                "processing",
                key,
                format!("unknown component '{other}'"),
            )),
        }
    }
}

/// An ordered list of processing steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessingSettings {
    pub steps: Vec<ProcessingStep>,
}

#[derive(Deserialize)]
struct RawProcessingFile {
    #[serde(default)]
    processing: Vec<toml::Table>,
}

impl ProcessingSettings {
    /// Parses `[[processing]]` tables, resolving molecules against the
    /// built-in library.
    pub fn from_toml_str(toml: &str) -> Result<Self, Error> {
        Self::from_toml_str_with_library(toml, MoleculeLibrary::builtin())
    }

    pub fn from_toml_str_with_library(
        toml: &str,
        molecules: &MoleculeLibrary,
    ) -> Result<Self, Error> {
        let raw: RawProcessingFile = toml::from_str(toml)?;
        let steps = raw
            .processing
            .into_iter()
            .enumerate()
            .map(|(index, table)| ProcessingStep::from_table(index, table, molecules))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }
}

/// Runs `steps` in order on `store`.
///
/// Every step draws from its own random stream, derived from the run seed,
/// the step's position and its name.
pub fn run_pipeline(
    store: &mut FieldStore,
    steps: &[ProcessingStep],
    context: &RunContext,
) -> Result<(), Error> {
    for (index, step) in steps.iter().enumerate() {
        let component = step.component();
        info!("Running processing step {index}: {}", component.name());
        let mut rng = context.rng_for(&format!("processing.{index}.{}", component.name()));
        component.run(store, &mut rng)?;
    }
    Ok(())
}

fn parse_field(component: &str, key: &str, value: &str) -> Result<DataField, Error> {
    value
        .parse::<DataField>()
        .map_err(|e| Error::configuration(component, key, e.to_string()))
}
