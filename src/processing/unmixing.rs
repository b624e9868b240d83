use super::error::Error;
use super::{ProcessingComponent, parse_field};
use crate::io::FieldStore;
use crate::library::{self, DEOXYHEMOGLOBIN, MoleculeLibrary, OXYHEMOGLOBIN};
use crate::model::field::DataField;
use crate::model::molecule::Molecule;
use log::info;
use nalgebra::DMatrix;
use ndarray::{Array3, Zip};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;

/// Singular values below this fraction of the largest one count as zero.
const RANK_TOLERANCE: f64 = 1e-12;

/// Per-voxel linear spectral unmixing.
///
/// Solves `E · c = y` in the least-squares sense for every voxel, where `y`
/// holds the measured field at each wavelength and `E` the absorption of
/// each chromophore at those wavelengths.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearUnmixing {
    pub field: DataField,
    pub chromophores: Vec<Molecule>,
    /// Wavelengths to use; `None` takes every wavelength of the store.
    pub wavelengths: Option<Vec<u32>>,
    pub compute_so2: bool,
}

impl LinearUnmixing {
    pub const NAME: &'static str = "linear_unmixing";

    pub fn new(chromophores: Vec<Molecule>) -> Self {
        Self {
            field: DataField::Absorption,
            chromophores,
            wavelengths: None,
            compute_so2: false,
        }
    }

    pub(crate) fn from_table(table: toml::Table, molecules: &MoleculeLibrary) -> Result<Self, Error> {
        let raw: RawUnmixing = toml::Value::Table(table).try_into()?;
        let field = match raw.field {
            Some(name) => parse_field(Self::NAME, "field", &name)?,
            None => DataField::Absorption,
        };
        let chromophores = raw
            .chromophores
            .iter()
            .map(|name| molecules.molecule(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            field,
            chromophores,
            wavelengths: raw.wavelengths,
            compute_so2: raw.compute_so2,
        })
    }

    fn validate(&self, wavelengths: &[u32]) -> Result<(), Error> {
        if self.chromophores.is_empty() {
            return Err(Error::configuration(
                Self::NAME,
                "chromophores",
                "at least one chromophore is required",
            ));
        }
        if wavelengths.len() < self.chromophores.len() {
            return Err(Error::configuration(
                Self::NAME,
                "wavelengths",
                format!(
                    "{} wavelengths cannot resolve {} chromophores",
                    wavelengths.len(),
                    self.chromophores.len()
                ),
            ));
        }
        if self.compute_so2
            && (self.position(OXYHEMOGLOBIN).is_none() || self.position(DEOXYHEMOGLOBIN).is_none())
        {
            return Err(Error::configuration(
                Self::NAME,
                "compute_so2",
                "requires both oxyhemoglobin and deoxyhemoglobin as chromophores",
            ));
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.chromophores.iter().position(|m| m.name == name)
    }

    /// Endmember matrix, one row per wavelength and one column per chromophore.
    fn endmembers(&self, wavelengths: &[u32]) -> Result<DMatrix<f64>, Error> {
        let mut entries = Vec::with_capacity(wavelengths.len() * self.chromophores.len());
        for &nm in wavelengths {
            for molecule in &self.chromophores {
                entries.push(
                    molecule
                        .absorption_per_cm(f64::from(nm))
                        .map_err(|e| library::Error::wavelength_out_of_range(&molecule.name, e))?,
                );
            }
        }
        Ok(DMatrix::from_row_slice(
            wavelengths.len(),
            self.chromophores.len(),
            &entries,
        ))
    }

    fn names(&self) -> Vec<String> {
        self.chromophores.iter().map(|m| m.name.clone()).collect()
    }
}

impl ProcessingComponent for LinearUnmixing {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(&self, store: &mut FieldStore, _rng: &mut ChaCha8Rng) -> Result<(), Error> {
        let wavelengths = self
            .wavelengths
            .clone()
            .unwrap_or_else(|| store.wavelengths().to_vec());
        self.validate(&wavelengths)?;

        let endmembers = self.endmembers(&wavelengths)?;
        let pseudo_inverse = pseudo_inverse(&endmembers).ok_or_else(|| Error::Singular {
            chromophores: self.names(),
        })?;

        let mut measurements = Vec::with_capacity(wavelengths.len());
        for &nm in &wavelengths {
            measurements.push(store.get(&self.field, Some(nm))?);
        }
        let shape = measurements[0].raw_dim();
        for (&nm, data) in wavelengths.iter().zip(&measurements) {
            if data.raw_dim() != shape {
                return Err(Error::ShapeMismatch {
                    field: self.field.clone(),
                    wavelength_nm: nm,
                    expected: measurements[0].shape().to_vec(),
                    found: data.shape().to_vec(),
                });
            }
        }

        let concentrations: Vec<Array3<f64>> = pseudo_inverse
            .row_iter()
            .map(|weights| {
                Array3::from_shape_fn(shape, |(i, j, k)| {
                    weights
                        .iter()
                        .zip(&measurements)
                        .map(|(w, data)| w * data[[i, j, k]])
                        .sum::<f64>()
                })
            })
            .collect();

        info!(
            "Unmixed {} chromophores from {} wavelengths of '{}'",
            self.chromophores.len(),
            wavelengths.len(),
            self.field
        );

        if self.compute_so2 {
            if let (Some(oxy), Some(deoxy)) =
                (self.position(OXYHEMOGLOBIN), self.position(DEOXYHEMOGLOBIN))
            {
                let mut so2 = Array3::zeros(shape);
                Zip::from(&mut so2)
                    .and(&concentrations[oxy])
                    .and(&concentrations[deoxy])
                    .for_each(|s, &o, &d| {
                        let total = o + d;
                        *s = if total != 0.0 { o / total } else { 0.0 };
                    });
                store.insert(DataField::UnmixedSo2, None, so2);
            }
        }

        for (molecule, concentration) in self.chromophores.iter().zip(concentrations) {
            store.insert(
                DataField::UnmixedConcentration(molecule.name.clone()),
                None,
                concentration,
            );
        }
        Ok(())
    }
}

/// Moore-Penrose pseudo-inverse via SVD, or `None` when the columns of
/// `matrix` are linearly dependent.
fn pseudo_inverse(matrix: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let svd = matrix.clone().svd(true, true);
    let tolerance = RANK_TOLERANCE * svd.singular_values.max().max(f64::MIN_POSITIVE);
    if svd.rank(tolerance) < matrix.ncols() {
        return None;
    }
    svd.pseudo_inverse(tolerance).ok()
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUnmixing {
    field: Option<String>,
    chromophores: Vec<String>,
    wavelengths: Option<Vec<u32>>,
    #[serde(default)]
    compute_so2: bool,
}
