use super::compositor::ComposedVolume;
use super::error::Error;
use crate::io::FieldStore;
use crate::library::{self, DEOXYHEMOGLOBIN, OXYHEMOGLOBIN};
use crate::model::field::DataField;
use crate::model::molecule::Molecule;
use log::debug;
use ndarray::{Array3, Zip};

impl ComposedVolume {
    /// Derives the property maps of this volume for every wavelength.
    ///
    /// Optical and acoustic coefficients are fraction-weighted sums of the
    /// molecule coefficients. Oxygenation is the oxyhemoglobin share of all
    /// hemoglobin (0 where there is none) and the blood volume fraction is
    /// the total hemoglobin fraction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Library`] when a wavelength lies outside a
    /// molecule's tabulated absorption spectrum.
    pub fn derive_fields(&self, wavelengths: &[u32]) -> Result<FieldStore, Error> {
        let grid = self.grid();
        let mut store = FieldStore::new(grid.spacing_mm, wavelengths.to_vec());

        for &wavelength in wavelengths {
            let nm = f64::from(wavelength);
            let mut absorption = grid.zeros();
            let mut scattering = grid.zeros();
            let mut anisotropy = grid.zeros();
            for (molecule, fraction) in self.constituents() {
                let mua = molecule
                    .absorption_per_cm(nm)
                    .map_err(|e| library::Error::wavelength_out_of_range(&molecule.name, e))?;
                absorption.scaled_add(mua, fraction);
                scattering.scaled_add(molecule.scattering_per_cm(nm), fraction);
                anisotropy.scaled_add(molecule.anisotropy, fraction);
            }
            store.insert(DataField::Absorption, Some(wavelength), absorption);
            store.insert(DataField::Scattering, Some(wavelength), scattering);
            store.insert(DataField::Anisotropy, Some(wavelength), anisotropy);
            debug!("Derived optical properties at {wavelength} nm");
        }

        let oxy = self.fraction_of(OXYHEMOGLOBIN);
        let deoxy = self.fraction_of(DEOXYHEMOGLOBIN);
        let blood = &oxy + &deoxy;
        let mut oxygenation = grid.zeros();
        Zip::from(&mut oxygenation)
            .and(&oxy)
            .and(&blood)
            .for_each(|s, &o, &b| *s = if b > 0.0 { o / b } else { 0.0 });
        store.insert(DataField::Oxygenation, None, oxygenation);
        store.insert(DataField::BloodVolumeFraction, None, blood);

        store.insert(
            DataField::Segmentation,
            None,
            self.segmentation().mapv(f64::from),
        );

        let acoustic: [(DataField, fn(&Molecule) -> f64); 4] = [
            (DataField::SpeedOfSound, |m| m.acoustic.speed_of_sound),
            (DataField::Density, |m| m.acoustic.density),
            (DataField::AlphaCoefficient, |m| m.acoustic.alpha_coefficient),
            (DataField::Gruneisen, |m| m.acoustic.gruneisen),
        ];
        for (field, property) in acoustic {
            store.insert(field, None, self.weighted_sum(property));
        }

        Ok(store)
    }

    fn weighted_sum(&self, property: impl Fn(&Molecule) -> f64) -> Array3<f64> {
        let mut out = self.grid().zeros();
        for (molecule, fraction) in self.constituents() {
            out.scaled_add(property(molecule), fraction);
        }
        out
    }
}
