use super::spectrum::{Spectrum, SpectrumError};
use serde::Deserialize;

/// Scattering behaviour of a molecule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ScatteringModel {
    /// Wavelength-independent scattering coefficient in 1/cm.
    Constant { mus_per_cm: f64 },
    /// Mie/Rayleigh power law on the reduced scattering coefficient.
    ///
    /// `mus'(λ) = a · (f_ray · (λ/500)^-4 + (1 − f_ray) · (λ/500)^-b_mie)` with
    /// `a` the reduced scattering at 500 nm in 1/cm.
    PowerLaw {
        mus_prime_500_per_cm: f64,
        b_mie: f64,
        f_ray: f64,
    },
}

impl ScatteringModel {
    /// Scattering coefficient in 1/cm at `wavelength_nm` for anisotropy `g`.
    pub fn scattering_per_cm(&self, wavelength_nm: f64, anisotropy: f64) -> f64 {
        match *self {
            ScatteringModel::Constant { mus_per_cm } => mus_per_cm,
            ScatteringModel::PowerLaw {
                mus_prime_500_per_cm,
                b_mie,
                f_ray,
            } => {
                let ratio = wavelength_nm / 500.0;
                let reduced = mus_prime_500_per_cm
                    * (f_ray * ratio.powf(-4.0) + (1.0 - f_ray) * ratio.powf(-b_mie));
                if anisotropy < 1.0 {
                    reduced / (1.0 - anisotropy)
                } else {
                    reduced
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AcousticProperties {
    /// Speed of sound in m/s.
    #[serde(default = "default_speed_of_sound")]
    pub speed_of_sound: f64,
    /// Density in kg/m³.
    #[serde(default = "default_density")]
    pub density: f64,
    /// Acoustic attenuation in dB/cm/MHz.
    #[serde(default = "default_alpha_coefficient")]
    pub alpha_coefficient: f64,
    /// Dimensionless Grüneisen parameter.
    #[serde(default = "default_gruneisen")]
    pub gruneisen: f64,
}

fn default_speed_of_sound() -> f64 {
    1540.0
}
fn default_density() -> f64 {
    1000.0
}
fn default_alpha_coefficient() -> f64 {
    0.5
}
fn default_gruneisen() -> f64 {
    0.2
}

impl Default for AcousticProperties {
    fn default() -> Self {
        Self {
            speed_of_sound: default_speed_of_sound(),
            density: default_density(),
            alpha_coefficient: default_alpha_coefficient(),
            gruneisen: default_gruneisen(),
        }
    }
}

/// A named substance with its optical and acoustic descriptors.
///
/// Two molecules are the same substance only if every descriptor matches;
/// the compositor relies on this equality to share fraction tensors.
#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    pub name: String,
    pub absorption: Spectrum,
    pub scattering: ScatteringModel,
    pub anisotropy: f64,
    pub acoustic: AcousticProperties,
}

impl Molecule {
    /// A molecule with wavelength-independent coefficients.
    pub fn constant(mua_per_cm: f64, mus_per_cm: f64, anisotropy: f64) -> Self {
        Self {
            name: "constant".to_string(),
            absorption: Spectrum::constant(mua_per_cm),
            scattering: ScatteringModel::Constant { mus_per_cm },
            anisotropy,
            acoustic: AcousticProperties::default(),
        }
    }

    pub fn absorption_per_cm(&self, wavelength_nm: f64) -> Result<f64, SpectrumError> {
        self.absorption.value_at(wavelength_nm)
    }

    pub fn scattering_per_cm(&self, wavelength_nm: f64) -> f64 {
        self.scattering
            .scattering_per_cm(wavelength_nm, self.anisotropy)
    }
}
