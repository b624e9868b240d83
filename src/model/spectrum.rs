use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpectrumError {
    #[error("tabulated spectrum needs at least two samples, got {0}")]
    TooFewSamples(usize),

    #[error("spectrum has {wavelengths} wavelengths but {values} values")]
    LengthMismatch { wavelengths: usize, values: usize },

    #[error("spectrum wavelengths must be strictly increasing")]
    Unsorted,

    #[error("wavelength {wavelength_nm} nm is outside the tabulated range {min_nm}-{max_nm} nm")]
    OutOfRange {
        wavelength_nm: f64,
        min_nm: f64,
        max_nm: f64,
    },
}

/// A wavelength-dependent coefficient, in 1/cm for absorption spectra.
///
/// Tabulated spectra are linearly interpolated between samples and refuse to
/// extrapolate. A constant spectrum answers every wavelength.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawSpectrum")]
pub enum Spectrum {
    Constant(f64),
    Tabulated {
        wavelengths_nm: Vec<f64>,
        values: Vec<f64>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSpectrum {
    Constant(f64),
    Tabulated {
        wavelengths_nm: Vec<f64>,
        values: Vec<f64>,
    },
}

impl TryFrom<RawSpectrum> for Spectrum {
    type Error = SpectrumError;

    fn try_from(raw: RawSpectrum) -> Result<Self, Self::Error> {
        match raw {
            RawSpectrum::Constant(value) => Ok(Spectrum::Constant(value)),
            RawSpectrum::Tabulated {
                wavelengths_nm,
                values,
            } => Spectrum::tabulated(wavelengths_nm, values),
        }
    }
}

impl Spectrum {
    pub fn constant(value: f64) -> Self {
        Spectrum::Constant(value)
    }

    pub fn tabulated(wavelengths_nm: Vec<f64>, values: Vec<f64>) -> Result<Self, SpectrumError> {
        if wavelengths_nm.len() != values.len() {
            return Err(SpectrumError::LengthMismatch {
                wavelengths: wavelengths_nm.len(),
                values: values.len(),
            });
        }
        if wavelengths_nm.len() < 2 {
            return Err(SpectrumError::TooFewSamples(wavelengths_nm.len()));
        }
        if wavelengths_nm.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SpectrumError::Unsorted);
        }
        Ok(Spectrum::Tabulated {
            wavelengths_nm,
            values,
        })
    }

    /// Value at `wavelength_nm`, linearly interpolated between samples.
    pub fn value_at(&self, wavelength_nm: f64) -> Result<f64, SpectrumError> {
        match self {
            Spectrum::Constant(value) => Ok(*value),
            Spectrum::Tabulated {
                wavelengths_nm,
                values,
            } => {
                let min_nm = wavelengths_nm[0];
                let max_nm = wavelengths_nm[wavelengths_nm.len() - 1];
                if !(min_nm..=max_nm).contains(&wavelength_nm) {
                    return Err(SpectrumError::OutOfRange {
                        wavelength_nm,
                        min_nm,
                        max_nm,
                    });
                }
                let upper = wavelengths_nm
                    .partition_point(|&w| w < wavelength_nm)
                    .clamp(1, wavelengths_nm.len() - 1);
                let (w0, w1) = (wavelengths_nm[upper - 1], wavelengths_nm[upper]);
                let t = (wavelength_nm - w0) / (w1 - w0);
                Ok(values[upper - 1] + t * (values[upper] - values[upper - 1]))
            }
        }
    }

    /// The `(min, max)` wavelengths this spectrum can answer, `None` if unbounded.
    pub fn range_nm(&self) -> Option<(f64, f64)> {
        match self {
            Spectrum::Constant(_) => None,
            Spectrum::Tabulated { wavelengths_nm, .. } => {
                Some((wavelengths_nm[0], wavelengths_nm[wavelengths_nm.len() - 1]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() <= eps
    }

    fn sample() -> Spectrum {
        Spectrum::tabulated(vec![500.0, 600.0, 700.0], vec![10.0, 20.0, 0.0])
            .expect("valid spectrum")
    }

    #[test]
    fn interpolates_linearly_between_samples() {
        let s = sample();
        assert!(approx_eq(s.value_at(550.0).unwrap(), 15.0, 1e-12));
        assert!(approx_eq(s.value_at(675.0).unwrap(), 5.0, 1e-12));
    }

    #[test]
    fn returns_exact_values_at_samples_and_edges() {
        let s = sample();
        assert_eq!(s.value_at(500.0).unwrap(), 10.0);
        assert_eq!(s.value_at(600.0).unwrap(), 20.0);
        assert_eq!(s.value_at(700.0).unwrap(), 0.0);
    }

    #[test]
    fn refuses_to_extrapolate() {
        let err = sample().value_at(720.0).unwrap_err();
        assert!(matches!(err, SpectrumError::OutOfRange { .. }));
        assert!(err.to_string().contains("720"));
    }

    #[test]
    fn constant_answers_any_wavelength() {
        let s = Spectrum::constant(0.16);
        assert_eq!(s.value_at(10_000.0).unwrap(), 0.16);
        assert!(s.range_nm().is_none());
    }

    #[test]
    fn rejects_malformed_tables() {
        assert!(matches!(
            Spectrum::tabulated(vec![500.0, 600.0], vec![1.0]),
            Err(SpectrumError::LengthMismatch { .. })
        ));
        assert!(matches!(
            Spectrum::tabulated(vec![600.0, 500.0], vec![1.0, 2.0]),
            Err(SpectrumError::Unsorted)
        ));
        assert!(matches!(
            Spectrum::tabulated(vec![600.0], vec![1.0]),
            Err(SpectrumError::TooFewSamples(1))
        ));
    }

    #[test]
    fn deserializes_both_forms_from_toml() {
        #[derive(Deserialize)]
        struct Holder {
            a: Spectrum,
            b: Spectrum,
        }
        let holder: Holder = toml::from_str(
            "a = 0.5\nb = { wavelengths_nm = [500.0, 600.0], values = [1.0, 3.0] }\n",
        )
        .expect("valid spectra");
        assert_eq!(holder.a, Spectrum::Constant(0.5));
        assert!(approx_eq(holder.b.value_at(550.0).unwrap(), 2.0, 1e-12));
    }

    #[test]
    fn deserialization_validates_tables() {
        #[derive(Debug, Deserialize)]
        struct Holder {
            #[allow(dead_code)]
            a: Spectrum,
        }
        let result: Result<Holder, _> =
            toml::from_str("a = { wavelengths_nm = [600.0, 500.0], values = [1.0, 3.0] }\n");
        assert!(result.is_err());
    }
}
