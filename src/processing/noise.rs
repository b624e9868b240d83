use super::error::Error;
use super::{ProcessingComponent, parse_field};
use crate::io::FieldStore;
use crate::model::field::DataField;
use log::debug;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Poisson};
use serde::Deserialize;

/// How sampled noise is combined with the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseMode {
    #[default]
    Additive,
    Multiplicative,
}

impl NoiseMode {
    #[inline]
    fn apply(self, value: f64, noise: f64) -> f64 {
        match self {
            NoiseMode::Additive => value + noise,
            NoiseMode::Multiplicative => value * noise,
        }
    }
}

/// Applies `noise` to every stored volume of `field`.
fn perturb(
    store: &mut FieldStore,
    field: &DataField,
    rng: &mut ChaCha8Rng,
    mut noise: impl FnMut(&mut ChaCha8Rng, f64) -> f64,
) -> Result<usize, Error> {
    let keys = store.keys_of(field);
    if keys.is_empty() {
        return Err(crate::io::Error::missing_field(field, None).into());
    }
    for key in &keys {
        let data = store.get_mut(&key.field, key.wavelength_nm)?;
        data.mapv_inplace(|value| noise(rng, value));
    }
    Ok(keys.len())
}

/// Poisson-distributed noise.
#[derive(Debug, Clone, PartialEq)]
pub struct PoissonNoise {
    pub field: DataField,
    /// Mean of the Poisson distribution; must be positive.
    pub mean: f64,
    pub mode: NoiseMode,
}

impl PoissonNoise {
    pub const NAME: &'static str = "poisson_noise";

    pub fn new(field: DataField) -> Self {
        Self {
            field,
            mean: default_poisson_mean(),
            mode: NoiseMode::Additive,
        }
    }

    pub(crate) fn from_table(table: toml::Table) -> Result<Self, Error> {
        let raw: RawPoissonNoise = toml::Value::Table(table).try_into()?;
        Ok(Self {
            field: parse_field(Self::NAME, "field", &raw.field)?,
            mean: raw.mean,
            mode: raw.mode,
        })
    }
}

impl ProcessingComponent for PoissonNoise {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(&self, store: &mut FieldStore, rng: &mut ChaCha8Rng) -> Result<(), Error> {
        let poisson = Poisson::new(self.mean).map_err(|e| Error::distribution(Self::NAME, e))?;
        let mode = self.mode;
        let count = perturb(store, &self.field, rng, |rng, value| {
            mode.apply(value, poisson.sample(rng))
        })?;
        debug!(
            "Applied {:?} Poisson noise (mean {}) to {count} '{}' volume(s)",
            self.mode, self.mean, self.field
        );
        Ok(())
    }
}

/// Normally distributed noise.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianNoise {
    pub field: DataField,
    pub mean: f64,
    /// Standard deviation; must be non-negative.
    pub std: f64,
    pub mode: NoiseMode,
    /// Clamp results at zero.
    pub non_negative: bool,
}

impl GaussianNoise {
    pub const NAME: &'static str = "gaussian_noise";

    pub fn new(field: DataField) -> Self {
        Self {
            field,
            mean: 0.0,
            std: default_std(),
            mode: NoiseMode::Additive,
            non_negative: false,
        }
    }

    pub(crate) fn from_table(table: toml::Table) -> Result<Self, Error> {
        let raw: RawGaussianNoise = toml::Value::Table(table).try_into()?;
        Ok(Self {
            field: parse_field(Self::NAME, "field", &raw.field)?,
            mean: raw.mean,
            std: raw.std,
            mode: raw.mode,
            non_negative: raw.non_negative,
        })
    }
}

impl ProcessingComponent for GaussianNoise {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(&self, store: &mut FieldStore, rng: &mut ChaCha8Rng) -> Result<(), Error> {
        let normal =
            Normal::new(self.mean, self.std).map_err(|e| Error::distribution(Self::NAME, e))?;
        let mode = self.mode;
        let non_negative = self.non_negative;
        let count = perturb(store, &self.field, rng, |rng, value| {
            let noisy = mode.apply(value, normal.sample(rng));
            if non_negative { noisy.max(0.0) } else { noisy }
        })?;
        debug!(
            "Applied {:?} Gaussian noise (mean {}, std {}) to {count} '{}' volume(s)",
            self.mode, self.mean, self.std, self.field
        );
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPoissonNoise {
    field: String,
    #[serde(default = "default_poisson_mean")]
    mean: f64,
    #[serde(default)]
    mode: NoiseMode,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGaussianNoise {
    field: String,
    #[serde(default)]
    mean: f64,
    #[serde(default = "default_std")]
    std: f64,
    #[serde(default)]
    mode: NoiseMode,
    #[serde(default)]
    non_negative: bool,
}

fn default_poisson_mean() -> f64 {
    3.0
}

fn default_std() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use rand::SeedableRng;

    fn store() -> FieldStore {
        let mut store = FieldStore::new(1.0, vec![700, 800]);
        for nm in [700, 800] {
            store.insert(
                DataField::InitialPressure,
                Some(nm),
                Array3::from_elem((8, 8, 8), 10.0),
            );
        }
        store
    }

    fn pressure(store: &FieldStore, nm: u32) -> &Array3<f64> {
        store.get(&DataField::InitialPressure, Some(nm)).unwrap()
    }

    #[test]
    fn gaussian_noise_is_reproducible_per_seed() {
        let noise = GaussianNoise::new(DataField::InitialPressure);
        let mut a = store();
        let mut b = store();
        noise.run(&mut a, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        noise.run(&mut b, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
        assert_ne!(pressure(&a, 700), pressure(&a, 800));
    }

    #[test]
    fn gaussian_noise_statistics_match_settings() {
        let mut noise = GaussianNoise::new(DataField::InitialPressure);
        noise.mean = 2.0;
        noise.std = 0.5;
        let mut s = store();
        noise.run(&mut s, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        let data = pressure(&s, 700);
        let mean = data.mean().unwrap();
        let var = data.mapv(|v| (v - mean).powi(2)).mean().unwrap();
        assert!((mean - 12.0).abs() < 0.1, "mean {mean}");
        assert!((var.sqrt() - 0.5).abs() < 0.05, "std {}", var.sqrt());
    }

    #[test]
    fn non_negative_clamps_results() {
        let mut noise = GaussianNoise::new(DataField::InitialPressure);
        noise.mean = -20.0;
        let mut s = store();
        noise.run(&mut s, &mut ChaCha8Rng::seed_from_u64(2)).unwrap();
        assert!(pressure(&s, 700).iter().any(|&v| v < 0.0));

        noise.non_negative = true;
        let mut s = store();
        noise.run(&mut s, &mut ChaCha8Rng::seed_from_u64(2)).unwrap();
        assert!(pressure(&s, 700).iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn multiplicative_poisson_scales_data() {
        let mut noise = PoissonNoise::new(DataField::InitialPressure);
        noise.mode = NoiseMode::Multiplicative;
        let mut s = store();
        noise.run(&mut s, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        let data = pressure(&s, 800);
        assert!(data.iter().all(|&v| v >= 0.0 && (v / 10.0).fract() == 0.0));
        assert!((data.mean().unwrap() - 30.0).abs() < 3.0);
    }

    #[test]
    fn invalid_distribution_parameters_are_reported() {
        let mut noise = PoissonNoise::new(DataField::InitialPressure);
        noise.mean = -1.0;
        let err = noise
            .run(&mut store(), &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, Error::Distribution { component: "poisson_noise", .. }));
    }

    #[test]
    fn missing_field_is_a_store_error() {
        let noise = GaussianNoise::new(DataField::Fluence);
        let err = noise
            .run(&mut store(), &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn settings_table_fills_defaults() {
        let table: toml::Table = toml::from_str(r#"field = "initial_pressure""#).unwrap();
        let noise = GaussianNoise::from_table(table).unwrap();
        assert_eq!(noise, GaussianNoise::new(DataField::InitialPressure));

        let table: toml::Table =
            toml::from_str("field = \"mua\"\nmean = 5.0\nmode = \"multiplicative\"").unwrap();
        let noise = PoissonNoise::from_table(table).unwrap();
        assert_eq!(noise.field, DataField::Absorption);
        assert_eq!(noise.mean, 5.0);
        assert_eq!(noise.mode, NoiseMode::Multiplicative);
    }
}
