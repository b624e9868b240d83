use super::molecule::Molecule;
use ndarray::{Array3, Zip};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const FRACTION_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid or unsupported segmentation class: '{0}'")]
pub struct ParseSegmentationClassError(String);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompositionError {
    #[error("volume fractions sum to {total:.6} (must not exceed 1)")]
    FractionSum { total: f64 },

    #[error("molecule '{molecule}' has invalid volume fraction {value}")]
    InvalidFraction { molecule: String, value: f64 },

    #[error("volume fraction fields disagree in shape: {first:?} vs {second:?}")]
    FieldShapes {
        first: [usize; 3],
        second: [usize; 3],
    },

    #[error("a composition needs at least one molecule")]
    Empty,
}

/// Tissue class written into the segmentation map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationClass {
    #[default]
    Generic,
    Air,
    Muscle,
    Bone,
    Blood,
    Epidermis,
    Dermis,
    Fat,
    UltrasoundGel,
    Water,
    HeavyWater,
    Mediprene,
    SoftTissue,
}

impl SegmentationClass {
    pub const ALL: [SegmentationClass; 13] = [
        SegmentationClass::Generic,
        SegmentationClass::Air,
        SegmentationClass::Muscle,
        SegmentationClass::Bone,
        SegmentationClass::Blood,
        SegmentationClass::Epidermis,
        SegmentationClass::Dermis,
        SegmentationClass::Fat,
        SegmentationClass::UltrasoundGel,
        SegmentationClass::Water,
        SegmentationClass::HeavyWater,
        SegmentationClass::Mediprene,
        SegmentationClass::SoftTissue,
    ];

    /// Integer label stored in the segmentation field.
    pub fn code(self) -> i32 {
        match self {
            SegmentationClass::Generic => -1,
            SegmentationClass::Air => 0,
            SegmentationClass::Muscle => 1,
            SegmentationClass::Bone => 2,
            SegmentationClass::Blood => 3,
            SegmentationClass::Epidermis => 4,
            SegmentationClass::Dermis => 5,
            SegmentationClass::Fat => 6,
            SegmentationClass::UltrasoundGel => 7,
            SegmentationClass::Water => 8,
            SegmentationClass::HeavyWater => 9,
            SegmentationClass::Mediprene => 11,
            SegmentationClass::SoftTissue => 12,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SegmentationClass::Generic => "generic",
            SegmentationClass::Air => "air",
            SegmentationClass::Muscle => "muscle",
            SegmentationClass::Bone => "bone",
            SegmentationClass::Blood => "blood",
            SegmentationClass::Epidermis => "epidermis",
            SegmentationClass::Dermis => "dermis",
            SegmentationClass::Fat => "fat",
            SegmentationClass::UltrasoundGel => "ultrasound_gel",
            SegmentationClass::Water => "water",
            SegmentationClass::HeavyWater => "heavy_water",
            SegmentationClass::Mediprene => "mediprene",
            SegmentationClass::SoftTissue => "soft_tissue",
        }
    }
}

impl fmt::Display for SegmentationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentationClass {
    type Err = ParseSegmentationClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" => Ok(SegmentationClass::Generic),
            "air" => Ok(SegmentationClass::Air),
            "muscle" => Ok(SegmentationClass::Muscle),
            "bone" => Ok(SegmentationClass::Bone),
            "blood" => Ok(SegmentationClass::Blood),
            "epidermis" => Ok(SegmentationClass::Epidermis),
            "dermis" => Ok(SegmentationClass::Dermis),
            "fat" => Ok(SegmentationClass::Fat),
            "ultrasound_gel" => Ok(SegmentationClass::UltrasoundGel),
            "water" => Ok(SegmentationClass::Water),
            "heavy_water" => Ok(SegmentationClass::HeavyWater),
            "mediprene" => Ok(SegmentationClass::Mediprene),
            "soft_tissue" => Ok(SegmentationClass::SoftTissue),
            _ => Err(ParseSegmentationClassError(s.to_string())),
        }
    }
}

/// Share of a voxel occupied by one molecule.
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeFraction {
    Uniform(f64),
    Field(Array3<f64>),
}

impl VolumeFraction {
    pub fn max(&self) -> f64 {
        match self {
            VolumeFraction::Uniform(v) => *v,
            VolumeFraction::Field(field) => field.iter().copied().fold(0.0, f64::max),
        }
    }

    pub fn field_shape(&self) -> Option<[usize; 3]> {
        match self {
            VolumeFraction::Uniform(_) => None,
            VolumeFraction::Field(field) => {
                let s = field.shape();
                Some([s[0], s[1], s[2]])
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constituent {
    pub molecule: Molecule,
    pub fraction: VolumeFraction,
}

/// Ordered mixture of molecules with the segmentation class it paints.
///
/// Construction through [`CompositionBuilder`] guarantees every fraction is
/// in `[0, 1]`, all field fractions share one shape, and the per-voxel sum
/// does not exceed 1.
#[derive(Debug, Clone, PartialEq)]
pub struct MolecularComposition {
    constituents: Vec<Constituent>,
    segmentation: SegmentationClass,
}

impl MolecularComposition {
    pub fn builder(segmentation: SegmentationClass) -> CompositionBuilder {
        CompositionBuilder {
            constituents: Vec::new(),
            segmentation,
        }
    }

    pub fn constituents(&self) -> &[Constituent] {
        &self.constituents
    }

    pub fn segmentation(&self) -> SegmentationClass {
        self.segmentation
    }

    /// Shape shared by all field-valued fractions, if any.
    pub fn field_shape(&self) -> Option<[usize; 3]> {
        self.constituents
            .iter()
            .find_map(|c| c.fraction.field_shape())
    }

    /// Largest per-voxel fraction sum over the whole composition.
    pub fn max_total_fraction(&self) -> f64 {
        let uniform: f64 = self
            .constituents
            .iter()
            .filter_map(|c| match c.fraction {
                VolumeFraction::Uniform(v) => Some(v),
                VolumeFraction::Field(_) => None,
            })
            .sum();

        let Some(shape) = self.field_shape() else {
            return uniform;
        };
        let mut field_sum = Array3::<f64>::zeros((shape[0], shape[1], shape[2]));
        for c in &self.constituents {
            if let VolumeFraction::Field(field) = &c.fraction {
                field_sum += field;
            }
        }
        uniform + field_sum.iter().copied().fold(0.0, f64::max)
    }
}

pub struct CompositionBuilder {
    constituents: Vec<Constituent>,
    segmentation: SegmentationClass,
}

impl CompositionBuilder {
    pub fn append(mut self, molecule: Molecule, fraction: f64) -> Self {
        self.constituents.push(Constituent {
            molecule,
            fraction: VolumeFraction::Uniform(fraction),
        });
        self
    }

    pub fn append_field(mut self, molecule: Molecule, fraction: Array3<f64>) -> Self {
        self.constituents.push(Constituent {
            molecule,
            fraction: VolumeFraction::Field(fraction),
        });
        self
    }

    pub fn build(self) -> Result<MolecularComposition, CompositionError> {
        if self.constituents.is_empty() {
            return Err(CompositionError::Empty);
        }

        let mut shape: Option<[usize; 3]> = None;
        for c in &self.constituents {
            let invalid = |value: f64| CompositionError::InvalidFraction {
                molecule: c.molecule.name.clone(),
                value,
            };
            match &c.fraction {
                VolumeFraction::Uniform(v) => {
                    if !(0.0..=1.0 + FRACTION_TOLERANCE).contains(v) {
                        return Err(invalid(*v));
                    }
                }
                VolumeFraction::Field(field) => {
                    if let Some(bad) = field
                        .iter()
                        .find(|v| !(0.0..=1.0 + FRACTION_TOLERANCE).contains(*v))
                    {
                        return Err(invalid(*bad));
                    }
                    let s = field.shape();
                    let this = [s[0], s[1], s[2]];
                    match shape {
                        None => shape = Some(this),
                        Some(first) if first != this => {
                            return Err(CompositionError::FieldShapes {
                                first,
                                second: this,
                            });
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        let composition = MolecularComposition {
            constituents: self.constituents,
            segmentation: self.segmentation,
        };
        let total = composition.max_total_fraction();
        if total > 1.0 + FRACTION_TOLERANCE {
            return Err(CompositionError::FractionSum { total });
        }
        Ok(composition)
    }
}

/// Adds `weight · fraction` of a constituent into `target`, elementwise.
pub(crate) fn accumulate_weighted(
    target: &mut Array3<f64>,
    weight: &Array3<f64>,
    fraction: &Array3<f64>,
) {
    Zip::from(target)
        .and(weight)
        .and(fraction)
        .for_each(|t, &w, &f| *t += w * f);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn molecule(name: &str) -> Molecule {
        let mut m = Molecule::constant(0.1, 10.0, 0.9);
        m.name = name.to_string();
        m
    }

    #[test]
    fn builder_accepts_fractions_up_to_one() {
        let composition = MolecularComposition::builder(SegmentationClass::Muscle)
            .append(molecule("a"), 0.6)
            .append(molecule("b"), 0.4)
            .build()
            .expect("sum is exactly one");
        assert_eq!(composition.constituents().len(), 2);
        assert_eq!(composition.segmentation(), SegmentationClass::Muscle);
        assert!((composition.max_total_fraction() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn segmentation_codes_round_trip() {
        for class in SegmentationClass::ALL {
            assert_eq!(SegmentationClass::from_code(class.code()), Some(class));
        }
        assert_eq!(SegmentationClass::from_code(10), None);
    }

    #[test]
    fn builder_rejects_oversubscribed_mixture() {
        let err = MolecularComposition::builder(SegmentationClass::Generic)
            .append(molecule("a"), 0.7)
            .append(molecule("b"), 0.4)
            .build()
            .unwrap_err();
        assert!(matches!(err, CompositionError::FractionSum { .. }));
    }

    #[test]
    fn builder_rejects_negative_fraction() {
        let err = MolecularComposition::builder(SegmentationClass::Generic)
            .append(molecule("a"), -0.1)
            .build()
            .unwrap_err();
        assert!(matches!(err, CompositionError::InvalidFraction { .. }));
    }

    #[test]
    fn field_sum_is_checked_per_voxel() {
        let mut field = Array3::from_elem((2, 2, 2), 0.2);
        field[[1, 1, 1]] = 0.6;
        let err = MolecularComposition::builder(SegmentationClass::Generic)
            .append(molecule("a"), 0.5)
            .append_field(molecule("b"), field)
            .build()
            .unwrap_err();
        match err {
            CompositionError::FractionSum { total } => assert!((total - 1.1).abs() < 1e-12),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn field_shapes_must_agree() {
        let err = MolecularComposition::builder(SegmentationClass::Generic)
            .append_field(molecule("a"), Array3::zeros((2, 2, 2)))
            .append_field(molecule("b"), Array3::zeros((2, 2, 3)))
            .build()
            .unwrap_err();
        assert!(matches!(err, CompositionError::FieldShapes { .. }));
    }

    #[test]
    fn empty_composition_is_rejected() {
        let err = MolecularComposition::builder(SegmentationClass::Generic)
            .build()
            .unwrap_err();
        assert_eq!(err, CompositionError::Empty);
    }

    #[test]
    fn segmentation_class_round_trips_through_strings() {
        for class in [
            SegmentationClass::Generic,
            SegmentationClass::Epidermis,
            SegmentationClass::UltrasoundGel,
            SegmentationClass::HeavyWater,
        ] {
            assert_eq!(class.to_string().parse::<SegmentationClass>(), Ok(class));
        }
        assert!("cartilage".parse::<SegmentationClass>().is_err());
    }
}
