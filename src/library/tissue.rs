use super::error::Error;
use super::molecules::MoleculeLibrary;
use crate::model::composition::{CompositionBuilder, MolecularComposition, SegmentationClass};
use crate::model::molecule::Molecule;
use ndarray::Array3;
use serde::Deserialize;
use std::fmt;

const MUSCLE_WATER_FRACTION: f64 = 0.7;
const SOFT_TISSUE_WATER_FRACTION: f64 = 0.7;
const DERMIS_WATER_FRACTION: f64 = 0.65;
const FAT_WATER_FRACTION: f64 = 0.25;
const FAT_LIPID_FRACTION: f64 = 0.6;
const BONE_MINERAL_FRACTION: f64 = 0.8;

/// A tissue preset as written in settings files.
///
/// Parameters left out take the documented default of the preset.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "preset", rename_all = "snake_case")]
pub enum TissueSpec {
    Constant {
        mua: f64,
        mus: f64,
        g: f64,
    },
    Muscle {
        #[serde(default = "default_oxygenation")]
        oxygenation: f64,
        #[serde(default = "default_muscle_blood")]
        blood_volume_fraction: f64,
    },
    SoftTissue {
        #[serde(default = "default_oxygenation")]
        oxygenation: f64,
        #[serde(default = "default_soft_tissue_blood")]
        blood_volume_fraction: f64,
    },
    Epidermis {
        #[serde(default = "default_melanin_fraction")]
        melanin_fraction: f64,
    },
    Dermis {
        #[serde(default = "default_dermis_oxygenation")]
        oxygenation: f64,
        #[serde(default = "default_dermis_blood")]
        blood_volume_fraction: f64,
    },
    SubcutaneousFat {
        #[serde(default = "default_dermis_oxygenation")]
        oxygenation: f64,
        #[serde(default = "default_fat_blood")]
        blood_volume_fraction: f64,
    },
    Blood {
        #[serde(default = "default_oxygenation")]
        oxygenation: f64,
    },
    Bone,
    Mediprene,
    HeavyWater,
    UltrasoundGel,
    Air,
    Water,
}

fn default_oxygenation() -> f64 {
    0.7
}
fn default_dermis_oxygenation() -> f64 {
    0.5
}
fn default_muscle_blood() -> f64 {
    0.06
}
fn default_soft_tissue_blood() -> f64 {
    0.02
}
fn default_dermis_blood() -> f64 {
    0.002
}
fn default_fat_blood() -> f64 {
    0.01
}
fn default_melanin_fraction() -> f64 {
    0.014
}

impl TissueSpec {
    /// Every preset with its default parameters.
    pub fn defaults() -> Vec<TissueSpec> {
        vec![
            TissueSpec::Constant {
                mua: 1e-4,
                mus: 1e-4,
                g: 0.9,
            },
            TissueSpec::Muscle {
                oxygenation: default_oxygenation(),
                blood_volume_fraction: default_muscle_blood(),
            },
            TissueSpec::SoftTissue {
                oxygenation: default_oxygenation(),
                blood_volume_fraction: default_soft_tissue_blood(),
            },
            TissueSpec::Epidermis {
                melanin_fraction: default_melanin_fraction(),
            },
            TissueSpec::Dermis {
                oxygenation: default_dermis_oxygenation(),
                blood_volume_fraction: default_dermis_blood(),
            },
            TissueSpec::SubcutaneousFat {
                oxygenation: default_dermis_oxygenation(),
                blood_volume_fraction: default_fat_blood(),
            },
            TissueSpec::Blood {
                oxygenation: default_oxygenation(),
            },
            TissueSpec::Bone,
            TissueSpec::Mediprene,
            TissueSpec::HeavyWater,
            TissueSpec::UltrasoundGel,
            TissueSpec::Air,
            TissueSpec::Water,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            TissueSpec::Constant { .. } => "constant",
            TissueSpec::Muscle { .. } => "muscle",
            TissueSpec::SoftTissue { .. } => "soft_tissue",
            TissueSpec::Epidermis { .. } => "epidermis",
            TissueSpec::Dermis { .. } => "dermis",
            TissueSpec::SubcutaneousFat { .. } => "subcutaneous_fat",
            TissueSpec::Blood { .. } => "blood",
            TissueSpec::Bone => "bone",
            TissueSpec::Mediprene => "mediprene",
            TissueSpec::HeavyWater => "heavy_water",
            TissueSpec::UltrasoundGel => "ultrasound_gel",
            TissueSpec::Air => "air",
            TissueSpec::Water => "water",
        }
    }
}

impl fmt::Display for TissueSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds tissue compositions from the molecules of a [`MoleculeLibrary`].
#[derive(Debug, Clone, Copy)]
pub struct TissueLibrary<'a> {
    molecules: &'a MoleculeLibrary,
}

impl TissueLibrary<'static> {
    pub fn builtin() -> Self {
        Self {
            molecules: MoleculeLibrary::builtin(),
        }
    }
}

impl<'a> TissueLibrary<'a> {
    pub fn new(molecules: &'a MoleculeLibrary) -> Self {
        Self { molecules }
    }

    pub fn molecules(&self) -> &'a MoleculeLibrary {
        self.molecules
    }

    pub fn resolve(&self, spec: &TissueSpec) -> Result<MolecularComposition, Error> {
        match *spec {
            TissueSpec::Constant { mua, mus, g } => self.constant(mua, mus, g),
            TissueSpec::Muscle {
                oxygenation,
                blood_volume_fraction,
            } => self.muscle(oxygenation, blood_volume_fraction),
            TissueSpec::SoftTissue {
                oxygenation,
                blood_volume_fraction,
            } => self.soft_tissue(oxygenation, blood_volume_fraction),
            TissueSpec::Epidermis { melanin_fraction } => self.epidermis(melanin_fraction),
            TissueSpec::Dermis {
                oxygenation,
                blood_volume_fraction,
            } => self.dermis(oxygenation, blood_volume_fraction),
            TissueSpec::SubcutaneousFat {
                oxygenation,
                blood_volume_fraction,
            } => self.subcutaneous_fat(oxygenation, blood_volume_fraction),
            TissueSpec::Blood { oxygenation } => self.blood(oxygenation),
            TissueSpec::Bone => self.bone(),
            TissueSpec::Mediprene => self.mediprene(),
            TissueSpec::HeavyWater => self.heavy_water(),
            TissueSpec::UltrasoundGel => self.ultrasound_gel(),
            TissueSpec::Air => self.air(),
            TissueSpec::Water => self.water(),
        }
    }

    pub fn constant(&self, mua: f64, mus: f64, g: f64) -> Result<MolecularComposition, Error> {
        if mua < 0.0 || mus < 0.0 {
            return Err(Error::invalid_parameter(
                "constant",
                "mua/mus",
                mua.min(mus),
                "coefficients must be non-negative",
            ));
        }
        if !(0.0..=1.0).contains(&g) {
            return Err(Error::invalid_parameter(
                "constant",
                "g",
                g,
                "must lie in [0, 1]",
            ));
        }
        finish(
            "constant",
            MolecularComposition::builder(SegmentationClass::Generic)
                .append(Molecule::constant(mua, mus, g), 1.0),
        )
    }

    pub fn muscle(
        &self,
        oxygenation: f64,
        blood_volume_fraction: f64,
    ) -> Result<MolecularComposition, Error> {
        self.perfused(
            "muscle",
            SegmentationClass::Muscle,
            oxygenation,
            blood_volume_fraction,
            &[(self.molecules.water()?, MUSCLE_WATER_FRACTION)],
            self.molecules.muscle_scatterer()?,
        )
    }

    pub fn soft_tissue(
        &self,
        oxygenation: f64,
        blood_volume_fraction: f64,
    ) -> Result<MolecularComposition, Error> {
        self.perfused(
            "soft_tissue",
            SegmentationClass::SoftTissue,
            oxygenation,
            blood_volume_fraction,
            &[(self.molecules.water()?, SOFT_TISSUE_WATER_FRACTION)],
            self.molecules.soft_tissue_scatterer()?,
        )
    }

    pub fn epidermis(&self, melanin_fraction: f64) -> Result<MolecularComposition, Error> {
        check_unit("epidermis", "melanin_fraction", melanin_fraction)?;
        finish(
            "epidermis",
            MolecularComposition::builder(SegmentationClass::Epidermis)
                .append(self.molecules.melanin()?, melanin_fraction)
                .append(self.molecules.epidermal_scatterer()?, 1.0 - melanin_fraction),
        )
    }

    pub fn dermis(
        &self,
        oxygenation: f64,
        blood_volume_fraction: f64,
    ) -> Result<MolecularComposition, Error> {
        self.perfused(
            "dermis",
            SegmentationClass::Dermis,
            oxygenation,
            blood_volume_fraction,
            &[(self.molecules.water()?, DERMIS_WATER_FRACTION)],
            self.molecules.dermal_scatterer()?,
        )
    }

    pub fn subcutaneous_fat(
        &self,
        oxygenation: f64,
        blood_volume_fraction: f64,
    ) -> Result<MolecularComposition, Error> {
        self.perfused(
            "subcutaneous_fat",
            SegmentationClass::Fat,
            oxygenation,
            blood_volume_fraction,
            &[
                (self.molecules.water()?, FAT_WATER_FRACTION),
                (self.molecules.fat()?, FAT_LIPID_FRACTION),
            ],
            self.molecules.soft_tissue_scatterer()?,
        )
    }

    pub fn blood(&self, oxygenation: f64) -> Result<MolecularComposition, Error> {
        check_unit("blood", "oxygenation", oxygenation)?;
        finish(
            "blood",
            MolecularComposition::builder(SegmentationClass::Blood)
                .append(self.molecules.oxyhemoglobin()?, oxygenation)
                .append(self.molecules.deoxyhemoglobin()?, 1.0 - oxygenation),
        )
    }

    pub fn bone(&self) -> Result<MolecularComposition, Error> {
        finish(
            "bone",
            MolecularComposition::builder(SegmentationClass::Bone)
                .append(self.molecules.bone()?, BONE_MINERAL_FRACTION)
                .append(self.molecules.water()?, 1.0 - BONE_MINERAL_FRACTION),
        )
    }

    pub fn mediprene(&self) -> Result<MolecularComposition, Error> {
        self.pure("mediprene", SegmentationClass::Mediprene, self.molecules.mediprene()?)
    }

    pub fn heavy_water(&self) -> Result<MolecularComposition, Error> {
        self.pure(
            "heavy_water",
            SegmentationClass::HeavyWater,
            self.molecules.heavy_water()?,
        )
    }

    pub fn ultrasound_gel(&self) -> Result<MolecularComposition, Error> {
        self.pure(
            "ultrasound_gel",
            SegmentationClass::UltrasoundGel,
            self.molecules.ultrasound_gel()?,
        )
    }

    pub fn air(&self) -> Result<MolecularComposition, Error> {
        self.pure("air", SegmentationClass::Air, self.molecules.air()?)
    }

    pub fn water(&self) -> Result<MolecularComposition, Error> {
        self.pure("water", SegmentationClass::Water, self.molecules.water()?)
    }

    /// Muscle whose blood volume fraction varies per voxel.
    ///
    /// The scatterer takes whatever the fixed water fraction and the local
    /// blood leave over, so `blood_volume_fraction` must stay below 0.3.
    pub fn muscle_with_blood_field(
        &self,
        oxygenation: f64,
        blood_volume_fraction: Array3<f64>,
    ) -> Result<MolecularComposition, Error> {
        check_unit("muscle", "oxygenation", oxygenation)?;
        let oxy = blood_volume_fraction.mapv(|b| b * oxygenation);
        let deoxy = blood_volume_fraction.mapv(|b| b * (1.0 - oxygenation));
        let scatterer = blood_volume_fraction.mapv(|b| 1.0 - MUSCLE_WATER_FRACTION - b);
        finish(
            "muscle",
            MolecularComposition::builder(SegmentationClass::Muscle)
                .append_field(self.molecules.oxyhemoglobin()?, oxy)
                .append_field(self.molecules.deoxyhemoglobin()?, deoxy)
                .append(self.molecules.water()?, MUSCLE_WATER_FRACTION)
                .append_field(self.molecules.muscle_scatterer()?, scatterer),
        )
    }

    fn pure(
        &self,
        tissue: &str,
        segmentation: SegmentationClass,
        molecule: Molecule,
    ) -> Result<MolecularComposition, Error> {
        finish(
            tissue,
            MolecularComposition::builder(segmentation).append(molecule, 1.0),
        )
    }

    /// Blood-perfused tissue: hemoglobin split by `oxygenation`, fixed
    /// fractions of `base` molecules, and `scatterer` filling the remainder.
    fn perfused(
        &self,
        tissue: &str,
        segmentation: SegmentationClass,
        oxygenation: f64,
        blood_volume_fraction: f64,
        base: &[(Molecule, f64)],
        scatterer: Molecule,
    ) -> Result<MolecularComposition, Error> {
        check_unit(tissue, "oxygenation", oxygenation)?;
        check_unit(tissue, "blood_volume_fraction", blood_volume_fraction)?;

        let fixed: f64 = base.iter().map(|(_, f)| f).sum::<f64>() + blood_volume_fraction;
        if fixed > 1.0 {
            return Err(Error::invalid_parameter(
                tissue,
                "blood_volume_fraction",
                blood_volume_fraction,
                format!("leaves no room for the remaining constituents ({fixed:.3} > 1)"),
            ));
        }

        let mut builder = MolecularComposition::builder(segmentation)
            .append(
                self.molecules.oxyhemoglobin()?,
                blood_volume_fraction * oxygenation,
            )
            .append(
                self.molecules.deoxyhemoglobin()?,
                blood_volume_fraction * (1.0 - oxygenation),
            );
        for (molecule, fraction) in base {
            builder = builder.append(molecule.clone(), *fraction);
        }
        finish(tissue, builder.append(scatterer, 1.0 - fixed))
    }
}

fn check_unit(tissue: &str, parameter: &'static str, value: f64) -> Result<(), Error> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::invalid_parameter(
            tissue,
            parameter,
            value,
            "must lie in [0, 1]",
        ))
    }
}

fn finish(tissue: &str, builder: CompositionBuilder) -> Result<MolecularComposition, Error> {
    builder.build().map_err(|source| Error::VolumeFraction {
        tissue: tissue.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::molecules::{DEOXYHEMOGLOBIN, OXYHEMOGLOBIN, WATER};
    use crate::model::composition::VolumeFraction;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() <= eps
    }

    fn uniform_fraction(composition: &MolecularComposition, name: &str) -> f64 {
        composition
            .constituents()
            .iter()
            .filter(|c| c.molecule.name == name)
            .map(|c| match c.fraction {
                VolumeFraction::Uniform(v) => v,
                VolumeFraction::Field(_) => panic!("expected a uniform fraction"),
            })
            .sum()
    }

    #[test]
    fn every_preset_sums_to_at_most_one() {
        let library = TissueLibrary::builtin();
        for spec in TissueSpec::defaults() {
            let composition = library
                .resolve(&spec)
                .unwrap_or_else(|e| panic!("preset {spec} failed: {e}"));
            let total = composition.max_total_fraction();
            assert!(total <= 1.0 + 1e-12, "preset {spec} sums to {total}");
        }
    }

    #[test]
    fn presets_are_deterministic() {
        let library = TissueLibrary::builtin();
        for spec in TissueSpec::defaults() {
            assert_eq!(library.resolve(&spec).unwrap(), library.resolve(&spec).unwrap());
        }
    }

    #[test]
    fn muscle_default_matches_reference_mixture() {
        let muscle = TissueLibrary::builtin().muscle(0.7, 0.06).unwrap();
        assert!(approx_eq(uniform_fraction(&muscle, WATER), 0.7, 1e-12));
        assert!(approx_eq(uniform_fraction(&muscle, OXYHEMOGLOBIN), 0.042, 1e-12));
        assert!(approx_eq(uniform_fraction(&muscle, DEOXYHEMOGLOBIN), 0.018, 1e-12));
        assert!(approx_eq(muscle.max_total_fraction(), 1.0, 1e-12));
        assert_eq!(muscle.segmentation(), SegmentationClass::Muscle);
    }

    #[test]
    fn blood_splits_by_oxygenation() {
        let blood = TissueLibrary::builtin().blood(0.25).unwrap();
        assert!(approx_eq(uniform_fraction(&blood, OXYHEMOGLOBIN), 0.25, 1e-12));
        assert!(approx_eq(uniform_fraction(&blood, DEOXYHEMOGLOBIN), 0.75, 1e-12));
    }

    #[test]
    fn out_of_range_parameters_are_rejected() {
        let library = TissueLibrary::builtin();
        assert!(matches!(
            library.blood(1.2),
            Err(Error::InvalidParameter {
                parameter: "oxygenation",
                ..
            })
        ));
        assert!(matches!(
            library.muscle(0.7, 0.5),
            Err(Error::InvalidParameter {
                parameter: "blood_volume_fraction",
                ..
            })
        ));
        assert!(library.epidermis(-0.1).is_err());
        assert!(library.constant(0.1, 1.0, 1.5).is_err());
    }

    #[test]
    fn muscle_with_blood_field_keeps_voxel_sums_at_one() {
        let mut blood = Array3::from_elem((2, 2, 2), 0.05);
        blood[[0, 0, 0]] = 0.2;
        let muscle = TissueLibrary::builtin()
            .muscle_with_blood_field(0.8, blood)
            .unwrap();
        assert_eq!(muscle.field_shape(), Some([2, 2, 2]));
        assert!(approx_eq(muscle.max_total_fraction(), 1.0, 1e-12));
    }

    #[test]
    fn muscle_with_too_much_blood_fails_validation() {
        let blood = Array3::from_elem((1, 1, 1), 0.4);
        let err = TissueLibrary::builtin()
            .muscle_with_blood_field(0.8, blood)
            .unwrap_err();
        assert!(matches!(err, Error::VolumeFraction { .. }));
    }

    #[test]
    fn tissue_specs_deserialize_with_defaults() {
        #[derive(Deserialize)]
        struct Holder {
            tissue: TissueSpec,
        }
        let holder: Holder =
            toml::from_str("tissue = { preset = \"epidermis\" }").expect("valid preset");
        assert_eq!(
            holder.tissue,
            TissueSpec::Epidermis {
                melanin_fraction: 0.014
            }
        );
        let holder: Holder =
            toml::from_str("tissue = { preset = \"bone\" }").expect("valid unit preset");
        assert_eq!(holder.tissue, TissueSpec::Bone);
    }
}
