mod compositor;
mod config;
mod context;
mod deformation;
mod error;
mod properties;
mod spline;
mod structure;

pub use compositor::ComposedVolume;
pub use config::{
    DeformationConfig, ShapeSettings, SimulationSettings, StructureSettings, VesselSettings,
};
pub use context::{RunContext, derive_seed};
pub use deformation::{DeformationField, DeformationSettings, generate as generate_deformation};
pub use error::Error;
pub use structure::{ParseStructureKindError, ResolvedConstituent, Structure, StructureKind};

use crate::io::FieldStore;
use log::info;
use rayon::prelude::*;
use std::cmp::Reverse;

/// Builds the composed volume described by `settings`.
///
/// Settings are validated, the deformation is generated or loaded, and every
/// structure is built before any voxel is blended. Structures are then
/// composited in descending priority, ties keeping their document order.
pub fn compose(settings: &SimulationSettings) -> Result<ComposedVolume, Error> {
    settings.validate()?;
    let context = RunContext::new(settings.random_seed);
    let grid = &settings.grid;

    let deformation = match &settings.deformation {
        None => None,
        Some(DeformationConfig::Explicit(points)) => Some(DeformationField::from_settings(points)?),
        Some(DeformationConfig::Generated {
            max_elevation_mm,
            filter_sigma,
            cosine_scaling_factor,
        }) => {
            let mut rng = context.rng_for("deformation");
            let points = generate_deformation(
                grid.horizontal_bounds_mm(),
                *max_elevation_mm,
                *filter_sigma,
                *cosine_scaling_factor,
                &mut rng,
            )?;
            Some(DeformationField::from_settings(&points)?)
        }
    };

    let mut structures = settings
        .structures
        .iter()
        .map(|entry| Structure::build(entry, grid, context.seed(), deformation.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    structures.sort_by_key(|s| Reverse(s.priority()));

    info!(
        "Composing volume '{}' (seed {}, {} structures)",
        settings.name,
        context.seed(),
        structures.len()
    );
    compositor::composite(grid, &structures, deformation)
}

/// Composes the volume and derives its property fields for every configured
/// wavelength.
pub fn create_volume(settings: &SimulationSettings) -> Result<FieldStore, Error> {
    compose(settings)?.derive_fields(&settings.wavelengths)
}

/// Runs [`create_volume`] once per seed, in parallel.
///
/// Each run owns its random state, so the result for a seed does not depend
/// on which other seeds are in the batch. Results keep the order of `seeds`.
pub fn compose_batch(
    settings: &SimulationSettings,
    seeds: &[u64],
) -> Vec<Result<FieldStore, Error>> {
    seeds
        .par_iter()
        .map(|&seed| create_volume(&settings.clone().with_seed(seed)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::TissueLibrary;
    use crate::model::composition::{MolecularComposition, SegmentationClass};
    use crate::model::field::DataField;
    use crate::model::molecule::Molecule;

    fn layered(seed: u64) -> SimulationSettings {
        let tissues = TissueLibrary::builtin();
        SimulationSettings::new(1.0, [6.0, 6.0, 6.0], vec![800])
            .expect("valid grid")
            .with_seed(seed)
            .with_deformation(DeformationConfig::default())
            .with_structure(StructureSettings::new(
                "background",
                ShapeSettings::Background,
                tissues.water().expect("water preset"),
            ))
            .with_structure(
                StructureSettings::new(
                    "skin",
                    ShapeSettings::HorizontalLayer {
                        start_z_mm: 2.0,
                        end_z_mm: 4.0,
                    },
                    tissues.epidermis(0.02).expect("epidermis preset"),
                )
                .with_priority(8)
                .with_partial_volume(true)
                .with_deformation_adherence(true),
            )
    }

    #[test]
    fn compose_orders_structures_by_priority() {
        let volume = compose(&layered(1)).unwrap();
        assert_eq!(volume.structure_order(), &["skin", "background"]);
        assert!(volume.deformation().is_some());
    }

    #[test]
    fn equal_seeds_give_equal_volumes() {
        let a = create_volume(&layered(7)).unwrap();
        let b = create_volume(&layered(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn batch_results_match_single_runs() {
        let settings = layered(0);
        let batch = compose_batch(&settings, &[3, 4]);
        assert_eq!(batch.len(), 2);
        let single = create_volume(&settings.clone().with_seed(4)).unwrap();
        assert_eq!(batch[1].as_ref().unwrap(), &single);
        let mua = batch[0]
            .as_ref()
            .unwrap()
            .get(&DataField::Absorption, Some(800))
            .unwrap();
        assert_eq!(mua.dim(), (6, 6, 6));
    }

    #[test]
    fn deformed_field_layer_leaves_no_voxel_empty() {
        let surface = DeformationSettings {
            x_mm: Some(vec![0.0, 2.0]),
            y_mm: Some(vec![0.0, 2.0]),
            z_mm: Some(ndarray::Array2::from_elem((2, 2), -1.0)),
            max_deformation_mm: None,
        };
        let ink = MolecularComposition::builder(SegmentationClass::Generic)
            .append_field(
                Molecule::constant(1.0, 10.0, 0.9),
                ndarray::Array3::from_elem((2, 2, 2), 1.0),
            )
            .build()
            .expect("valid composition");
        let settings = SimulationSettings::new(1.0, [2.0, 2.0, 6.0], vec![800])
            .unwrap()
            .with_deformation(DeformationConfig::Explicit(surface))
            .with_structure(StructureSettings::new(
                "background",
                ShapeSettings::Background,
                TissueLibrary::builtin().water().unwrap(),
            ))
            .with_structure(
                StructureSettings::new(
                    "ink",
                    ShapeSettings::HorizontalLayer {
                        start_z_mm: 2.0,
                        end_z_mm: 4.0,
                    },
                    ink,
                )
                .with_priority(1)
                .with_deformation_adherence(true),
            );

        let volume = compose(&settings).unwrap();
        let total = volume.total_fraction();
        for ((i, j, k), &t) in total.indexed_iter() {
            assert!((t - 1.0).abs() < 1e-12, "voxel ({i}, {j}, {k}) holds {t}");
        }
        let ink = volume.fraction_of("constant");
        let column: Vec<f64> = (0..6).map(|k| ink[[1, 1, k]]).collect();
        assert_eq!(column, vec![0.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn invalid_settings_fail_before_compositing() {
        let settings = SimulationSettings::new(1.0, [2.0, 2.0, 2.0], vec![800]).unwrap();
        assert!(matches!(
            compose(&settings),
            Err(Error::Configuration { .. })
        ));
    }
}
