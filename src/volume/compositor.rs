//! Front-to-back priority compositing.
//!
//! Structures are visited in descending priority. Each one claims the part
//! of every voxel that is still free, up to its own footprint fraction, and
//! deposits its molecules into that claim. The background takes whatever
//! remains once every other structure has been placed.

use super::deformation::DeformationField;
use super::error::Error;
use super::structure::Structure;
use crate::model::composition::accumulate_weighted;
use crate::model::grid::GridGeometry;
use crate::model::molecule::Molecule;
use log::{debug, info};
use ndarray::{Array3, Zip};

/// Per-molecule fraction tensors, one per distinct molecule.
///
/// Molecules that compare equal share one tensor, no matter which structure
/// contributed them.
#[derive(Debug, Clone, Default)]
pub(crate) struct MoleculeRegistry {
    molecules: Vec<Molecule>,
    fractions: Vec<Array3<f64>>,
}

impl MoleculeRegistry {
    /// Tensor of `molecule`, allocated on first use.
    fn fraction_mut(&mut self, molecule: &Molecule, grid: &GridGeometry) -> &mut Array3<f64> {
        let index = match self.molecules.iter().position(|m| m == molecule) {
            Some(index) => index,
            None => {
                self.molecules.push(molecule.clone());
                self.fractions.push(grid.zeros());
                self.molecules.len() - 1
            }
        };
        &mut self.fractions[index]
    }

    fn deposit(&mut self, structure: &Structure, claim: &Array3<f64>, grid: &GridGeometry) {
        for constituent in structure.constituents() {
            let target = self.fraction_mut(&constituent.molecule, grid);
            accumulate_weighted(target, claim, &constituent.fraction);
        }
    }
}

/// Result of compositing: the molecular make-up of every voxel.
#[derive(Debug, Clone)]
pub struct ComposedVolume {
    grid: GridGeometry,
    registry: MoleculeRegistry,
    segmentation: Array3<i32>,
    structure_order: Vec<String>,
    deformation: Option<DeformationField>,
}

impl ComposedVolume {
    pub fn grid(&self) -> &GridGeometry {
        &self.grid
    }

    /// Distinct molecules in order of first appearance.
    pub fn molecules(&self) -> &[Molecule] {
        &self.registry.molecules
    }

    /// Molecules paired with their fraction tensors.
    pub fn constituents(&self) -> impl Iterator<Item = (&Molecule, &Array3<f64>)> {
        self.registry
            .molecules
            .iter()
            .zip(self.registry.fractions.iter())
    }

    /// Summed fraction of every molecule called `name`.
    pub fn fraction_of(&self, name: &str) -> Array3<f64> {
        let mut total = self.grid.zeros();
        for (molecule, fraction) in self.constituents() {
            if molecule.name == name {
                total += fraction;
            }
        }
        total
    }

    /// Sum of all molecule fractions per voxel.
    pub fn total_fraction(&self) -> Array3<f64> {
        let mut total = self.grid.zeros();
        for fraction in &self.registry.fractions {
            total += fraction;
        }
        total
    }

    /// Segmentation class code per voxel.
    pub fn segmentation(&self) -> &Array3<i32> {
        &self.segmentation
    }

    /// Structure names in the order they were composited.
    pub fn structure_order(&self) -> &[String] {
        &self.structure_order
    }

    pub fn deformation(&self) -> Option<&DeformationField> {
        self.deformation.as_ref()
    }
}

/// Composites `structures` into one volume.
///
/// `structures` must already be in compositing order (descending priority,
/// insertion order among equals) and contain exactly one background.
///
/// # Errors
///
/// Returns [`Error::Configuration`] when the background count is wrong and
/// any error raised while rasterizing a footprint.
pub(crate) fn composite(
    grid: &GridGeometry,
    structures: &[Structure],
    deformation: Option<DeformationField>,
) -> Result<ComposedVolume, Error> {
    let mut backgrounds = structures.iter().filter(|s| s.is_background());
    let background = match (backgrounds.next(), backgrounds.next()) {
        (Some(background), None) => background,
        _ => {
            return Err(Error::configuration(
                "structures",
                "exactly one background structure is required",
            ));
        }
    };

    info!(
        "Compositing {} structures into a {:?} voxel grid",
        structures.len(),
        grid.dims
    );

    let mut registry = MoleculeRegistry::default();
    let mut occupied = grid.zeros();
    let mut best_claim = grid.zeros();
    let mut segmentation = Array3::from_elem(grid.shape(), background.segmentation().code());

    for structure in structures.iter().filter(|s| !s.is_background()) {
        let mut claim = structure.footprint(deformation.as_ref())?;
        Zip::from(&mut claim)
            .and(&occupied)
            .for_each(|a, &o| *a = a.min(1.0 - o).max(0.0));

        registry.deposit(structure, &claim, grid);
        claim_segmentation(&mut segmentation, &mut best_claim, &claim, structure);
        occupied += &claim;

        debug!(
            "Structure '{}' (priority {}) claimed {:.3} voxel volumes",
            structure.name(),
            structure.priority(),
            claim.sum()
        );
    }

    let remainder = occupied.mapv(|o| (1.0 - o).max(0.0));
    registry.deposit(background, &remainder, grid);
    claim_segmentation(&mut segmentation, &mut best_claim, &remainder, background);
    debug!(
        "Background '{}' filled {:.3} voxel volumes",
        background.name(),
        remainder.sum()
    );

    Ok(ComposedVolume {
        grid: *grid,
        registry,
        segmentation,
        structure_order: structures.iter().map(|s| s.name().to_string()).collect(),
        deformation,
    })
}

/// Hands voxels to `structure` where its claim beats every earlier one.
fn claim_segmentation(
    segmentation: &mut Array3<i32>,
    best_claim: &mut Array3<f64>,
    claim: &Array3<f64>,
    structure: &Structure,
) {
    let code = structure.segmentation().code();
    Zip::from(segmentation)
        .and(best_claim)
        .and(claim)
        .for_each(|label, best, &a| {
            if a > *best {
                *best = a;
                *label = code;
            }
        });
}
