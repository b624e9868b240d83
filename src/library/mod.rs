//! Molecule and tissue library.
//!
//! Molecules are read from an embedded TOML resource parsed on first use;
//! a custom document with the same layout may replace it. Tissue presets
//! combine library molecules into validated [`MolecularComposition`]s.
//!
//! [`MolecularComposition`]: crate::MolecularComposition

mod error;
mod molecules;
mod params;
mod tissue;

pub use error::Error;
pub use molecules::{
    AIR, BONE, DEOXYHEMOGLOBIN, DERMAL_SCATTERER, EPIDERMAL_SCATTERER, FAT, HEAVY_WATER,
    MEDIPRENE, MELANIN, MUSCLE_SCATTERER, MoleculeLibrary, OXYHEMOGLOBIN, SOFT_TISSUE_SCATTERER,
    ULTRASOUND_GEL, WATER,
};
pub use tissue::{TissueLibrary, TissueSpec};
