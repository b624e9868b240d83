//! Core data structures describing tissue volumes.
//!
//! - [`grid`] – Voxel grid geometry and millimetre/voxel conversions.
//! - [`spectrum`] – Tabulated or constant wavelength-dependent coefficients.
//! - [`molecule`] – Named substances with optical and acoustic descriptors.
//! - [`composition`] – Molecular mixtures, volume fractions and segmentation classes.
//! - [`field`] – Names of the volumes held by the field store.

pub mod composition;
pub mod field;
pub mod grid;
pub mod molecule;
pub mod spectrum;
pub(crate) mod vector;
