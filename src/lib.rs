//! A pure Rust library for building synthetic tissue volumes for photoacoustic imaging
//! simulations. It rasterizes declarative geometric structures with molecular compositions
//! into a voxel grid, resolves their overlaps by priority, and derives the optical and
//! acoustic property maps that external light- and sound-propagation solvers consume.
//!
//! # Features
//!
//! - **Structures** — Background, horizontal layers, circular and elliptical tubes,
//!   parallelepipeds, cuboids, spheres, and randomly grown vessel trees, with optional
//!   partial-volume rasterization
//! - **Priority compositing** — Front-to-back claiming of voxel volume, so that the
//!   structure with the highest priority wins and partial voxels blend linearly
//! - **Surface deformation** — Smooth random or explicit elevation maps that layers can
//!   follow
//! - **Tissue library** — Wavelength-dependent molecules from an embedded parameter file,
//!   combined into presets such as muscle, epidermis, dermis, fat, blood and bone
//! - **Processing** — Noise models, field-of-view cropping and linear spectral unmixing
//!   on the resulting field store
//!
//! # Quick Start
//!
//! Settings are usually written in TOML. The [`create_volume`] function validates them,
//! composes the volume and returns a [`FieldStore`](io::FieldStore) with one property
//! map per field and wavelength:
//!
//! ```
//! use pa_forge::{DataField, SimulationSettings, create_volume};
//!
//! let settings = SimulationSettings::from_toml_str(r#"
//!     [simulation]
//!     spacing_mm = 1.0
//!     volume_x_mm = 4.0
//!     volume_y_mm = 4.0
//!     volume_z_mm = 4.0
//!     wavelengths = [800]
//!
//!     [structures.background]
//!     type = "background"
//!     tissue = { preset = "water" }
//!
//!     [structures.slab]
//!     type = "horizontal_layer"
//!     priority = 5
//!     start_mm = [0.0, 0.0, 0.0]
//!     end_mm = [0.0, 0.0, 2.0]
//!     tissue = { preset = "constant", mua = 0.5, mus = 100.0, g = 0.9 }
//! "#)?;
//!
//! let store = create_volume(&settings)?;
//! let mua = store.get(&DataField::Absorption, Some(800))?;
//!
//! // The slab fills the upper half of the volume, water the rest.
//! assert_eq!(mua[[0, 0, 0]], 0.5);
//! assert!(mua[[0, 0, 3]] < 0.5);
//!
//! // Segmentation is wavelength independent.
//! assert!(store.contains(&DataField::Segmentation, None));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Module Organization
//!
//! - [`library`] — Molecules and tissue presets
//! - [`io`] — Field store and its JSON persistence
//! - [`processing`] — Components that operate on a field store
//! - [`compose`] / [`create_volume`] / [`compose_batch`] — Volume construction
//!
//! # Data Types
//!
//! ## Settings
//!
//! - [`SimulationSettings`] — Grid, wavelengths, seed, deformation and structures
//! - [`StructureSettings`] — One named structure with priority and composition
//! - [`ShapeSettings`] — Geometry of each structure kind
//! - [`VesselSettings`] — Random-walk parameters of a vessel tree
//! - [`DeformationConfig`] — Generated or explicit surface deformation
//!
//! ## Volume Model
//!
//! - [`GridGeometry`] — Voxel spacing, extent and dimensions
//! - [`Molecule`] — Absorption spectrum, scattering model and acoustic properties
//! - [`MolecularComposition`] — Molecules with volume fractions and a segmentation class
//! - [`ComposedVolume`] — Per-molecule fraction tensors and the segmentation map
//! - [`DataField`] — Keys of the derived property maps

pub mod io;
pub mod library;
mod model;
pub mod processing;
mod volume;

pub use model::composition::{
    CompositionBuilder, CompositionError, Constituent, MolecularComposition,
    ParseSegmentationClassError, SegmentationClass, VolumeFraction,
};
pub use model::field::{DataField, ParseDataFieldError};
pub use model::grid::GridGeometry;
pub use model::molecule::{AcousticProperties, Molecule, ScatteringModel};
pub use model::spectrum::{Spectrum, SpectrumError};

pub use library::{MoleculeLibrary, TissueLibrary, TissueSpec};

pub use volume::{
    ComposedVolume, DeformationConfig, DeformationField, DeformationSettings,
    ParseStructureKindError, ResolvedConstituent, RunContext, ShapeSettings, SimulationSettings,
    Structure, StructureKind, StructureSettings, VesselSettings, compose, compose_batch,
    create_volume, derive_seed, generate_deformation,
};

pub use library::Error as LibraryError;
pub use volume::Error as VolumeError;
