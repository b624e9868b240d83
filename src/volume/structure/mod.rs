//! Geometric structures and their voxel footprints.
//!
//! Every structure kind answers one question per voxel: which fraction of
//! it does the shape cover? With partial volume disabled the answer is 0 or
//! 1 from a voxel-centre test; with partial volume enabled it is an estimate
//! of the covered volume in `[0, 1]`.
//!
//! Structures are built from their settings and the grid alone, so the
//! result never depends on the order in which the compositor visits them.

mod layer;
mod shapes;
mod tube;
mod vessel;

use super::config::{ShapeSettings, StructureSettings};
use super::context::derive_seed;
use super::deformation::DeformationField;
use super::error::Error;
use crate::model::composition::{SegmentationClass, VolumeFraction};
use crate::model::grid::GridGeometry;
use crate::model::molecule::Molecule;
use crate::model::vector::Vec3;
use layer::HorizontalLayer;
use ndarray::Array3;
use shapes::{Parallelepiped, Sphere};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tube::Tube;
use vessel::Vessel;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid or unsupported structure type: '{0}'")]
pub struct ParseStructureKindError(String);

/// Discriminator of the closed family of structure shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureKind {
    Background,
    HorizontalLayer,
    CircularTubular,
    EllipticalTubular,
    Parallelepiped,
    RectangularCuboid,
    Spherical,
    Vessel,
}

impl StructureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StructureKind::Background => "background",
            StructureKind::HorizontalLayer => "horizontal_layer",
            StructureKind::CircularTubular => "circular_tubular",
            StructureKind::EllipticalTubular => "elliptical_tubular",
            StructureKind::Parallelepiped => "parallelepiped",
            StructureKind::RectangularCuboid => "rectangular_cuboid",
            StructureKind::Spherical => "spherical",
            StructureKind::Vessel => "vessel",
        }
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StructureKind {
    type Err = ParseStructureKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        let normalized = normalized.strip_suffix("structure").unwrap_or(&normalized);
        match normalized {
            "background" => Ok(StructureKind::Background),
            "horizontallayer" | "layer" => Ok(StructureKind::HorizontalLayer),
            "circulartubular" | "tube" => Ok(StructureKind::CircularTubular),
            "ellipticaltubular" => Ok(StructureKind::EllipticalTubular),
            "parallelepiped" => Ok(StructureKind::Parallelepiped),
            "rectangularcuboid" | "cuboid" => Ok(StructureKind::RectangularCuboid),
            "spherical" | "sphere" => Ok(StructureKind::Spherical),
            "vessel" => Ok(StructureKind::Vessel),
            _ => Err(ParseStructureKindError(s.to_string())),
        }
    }
}

/// Per-call inputs to footprint evaluation.
pub(crate) struct RasterContext<'a> {
    pub grid: &'a GridGeometry,
    pub partial_volume: bool,
    pub deformation: Option<&'a DeformationField>,
}

impl RasterContext<'_> {
    /// Surface elevation under voxel column `(i, j)`; zero without deformation.
    pub fn elevation_at(&self, i: usize, j: usize) -> Result<f64, Error> {
        column_elevation(self.grid, self.deformation, i, j)
    }

    /// Centre of voxel `index` moved into the undeformed frame of the shape.
    pub fn undeformed_center(&self, index: [usize; 3]) -> Result<Vec3, Error> {
        let mut center = self.grid.voxel_center_mm(index);
        center[2] -= self.elevation_at(index[0], index[1])?;
        Ok(center)
    }
}

fn column_elevation(
    grid: &GridGeometry,
    deformation: Option<&DeformationField>,
    i: usize,
    j: usize,
) -> Result<f64, Error> {
    match deformation {
        Some(deformation) => {
            let [x, y, _] = grid.voxel_center_mm([i, j, 0]);
            deformation.evaluate(x, y)
        }
        None => Ok(0.0),
    }
}

/// Voxel coverage of a shape.
pub(crate) trait Footprint {
    /// Fraction of voxel `index` covered by the shape, in `[0, 1]`.
    fn fraction_at(&self, index: [usize; 3], ctx: &RasterContext<'_>) -> Result<f64, Error>;

    /// Coverage of every voxel in the grid.
    fn rasterize(&self, ctx: &RasterContext<'_>) -> Result<Array3<f64>, Error> {
        let mut out = ctx.grid.zeros();
        for ((i, j, k), value) in out.indexed_iter_mut() {
            *value = self.fraction_at([i, j, k], ctx)?;
        }
        Ok(out)
    }
}

/// Coverage of a voxel by a round shape whose boundary lies at signed
/// distance `signed_distance_mm` from the voxel centre (negative inside).
#[inline]
pub(crate) fn radial_fraction(signed_distance_mm: f64, ctx: &RasterContext<'_>) -> f64 {
    if ctx.partial_volume {
        (0.5 - signed_distance_mm / ctx.grid.spacing_mm).clamp(0.0, 1.0)
    } else if signed_distance_mm <= 0.0 {
        1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
enum Shape {
    Background,
    Layer(HorizontalLayer),
    Tube(Tube),
    Parallelepiped(Parallelepiped),
    Sphere(Sphere),
    Vessel(Vessel),
}

impl Shape {
    fn as_footprint(&self) -> Option<&dyn Footprint> {
        match self {
            Shape::Background => None,
            Shape::Layer(s) => Some(s),
            Shape::Tube(s) => Some(s),
            Shape::Parallelepiped(s) => Some(s),
            Shape::Sphere(s) => Some(s),
            Shape::Vessel(s) => Some(s),
        }
    }
}

/// A molecule with its volume fraction resolved to a full-grid tensor.
#[derive(Debug, Clone)]
pub struct ResolvedConstituent {
    pub molecule: Molecule,
    pub fraction: Array3<f64>,
}

/// A structure ready for compositing.
#[derive(Debug, Clone)]
pub struct Structure {
    name: String,
    kind: StructureKind,
    priority: i32,
    partial_volume: bool,
    adhere_to_deformation: bool,
    segmentation: SegmentationClass,
    grid: GridGeometry,
    shape: Shape,
    constituents: Vec<ResolvedConstituent>,
}

impl Structure {
    /// Builds a structure from its settings and the grid.
    ///
    /// Field-valued fractions are resolved here: a tensor matching the grid is
    /// used as is. A layer tensor matching the layer's clipped voxel span is
    /// laid along the layer, shifted per column when the layer follows the
    /// deformation, and its outermost slices fill the rest of each column.
    /// Anything else is a geometry mismatch.
    ///
    /// # Arguments
    ///
    /// * `settings` — Validated structure entry
    /// * `grid` — Voxel grid of the run
    /// * `run_seed` — Seed of the run, used by randomized shapes without their own seed
    /// * `deformation` — Surface deformation of the run, if any
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for invalid geometry and
    /// [`Error::GeometryMismatch`] for fraction tensors that do not fit.
    pub fn build(
        settings: &StructureSettings,
        grid: &GridGeometry,
        run_seed: u64,
        deformation: Option<&DeformationField>,
    ) -> Result<Self, Error> {
        let name = settings.name.as_str();
        settings.shape.validate(name)?;
        let degenerate_tube = || {
            Error::configuration(
                format!("structures.{name}.end_mm"),
                "tube start and end coincide",
            )
        };

        let shape = match &settings.shape {
            ShapeSettings::Background => Shape::Background,
            ShapeSettings::HorizontalLayer {
                start_z_mm,
                end_z_mm,
            } => Shape::Layer(HorizontalLayer::new(*start_z_mm, *end_z_mm)),
            ShapeSettings::CircularTubular {
                start_mm,
                end_mm,
                radius_mm,
            } => Shape::Tube(
                Tube::circular(*start_mm, *end_mm, *radius_mm).ok_or_else(degenerate_tube)?,
            ),
            ShapeSettings::EllipticalTubular {
                start_mm,
                end_mm,
                radius_mm,
                eccentricity,
            } => Shape::Tube(
                Tube::elliptical(*start_mm, *end_mm, *radius_mm, *eccentricity)
                    .ok_or_else(degenerate_tube)?,
            ),
            ShapeSettings::Parallelepiped { start_mm, edges_mm } => Shape::Parallelepiped(
                Parallelepiped::new(*start_mm, *edges_mm).ok_or_else(|| {
                    Error::configuration(
                        format!("structures.{name}.third_edge_mm"),
                        "parallelepiped edges are coplanar",
                    )
                })?,
            ),
            ShapeSettings::RectangularCuboid { start_mm, size_mm } => {
                Shape::Parallelepiped(Parallelepiped::axis_aligned(*start_mm, *size_mm))
            }
            ShapeSettings::Spherical {
                center_mm,
                radius_mm,
            } => Shape::Sphere(Sphere::new(*center_mm, *radius_mm)),
            ShapeSettings::Vessel(vessel) => {
                let seed = vessel
                    .seed
                    .unwrap_or_else(|| derive_seed(run_seed, name));
                Shape::Vessel(Vessel::grow(vessel, grid, seed).ok_or_else(|| {
                    Error::configuration(
                        format!("structures.{name}.direction_mm"),
                        "direction must not be the zero vector",
                    )
                })?)
            }
        };

        let layer_span = match &shape {
            Shape::Layer(layer) => Some(layer.clipped_voxel_span(grid)),
            _ => None,
        };
        let deformation = deformation.filter(|_| settings.adhere_to_deformation);
        let constituents = resolve_constituents(settings, grid, layer_span, deformation)?;

        Ok(Self {
            name: settings.name.clone(),
            kind: settings.kind(),
            priority: settings.priority,
            partial_volume: settings.partial_volume,
            adhere_to_deformation: settings.adhere_to_deformation,
            segmentation: settings.composition.segmentation(),
            grid: *grid,
            shape,
            constituents,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StructureKind {
        self.kind
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn segmentation(&self) -> SegmentationClass {
        self.segmentation
    }

    pub fn partial_volume(&self) -> bool {
        self.partial_volume
    }

    pub fn adheres_to_deformation(&self) -> bool {
        self.adhere_to_deformation
    }

    pub fn is_background(&self) -> bool {
        self.kind == StructureKind::Background
    }

    pub fn constituents(&self) -> &[ResolvedConstituent] {
        &self.constituents
    }

    fn context<'a>(&'a self, deformation: Option<&'a DeformationField>) -> RasterContext<'a> {
        RasterContext {
            grid: &self.grid,
            partial_volume: self.partial_volume,
            deformation: deformation.filter(|_| self.adhere_to_deformation),
        }
    }

    /// Fraction of voxel `index` covered by this structure.
    pub fn fraction_at(
        &self,
        index: [usize; 3],
        deformation: Option<&DeformationField>,
    ) -> Result<f64, Error> {
        match self.shape.as_footprint() {
            Some(shape) => shape.fraction_at(index, &self.context(deformation)),
            None => Ok(1.0),
        }
    }

    /// Whether voxel `index` is at least partly inside this structure.
    pub fn contains(
        &self,
        index: [usize; 3],
        deformation: Option<&DeformationField>,
    ) -> Result<bool, Error> {
        Ok(self.fraction_at(index, deformation)? > 0.0)
    }

    /// Coverage of every voxel of the grid.
    pub fn footprint(&self, deformation: Option<&DeformationField>) -> Result<Array3<f64>, Error> {
        match self.shape.as_footprint() {
            Some(shape) => shape.rasterize(&self.context(deformation)),
            None => Ok(self.grid.filled(1.0)),
        }
    }
}

fn resolve_constituents(
    settings: &StructureSettings,
    grid: &GridGeometry,
    layer_span: Option<(usize, usize)>,
    deformation: Option<&DeformationField>,
) -> Result<Vec<ResolvedConstituent>, Error> {
    settings
        .composition
        .constituents()
        .iter()
        .map(|constituent| {
            let fraction = match &constituent.fraction {
                VolumeFraction::Uniform(value) => grid.filled(*value),
                VolumeFraction::Field(field) => {
                    resolve_field(&settings.name, field, grid, layer_span, deformation)?
                }
            };
            Ok(ResolvedConstituent {
                molecule: constituent.molecule.clone(),
                fraction,
            })
        })
        .collect()
}

fn resolve_field(
    name: &str,
    field: &Array3<f64>,
    grid: &GridGeometry,
    layer_span: Option<(usize, usize)>,
    deformation: Option<&DeformationField>,
) -> Result<Array3<f64>, Error> {
    let shape = field.shape();
    let composition_shape = [shape[0], shape[1], shape[2]];
    if composition_shape == grid.dims {
        return Ok(field.clone());
    }

    let [nx, ny, nz] = grid.dims;
    let Some((z0, z1)) = layer_span else {
        return Err(Error::geometry_mismatch(name, grid.dims, composition_shape));
    };
    let depth = z1 - z0;
    let expected = [nx, ny, depth];
    if composition_shape != expected {
        return Err(Error::geometry_mismatch(name, expected, composition_shape));
    }

    let mut resolved = grid.zeros();
    if depth == 0 {
        return Ok(resolved);
    }
    let last = (depth - 1) as f64;
    for i in 0..nx {
        for j in 0..ny {
            let shift = column_elevation(grid, deformation, i, j)? / grid.spacing_mm;
            for k in 0..nz {
                let source = ((k as f64 - shift).round() - z0 as f64).clamp(0.0, last);
                resolved[[i, j, k]] = field[[i, j, source as usize]];
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::TissueLibrary;
    use crate::model::composition::MolecularComposition;
    use crate::volume::config::VesselSettings;
    use crate::volume::deformation::DeformationSettings;
    use ndarray::Array2;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() <= eps
    }

    fn grid() -> GridGeometry {
        GridGeometry::new(1.0, [4.0, 3.0, 10.0])
    }

    fn ink() -> Molecule {
        Molecule::constant(1.0, 10.0, 0.9)
    }

    /// Surface lowered by one voxel everywhere above the 4 x 3 mm grid.
    fn sunken_surface() -> DeformationField {
        DeformationField::from_settings(&DeformationSettings {
            x_mm: Some(vec![0.0, 4.0]),
            y_mm: Some(vec![0.0, 3.0]),
            z_mm: Some(Array2::from_elem((2, 2), -1.0)),
            max_deformation_mm: None,
        })
        .expect("complete deformation")
    }

    fn layer_with_field(field: Array3<f64>) -> StructureSettings {
        let composition = MolecularComposition::builder(SegmentationClass::Generic)
            .append_field(ink(), field)
            .build()
            .expect("valid composition");
        StructureSettings::new(
            "stripe",
            ShapeSettings::HorizontalLayer {
                start_z_mm: 2.0,
                end_z_mm: 5.0,
            },
            composition,
        )
    }

    #[test]
    fn structure_kind_accepts_snake_and_class_names() {
        assert_eq!(
            "horizontal_layer".parse::<StructureKind>(),
            Ok(StructureKind::HorizontalLayer)
        );
        assert_eq!(
            "HorizontalLayerStructure".parse::<StructureKind>(),
            Ok(StructureKind::HorizontalLayer)
        );
        assert_eq!(
            "CircularTubularStructure".parse::<StructureKind>(),
            Ok(StructureKind::CircularTubular)
        );
        assert!("Toroidal".parse::<StructureKind>().is_err());
        for kind in [
            StructureKind::Background,
            StructureKind::EllipticalTubular,
            StructureKind::RectangularCuboid,
            StructureKind::Vessel,
        ] {
            assert_eq!(kind.to_string().parse::<StructureKind>(), Ok(kind));
        }
    }

    #[test]
    fn uniform_fractions_become_full_grid_tensors() {
        let settings = StructureSettings::new(
            "bg",
            ShapeSettings::Background,
            TissueLibrary::builtin().muscle(0.7, 0.06).unwrap(),
        );
        let structure = Structure::build(&settings, &grid(), 0, None).unwrap();
        assert_eq!(structure.constituents().len(), 4);
        for c in structure.constituents() {
            assert_eq!(c.fraction.shape(), &[4, 3, 10]);
        }
        assert!(structure.is_background());
        assert_eq!(structure.footprint(None).unwrap().sum(), 120.0);
    }

    #[test]
    fn layer_field_is_laid_along_the_layer_and_edge_extended() {
        let field = Array3::from_shape_fn((4, 3, 3), |(_, _, d)| 0.1 * (d + 1) as f64);
        let structure = Structure::build(&layer_with_field(field), &grid(), 0, None).unwrap();
        let resolved = &structure.constituents()[0].fraction;
        assert_eq!(resolved.shape(), &[4, 3, 10]);
        let column: Vec<f64> = (0..10).map(|k| resolved[[3, 2, k]]).collect();
        let expected = [0.1, 0.1, 0.1, 0.2, 0.3, 0.3, 0.3, 0.3, 0.3, 0.3];
        for (k, (&got, want)) in column.iter().zip(expected).enumerate() {
            assert!(approx_eq(got, want, 1e-12), "k={k}: {got} vs {want}");
        }
    }

    #[test]
    fn layer_field_follows_the_deformation_it_adheres_to() {
        let surface = sunken_surface();
        let field = Array3::from_shape_fn((4, 3, 3), |(_, _, d)| 0.1 * (d + 1) as f64);
        let settings = layer_with_field(field).with_deformation_adherence(true);
        let structure = Structure::build(&settings, &grid(), 0, Some(&surface)).unwrap();

        let footprint = structure.footprint(Some(&surface)).unwrap();
        let resolved = &structure.constituents()[0].fraction;
        for ((i, j, k), &cover) in footprint.indexed_iter() {
            let expected_cover = if (1..4).contains(&k) { 1.0 } else { 0.0 };
            assert_eq!(cover, expected_cover, "voxel ({i}, {j}, {k})");
            if cover > 0.0 {
                assert!(approx_eq(resolved[[i, j, k]], 0.1 * k as f64, 1e-12));
            }
        }
    }

    #[test]
    fn partial_layer_edges_outside_the_rounded_span_keep_their_molecules() {
        let composition = MolecularComposition::builder(SegmentationClass::Generic)
            .append_field(ink(), Array3::from_elem((4, 3, 2), 1.0))
            .build()
            .unwrap();
        let settings = StructureSettings::new(
            "film",
            ShapeSettings::HorizontalLayer {
                start_z_mm: 2.6,
                end_z_mm: 5.4,
            },
            composition,
        )
        .with_partial_volume(true);
        let structure = Structure::build(&settings, &grid(), 0, None).unwrap();

        let footprint = structure.footprint(None).unwrap();
        let resolved = &structure.constituents()[0].fraction;
        assert!(approx_eq(footprint[[0, 0, 2]], 0.4, 1e-12));
        assert!(approx_eq(footprint[[0, 0, 5]], 0.4, 1e-12));
        for (&cover, &fraction) in footprint.iter().zip(resolved.iter()) {
            if cover > 0.0 {
                assert_eq!(fraction, 1.0);
            }
        }
    }

    #[test]
    fn adhering_shapes_are_lowered_with_the_surface() {
        let surface = sunken_surface();
        let mut vessel = VesselSettings::new([0.0, 1.5, 5.3], [1.0, 0.0, 0.0], 1.0);
        vessel.curvature_factor = 0.0;
        let shapes = [
            ShapeSettings::CircularTubular {
                start_mm: [0.0, 1.5, 5.5],
                end_mm: [4.0, 1.5, 5.5],
                radius_mm: 1.2,
            },
            ShapeSettings::EllipticalTubular {
                start_mm: [0.0, 1.5, 5.5],
                end_mm: [4.0, 1.5, 5.5],
                radius_mm: 1.7,
                eccentricity: 0.6,
            },
            ShapeSettings::Spherical {
                center_mm: [2.0, 1.5, 5.0],
                radius_mm: 1.2,
            },
            ShapeSettings::RectangularCuboid {
                start_mm: [1.0, 0.0, 4.0],
                size_mm: [2.0, 3.0, 2.0],
            },
            ShapeSettings::Vessel(vessel),
        ];
        let water = TissueLibrary::builtin().water().unwrap();

        for shape in shapes {
            for partial_volume in [false, true] {
                let settings = StructureSettings::new("shape", shape.clone(), water.clone())
                    .with_partial_volume(partial_volume);
                let flat = Structure::build(&settings, &grid(), 0, Some(&surface))
                    .unwrap()
                    .footprint(Some(&surface))
                    .unwrap();
                let adhering = settings.with_deformation_adherence(true);
                let lowered = Structure::build(&adhering, &grid(), 0, Some(&surface))
                    .unwrap()
                    .footprint(Some(&surface))
                    .unwrap();

                assert_ne!(flat, lowered, "{shape:?} ignored the surface");
                for ((i, j, k), &value) in lowered.indexed_iter() {
                    let expected = if k + 1 < 10 { flat[[i, j, k + 1]] } else { 0.0 };
                    assert!(
                        approx_eq(value, expected, 1e-9),
                        "{shape:?} at ({i}, {j}, {k}): {value} vs {expected}"
                    );
                }
            }
        }
    }

    #[test]
    fn layer_field_with_unexplained_shape_is_a_mismatch() {
        let field = Array3::from_elem((4, 3, 4), 0.5);
        let err = Structure::build(&layer_with_field(field), &grid(), 0, None).unwrap_err();
        match err {
            Error::GeometryMismatch {
                structure,
                structure_shape,
                composition_shape,
            } => {
                assert_eq!(structure, "stripe");
                assert_eq!(structure_shape, [4, 3, 3]);
                assert_eq!(composition_shape, [4, 3, 4]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_layer_field_must_match_the_grid() {
        let composition = MolecularComposition::builder(SegmentationClass::Generic)
            .append_field(ink(), Array3::from_elem((4, 3, 3), 0.5))
            .build()
            .unwrap();
        let settings = StructureSettings::new(
            "ball",
            ShapeSettings::Spherical {
                center_mm: [2.0, 1.5, 5.0],
                radius_mm: 1.0,
            },
            composition,
        );
        assert!(matches!(
            Structure::build(&settings, &grid(), 0, None),
            Err(Error::GeometryMismatch { .. })
        ));
    }

    #[test]
    fn coplanar_parallelepiped_is_a_configuration_error() {
        let settings = StructureSettings::new(
            "flat",
            ShapeSettings::Parallelepiped {
                start_mm: [0.0; 3],
                edges_mm: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
            },
            TissueLibrary::builtin().water().unwrap(),
        );
        let err = Structure::build(&settings, &grid(), 0, None).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn contains_follows_the_footprint() {
        let settings = StructureSettings::new(
            "ball",
            ShapeSettings::Spherical {
                center_mm: [2.0, 1.5, 5.0],
                radius_mm: 1.0,
            },
            TissueLibrary::builtin().blood(0.7).unwrap(),
        );
        let structure = Structure::build(&settings, &grid(), 0, None).unwrap();
        assert!(structure.contains([1, 1, 4], None).unwrap());
        assert!(!structure.contains([3, 0, 0], None).unwrap());
        let footprint = structure.footprint(None).unwrap();
        assert!(approx_eq(footprint[[1, 1, 4]], 1.0, 0.0));
        assert_eq!(footprint[[3, 0, 0]], 0.0);
    }
}
