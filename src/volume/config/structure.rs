use crate::library::{TissueLibrary, TissueSpec};
use crate::model::composition::MolecularComposition;
use crate::model::vector::{Vec3, norm};
use crate::volume::error::Error;
use crate::volume::structure::StructureKind;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;

/// Geometry parameters of one structure, all lengths in millimetres.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeSettings {
    Background,
    HorizontalLayer {
        start_z_mm: f64,
        end_z_mm: f64,
    },
    CircularTubular {
        start_mm: Vec3,
        end_mm: Vec3,
        radius_mm: f64,
    },
    EllipticalTubular {
        start_mm: Vec3,
        end_mm: Vec3,
        radius_mm: f64,
        eccentricity: f64,
    },
    Parallelepiped {
        start_mm: Vec3,
        edges_mm: [Vec3; 3],
    },
    RectangularCuboid {
        start_mm: Vec3,
        size_mm: Vec3,
    },
    Spherical {
        center_mm: Vec3,
        radius_mm: f64,
    },
    Vessel(VesselSettings),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VesselSettings {
    pub start_mm: Vec3,
    pub direction_mm: Vec3,
    pub radius_mm: f64,
    /// Relative radius jitter applied at every step.
    pub radius_variation_factor: f64,
    /// Strength of the random direction change applied at every step.
    pub curvature_factor: f64,
    /// Path length after which a branch splits; `None` never splits.
    pub bifurcation_length_mm: Option<f64>,
    /// Overrides the seed derived from the run seed and structure name.
    pub seed: Option<u64>,
}

impl VesselSettings {
    pub fn new(start_mm: Vec3, direction_mm: Vec3, radius_mm: f64) -> Self {
        Self {
            start_mm,
            direction_mm,
            radius_mm,
            radius_variation_factor: 0.0,
            curvature_factor: default_curvature_factor(),
            bifurcation_length_mm: None,
            seed: None,
        }
    }
}

fn default_curvature_factor() -> f64 {
    0.05
}

impl ShapeSettings {
    pub fn kind(&self) -> StructureKind {
        match self {
            ShapeSettings::Background => StructureKind::Background,
            ShapeSettings::HorizontalLayer { .. } => StructureKind::HorizontalLayer,
            ShapeSettings::CircularTubular { .. } => StructureKind::CircularTubular,
            ShapeSettings::EllipticalTubular { .. } => StructureKind::EllipticalTubular,
            ShapeSettings::Parallelepiped { .. } => StructureKind::Parallelepiped,
            ShapeSettings::RectangularCuboid { .. } => StructureKind::RectangularCuboid,
            ShapeSettings::Spherical { .. } => StructureKind::Spherical,
            ShapeSettings::Vessel(_) => StructureKind::Vessel,
        }
    }

    /// Checks numeric ranges without touching the grid.
    pub fn validate(&self, name: &str) -> Result<(), Error> {
        let key = |field: &str| format!("structures.{name}.{field}");
        let positive = |field: &str, value: f64| {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(Error::configuration(
                    key(field),
                    format!("must be positive, got {value}"),
                ))
            }
        };

        match self {
            ShapeSettings::Background => Ok(()),
            ShapeSettings::HorizontalLayer {
                start_z_mm,
                end_z_mm,
            } => {
                if end_z_mm > start_z_mm {
                    Ok(())
                } else {
                    Err(Error::configuration(
                        key("end_mm"),
                        format!("layer ends at {end_z_mm} mm, above its start {start_z_mm} mm"),
                    ))
                }
            }
            ShapeSettings::CircularTubular {
                start_mm,
                end_mm,
                radius_mm,
            } => {
                positive("radius_mm", *radius_mm)?;
                distinct_endpoints(&key("end_mm"), *start_mm, *end_mm)
            }
            ShapeSettings::EllipticalTubular {
                start_mm,
                end_mm,
                radius_mm,
                eccentricity,
            } => {
                positive("radius_mm", *radius_mm)?;
                if !(0.0..1.0).contains(eccentricity) {
                    return Err(Error::configuration(
                        key("eccentricity"),
                        format!("must lie in [0, 1), got {eccentricity}"),
                    ));
                }
                distinct_endpoints(&key("end_mm"), *start_mm, *end_mm)
            }
            ShapeSettings::Parallelepiped { .. } => Ok(()),
            ShapeSettings::RectangularCuboid { size_mm, .. } => {
                for value in size_mm {
                    positive("size_mm", *value)?;
                }
                Ok(())
            }
            ShapeSettings::Spherical { radius_mm, .. } => positive("radius_mm", *radius_mm),
            ShapeSettings::Vessel(vessel) => {
                positive("radius_mm", vessel.radius_mm)?;
                if norm(vessel.direction_mm) <= f64::EPSILON {
                    return Err(Error::configuration(
                        key("direction_mm"),
                        "direction must not be the zero vector",
                    ));
                }
                if !(vessel.radius_variation_factor >= 0.0) {
                    return Err(Error::configuration(
                        key("radius_variation_factor"),
                        "must be non-negative",
                    ));
                }
                if !(vessel.curvature_factor >= 0.0) {
                    return Err(Error::configuration(
                        key("curvature_factor"),
                        "must be non-negative",
                    ));
                }
                if let Some(length) = vessel.bifurcation_length_mm {
                    positive("bifurcation_length_mm", length)?;
                }
                Ok(())
            }
        }
    }
}

fn distinct_endpoints(key: &str, start: Vec3, end: Vec3) -> Result<(), Error> {
    if start == end {
        Err(Error::configuration(key, "tube start and end coincide"))
    } else {
        Ok(())
    }
}

/// A validated structure entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureSettings {
    pub name: String,
    /// Higher priorities claim voxels first. Defaults to 0.
    pub priority: i32,
    pub shape: ShapeSettings,
    pub composition: MolecularComposition,
    pub partial_volume: bool,
    pub adhere_to_deformation: bool,
}

impl StructureSettings {
    pub fn new(
        name: impl Into<String>,
        shape: ShapeSettings,
        composition: MolecularComposition,
    ) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            shape,
            composition,
            partial_volume: false,
            adhere_to_deformation: false,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_partial_volume(mut self, partial_volume: bool) -> Self {
        self.partial_volume = partial_volume;
        self
    }

    pub fn with_deformation_adherence(mut self, adhere: bool) -> Self {
        self.adhere_to_deformation = adhere;
        self
    }

    pub fn kind(&self) -> StructureKind {
        self.shape.kind()
    }
}

/// One `[structures.<name>]` table as written in the settings file.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawStructure {
    #[serde(rename = "type")]
    kind: Option<String>,
    priority: Option<i32>,
    start_mm: Option<Vec3>,
    end_mm: Option<Vec3>,
    radius_mm: Option<f64>,
    eccentricity: Option<f64>,
    size_mm: Option<Vec3>,
    first_edge_mm: Option<Vec3>,
    second_edge_mm: Option<Vec3>,
    third_edge_mm: Option<Vec3>,
    direction_mm: Option<Vec3>,
    radius_variation_factor: Option<f64>,
    curvature_factor: Option<f64>,
    bifurcation_length_mm: Option<f64>,
    seed: Option<u64>,
    #[serde(default)]
    partial_volume: bool,
    #[serde(default)]
    adhere_to_deformation: bool,
    tissue: Option<TissueSpec>,
}

fn require<T>(value: Option<T>, name: &str, field: &str) -> Result<T, Error> {
    value.ok_or_else(|| Error::missing_setting(format!("structures.{name}.{field}")))
}

impl RawStructure {
    pub(crate) fn into_settings(
        self,
        name: String,
        tissues: &TissueLibrary<'_>,
    ) -> Result<StructureSettings, Error> {
        let kind: StructureKind = require(self.kind.as_deref(), &name, "type")?
            .parse()
            .map_err(|e| Error::configuration(format!("structures.{name}.type"), format!("{e}")))?;

        let shape = match kind {
            StructureKind::Background => ShapeSettings::Background,
            StructureKind::HorizontalLayer => ShapeSettings::HorizontalLayer {
                start_z_mm: require(self.start_mm, &name, "start_mm")?[2],
                end_z_mm: require(self.end_mm, &name, "end_mm")?[2],
            },
            StructureKind::CircularTubular => ShapeSettings::CircularTubular {
                start_mm: require(self.start_mm, &name, "start_mm")?,
                end_mm: require(self.end_mm, &name, "end_mm")?,
                radius_mm: require(self.radius_mm, &name, "radius_mm")?,
            },
            StructureKind::EllipticalTubular => ShapeSettings::EllipticalTubular {
                start_mm: require(self.start_mm, &name, "start_mm")?,
                end_mm: require(self.end_mm, &name, "end_mm")?,
                radius_mm: require(self.radius_mm, &name, "radius_mm")?,
                eccentricity: require(self.eccentricity, &name, "eccentricity")?,
            },
            StructureKind::Parallelepiped => ShapeSettings::Parallelepiped {
                start_mm: require(self.start_mm, &name, "start_mm")?,
                edges_mm: [
                    require(self.first_edge_mm, &name, "first_edge_mm")?,
                    require(self.second_edge_mm, &name, "second_edge_mm")?,
                    require(self.third_edge_mm, &name, "third_edge_mm")?,
                ],
            },
            StructureKind::RectangularCuboid => ShapeSettings::RectangularCuboid {
                start_mm: require(self.start_mm, &name, "start_mm")?,
                size_mm: require(self.size_mm, &name, "size_mm")?,
            },
            StructureKind::Spherical => ShapeSettings::Spherical {
                center_mm: require(self.start_mm, &name, "start_mm")?,
                radius_mm: require(self.radius_mm, &name, "radius_mm")?,
            },
            StructureKind::Vessel => ShapeSettings::Vessel(VesselSettings {
                start_mm: require(self.start_mm, &name, "start_mm")?,
                direction_mm: require(self.direction_mm, &name, "direction_mm")?,
                radius_mm: require(self.radius_mm, &name, "radius_mm")?,
                radius_variation_factor: self.radius_variation_factor.unwrap_or(0.0),
                curvature_factor: self
                    .curvature_factor
                    .unwrap_or_else(default_curvature_factor),
                bifurcation_length_mm: self.bifurcation_length_mm,
                seed: self.seed,
            }),
        };

        let tissue = require(self.tissue, &name, "tissue")?;
        let composition = tissues.resolve(&tissue)?;

        Ok(StructureSettings {
            priority: self.priority.unwrap_or(0),
            shape,
            composition,
            partial_volume: self.partial_volume,
            adhere_to_deformation: self.adhere_to_deformation,
            name,
        })
    }
}

/// The `[structures]` table with entries in document order.
#[derive(Debug, Default)]
pub(crate) struct StructureTable(pub(crate) Vec<(String, RawStructure)>);

impl<'de> Deserialize<'de> for StructureTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = StructureTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of named structures")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, entry)) = map.next_entry::<String, RawStructure>()? {
                    entries.push((name, entry));
                }
                Ok(StructureTable(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}
