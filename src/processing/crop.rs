use super::error::Error;
use super::{ProcessingComponent, parse_field};
use crate::io::{FieldKey, FieldStore};
use crate::model::field::DataField;
use log::{debug, info};
use ndarray::s;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use std::ops::Range;

const AXES: [&str; 3] = ["x", "y", "z"];

/// Crops stored volumes to a field of view.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldOfViewCropping {
    /// Fields to crop; `None` crops every stored volume.
    pub fields: Option<Vec<DataField>>,
    /// `[[x0, x1], [y0, y1], [z0, z1]]` in millimetres.
    pub field_of_view_mm: [[f64; 2]; 3],
}

impl FieldOfViewCropping {
    pub const NAME: &'static str = "field_of_view_cropping";

    pub fn new(field_of_view_mm: [[f64; 2]; 3]) -> Self {
        Self {
            fields: None,
            field_of_view_mm,
        }
    }

    pub(crate) fn from_table(table: toml::Table) -> Result<Self, Error> {
        let raw: RawCropping = toml::Value::Table(table).try_into()?;
        let fields = raw
            .fields
            .map(|names| {
                names
                    .iter()
                    .map(|name| parse_field(Self::NAME, "fields", name))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;
        Ok(Self {
            fields,
            field_of_view_mm: raw.field_of_view_mm,
        })
    }

    /// Voxel index ranges of the field of view.
    ///
    /// Bounds are rounded half away from zero; a zero-width range keeps one
    /// voxel.
    pub fn voxel_ranges(&self, spacing_mm: f64) -> Result<[Range<usize>; 3], Error> {
        let mut ranges = [0..0, 0..0, 0..0];
        for (axis, [lo, hi]) in self.field_of_view_mm.iter().copied().enumerate() {
            if !(lo >= 0.0 && hi >= lo) {
                return Err(Error::configuration(
                    Self::NAME,
                    format!("field_of_view_mm.{}", AXES[axis]),
                    format!("expected 0 <= start <= end, got [{lo}, {hi}]"),
                ));
            }
            let start = (lo / spacing_mm).round() as usize;
            let mut end = (hi / spacing_mm).round() as usize;
            if end == start {
                end += 1;
            }
            ranges[axis] = start..end;
        }
        Ok(ranges)
    }

    fn selected_keys(&self, store: &FieldStore) -> Vec<FieldKey> {
        match &self.fields {
            Some(fields) => fields.iter().flat_map(|f| store.keys_of(f)).collect(),
            None => store.keys().cloned().collect(),
        }
    }
}

impl ProcessingComponent for FieldOfViewCropping {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(&self, store: &mut FieldStore, _rng: &mut ChaCha8Rng) -> Result<(), Error> {
        let [rx, ry, rz] = self.voxel_ranges(store.spacing_mm())?;
        let target = [rx.len(), ry.len(), rz.len()];
        info!("Cropping to voxels x {rx:?}, y {ry:?}, z {rz:?}");

        for key in self.selected_keys(store) {
            let data = store.get(&key.field, key.wavelength_nm)?;
            if data.shape() == target {
                debug!("Skipping '{key}', already cropped");
                continue;
            }
            for (axis, (range, &dim)) in [&rx, &ry, &rz].iter().zip(data.shape()).enumerate() {
                if range.end > dim {
                    return Err(Error::configuration(
                        Self::NAME,
                        format!("field_of_view_mm.{}", AXES[axis]),
                        format!(
                            "voxels {range:?} exceed the {dim} voxels of '{key}' along {}",
                            AXES[axis]
                        ),
                    ));
                }
            }
            let cropped = data
                .slice(s![rx.clone(), ry.clone(), rz.clone()])
                .to_owned();
            store.insert(key.field, key.wavelength_nm, cropped);
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCropping {
    fields: Option<Vec<String>>,
    field_of_view_mm: [[f64; 2]; 3],
}
