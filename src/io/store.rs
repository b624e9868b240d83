use super::error::Error;
use crate::model::field::DataField;
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};

const FORMAT_NAME: &str = "pa-forge-fields";
const FORMAT_VERSION: u32 = 1;

/// Address of one volume in a [`FieldStore`].
///
/// Wavelength-independent fields are always keyed without a wavelength,
/// whatever the caller passes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    pub field: DataField,
    pub wavelength_nm: Option<u32>,
}

impl FieldKey {
    pub fn new(field: DataField, wavelength_nm: Option<u32>) -> Self {
        let wavelength_nm = if field.is_wavelength_dependent() {
            wavelength_nm
        } else {
            None
        };
        Self {
            field,
            wavelength_nm,
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.wavelength_nm {
            Some(nm) => write!(f, "{}@{}nm", self.field, nm),
            None => write!(f, "{}", self.field),
        }
    }
}

/// Keyed collection of simulation volumes.
///
/// Holds every derived property map of a run (per wavelength where the
/// property depends on it) together with the voxel spacing and the
/// wavelength list the run was configured with. Processing components read
/// and write fields through this store.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldStore {
    spacing_mm: f64,
    wavelengths: Vec<u32>,
    fields: BTreeMap<FieldKey, Array3<f64>>,
}

impl FieldStore {
    pub fn new(spacing_mm: f64, wavelengths: Vec<u32>) -> Self {
        Self {
            spacing_mm,
            wavelengths,
            fields: BTreeMap::new(),
        }
    }

    pub fn spacing_mm(&self) -> f64 {
        self.spacing_mm
    }

    pub fn wavelengths(&self) -> &[u32] {
        &self.wavelengths
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Stores `data`, returning the volume it replaced.
    pub fn insert(
        &mut self,
        field: DataField,
        wavelength_nm: Option<u32>,
        data: Array3<f64>,
    ) -> Option<Array3<f64>> {
        self.fields.insert(FieldKey::new(field, wavelength_nm), data)
    }

    pub fn contains(&self, field: &DataField, wavelength_nm: Option<u32>) -> bool {
        self.fields
            .contains_key(&FieldKey::new(field.clone(), wavelength_nm))
    }

    pub fn get(&self, field: &DataField, wavelength_nm: Option<u32>) -> Result<&Array3<f64>, Error> {
        let key = FieldKey::new(field.clone(), wavelength_nm);
        self.fields
            .get(&key)
            .ok_or_else(|| Error::missing_field(field, key.wavelength_nm))
    }

    pub fn get_mut(
        &mut self,
        field: &DataField,
        wavelength_nm: Option<u32>,
    ) -> Result<&mut Array3<f64>, Error> {
        let key = FieldKey::new(field.clone(), wavelength_nm);
        let missing = Error::missing_field(field, key.wavelength_nm);
        self.fields.get_mut(&key).ok_or(missing)
    }

    pub fn remove(&mut self, field: &DataField, wavelength_nm: Option<u32>) -> Option<Array3<f64>> {
        self.fields
            .remove(&FieldKey::new(field.clone(), wavelength_nm))
    }

    pub fn keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.fields.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &Array3<f64>)> {
        self.fields.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&FieldKey, &mut Array3<f64>)> {
        self.fields.iter_mut()
    }

    /// Keys of every stored volume of `field`, across wavelengths.
    pub fn keys_of(&self, field: &DataField) -> Vec<FieldKey> {
        self.fields
            .keys()
            .filter(|key| &key.field == field)
            .cloned()
            .collect()
    }
}

#[derive(Serialize, Deserialize)]
struct StoreFile {
    format: String,
    version: u32,
    spacing_mm: f64,
    wavelengths: Vec<u32>,
    fields: Vec<StoredField>,
}

#[derive(Serialize, Deserialize)]
struct StoredField {
    field: DataField,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wavelength_nm: Option<u32>,
    data: Array3<f64>,
}

/// Serializes `store` as JSON.
pub fn write_store<W: Write>(mut writer: W, store: &FieldStore) -> Result<(), Error> {
    let file = StoreFile {
        format: FORMAT_NAME.to_string(),
        version: FORMAT_VERSION,
        spacing_mm: store.spacing_mm,
        wavelengths: store.wavelengths.clone(),
        fields: store
            .fields
            .iter()
            .map(|(key, data)| StoredField {
                field: key.field.clone(),
                wavelength_nm: key.wavelength_nm,
                data: data.clone(),
            })
            .collect(),
    };
    serde_json::to_writer(&mut writer, &file)?;
    writer.flush()?;
    Ok(())
}

/// Reads a store written by [`write_store`].
pub fn read_store<R: Read>(reader: R) -> Result<FieldStore, Error> {
    let file: StoreFile = serde_json::from_reader(reader)?;
    if file.format != FORMAT_NAME || file.version != FORMAT_VERSION {
        return Err(Error::UnsupportedFormat {
            format: file.format,
            version: file.version,
        });
    }
    let mut store = FieldStore::new(file.spacing_mm, file.wavelengths);
    for stored in file.fields {
        store.insert(stored.field, stored.wavelength_nm, stored.data);
    }
    Ok(store)
}
