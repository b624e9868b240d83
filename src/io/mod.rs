//! Persistence of simulation volumes.
//!
//! A composed volume is turned into a set of property maps (absorption and
//! scattering per wavelength, acoustic properties, segmentation, ...). The
//! [`FieldStore`] keeps those maps keyed by [`DataField`](crate::DataField)
//! and wavelength, and can be written to or read from any byte stream as a
//! self-describing JSON document.
//!
//! ```
//! use ndarray::Array3;
//! use pa_forge::DataField;
//! use pa_forge::io::{FieldStore, read_store, write_store};
//!
//! let mut store = FieldStore::new(0.5, vec![800]);
//! store.insert(DataField::Absorption, Some(800), Array3::from_elem((2, 2, 2), 0.1));
//!
//! let mut buffer = Vec::new();
//! write_store(&mut buffer, &store)?;
//! let restored = read_store(buffer.as_slice())?;
//! assert_eq!(restored.get(&DataField::Absorption, Some(800))?[[1, 1, 1]], 0.1);
//! # Ok::<(), pa_forge::io::Error>(())
//! ```

mod error;
mod store;

pub use error::Error;
pub use store::{FieldKey, FieldStore, read_store, write_store};
