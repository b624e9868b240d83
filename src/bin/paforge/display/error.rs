use std::io::{self, Write};

use anyhow::Error;

use pa_forge::{LibraryError, SpectrumError, VolumeError};

use crate::util::text::wrap;

#[rustfmt::skip]
pub fn print_error(err: &Error) {
    let mut stderr = io::stderr().lock();

    let _ = writeln!(stderr);
    let _ = writeln!(stderr, "   ╔══════════════════════════════════════════════════════════════╗");
    let _ = writeln!(stderr, "   ║  ✗ Error                                                     ║");
    let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");

    for line in wrap(&err.to_string(), 59) {
        let _ = writeln!(stderr, "   ║  {:<59} ║", line);
    }

    for cause in err.chain().skip(1) {
        let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");
        let _ = writeln!(stderr, "   ║  Caused by:                                                  ║");
        for line in wrap(&cause.to_string(), 57) {
            let _ = writeln!(stderr, "   ║    {:<57} ║", line);
        }
    }

    let hints = HintCollector::collect(err);
    if !hints.is_empty() {
        let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");
        let _ = writeln!(stderr, "   ║  Hints:                                                      ║");
        for hint in hints {
            let wrapped = wrap(&hint, 55);
            if let Some((first, rest)) = wrapped.split_first() {
                let _ = writeln!(stderr, "   ║    • {:<55} ║", first);
                for line in rest {
                    let _ = writeln!(stderr, "   ║      {:<55} ║", line);
                }
            }
        }
    }

    let _ = writeln!(stderr, "   ╚══════════════════════════════════════════════════════════════╝");
    let _ = writeln!(stderr);
}

#[derive(Default)]
struct HintCollector {
    hints: Vec<String>,
    typed: bool,
}

impl HintCollector {
    fn collect(err: &Error) -> Vec<String> {
        let mut collector = Self::default();

        for cause in err.chain() {
            if let Some(e) = cause.downcast_ref::<VolumeError>() {
                collector.volume_hints(e);
            } else if let Some(e) = cause.downcast_ref::<pa_forge::processing::Error>() {
                collector.processing_hints(e);
            } else if let Some(e) = cause.downcast_ref::<LibraryError>() {
                collector.library_hints(e);
            } else if let Some(e) = cause.downcast_ref::<pa_forge::io::Error>() {
                collector.store_hints(e);
            } else if let Some(e) = cause.downcast_ref::<io::Error>() {
                collector.std_io_hints(e);
            }
            if collector.typed {
                break;
            }
        }

        if !collector.typed {
            collector.fallback_hints(err);
        }
        collector.hints
    }

    fn add(&mut self, hint: impl Into<String>) {
        self.hints.push(hint.into());
        self.typed = true;
    }

    fn volume_hints(&mut self, err: &VolumeError) {
        match err {
            VolumeError::Configuration { key, .. } => {
                self.add(format!("Check the '{key}' entry of the settings file"));
                if key.starts_with("structures") {
                    self.add("Every volume needs exactly one structure of type \"background\"");
                }
            }
            VolumeError::SettingsParse(_) => {
                self.add("The settings file is not valid TOML or has a wrongly typed value");
                self.add("Required tables: [simulation] and [structures.<name>]");
            }
            VolumeError::GeometryMismatch { structure, .. } => {
                self.add(format!(
                    "Fraction fields of '{structure}' must have the grid's voxel dimensions"
                ));
            }
            VolumeError::VolumeFraction { .. } => {
                self.add("Volume fractions of a tissue must not sum to more than 1");
            }
            VolumeError::MissingField(name) => {
                self.add(format!("Explicit deformations need a '{name}' array"));
            }
            VolumeError::OutOfBounds { .. } => {
                self.add("Explicit deformation control points must cover the whole x-y extent");
            }
            VolumeError::Library(inner) => self.library_hints(inner),
        }
    }

    fn library_hints(&mut self, err: &LibraryError) {
        match err {
            LibraryError::ParameterParse(_) => {
                self.add("The molecule library file has invalid TOML syntax");
                self.add("Compare it with `paforge library` output for the expected names");
            }
            LibraryError::UnknownMolecule(name) => {
                self.add(format!("No molecule named '{name}' in the library"));
                self.add("Run `paforge library` to list the available molecules");
            }
            LibraryError::WavelengthOutOfRange { source, .. } => {
                if let SpectrumError::OutOfRange { min_nm, max_nm, .. } = source {
                    self.add(format!(
                        "Choose wavelengths between {min_nm} and {max_nm} nm"
                    ));
                }
                self.add("Override wavelengths with --wavelengths");
            }
            LibraryError::VolumeFraction { .. } => {
                self.add("Blood, melanin and water fractions of a preset must not exceed 1");
            }
            LibraryError::InvalidParameter { parameter, .. } => {
                self.add(format!("Adjust '{parameter}' in the tissue table"));
            }
        }
    }

    fn processing_hints(&mut self, err: &pa_forge::processing::Error) {
        use pa_forge::processing::Error as ProcessingError;

        match err {
            ProcessingError::Store(inner) => self.store_hints(inner),
            ProcessingError::Configuration { component, key, .. } => {
                self.add(format!("Check '{key}' of the {component} step"));
                self.add(
                    "Known components: poisson_noise, gaussian_noise, field_of_view_cropping, linear_unmixing",
                );
            }
            ProcessingError::SettingsParse(_) => {
                self.add("The pipeline file is not valid TOML");
                self.add("Steps are [[processing]] tables with a 'component' key");
            }
            ProcessingError::Distribution { .. } => {
                self.add("Noise parameters must be finite; standard deviations non-negative");
            }
            ProcessingError::Library(inner) => self.library_hints(inner),
            ProcessingError::Singular { .. } => {
                self.add("Chromophore spectra are linearly dependent at these wavelengths");
                self.add("Use more wavelengths or fewer chromophores");
            }
            ProcessingError::ShapeMismatch { .. } => {
                self.add("Crop every wavelength of a field before unmixing it");
            }
        }
    }

    fn store_hints(&mut self, err: &pa_forge::io::Error) {
        use pa_forge::io::Error as StoreError;

        match err {
            StoreError::Io { source } => self.std_io_hints(source),
            StoreError::Serialization(_) => {
                self.add("The input is not a field store written by `paforge compose`");
            }
            StoreError::MissingField { field, .. } => {
                self.add(format!("Add the '{field}' volume before running this step"));
                self.add("Solver outputs such as fluence must be inserted by the solver");
            }
            StoreError::UnsupportedFormat { .. } => {
                self.add("Re-create the field store with this version of paforge");
            }
        }
    }

    fn std_io_hints(&mut self, source: &io::Error) {
        use io::ErrorKind;

        match source.kind() {
            ErrorKind::NotFound => {
                self.add("Check the path spelling and ensure the file exists");
            }
            ErrorKind::PermissionDenied => {
                self.add("Check file permissions with `ls -la`");
            }
            ErrorKind::InvalidData | ErrorKind::UnexpectedEof => {
                self.add("The file may be truncated or not UTF-8 text");
            }
            ErrorKind::BrokenPipe => {
                self.add("Output consumer terminated before the store was written");
            }
            _ => {
                self.add("Check file path, permissions, and disk space");
            }
        }
    }

    fn fallback_hints(&mut self, err: &Error) {
        let msg = error_chain_text(err);

        if msg.contains("terminal") || msg.contains("stdin") {
            self.add("Provide input via -i/--input or pipe data to stdin");
        } else if msg.contains("stdout") {
            self.add("Write the store with -o/--output or redirect stdout");
        }
    }
}

fn error_chain_text(err: &Error) -> String {
    err.chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase()
}
