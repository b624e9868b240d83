use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, IsTerminal, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};

use pa_forge::MoleculeLibrary;

pub fn stderr_is_tty() -> bool {
    io::stderr().is_terminal()
}

pub fn stdin_is_tty() -> bool {
    io::stdin().is_terminal()
}

pub fn stdout_is_tty() -> bool {
    io::stdout().is_terminal()
}

/// Buffered reader over `path`, or stdin when no path is given.
pub fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    let Some(p) = path else {
        return Ok(Box::new(BufReader::new(io::stdin())));
    };
    let file =
        File::open(p).with_context(|| format!("Failed to open input file: {}", p.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Reads a whole text document, from `path` or stdin.
pub fn read_text(path: Option<&Path>) -> Result<String> {
    let mut text = String::new();
    open_input(path)?
        .read_to_string(&mut text)
        .with_context(|| match path {
            Some(p) => format!("Failed to read {}", p.display()),
            None => "Failed to read stdin".to_string(),
        })?;
    Ok(text)
}

/// Buffered writer to `path`, or stdout when no path is given.
pub fn create_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    let Some(p) = path else {
        return Ok(Box::new(BufWriter::new(io::stdout().lock())));
    };
    let file = File::create(p)
        .with_context(|| format!("Failed to create output file: {}", p.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

/// The built-in library, or the one parsed from `path`.
pub fn load_molecules(path: Option<&Path>) -> Result<MoleculeLibrary> {
    match path {
        Some(p) => {
            let text = fs::read_to_string(p)
                .with_context(|| format!("Failed to read molecule library: {}", p.display()))?;
            MoleculeLibrary::from_toml(&text).context("Invalid molecule library")
        }
        None => Ok(MoleculeLibrary::builtin().clone()),
    }
}
