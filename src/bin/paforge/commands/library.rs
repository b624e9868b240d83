use std::io::{self, Write};

use anyhow::Result;

use pa_forge::TissueLibrary;

use crate::cli::LibraryArgs;
use crate::display::{print_molecule_library, print_tissue_presets};
use crate::io::load_molecules;

pub fn run_library(args: LibraryArgs) -> Result<()> {
    let molecules = load_molecules(args.molecules.as_deref())?;
    let tissues = TissueLibrary::new(&molecules);

    let mut out = io::stdout().lock();
    print_molecule_library(&mut out, &molecules, args.wavelength);
    writeln!(out)?;
    print_tissue_presets(&mut out, &tissues, args.wavelength);
    out.flush()?;
    Ok(())
}
