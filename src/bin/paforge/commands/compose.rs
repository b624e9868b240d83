use std::path::Path;

use anyhow::{Context, Result, bail};

use pa_forge::io::write_store;
use pa_forge::processing::{ProcessingSettings, ProcessingStep, run_pipeline};
use pa_forge::{MoleculeLibrary, RunContext, SimulationSettings, compose};

use crate::cli::ComposeArgs;
use crate::display::{
    Context as DisplayContext, Progress, print_field_summary, print_molecule_fractions,
    print_segmentation, print_settings_summary,
};
use crate::io::{create_output, load_molecules, read_text, stdin_is_tty, stdout_is_tty};

const TOTAL_STEPS: u8 = 5;

pub fn run_compose(args: ComposeArgs, ctx: DisplayContext) -> Result<()> {
    if args.io.input.is_none() && stdin_is_tty() {
        bail!(
            "No settings file specified and stdin is a terminal.\n\nUsage: paforge compose -i <SETTINGS> or pipe the settings via stdin."
        );
    }
    if args.io.output.is_none() && stdout_is_tty() {
        bail!(
            "No output file specified and stdout is a terminal.\n\nUsage: paforge compose -i <SETTINGS> -o <STORE> or redirect stdout."
        );
    }

    let mut progress = Progress::new(ctx.interactive, TOTAL_STEPS);

    progress.step("Reading settings");
    let molecules = load_molecules(args.simulation.molecules.as_deref())?;
    let text = read_text(args.io.input.as_deref())?;
    let settings = parse_settings(
        &text,
        &molecules,
        args.simulation.seed,
        &args.simulation.wavelengths,
    )?;
    let mut steps = if args.no_processing {
        Vec::new()
    } else {
        parse_steps(&text, &molecules).context("Invalid [[processing]] tables in settings")?
    };
    if let Some(path) = &args.pipeline {
        steps.extend(read_steps(path, &molecules)?);
    }
    progress.complete_step(
        "Reading settings",
        &[
            format!("{} structures", settings.structures.len()),
            format!("{} processing steps", steps.len()),
        ],
    );

    if ctx.interactive {
        print_settings_summary(&settings);
    }

    progress.step("Compositing structures");
    let volume = compose(&settings).context("Volume composition failed")?;
    progress.complete_step(
        "Compositing structures",
        &[format!("Order: {}", volume.structure_order().join(" › "))],
    );

    if ctx.interactive {
        print_segmentation(&volume);
        print_molecule_fractions(&volume);
    }

    progress.step("Deriving property fields");
    let mut store = volume
        .derive_fields(&settings.wavelengths)
        .context("Property derivation failed")?;
    progress.complete_step(
        "Deriving property fields",
        &[format!("{} volumes", store.len())],
    );

    progress.step("Running processing steps");
    run_pipeline(&mut store, &steps, &RunContext::new(settings.random_seed))
        .context("Processing failed")?;
    progress.complete_step("Running processing steps", &step_names(&steps));

    if ctx.interactive {
        print_field_summary(&store);
    }

    progress.step("Writing field store");
    let writer = create_output(args.io.output.as_deref())?;
    write_store(writer, &store).context("Failed to write field store")?;
    progress.complete_step("Writing field store", &[output_name(args.io.output.as_deref())]);

    progress.finish("Volume complete");
    Ok(())
}

/// Parses settings and applies the command-line overrides.
pub(super) fn parse_settings(
    text: &str,
    molecules: &MoleculeLibrary,
    seed: Option<u64>,
    wavelengths: &[u32],
) -> Result<SimulationSettings> {
    let mut settings = SimulationSettings::from_toml_str_with_library(text, molecules)
        .context("Invalid simulation settings")?;
    if let Some(seed) = seed {
        settings.random_seed = seed;
    }
    if !wavelengths.is_empty() {
        settings.wavelengths = wavelengths.to_vec();
        settings
            .validate()
            .context("Invalid --wavelengths override")?;
    }
    Ok(settings)
}

pub(super) fn parse_steps(text: &str, molecules: &MoleculeLibrary) -> Result<Vec<ProcessingStep>> {
    Ok(ProcessingSettings::from_toml_str_with_library(text, molecules)?.steps)
}

pub(super) fn read_steps(path: &Path, molecules: &MoleculeLibrary) -> Result<Vec<ProcessingStep>> {
    let text = read_text(Some(path))?;
    parse_steps(&text, molecules)
        .with_context(|| format!("Invalid processing pipeline: {}", path.display()))
}

pub(super) fn step_names(steps: &[ProcessingStep]) -> Vec<String> {
    if steps.is_empty() {
        return vec!["No steps configured".to_string()];
    }
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}", i + 1, step.component().name()))
        .collect()
}

pub(super) fn output_name(path: Option<&Path>) -> String {
    match path {
        Some(p) => format!("→ {}", p.display()),
        None => "→ stdout".to_string(),
    }
}
