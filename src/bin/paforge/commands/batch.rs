use anyhow::{Context, Result, bail};

use pa_forge::io::write_store;
use pa_forge::processing::run_pipeline;
use pa_forge::{RunContext, compose_batch};

use super::compose::{parse_settings, parse_steps, step_names};
use crate::cli::BatchArgs;
use crate::display::{Context as DisplayContext, Progress, print_batch_summary, print_settings_summary};
use crate::io::{create_output, load_molecules, read_text, stdin_is_tty};
use crate::util::path::with_suffix;

const TOTAL_STEPS: u8 = 3;

pub fn run_batch(args: BatchArgs, ctx: DisplayContext) -> Result<()> {
    if args.input.is_none() && stdin_is_tty() {
        bail!(
            "No settings file specified and stdin is a terminal.\n\nUsage: paforge batch -i <SETTINGS> -o <STORE> --seeds 1,2,3"
        );
    }

    let mut progress = Progress::new(ctx.interactive, TOTAL_STEPS);

    progress.step("Reading settings");
    let molecules = load_molecules(args.molecules.as_deref())?;
    let text = read_text(args.input.as_deref())?;
    let settings = parse_settings(&text, &molecules, None, &args.wavelengths)?;
    let steps = parse_steps(&text, &molecules).context("Invalid [[processing]] tables in settings")?;
    progress.complete_step(
        "Reading settings",
        &[format!(
            "{} seeds × {} structures",
            args.seeds.len(),
            settings.structures.len()
        )],
    );

    if ctx.interactive {
        print_settings_summary(&settings);
    }

    progress.step("Composing volumes");
    let results = compose_batch(&settings, &args.seeds);
    let mut stores = Vec::with_capacity(results.len());
    for (seed, result) in args.seeds.iter().zip(results) {
        let mut store = result.with_context(|| format!("Composition failed for seed {seed}"))?;
        run_pipeline(&mut store, &steps, &RunContext::new(*seed))
            .with_context(|| format!("Processing failed for seed {seed}"))?;
        stores.push((*seed, store));
    }
    progress.complete_step("Composing volumes", &step_names(&steps));

    progress.step("Writing field stores");
    let mut outputs = Vec::with_capacity(stores.len());
    for (seed, store) in &stores {
        let path = with_suffix(&args.output, &format!("_seed{seed}"));
        let writer = create_output(Some(&path))?;
        write_store(writer, store)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        outputs.push((*seed, path));
    }
    progress.complete_step(
        "Writing field stores",
        &[format!("{} stores", outputs.len())],
    );

    if ctx.interactive {
        print_batch_summary(&outputs);
    }

    progress.finish("Batch complete");
    Ok(())
}
