use anyhow::{Context, Result, bail};

use pa_forge::RunContext;
use pa_forge::io::{read_store, write_store};
use pa_forge::processing::run_pipeline;

use super::compose::{output_name, read_steps, step_names};
use crate::cli::ProcessArgs;
use crate::display::{Context as DisplayContext, Progress, print_field_summary};
use crate::io::{create_output, load_molecules, open_input, stdin_is_tty, stdout_is_tty};

const TOTAL_STEPS: u8 = 3;

pub fn run_process(args: ProcessArgs, ctx: DisplayContext) -> Result<()> {
    if args.io.input.is_none() && stdin_is_tty() {
        bail!(
            "No field store specified and stdin is a terminal.\n\nUsage: paforge process -i <STORE> -p <PIPELINE> or pipe the store via stdin."
        );
    }
    if args.io.output.is_none() && stdout_is_tty() {
        bail!(
            "No output file specified and stdout is a terminal.\n\nUsage: paforge process -i <STORE> -p <PIPELINE> -o <STORE> or redirect stdout."
        );
    }

    let mut progress = Progress::new(ctx.interactive, TOTAL_STEPS);

    progress.step("Reading field store");
    let molecules = load_molecules(args.molecules.as_deref())?;
    let steps = read_steps(&args.pipeline, &molecules)?;
    let mut store = read_store(open_input(args.io.input.as_deref())?)
        .context("Failed to read field store")?;
    progress.complete_step(
        "Reading field store",
        &[
            format!("{} volumes", store.len()),
            format!("{} processing steps", steps.len()),
        ],
    );

    progress.step("Running processing steps");
    run_pipeline(&mut store, &steps, &RunContext::new(args.seed)).context("Processing failed")?;
    progress.complete_step("Running processing steps", &step_names(&steps));

    if ctx.interactive {
        print_field_summary(&store);
    }

    progress.step("Writing field store");
    let writer = create_output(args.io.output.as_deref())?;
    write_store(writer, &store).context("Failed to write field store")?;
    progress.complete_step("Writing field store", &[output_name(args.io.output.as_deref())]);

    progress.finish("Processing complete");
    Ok(())
}
