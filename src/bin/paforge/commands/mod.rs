mod batch;
mod compose;
mod library;
mod process;

use anyhow::Result;

use crate::cli::Command;
use crate::display::Context;

pub fn dispatch(command: Command, ctx: Context) -> Result<()> {
    match command {
        Command::Compose(args) => compose::run_compose(args, ctx),
        Command::Process(args) => process::run_process(args, ctx),
        Command::Batch(args) => batch::run_batch(args, ctx),
        Command::Library(args) => library::run_library(args),
    }
}
