//! `coverglow` binary: opens the preview window by default and exposes the
//! `effects`, `check`, and `palette` utility subcommands.

mod cli;
mod commands;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Effects(args)) => commands::effects(&args),
        Some(Command::Check(args)) => commands::check(&args),
        Some(Command::Palette(args)) => commands::palette(&args),
        None => run::run(cli.run),
    }
}
