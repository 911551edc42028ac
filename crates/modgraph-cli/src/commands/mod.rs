//! Command dispatch and handler modules.

mod insight;
mod replay;
mod resolve;

use miette::Result;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Resolve {
            catalog,
            config,
            lock,
            write_lock,
            depth,
            output,
            json,
        } => resolve::exec(catalog, config, lock, write_lock, depth, output, json),
        Command::Insight {
            catalog,
            module,
            config,
        } => insight::exec(&catalog, &module, config),
        Command::Replay { file, depth } => replay::exec(&file, depth),
    }
}
