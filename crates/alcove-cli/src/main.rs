//! Alcove sandbox console.
//!
//! Interactive front end for the engine: load module images into
//! isolated sandboxes, construct objects, invoke methods, and manage
//! variables, from a REPL or a command script.

mod output;
mod parse;
mod repl;
mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};

use output::{color_choice, StyledOutput};
use session::Session;

#[derive(Parser)]
#[command(name = "alcove")]
#[command(about = "Sandboxed module loading and reflective invocation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive console (the default)
    Repl,
    /// Run commands from a script file
    Run {
        /// Script of console commands, one per line
        file: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let out = StyledOutput::new(color_choice());
    let session = Session::new(StyledOutput::new(color_choice()));

    match cli.command {
        None | Some(Commands::Repl) => repl::run(session, out),
        Some(Commands::Run { file }) => {
            let source = std::fs::read_to_string(&file)?;
            let mut session = session;
            repl::run_script(&mut session, &source)
        }
    }
}
