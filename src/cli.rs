use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Compiled grammar artifact; the built-in Moon tables when omitted
    #[arg(long, global = true)]
    pub grammar: Option<PathBuf>,
    /// Machine configuration (.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Log every pipeline stage
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Assemble `[lib ...] main` into <output>/<main>.json and <main>.bin
    Asm {
        /// Library sources followed by the main source
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory
        #[arg(short, long, default_value = "out")]
        output: PathBuf,
    },
    /// Run `[lib ...] main` sources, or a single .json program image
    Run {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Start in step mode and stop at `debug*` symbols
        #[arg(long)]
        debug: bool,
        /// Write the mutation history here as JSON
        #[arg(long)]
        trace: Option<PathBuf>,
    },
    /// Write the built-in tables as a grammar artifact
    Grammar { output: PathBuf },
}
