pub mod cli;
pub mod config;
pub mod error;
pub mod grammar;
pub mod log;
pub mod machine;
pub mod model;
pub mod processor;
pub mod writer;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Parser;

use cli::Command;
use config::Config;
use grammar::Tables;
use machine::{StdioHost, Vm};
use model::ProgramImage;
use processor::Assembler;

pub fn run() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    if args.verbose {
        log::set_level(log::Level::Debug);
    }

    // 1. ── Load configuration and tables ──────────────────────────────
    let mut config = load_config(args.config.as_deref())?;
    let tables = load_tables(args.grammar.as_deref())?;

    match args.command {
        // 2. ── Assemble and write outputs ─────────────────────────────
        Command::Asm { inputs, output } => {
            let image = assemble(&tables, &config, &inputs)?;

            std::fs::create_dir_all(&output)
                .with_context(|| format!("Creating {}", output.display()))?;
            let main = inputs.last().context("No input files")?;
            let stem = main.file_stem().unwrap_or(main.as_os_str());
            let json_path = output.join(stem).with_extension("json");
            let bin_path = output.join(stem).with_extension("bin");

            writer::json::emit_image(&image, &json_path)
                .with_context(|| format!("Writing {}", json_path.display()))?;
            writer::bin::emit(&image, config.address_size(), &bin_path)
                .with_context(|| format!("Writing {}", bin_path.display()))?;
            info!("asm", "wrote {} and {}", json_path.display(), bin_path.display());
        }

        // 3. ── Execute ────────────────────────────────────────────────
        Command::Run {
            inputs,
            debug,
            trace,
        } => {
            config.debug |= debug;
            let image = match inputs.as_slice() {
                [input] if input.extension().is_some_and(|ext| ext == "json") => {
                    let json = std::fs::read_to_string(input)
                        .with_context(|| format!("Reading {}", input.display()))?;
                    writer::json::load_image(&json).with_context(|| "Parsing program image")?
                }
                _ => assemble(&tables, &config, &inputs)?,
            };

            let mut vm = Vm::new(&image, &config).with_context(|| "Booting the machine")?;
            let halt = vm.run(&mut StdioHost::new());
            info!("run", "halted: {halt} after {} events", vm.history().len());

            if let Some(path) = trace {
                writer::json::emit_trace(vm.history(), &path)
                    .with_context(|| format!("Writing {}", path.display()))?;
            }
            if halt.is_fault() {
                bail!("program faulted: {halt}");
            }
        }

        Command::Grammar { output } => {
            let bytes = tables.encode().with_context(|| "Encoding grammar artifact")?;
            std::fs::write(&output, bytes)
                .with_context(|| format!("Writing {}", output.display()))?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Reading {}", path.display()))?;
            Config::from_json(&json).with_context(|| "Parsing configuration")?
        }
        None => Config::default(),
    };
    config.validate().with_context(|| "Invalid configuration")?;
    debug!("config", "{} bits, {} bytes of memory", config.bits, config.memory_size());
    Ok(config)
}

fn load_tables(path: Option<&Path>) -> anyhow::Result<Tables> {
    let tables = match path {
        Some(path) => {
            let bytes = std::fs::read(path).with_context(|| format!("Reading {}", path.display()))?;
            Tables::decode(&bytes).with_context(|| format!("Decoding {}", path.display()))?
        }
        None => Tables::moon().with_context(|| "Building the built-in grammar")?,
    };
    debug!(
        "grammar",
        "{} automaton nodes, {} grammar atoms",
        tables.automaton.nodes().len(),
        tables.grammar.atoms().len()
    );
    Ok(tables)
}

/// Assembles the library files and the main file, in command-line order.
fn assemble(tables: &Tables, config: &Config, inputs: &[PathBuf]) -> anyhow::Result<ProgramImage> {
    let mut sources = Vec::with_capacity(inputs.len());
    for input in inputs {
        let source = std::fs::read_to_string(input)
            .with_context(|| format!("Reading {}", input.display()))?;
        sources.push(source);
    }
    let names: Vec<String> = inputs.iter().map(|p| p.display().to_string()).collect();
    let assembler = Assembler::new(tables, config)?;
    assembler
        .assemble_all(&sources)
        .with_context(|| format!("Assembling {}", names.join(" + ")))
}
