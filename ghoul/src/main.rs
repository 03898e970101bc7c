#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ghoul_ast::{AsgContext, FileId};
use ghoul_sema::Target;
use miette::{IntoDiagnostic, NamedSource, WrapErr};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ghoul", version, about = "Front-end for the Ghoul language")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse, resolve and mangle the given `.ghoul` source files.
    Build {
        /// Source files, processed in argument order.
        files: Vec<PathBuf>,

        /// Target descriptor; defaults to the host.
        #[arg(long)]
        target: Option<String>,

        /// Print every mangled symbol once the pipeline completes.
        #[arg(long)]
        emit_symbols: bool,
    },
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GHOUL_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Build {
            files,
            target,
            emit_symbols,
        } => build(files, target, emit_symbols),
    }
}

fn build(files: Vec<PathBuf>, target: Option<String>, emit_symbols: bool) -> miette::Result<()> {
    if files.is_empty() {
        miette::bail!("no input files");
    }

    let target = match target {
        Some(triple) => Target::from_triple(&triple),
        None => Target::host(),
    };
    info!(triple = %target.triple, "building");

    let mut ctx = AsgContext::new();

    for path in &files {
        let text = fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("file `{}` was not found", path.display()))?;
        let file = ctx.add_file(path.display().to_string(), text);

        if let Err(err) = ghoul_parse::parse_file(&mut ctx, file) {
            return Err(miette::Report::new(err).with_source_code(named_source(&ctx, file)));
        }
    }

    if let Err(err) = ghoul_sema::run_passes(&mut ctx, &target) {
        let file = err.file.unwrap_or_else(|| ctx.files()[0].id);
        return Err(miette::Report::new(err).with_source_code(named_source(&ctx, file)));
    }

    if let Err(err) = ghoul_mangle::mangle_files(&mut ctx) {
        let file = ctx.files()[0].id;
        return Err(miette::Report::new(err).with_source_code(named_source(&ctx, file)));
    }

    if emit_symbols {
        for symbol in ghoul_mangle::collect_symbols(&ctx) {
            println!("{symbol}");
        }
    }

    info!(files = files.len(), decls = ctx.decl_count(), "front-end finished");
    Ok(())
}

fn named_source(ctx: &AsgContext, file: FileId) -> NamedSource<String> {
    let file = ctx.file(file);
    NamedSource::new(file.path.clone(), file.text.clone())
}
