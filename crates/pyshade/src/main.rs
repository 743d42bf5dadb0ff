use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::warn;

use pyshade::{copy_project, discover_python_files, transform};

#[derive(Parser, Debug)]
#[command(name = "pyshade", version, about = "Copy a Python project and obfuscate its identifiers")]
struct Args {
    /// Input Python project path
    #[arg(long)]
    input: PathBuf,

    /// Output folder path
    #[arg(long)]
    output: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => {
            println!("status=success");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err:#}");
            println!("status=failure");
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    println!("validation:start");
    let (input, output) = validate_paths(&args.input, &args.output)?;
    println!("validation:done");

    println!("copy:start");
    let copy_summary = copy_project(&input, &output).context("copy failed")?;
    println!("copy:done");
    emit_summary(&[
        ("files_copied", copy_summary.files_copied as u64),
        ("dirs_created", copy_summary.dirs_created as u64),
        (
            "paths_skipped_by_gitignore",
            copy_summary.paths_skipped_by_gitignore as u64,
        ),
        (
            "paths_skipped_git_dir",
            copy_summary.paths_skipped_git_dir as u64,
        ),
        ("elapsed_ms", copy_summary.elapsed_ms),
    ]);

    println!("transform:start");
    let files = discover_python_files(&output).context("discovery failed")?;
    let summary = transform(&output, &files).context("transform failed")?;
    println!("transform:done");
    for warning in &summary.warnings {
        warn!("{warning}");
    }
    emit_summary(&[
        (
            "python_files_discovered",
            summary.python_files_discovered as u64,
        ),
        (
            "python_files_processed",
            summary.python_files_processed as u64,
        ),
        (
            "python_files_unchanged",
            summary.python_files_unchanged as u64,
        ),
        ("symbols_discovered", summary.symbols_discovered as u64),
        ("symbols_renamed", summary.symbols_renamed as u64),
        (
            "symbols_skipped_external",
            summary.symbols_skipped_external as u64,
        ),
        (
            "symbols_renamed_likely_local",
            summary.symbols_renamed_likely_local as u64,
        ),
        ("dynamic_name_rewrites", summary.dynamic_name_rewrites as u64),
        ("elapsed_ms", summary.elapsed_ms),
    ]);
    Ok(())
}

/// Enforce the CLI path contract: the input must be an existing project
/// with a `.gitignore`; the output must be absent or an empty directory;
/// the two must not overlap.
fn validate_paths(input: &Path, output: &Path) -> Result<(PathBuf, PathBuf)> {
    let input_abs = std::path::absolute(input)
        .with_context(|| format!("cannot resolve input path {}", input.display()))?;
    let output_abs = std::path::absolute(output)
        .with_context(|| format!("cannot resolve output path {}", output.display()))?;

    if !input_abs.exists() {
        bail!("input path does not exist: {}", input_abs.display());
    }
    if !input_abs.is_dir() {
        bail!("input path must be a directory: {}", input_abs.display());
    }
    if !input_abs.join(".gitignore").exists() {
        bail!("input path must contain .gitignore: {}", input_abs.display());
    }
    if output_abs.is_dir()
        && output_abs
            .read_dir()
            .with_context(|| format!("cannot read output path {}", output_abs.display()))?
            .next()
            .is_some()
    {
        bail!("output path must be empty: {}", output_abs.display());
    }
    if input_abs == output_abs
        || input_abs.starts_with(&output_abs)
        || output_abs.starts_with(&input_abs)
    {
        bail!("input and output paths must not overlap");
    }
    Ok((input_abs, output_abs))
}

fn emit_summary(fields: &[(&str, u64)]) {
    let line = fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!("{line}");
}
