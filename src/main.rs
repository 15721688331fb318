use clap::Parser;
use log::LevelFilter;
use rcm2smf::{Converter, Settings};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rcm2smf")]
#[command(version = "0.1.0")]
#[command(about = "Recomposer (RCP/R36/G36/MCP) to Standard MIDI File converter", long_about = None)]
struct Args {
    /// Input song file
    input: PathBuf,

    /// Output SMF file (defaults to the input name with a .mid extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON settings file
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Override a single setting, e.g. `--set noteOff=noteOff`
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Log every skipped or adjusted event
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), rcm2smf::Error> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let mut settings = match &args.settings {
        Some(path) => Settings::from_path(path)?,
        None => Settings::default(),
    };
    for pair in &args.overrides {
        settings.apply_pair(pair)?;
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("mid"));

    Converter::new(settings).convert_file(&args.input, &output)?;
    Ok(())
}
