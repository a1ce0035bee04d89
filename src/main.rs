//! arm-coder - edit puzzle solutions as arm program text
//!
//! # Commands
//!
//! - `arm-coder decompile` - Turn the instructions of every arm into program text
//! - `arm-coder export` - Compile the programs of a `.solutionx` back into a `.solution`
//!
//! # Usage
//!
//! ```bash
//! # Print the programs of a solution
//! arm-coder decompile P007.solution
//!
//! # Store them next to the solution for editing
//! arm-coder decompile P007.solution -o P007.solutionx
//!
//! # Compile the edited programs for the game
//! arm-coder export P007.solutionx -o P007-generated.solution
//! ```

use anyhow::{Context, Result, bail};
use arm_coder::{
    CodedSolution, CoderConfig, ExportSession, Solution, decompile, normalize_line_endings,
};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Edit puzzle solutions as arm program text
#[derive(Parser)]
#[command(name = "arm-coder")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Settings {
    /// TOML file with compiler settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Total time a `wait` may block before its arm is reported invalid
    #[arg(long, global = true)]
    wait_timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn the instructions of every arm into program text
    Decompile {
        /// `.solution` or `.solutionx` file
        input: PathBuf,

        /// Write a `.solutionx` carrying the programs instead of printing them
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compile the programs of a `.solutionx` into a `.solution`
    Export {
        /// `.solutionx` file
        input: PathBuf,

        /// Output path (defaults to `<puzzle>-generated.solution`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Target a different puzzle
        #[arg(long)]
        puzzle: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.settings)?;

    match cli.command {
        Commands::Decompile { input, output } => run_decompile(&input, output.as_deref()),
        Commands::Export {
            input,
            output,
            puzzle,
        } => run_export(config, &input, output, puzzle),
    }
}

fn load_config(settings: &Settings) -> Result<CoderConfig> {
    let mut config = match &settings.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => CoderConfig::default(),
    };
    if let Some(ms) = settings.wait_timeout_ms {
        config.wait_timeout_ms = ms;
    }
    Ok(config)
}

fn read_coded(path: &Path) -> Result<CodedSolution> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let coded = match path.extension().and_then(|ext| ext.to_str()) {
        Some("solutionx") => CodedSolution::read(reader),
        Some("solution") => Solution::read(reader).map(|solution| CodedSolution {
            code: Vec::new(),
            solution,
        }),
        _ => bail!("Unknown file type: {}", path.display()),
    }
    .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(coded)
}

fn run_decompile(input: &Path, output: Option<&Path>) -> Result<()> {
    let mut coded = read_coded(input)?;
    coded.solution.attach_tracks();

    let mut code = Vec::new();
    for part in coded.solution.programmable_parts() {
        let text = match coded.program(part) {
            Some(text) => text.to_owned(),
            None => decompile(part),
        };
        code.push((part.program_key(), text));
    }
    code.extend(
        coded
            .macros()
            .map(|(name, body)| (name.to_owned(), body.to_owned())),
    );
    coded.code = code;

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            coded.write(&mut writer)?;
            writer.flush()?;
            info!(programs = coded.solution.programmable_parts().len(), path = %path.display(), "wrote programs");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            for (key, text) in &coded.code {
                writeln!(stdout, "== {key}")?;
                write!(stdout, "{}", text.replace("\r\n", "\n"))?;
            }
        }
    }
    Ok(())
}

fn run_export(
    config: CoderConfig,
    input: &Path,
    output: Option<PathBuf>,
    puzzle: Option<String>,
) -> Result<()> {
    let mut coded = read_coded(input)?;
    coded.solution.attach_tracks();

    let mut session = ExportSession::new(config);
    let macros: Vec<(String, String)> = coded
        .macros()
        .map(|(name, body)| (name.to_owned(), normalize_line_endings(body)))
        .collect();
    session
        .load_macros(macros.iter().map(|(name, body)| (name.as_str(), body.as_str())))
        .context("Malformed macro")?;

    let texts: Vec<Option<String>> = coded
        .solution
        .programmable_parts()
        .into_iter()
        .map(|part| coded.program(part).map(normalize_line_endings))
        .collect();
    let mut programs = Vec::new();
    for (part, text) in coded.solution.programmable_parts_mut().into_iter().zip(&texts) {
        match text {
            Some(text) => programs.push((part, text.as_str())),
            None => warn!(part = %part.program_key(), "no program stored, keeping instructions"),
        }
    }

    let report = session.export(programs).context("Malformed program")?;
    if !report.is_complete() {
        for failure in &report.failures {
            for issue in &failure.issues {
                eprintln!("{}: {issue}", failure.part);
            }
        }
        bail!(
            "{} of {} arms could not be compiled",
            report.failures.len(),
            report.failures.len() + report.compiled.len()
        );
    }

    let mut solution = coded.solution;
    if let Some(puzzle) = puzzle {
        solution.puzzle_name = puzzle;
    }
    let path = output
        .unwrap_or_else(|| PathBuf::from(format!("{}-generated.solution", solution.puzzle_name)));
    let file =
        File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    solution.write(&mut writer)?;
    writer.flush()?;
    info!(arms = report.compiled.len(), path = %path.display(), "exported solution");
    Ok(())
}
