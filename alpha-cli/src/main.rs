mod config;

use std::ffi::OsString;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use alpha_validator::{
    CombinationKey, Diagnostic, ExpressionValidator, SourceFile, ValidationReport,
};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{DATA_DIR_ENV, DEFAULT_DELAY, DEFAULT_REGION, DEFAULT_UNIVERSE};

const CHECK_AFTER_HELP: &str = "\
Subcommands:
  alpha-cli batch <FILE>   Validate every non-blank line of a file as its own expression.

See `alpha-cli batch --help` for batch options.";

#[derive(Args, Debug)]
struct TargetArgs {
    /// Region of the field set to validate against.
    #[arg(short, long, default_value = DEFAULT_REGION)]
    region: String,

    /// Delay of the field set to validate against.
    #[arg(short, long, default_value_t = DEFAULT_DELAY)]
    delay: u32,

    /// Universe of the field set to validate against.
    #[arg(short, long, default_value = DEFAULT_UNIVERSE)]
    universe: String,

    /// Directory holding operators.json and the field catalog.
    #[arg(long, value_name = "DIR", env = DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Print the report as JSON.
    #[arg(short = 'j', long)]
    json: bool,

    /// Emit debug logs on stderr.
    #[arg(short, long)]
    verbose: bool,
}

impl TargetArgs {
    fn key(&self) -> CombinationKey {
        CombinationKey::new(self.region.clone(), self.delay, self.universe.clone())
    }

    fn validator(&self) -> Result<ExpressionValidator> {
        let dir = config::resolve_data_dir(self.data_dir.as_deref())?;
        let context = config::load_context(&dir)?;
        let validator = context.validator(self.key())?;
        Ok(validator)
    }
}

#[derive(Parser)]
#[command(
    name = "alpha-cli",
    version,
    about = "Validate alpha expressions against operator and field catalogs.",
    long_about = "Validate one alpha expression given inline, from a file, or on stdin.",
    after_help = CHECK_AFTER_HELP
)]
struct CheckCli {
    /// Expression to validate. Read from stdin when neither this nor --file is given.
    #[arg(value_name = "EXPRESSION", conflicts_with = "file")]
    expression: Option<String>,

    /// Read the expression from a file.
    #[arg(short, long, value_name = "PATH")]
    file: Option<PathBuf>,

    #[command(flatten)]
    target: TargetArgs,
}

#[derive(Parser)]
#[command(
    name = "alpha-cli batch",
    about = "Validate every non-blank line of a file as an independent expression."
)]
struct BatchCli {
    /// File with one expression per line.
    #[arg(value_name = "PATH")]
    input: PathBuf,

    #[command(flatten)]
    target: TargetArgs,
}

fn main() -> Result<ExitCode> {
    let mut raw: Vec<OsString> = std::env::args_os().collect();
    if raw.get(1).map(|arg| arg == "batch").unwrap_or(false) {
        raw.remove(1);
        let cli = BatchCli::parse_from(raw);
        init_tracing(cli.target.verbose)?;
        return run_batch(cli);
    }
    if raw.get(1).map(|arg| arg == "check").unwrap_or(false) {
        raw.remove(1);
    }

    let cli = CheckCli::parse_from(raw);
    init_tracing(cli.target.verbose)?;
    run_check(cli)
}

fn init_tracing(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init()
        .context("failed to install log subscriber")?;
    Ok(())
}

fn run_check(cli: CheckCli) -> Result<ExitCode> {
    let source = read_expression(&cli)?;
    let validator = cli.target.validator()?;
    let report = validator.validate_source(&source);

    if cli.target.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.is_valid {
        println!("valid");
    } else {
        print_report(&source, &report);
    }

    Ok(exit_code(report.is_valid))
}

fn read_expression(cli: &CheckCli) -> Result<SourceFile> {
    if let Some(path) = &cli.file {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        return Ok(SourceFile::new(path.clone(), contents));
    }
    if let Some(expression) = &cli.expression {
        return Ok(SourceFile::inline(expression.clone()));
    }

    let mut contents = String::new();
    io::stdin()
        .read_to_string(&mut contents)
        .context("failed to read expression from stdin")?;
    Ok(SourceFile::new(PathBuf::from("<stdin>"), contents))
}

#[derive(Serialize)]
struct BatchSummary {
    total: usize,
    valid: usize,
    invalid: usize,
    reports: Vec<BatchEntry>,
}

#[derive(Serialize)]
struct BatchEntry {
    line: usize,
    #[serde(flatten)]
    report: ValidationReport,
}

fn run_batch(cli: BatchCli) -> Result<ExitCode> {
    let contents = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let validator = cli.target.validator()?;

    let mut entries = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let source = SourceFile::new(cli.input.clone(), line.to_string());
        let report = validator.validate_source(&source);
        if !cli.target.json {
            print_batch_entry(&cli.input, index + 1, &report);
        }
        entries.push(BatchEntry {
            line: index + 1,
            report,
        });
    }

    if entries.is_empty() {
        bail!("{} contains no expressions", cli.input.display());
    }

    let valid = entries.iter().filter(|entry| entry.report.is_valid).count();
    let summary = BatchSummary {
        total: entries.len(),
        invalid: entries.len() - valid,
        valid,
        reports: entries,
    };

    if cli.target.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "checked {} expressions: {} valid, {} invalid",
            summary.total, summary.valid, summary.invalid
        );
    }

    Ok(exit_code(summary.invalid == 0))
}

fn print_batch_entry(path: &Path, line: usize, report: &ValidationReport) {
    if report.is_valid {
        println!("{}:{}: valid", path.display(), line);
        return;
    }
    println!("{}:{}: invalid", path.display(), line);
    for message in report.messages() {
        println!("    {message}");
    }
}

fn exit_code(valid: bool) -> ExitCode {
    if valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_report(source: &SourceFile, report: &ValidationReport) {
    let lines: Vec<&str> = source.contents.lines().collect();
    for diagnostic in &report.diagnostics {
        print_diagnostic(source, &lines, diagnostic);
    }
    let count = report.diagnostics.len();
    eprintln!(
        "expression is invalid: {} problem{} found",
        count,
        if count == 1 { "" } else { "s" }
    );
}

fn print_diagnostic(source: &SourceFile, lines: &[&str], diagnostic: &Diagnostic) {
    eprintln!("  - error[{}]: {}", diagnostic.code, diagnostic.message);
    if let Some(span) = diagnostic.span {
        eprintln!("     --> {}:{}:{}", source.path.display(), span.line, span.column);

        if let Some(raw_line) = lines.get(span.line.saturating_sub(1)) {
            let display_line = raw_line.replace('\t', "    ");
            eprintln!("      {}", display_line);

            let mut caret_line = String::from("      ");
            for ch in raw_line.chars().take(span.column.saturating_sub(1)) {
                match ch {
                    '\t' => caret_line.push_str("    "),
                    _ => caret_line.push(' '),
                }
            }

            let highlight_len = if span.end_line == span.line {
                span.end_column
                    .saturating_sub(span.column)
                    .saturating_add(1)
            } else {
                raw_line
                    .chars()
                    .count()
                    .saturating_sub(span.column.saturating_sub(1))
            };

            caret_line.push_str(&"^".repeat(highlight_len.max(1)));
            eprintln!("{}", caret_line);
        }
    }
    if let Some(suggestion) = &diagnostic.suggestion {
        eprintln!("      = help: {suggestion}");
    }
}
