use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use rshtml_parser::batch::parse_all;
use rshtml_parser::{Ast, ParseError, ParseOptions, analyze, outline, parse_with};
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, level_filters::LevelFilter};
use walkdir::WalkDir;

const EXTENSION: &str = ".rs.html";

#[derive(Parser)]
#[command(name = "rshtml")]
#[command(about = "RsHtml - parse and check .rs.html templates")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: OptionArgs,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args)]
struct OptionArgs {
    /// Maximum nesting depth before the parse is abandoned
    #[arg(long, global = true, default_value_t = 128)]
    max_depth: usize,

    /// Treat a leading `@(...);` as an expression, not a parameter header
    #[arg(long, global = true)]
    no_header: bool,
}

impl From<&OptionArgs> for ParseOptions {
    fn from(args: &OptionArgs) -> Self {
        ParseOptions {
            max_depth: args.max_depth,
            parameter_header: !args.no_header,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one template and print its tree
    Parse {
        /// Path to a .rs.html file
        #[arg(required_unless_present = "stdin")]
        file: Option<PathBuf>,

        /// Read from stdin
        #[arg(long)]
        stdin: bool,

        /// Output the tree as JSON
        #[arg(long, conflicts_with_all = ["outline", "metadata"])]
        json: bool,

        /// Output the tree as an S-expression outline (default)
        #[arg(long, conflicts_with = "metadata")]
        outline: bool,

        /// Output the template's metadata as JSON
        #[arg(long)]
        metadata: bool,
    },
    /// Parse every template under a path and report errors
    Check {
        /// Path to a .rs.html file or directory
        path: PathBuf,
    },
}

#[derive(Clone, Copy)]
enum Format {
    Json,
    Outline,
    Metadata,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let options = ParseOptions::from(&cli.options);

    let result = match cli.command {
        Commands::Parse {
            file,
            stdin,
            json,
            outline,
            metadata,
        } => {
            let format = match (json, outline, metadata) {
                (true, _, _) => Format::Json,
                (_, _, true) => Format::Metadata,
                _ => Format::Outline,
            };
            parse_command(file.as_deref(), stdin, format, options)
        }
        Commands::Check { path } => check_command(&path, options),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Returns whether the template parsed without errors
fn parse_command(file: Option<&Path>, stdin: bool, format: Format, options: ParseOptions) -> Result<bool> {
    let (source, filename) = if stdin {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source).context("failed to read stdin")?;
        (source, "<stdin>".to_string())
    } else if let Some(path) = file {
        let source = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        (source, path.display().to_string())
    } else {
        bail!("provide a file or use --stdin");
    };

    let ast = match parse_with(&source, options) {
        Ok(ast) => ast,
        Err(err) => {
            eprint!("{}", render_fatal(&err, &source, &filename));
            return Ok(false);
        }
    };

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&ast)?),
        Format::Outline => println!("{}", outline::to_sexp(&ast)),
        Format::Metadata => println!("{}", serde_json::to_string_pretty(&analyze(&ast))?),
    }
    Ok(report_error_nodes(&ast, &source, &filename) == 0)
}

/// Returns whether every template parsed without errors
fn check_command(path: &Path, options: ParseOptions) -> Result<bool> {
    let start = Instant::now();
    let files = collect_templates(path)?;
    if files.is_empty() {
        bail!("no {} files found in {}", EXTENSION, path.display());
    }

    let sources = files
        .iter()
        .map(|file| fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display())))
        .collect::<Result<Vec<_>>>()?;
    debug!(files = files.len(), "checking templates");

    let mut failed = 0;
    for ((file, source), result) in files.iter().zip(&sources).zip(parse_all(&sources, &options)) {
        let filename = file.display().to_string();
        let errors = match result {
            Ok(ast) => report_error_nodes(&ast, source, &filename),
            Err(err) => {
                eprint!("{}", render_fatal(&err, source, &filename));
                1
            }
        };
        if errors == 0 {
            print_checked(&filename);
        } else {
            failed += 1;
        }
    }

    print_summary(files.len(), failed, start.elapsed());
    Ok(failed == 0)
}

fn collect_templates(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        if !is_template(path) {
            bail!("{} is not a {} file", path.display(), EXTENSION);
        }
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("{} does not exist", path.display());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_template(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    Ok(files)
}

fn is_template(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(EXTENSION))
}

fn render_fatal(err: &ParseError, source: &str, filename: &str) -> String {
    if io::stderr().is_terminal() {
        err.render_color(source, filename)
    } else {
        err.render(source, filename)
    }
}

/// Print every error node; returns how many there were
fn report_error_nodes(ast: &Ast, source: &str, filename: &str) -> usize {
    let errors = ast.errors();
    let color = io::stderr().is_terminal();
    for error in &errors {
        if color {
            eprint!("{}", error.render_color(source, filename));
        } else {
            eprint!("{}", error.render(source, filename));
        }
    }
    errors.len()
}

fn print_checked(path: &str) {
    if io::stderr().is_terminal() {
        eprintln!("  \x1b[32m✓\x1b[0m {}", path);
    } else {
        eprintln!("  ✓ {}", path);
    }
}

fn print_summary(count: usize, failed: usize, elapsed: std::time::Duration) {
    let is_tty = io::stderr().is_terminal();
    let time_str = format_duration(elapsed);
    let files_word = if count == 1 { "file" } else { "files" };
    let line = if failed == 0 {
        format!("Checked {} {} in {}", count, files_word, time_str)
    } else {
        format!("Checked {} {} in {}, {} with errors", count, files_word, time_str, failed)
    };

    match (is_tty, failed) {
        (true, 0) => eprintln!("\n\x1b[1m{}\x1b[0m", line),
        (true, _) => eprintln!("\n\x1b[1;31m{}\x1b[0m", line),
        (false, _) => eprintln!("\n{}", line),
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let micros = d.as_micros();
    if micros < 1000 {
        format!("{}μs", micros)
    } else if micros < 1_000_000 {
        format!("{:.1}ms", micros as f64 / 1000.0)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}
