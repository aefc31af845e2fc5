// CLI binary — panicking on unrecoverable errors is standard for CLI tools.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use serde::Serialize;

use snapscript::script::{self, builtins, Command, Interpreter, OutputFn, OutputStyle, Parameter};
use snapscript::settings;

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "snapscript-cli", about = "SnapScript headless script runner", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file override
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output a JSON report instead of streaming text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a script file
    Run { script: PathBuf },
    /// Lex, parse and validate without executing
    Check { script: PathBuf },
    /// Dump the parsed statement tree
    Ast { script: PathBuf },
    /// List registered commands with their signatures
    Commands,
}

// ── JSON report types ────────────────────────────────────────────

#[derive(Serialize)]
struct OutputEvent {
    style: &'static str,
    text: String,
}

#[derive(Serialize)]
struct RunReport {
    ok: bool,
    events: Vec<OutputEvent>,
    error: Option<String>,
}

#[derive(Serialize)]
struct CommandReport {
    name: String,
    signature: Vec<String>,
    returns: String,
}

fn main() {
    let cli = Cli::parse();
    let settings = settings::load_or_default(cli.config.as_deref());
    let json = cli.json || settings.json_output;
    match cli.command {
        Commands::Run { script } => run_script(&resolve(&script, &settings), json),
        Commands::Check { script } => check_script(&resolve(&script, &settings)),
        Commands::Ast { script } => dump_ast(&resolve(&script, &settings)),
        Commands::Commands => list_commands(json),
    }
}

/// Resolve a relative script path against the configured script directory.
fn resolve(path: &Path, settings: &settings::AppSettings) -> PathBuf {
    if path.is_relative() {
        if let Some(dir) = &settings.script_dir {
            return dir.join(path);
        }
    }
    path.to_path_buf()
}

fn read_source(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("[SnapScript] cannot read {}: {e}", path.display());
            process::exit(2);
        }
    }
}

fn default_interpreter(output: OutputFn) -> Interpreter {
    let mut interp = Interpreter::new(output);
    builtins::register_defaults(interp.registry_mut());
    interp
}

fn run_script(path: &Path, json: bool) {
    let source = read_source(path);
    if json {
        let events: Arc<Mutex<Vec<OutputEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let output: OutputFn = Rc::new(move |value: &Parameter, style| {
            sink.lock().push(OutputEvent {
                style: style_name(style),
                text: value.to_string(),
            });
        });
        let mut interp = default_interpreter(output);
        let result = interp.run(&source);
        let report = RunReport {
            ok: result.is_ok(),
            events: std::mem::take(&mut *events.lock()),
            error: result.as_ref().err().map(ToString::to_string),
        };
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
        if result.is_err() {
            process::exit(1);
        }
    } else {
        let output: OutputFn = Rc::new(|value: &Parameter, style| match style {
            OutputStyle::Standard => println!("{value}"),
            OutputStyle::Error => eprintln!("{value}"),
        });
        let mut interp = default_interpreter(output);
        if interp.run(&source).is_err() {
            process::exit(1);
        }
    }
}

fn check_script(path: &Path) {
    let source = read_source(path);
    let interp = default_interpreter(Rc::new(|_value: &Parameter, _style| {}));
    match interp.check(&source) {
        Ok(()) => println!("{}: ok", path.display()),
        Err(e) => {
            eprintln!("{}: [{}] {e}", path.display(), e.stage());
            process::exit(1);
        }
    }
}

fn dump_ast(path: &Path) {
    let source = read_source(path);
    match script::compile(&source) {
        Ok(root) => print!("{}", root.dump()),
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            process::exit(1);
        }
    }
}

fn list_commands(json: bool) {
    let interp = default_interpreter(Rc::new(|_value: &Parameter, _style| {}));
    if json {
        let commands: Vec<CommandReport> = interp
            .registry()
            .iter()
            .map(|command| CommandReport {
                name: command.name.clone(),
                signature: positions(command),
                returns: command.return_type.to_string(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&commands).unwrap());
    } else {
        for command in interp.registry().iter() {
            println!(
                "{}({}) -> {}",
                command.name,
                positions(command).join(", "),
                command.return_type
            );
        }
    }
}

fn positions(command: &Command) -> Vec<String> {
    (0..command.signature.len())
        .map(|i| command.expected_at(i))
        .collect()
}

fn style_name(style: OutputStyle) -> &'static str {
    match style {
        OutputStyle::Standard => "standard",
        OutputStyle::Error => "error",
    }
}
