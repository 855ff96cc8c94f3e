//=============================================
// joss/main.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Joss CLI entry point
// Objective: Run, syntax-check or tokenize .joss scripts with optional env
//            and config files
//=============================================

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use joss::config::ENV_FILE_NAME;
use joss::{Interpreter, RuntimeOptions, ScriptError, TokenKind, Tokenizer, parse_source};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "joss", about = "Joss scripting language runtime")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a .joss script.
    Run(RunArgs),
    /// Parse a script and report syntax errors without running it.
    Check(FileArgs),
    /// Print the token stream of a script.
    Tokens(FileArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Path to the script to execute.
    pub script: PathBuf,

    /// Print parsed AST before execution.
    #[arg(long = "print-ast")]
    pub print_ast: bool,

    /// Environment file; defaults to env.joss beside the script.
    #[arg(long = "env-file")]
    pub env_file: Option<PathBuf>,

    /// Runtime configuration file; defaults to a discovered joss.toml.
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Emit interpreter debug events on stderr.
    #[arg(long = "trace")]
    pub trace: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct FileArgs {
    /// Path to the script.
    pub script: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let outcome = match args.command {
        Command::Run(cmd) => run_entry(cmd),
        Command::Check(cmd) => check_entry(&cmd.script),
        Command::Tokens(cmd) => tokens_entry(&cmd.script),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<ScriptError>() {
                Some(script_error) => eprintln!("{}", script_error),
                None => eprintln!("error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

fn read_script(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn script_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

//Function: run_entry
//Purpose: Load configuration and environment, then execute the script
//Inputs: args: RunArgs
//Returns: Result<()> (script errors carry their error code)
fn run_entry(args: RunArgs) -> Result<()> {
    let dir = script_dir(&args.script);
    let options = RuntimeOptions::load(args.config.as_deref(), &dir)
        .context("failed to load runtime configuration")?
        .with_trace(args.trace)
        .with_base_dir(&dir);
    joss::logging::init_tracing(options.trace);

    let source = read_script(&args.script)?;
    let program = parse_source(&source).map_err(ScriptError::from)?;
    if args.print_ast {
        println!("{:#?}", program);
    }

    let mut interpreter = Interpreter::with_options(options.clone());
    let env_file = args
        .env_file
        .or(options.env_file)
        .or_else(|| Some(dir.join(ENV_FILE_NAME)).filter(|path| path.is_file()));
    if let Some(path) = env_file {
        let count = interpreter
            .load_env_file(&path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        debug!(path = %path.display(), count, "environment loaded");
    }

    let path = args
        .script
        .canonicalize()
        .unwrap_or_else(|_| args.script.clone());
    interpreter.set_script_dir(script_dir(&path));
    interpreter.execute(&program).map_err(ScriptError::from)?;
    Ok(())
}

fn check_entry(path: &Path) -> Result<()> {
    let source = read_script(path)?;
    let program = parse_source(&source).map_err(ScriptError::from)?;
    println!(
        "{}: ok ({} top-level statements)",
        path.display(),
        program.statements.len()
    );
    Ok(())
}

fn tokens_entry(path: &Path) -> Result<()> {
    let source = read_script(path)?;
    for token in Tokenizer::new(&source).tokenize() {
        if token.kind == TokenKind::Newline {
            continue;
        }
        println!(
            "{:>4}:{:<4} {}",
            token.position.line, token.position.column, token.kind
        );
    }
    Ok(())
}
