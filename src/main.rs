use std::{
    fs,
    io::{self, IsTerminal, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use suiron::{Interpreter, RunError, RunOptions};

const PROMPT: &str = "〉 ";

const EXIT_SYNTAX: u8 = 65;
const EXIT_NO_INPUT: u8 = 66;
const EXIT_RUNTIME: u8 = 70;

/// Suiron is a small dynamically-typed scripting language. Run a script, or
/// start the interactive prompt when no script is given.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Script to run.
    script: Option<PathBuf>,

    /// Print the token stream before running.
    #[arg(long)]
    tokens: bool,

    /// Print every parsed statement before running.
    #[arg(long)]
    ast: bool,

    /// Evaluate a single expression and print its value.
    #[arg(short, long, value_name = "EXPR", conflicts_with = "script")]
    eval: Option<String>,
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // logs go to stderr so they never mix with program output
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn report(message: &str) {
    if io::stderr().is_terminal() {
        eprintln!("\x1b[31m{}\x1b[0m", message);
    } else {
        eprintln!("{}", message);
    }
}

fn report_run_error(err: &RunError) {
    match err {
        RunError::Syntax(errors) => {
            for error in errors {
                report(&error.to_string());
            }
        }
        RunError::Runtime(err) => report(&err.report()),
        RunError::Io(err) => report(&err.to_string()),
    }
}

fn exit_code(err: &RunError) -> ExitCode {
    match err {
        RunError::Syntax(_) => ExitCode::from(EXIT_SYNTAX),
        RunError::Runtime(_) => ExitCode::from(EXIT_RUNTIME),
        RunError::Io(_) => ExitCode::FAILURE,
    }
}

fn run_file(path: &Path, options: RunOptions) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            report(&format!("Could not read '{}': {}", path.display(), err));
            return ExitCode::from(EXIT_NO_INPUT);
        }
    };

    let mut interpreter = Interpreter::new();
    match suiron::run_with(&source, &mut interpreter, options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_run_error(&err);
            exit_code(&err)
        }
    }
}

fn run_prompt(options: RunOptions) -> ExitCode {
    let mut interpreter = Interpreter::new();

    loop {
        let output = interpreter.output();
        if write!(output, "{}", PROMPT).and_then(|_| output.flush()).is_err() {
            return ExitCode::FAILURE;
        }

        let line = match interpreter.read_line() {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                report(&format!("Could not read input: {}", err));
                return ExitCode::FAILURE;
            }
        };

        let line = line.trim();
        if line.is_empty() || line == "exit" {
            break;
        }

        // an error only discards the current line
        if let Err(err) = suiron::run_with(line, &mut interpreter, options) {
            report_run_error(&err);
        }
    }

    ExitCode::SUCCESS
}

fn eval(expr: &str) -> ExitCode {
    let mut interpreter = Interpreter::new();
    match suiron::eval_expression(expr, &mut interpreter) {
        Ok(value) => {
            println!("{}", value.stringify());
            ExitCode::SUCCESS
        }
        Err(err) => {
            report_run_error(&err);
            exit_code(&err)
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let options = RunOptions {
        dump_tokens: args.tokens,
        dump_ast: args.ast,
    };

    if let Some(expr) = &args.eval {
        return eval(expr);
    }

    match &args.script {
        Some(path) => run_file(path, options),
        None => run_prompt(options),
    }
}
