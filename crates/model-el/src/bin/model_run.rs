//! `model-run`: loads a model file and runs steps against it.
//!
//! Usage:
//!   model-run <file.json|file.xml>            # run the model's $$run / $steps
//!   model-run <file.json|file.xml> '<steps>'  # run the given steps instead
//!
//! The resulting tree is printed to stdout as JSON. Set `RUST_LOG=debug` to
//! see file loads and step events.

use std::env;
use std::process::ExitCode;

use model_el::cli::run_file;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(file) = args.get(1) else {
        eprintln!("usage: model-run <file.json|file.xml> [steps]");
        return ExitCode::FAILURE;
    };

    match run_file(file, args.get(2).map(String::as_str)) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
