//! conflux CLI Application
//!
//! Prints `Hello, {Name}!` with `Name` read through whichever resolver chain
//! the command line selects.

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

use conflux::cli::{self, EXIT_OK, EXIT_SOURCE, OkEnvelope, exit_code_for, render_error};
use conflux::tracing::{TracingConfig, init_tracing};
use serde::Serialize;

/// Payload of the JSON success envelope
#[derive(Debug, Serialize)]
struct Greeting {
    greeting: String,
    chain: String,
}

fn main() {
    // NOTE: Using eprintln! in panic hook is intentional - tracing infrastructure
    // may be corrupted during a panic, so we use the most reliable output method.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();

    let tracing_config = TracingConfig {
        format: cli.tracing_format(),
        level: cli.level.into(),
        ..Default::default()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("Failed to initialize tracing: {e}");
    }

    let exit_code = run_with_tokio(&cli);
    std::process::exit(exit_code);
}

/// Create tokio runtime and run the greeting
fn run_with_tokio(cli: &cli::Cli) -> i32 {
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            return EXIT_SOURCE;
        }
    };

    let config = cli.config();
    match rt.block_on(conflux::run(&config)) {
        Ok(greeting) => {
            if cli.json {
                let envelope = OkEnvelope::new(Greeting {
                    greeting,
                    chain: config.chain(),
                });
                match serde_json::to_string(&envelope) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("Error serializing response: {e}");
                        return EXIT_SOURCE;
                    }
                }
            } else {
                println!("{greeting}");
            }
            EXIT_OK
        }
        Err(err) => {
            render_error(&err, cli.json);
            exit_code_for(&err)
        }
    }
}
