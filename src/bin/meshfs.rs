//! meshfs CLI Binary
//!
//! Runs a naming server, a storage server, or a single client command.

use clap::Parser;
use meshfs::logging::init_logging;
use meshfs::tooling::cli::{Cli, CliContext};
use std::process;

fn main() {
    let cli = Cli::parse();

    let context = match CliContext::new(cli.config.clone(), cli.naming_host.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    let logging = match cli.logging_config(&context.config().logging) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error configuring logging: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = init_logging(Some(&logging)) {
        eprintln!("Error initializing logging: {}", e);
        process::exit(1);
    }

    match context.execute(&cli.command) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
