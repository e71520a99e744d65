//! Tooling & Integration Layer
//!
//! The command-line front end for servers and clients.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
