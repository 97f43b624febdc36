//! mammotex-cli: command line front end for the mammotex pipeline.
//!
//! The binary is a thin dispatcher; argument definitions, configuration
//! resolution and the subcommand bodies live here so they can be tested
//! without spawning a process.
pub mod cli;
pub mod commands;
