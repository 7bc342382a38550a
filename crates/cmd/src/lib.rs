//! Command line front end for the `tdspu` library.
//!
//! Each subcommand is an async function taking the shared [`common::RunContext`],
//! its parsed arguments and a writer for its output, so the same code
//! serves the binary and the integration tests.

pub mod commands;
pub mod common;
pub mod error_utils;
pub mod template_utils;
