//! `tagpp_core` is the engine behind [tagpp](https://docs.rs/tagpp_cli), a
//! directive-driven text preprocessor. It walks a source tree, rewrites
//! specially marked comment lines into conditionally included output, and
//! mirrors the result into a destination tree. One annotated source can then
//! produce export-safe or variant-specific copies.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Source tree
//!   → Walker (pre-order, mirrors directories, pushes/pops the destination)
//!   → Validator (pre-scans each file; broken files are skipped, never half-written)
//!   → Visited guard (each file is processed once per run)
//!   → Dispatcher (classifies each line as plain text or a directive)
//!   → Processors (if/elseif/else/endif, define, include, export)
//!   → Destination file (written through a temporary file)
//! ```
//!
//! ## Directives
//!
//! With the default comment mark `//`:
//!
//! ```text
//! // define VENDOR=acme        bind a symbol for the rest of the run
//! // include common.def        process another file for its definitions
//! // if export                 keep the block only in export mode
//! // elseif !VENDOR            ... or when VENDOR is not defined
//! // else
//! // endif
//! // export off                keep the following lines only outside export mode
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from `tagpp.toml`.
//! - [`context`]: The run-scoped state shared by the walker and processors.
//! - [`dispatch`]: Line classification and directive parsing.
//! - [`validator`]: The structural pre-scan.
//! - [`processor`]: Directive execution over a per-file line cursor.
//! - [`expand`]: `${NAME}` expansion of emitted lines.
//! - [`io`]: Line source and temp-file line sink.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tagpp_core::RunOptions;
//! use tagpp_core::preprocess;
//!
//! let options = RunOptions {
//! 	export: true,
//! 	..RunOptions::default()
//! };
//! let mut report = |message: &str| println!("{message}");
//! let summary = preprocess(Path::new("src"), Path::new("out"), &options, &mut report)?;
//! assert!(summary.is_ok());
//! # Ok::<(), tagpp_core::PreprocessError>(())
//! ```

pub use config::*;
pub use context::*;
pub use error::*;
pub use report::*;
pub use walker::*;

pub mod config;
pub mod context;
pub mod dispatch;
mod error;
pub mod expand;
pub mod io;
pub mod processor;
mod report;
pub mod validator;
mod walker;

#[cfg(test)]
mod __fixtures;
