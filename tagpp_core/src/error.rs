use miette::Diagnostic;
use thiserror::Error;

use crate::validator::SyntaxDiagnostic;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum PreprocessError {
	#[error(transparent)]
	#[diagnostic(code(tagpp::io_error))]
	Io(#[from] std::io::Error),

	#[error("[{role}] `{path}` does not exist")]
	#[diagnostic(
		code(tagpp::missing_root),
		help("create the directory first or pass an existing path")
	)]
	MissingRoot { role: RootRole, path: String },

	#[error("structural error in `{path}` at line {line}: {message}")]
	#[diagnostic(
		code(tagpp::structural),
		help("every `if` needs a matching `endif`, and `elseif`/`else` must sit inside one")
	)]
	Structural {
		path: String,
		line: usize,
		message: String,
	},

	#[error("failed to process `{path}`: {source}")]
	#[diagnostic(code(tagpp::file_io))]
	FileIo {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(tagpp::config_parse),
		help("check that tagpp.toml is valid TOML with optional [symbols], [exclude] and [passthrough] sections")
	)]
	ConfigParse(String),

	#[error("invalid pattern `{pattern}`: {reason}")]
	#[diagnostic(code(tagpp::invalid_pattern))]
	InvalidPattern { pattern: String, reason: String },

	#[error("invalid symbol definition `{0}`")]
	#[diagnostic(
		code(tagpp::invalid_symbol),
		help("symbols are written as `NAME` or `NAME=value`")
	)]
	InvalidSymbol(String),

	#[error("the run was cancelled")]
	#[diagnostic(code(tagpp::cancelled))]
	Cancelled,
}

impl PreprocessError {
	pub(crate) fn structural(path: &std::path::Path, diagnostic: &SyntaxDiagnostic) -> Self {
		Self::Structural {
			path: path.display().to_string(),
			line: diagnostic.line,
			message: diagnostic.kind.to_string(),
		}
	}

	pub(crate) fn file_io(path: &std::path::Path, source: std::io::Error) -> Self {
		Self::FileIo {
			path: path.display().to_string(),
			source,
		}
	}
}

/// Which of the two run roots was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootRole {
	Source,
	Destination,
}

impl std::fmt::Display for RootRole {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Source => write!(f, "srcdir"),
			Self::Destination => write!(f, "destdir"),
		}
	}
}

pub type PreprocessResult<T> = Result<T, PreprocessError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
