use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::PreprocessError;
use crate::PreprocessResult;
use crate::context::DEFAULT_COMMENT_MARK;
use crate::context::SymbolValue;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["tagpp.toml", ".tagpp.toml", ".config/tagpp.toml"];

/// The init file name used by the command line when none is configured.
pub const DEFAULT_INIT_FILE: &str = "global.def";

/// Configuration loaded from a `tagpp.toml` file.
///
/// ```toml
/// export = true
/// comment_mark = "//"
/// init_file = "global.def"
/// expand_symbols = false
///
/// [symbols]
/// VENDOR = "acme"
/// DEBUG = false
///
/// [exclude]
/// patterns = ["target/", "*.orig"]
///
/// [passthrough]
/// patterns = ["*.png", "*.jar"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TagppConfig {
	/// Whether export mode is on.
	#[serde(default)]
	pub export: bool,
	/// Prefix that marks a line as a potential directive.
	#[serde(default = "default_comment_mark")]
	pub comment_mark: String,
	/// File processed before the tree to seed global symbols.
	#[serde(default)]
	pub init_file: Option<PathBuf>,
	/// Replace `${NAME}` references in emitted lines.
	#[serde(default)]
	pub expand_symbols: bool,
	/// Symbols defined before the init file runs.
	#[serde(default)]
	pub symbols: BTreeMap<String, SymbolValue>,
	/// Entries skipped entirely, in gitignore syntax.
	#[serde(default)]
	pub exclude: PatternConfig,
	/// Files copied byte-for-byte without directive processing.
	#[serde(default)]
	pub passthrough: PatternConfig,
}

impl Default for TagppConfig {
	fn default() -> Self {
		Self {
			export: false,
			comment_mark: default_comment_mark(),
			init_file: None,
			expand_symbols: false,
			symbols: BTreeMap::new(),
			exclude: PatternConfig::default(),
			passthrough: PatternConfig::default(),
		}
	}
}

/// A list of path patterns.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatternConfig {
	#[serde(default)]
	pub patterns: Vec<String>,
}

fn default_comment_mark() -> String {
	DEFAULT_COMMENT_MARK.to_string()
}

impl TagppConfig {
	/// Resolve the first existing config file path at `root`.
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if there is none.
	pub fn load(root: &Path) -> PreprocessResult<Option<TagppConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		Self::load_from(&config_path).map(Some)
	}

	/// Load the config from an explicit file.
	pub fn load_from(path: &Path) -> PreprocessResult<TagppConfig> {
		let content = std::fs::read_to_string(path)?;
		toml::from_str(&content).map_err(|e| PreprocessError::ConfigParse(e.to_string()))
	}
}

/// Parse a `NAME` or `NAME=value` pair as given on the command line.
pub fn parse_symbol_assignment(raw: &str) -> PreprocessResult<(String, SymbolValue)> {
	let (name, value) = match raw.split_once('=') {
		Some((name, value)) => (name.trim(), SymbolValue::from_literal(value.trim())),
		None => (raw.trim(), SymbolValue::Flag(true)),
	};

	let valid = name
		.chars()
		.next()
		.is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_')
		&& name
			.chars()
			.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'));

	if !valid {
		return Err(PreprocessError::InvalidSymbol(raw.to_string()));
	}

	Ok((name.to_string(), value))
}
