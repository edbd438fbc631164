use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::path::PathBuf;

use derive_more::Deref;
use derive_more::DerefMut;
use serde::Deserialize;
use serde::Serialize;

/// The comment mark used when none is configured.
pub const DEFAULT_COMMENT_MARK: &str = "//";

/// The value bound to a symbol by a `define` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SymbolValue {
	/// `define NAME` binds `Flag(true)`. `define NAME=false` binds the false
	/// sentinel, which conditionals treat like an undefined symbol.
	Flag(bool),
	/// The literal text after `=`.
	Text(String),
}

impl SymbolValue {
	/// Parse the text after `=` in a `define` directive.
	pub fn from_literal(literal: &str) -> Self {
		match literal {
			"true" => Self::Flag(true),
			"false" => Self::Flag(false),
			other => Self::Text(other.to_string()),
		}
	}

	/// Whether a conditional predicate naming this symbol holds.
	pub fn is_truthy(&self) -> bool {
		!matches!(self, Self::Flag(false))
	}
}

impl Display for SymbolValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Flag(value) => write!(f, "{value}"),
			Self::Text(text) => write!(f, "{text}"),
		}
	}
}

impl From<bool> for SymbolValue {
	fn from(value: bool) -> Self {
		Self::Flag(value)
	}
}

impl From<&str> for SymbolValue {
	fn from(value: &str) -> Self {
		Self::Text(value.to_string())
	}
}

/// Global symbol bindings for one run. Ordered so summaries are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deref, DerefMut)]
pub struct SymbolTable(BTreeMap<String, SymbolValue>);

/// How a file entered the visited set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
	/// Processed for side effects only, through `include` or the init file.
	Included,
	/// Processed by the tree walker and written to the destination tree.
	Emitted,
}

/// Run-scoped preprocessing state.
///
/// One `Context` is created per call to [`preprocess`](crate::preprocess) and
/// threaded by `&mut` reference through the walker and the directive
/// processors. Nothing in here is process-wide, so independent runs never
/// observe each other's symbols or visited files.
#[derive(Debug, Clone)]
pub struct Context {
	export: bool,
	comment_mark: String,
	symbols: SymbolTable,
	visited: HashMap<PathBuf, Visit>,
	namespace: Option<PathBuf>,
	dest: Vec<PathBuf>,
}

impl Default for Context {
	fn default() -> Self {
		Self::new(false, DEFAULT_COMMENT_MARK)
	}
}

impl Context {
	pub fn new(export: bool, comment_mark: impl Into<String>) -> Self {
		Self {
			export,
			comment_mark: comment_mark.into(),
			symbols: SymbolTable::default(),
			visited: HashMap::new(),
			namespace: None,
			dest: Vec::new(),
		}
	}

	pub fn export(&self) -> bool {
		self.export
	}

	pub fn set_export(&mut self, export: bool) {
		self.export = export;
	}

	pub fn comment_mark(&self) -> &str {
		&self.comment_mark
	}

	pub fn set_comment_mark(&mut self, mark: impl Into<String>) {
		self.comment_mark = mark.into();
	}

	/// Set the root of the destination stack, discarding anything pushed
	/// before.
	pub fn set_dest_root(&mut self, root: impl Into<PathBuf>) {
		self.dest.clear();
		self.dest.push(root.into());
	}

	/// Append `name` to the active destination directory and make the result
	/// the new top of the stack.
	pub fn push_dest(&mut self, name: impl AsRef<Path>) -> PathBuf {
		let next = self.dest_path().join(name);
		self.dest.push(next.clone());
		next
	}

	/// Restore the destination that was active before the last
	/// [`push_dest`](Self::push_dest). The root itself is never popped.
	pub fn pop_dest(&mut self) -> Option<PathBuf> {
		if self.dest.len() > 1 {
			self.dest.pop()
		} else {
			None
		}
	}

	/// The active destination directory.
	pub fn dest_path(&self) -> PathBuf {
		self.dest.last().cloned().unwrap_or_default()
	}

	pub fn dest_depth(&self) -> usize {
		self.dest.len()
	}

	pub fn is_visited(&self, path: &Path) -> bool {
		self.visited.contains_key(path)
	}

	pub fn visit_of(&self, path: &Path) -> Option<Visit> {
		self.visited.get(path).copied()
	}

	/// Record a visit. An `Emitted` visit is never downgraded to `Included`.
	pub fn mark_visited(&mut self, path: impl Into<PathBuf>, visit: Visit) {
		let entry = self.visited.entry(path.into()).or_insert(visit);
		if visit == Visit::Emitted {
			*entry = Visit::Emitted;
		}
	}

	pub fn visited_count(&self) -> usize {
		self.visited.len()
	}

	pub fn namespace(&self) -> Option<&Path> {
		self.namespace.as_deref()
	}

	/// Replace the current namespace, returning the previous one so callers
	/// can restore it.
	pub fn set_namespace(&mut self, path: Option<PathBuf>) -> Option<PathBuf> {
		std::mem::replace(&mut self.namespace, path)
	}

	/// Bind `name` globally. Last write wins.
	pub fn define(&mut self, name: impl Into<String>, value: SymbolValue) {
		self.symbols.insert(name.into(), value);
	}

	pub fn lookup(&self, name: &str) -> Option<&SymbolValue> {
		self.symbols.get(name)
	}

	/// A symbol is defined when it is bound to anything but the false
	/// sentinel. Unbound symbols are simply not defined.
	pub fn is_defined(&self, name: &str) -> bool {
		self.lookup(name).is_some_and(SymbolValue::is_truthy)
	}

	pub fn symbols(&self) -> &SymbolTable {
		&self.symbols
	}
}
