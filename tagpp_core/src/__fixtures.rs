use std::path::Path;
use std::path::PathBuf;

use crate::Context;
use crate::SymbolValue;
use crate::processor;
use crate::processor::ProcessMode;
use crate::processor::Session;

/// Split a literal into owned lines.
pub(crate) fn lines(text: &str) -> Vec<String> {
	text.lines().map(ToString::to_string).collect()
}

/// A session that records includes instead of processing them.
#[derive(Debug, Default)]
pub(crate) struct StubSession {
	pub ctx: Context,
	pub includes: Vec<PathBuf>,
}

impl StubSession {
	pub fn new(export: bool) -> Self {
		Self {
			ctx: Context::new(export, "//"),
			includes: Vec::new(),
		}
	}

	pub fn with_symbol(mut self, name: &str, value: impl Into<SymbolValue>) -> Self {
		self.ctx.define(name, value.into());
		self
	}

	pub fn run(&mut self, text: &str) -> Vec<String> {
		processor::process(self, &lines(text), ProcessMode::default())
			.unwrap_or_else(|e| panic!("process failed at line {}: {}", e.line, e.kind))
	}
}

impl Session for StubSession {
	fn context(&mut self) -> &mut Context {
		&mut self.ctx
	}

	fn include(&mut self, path: &Path) {
		self.includes.push(path.to_path_buf());
	}
}

/// A temporary source tree with `src/` and `out/` directories.
pub(crate) struct Tree {
	_tmp: tempfile::TempDir,
	pub root: PathBuf,
}

impl Tree {
	pub fn new() -> Self {
		let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
		let root = tmp
			.path()
			.canonicalize()
			.unwrap_or_else(|e| panic!("canonicalize: {e}"));
		std::fs::create_dir_all(root.join("src")).unwrap_or_else(|e| panic!("mkdir: {e}"));
		std::fs::create_dir_all(root.join("out")).unwrap_or_else(|e| panic!("mkdir: {e}"));

		Self { _tmp: tmp, root }
	}

	pub fn src(&self) -> PathBuf {
		self.root.join("src")
	}

	pub fn out(&self) -> PathBuf {
		self.root.join("out")
	}

	/// Write a file relative to the tree root, creating parent directories.
	pub fn write(&self, relative: &str, content: impl AsRef<[u8]>) -> PathBuf {
		let path = self.root.join(relative);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("mkdir: {e}"));
		}
		std::fs::write(&path, content).unwrap_or_else(|e| panic!("write: {e}"));
		path
	}

	/// Read a file relative to the tree root.
	pub fn read(&self, relative: &str) -> String {
		std::fs::read_to_string(self.root.join(relative))
			.unwrap_or_else(|e| panic!("read {relative}: {e}"))
	}

	pub fn exists(&self, relative: &str) -> bool {
		self.root.join(relative).exists()
	}
}
