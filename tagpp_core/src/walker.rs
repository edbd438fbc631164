use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::PreprocessError;
use crate::PreprocessResult;
use crate::RootRole;
use crate::config::TagppConfig;
use crate::context::Context;
use crate::context::DEFAULT_COMMENT_MARK;
use crate::context::SymbolTable;
use crate::context::SymbolValue;
use crate::context::Visit;
use crate::io;
use crate::processor;
use crate::processor::ProcessMode;
use crate::processor::Session;
use crate::report::Report;
use crate::validator;
use crate::validator::SyntaxDiagnostic;

/// Options for one preprocessing run.
///
/// Use [`RunOptions::default()`] for the plain defaults or
/// [`RunOptions::from_config`] to start from a [`TagppConfig`].
#[derive(Debug, Clone)]
pub struct RunOptions {
	/// Export mode, tested by `if export` and by `export` gates.
	pub export: bool,
	/// Prefix that marks a line as a potential directive.
	pub comment_mark: String,
	/// File processed before the tree, for its definitions only.
	pub init_file: Option<PathBuf>,
	/// Symbols defined before the init file runs.
	pub symbols: Vec<(String, SymbolValue)>,
	/// Gitignore-style patterns of entries the walker skips.
	pub exclude_patterns: Vec<String>,
	/// Glob patterns of files copied byte-for-byte.
	pub passthrough_patterns: Vec<String>,
	/// Replace `${NAME}` references in emitted lines.
	pub expand_symbols: bool,
	/// Checked before every file; once set the run stops.
	pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for RunOptions {
	fn default() -> Self {
		Self {
			export: false,
			comment_mark: DEFAULT_COMMENT_MARK.to_string(),
			init_file: None,
			symbols: Vec::new(),
			exclude_patterns: Vec::new(),
			passthrough_patterns: Vec::new(),
			expand_symbols: false,
			cancel: None,
		}
	}
}

impl RunOptions {
	/// Construct [`RunOptions`] from an optional [`TagppConfig`].
	pub fn from_config(config: Option<&TagppConfig>) -> Self {
		let Some(config) = config else {
			return Self::default();
		};

		Self {
			export: config.export,
			comment_mark: config.comment_mark.clone(),
			init_file: config.init_file.clone(),
			symbols: config
				.symbols
				.iter()
				.map(|(name, value)| (name.clone(), value.clone()))
				.collect(),
			exclude_patterns: config.exclude.patterns.clone(),
			passthrough_patterns: config.passthrough.patterns.clone(),
			expand_symbols: config.expand_symbols,
			cancel: None,
		}
	}
}

/// A file the validator rejected.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
	pub file: PathBuf,
	/// 1-indexed line of the problem.
	pub line: usize,
	pub reason: String,
}

/// A file whose read or write failed.
#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
	pub file: PathBuf,
	pub reason: String,
}

/// What happened during a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
	/// Files dispatched and written into the destination tree.
	pub processed: Vec<PathBuf>,
	/// Passthrough files copied unchanged.
	pub copied: Vec<PathBuf>,
	/// Files processed for their definitions only.
	pub included: Vec<PathBuf>,
	pub skipped: Vec<SkippedFile>,
	pub failed: Vec<FailedFile>,
	/// Symbol table at the end of the run.
	pub symbols: SymbolTable,
}

impl RunSummary {
	/// Returns true if no file was skipped or failed.
	pub fn is_ok(&self) -> bool {
		self.skipped.is_empty() && self.failed.is_empty()
	}
}

/// Preprocess `source_root` into `destination_root`.
///
/// A directory source is mirrored as a same-named directory under the
/// destination; a single file source is written directly into it. Missing
/// roots are reported and abort the run. Every other problem is reported,
/// recorded in the returned [`RunSummary`], and the walk continues.
pub fn preprocess(
	source_root: &Path,
	destination_root: &Path,
	options: &RunOptions,
	report: &mut dyn Report,
) -> PreprocessResult<RunSummary> {
	let source = resolve_root(source_root, RootRole::Source, report)?;
	let destination = resolve_root(destination_root, RootRole::Destination, report)?;
	let filters = Filters::new(&source, options)?;

	info!(
		source = %source.display(),
		destination = %destination.display(),
		export = options.export,
		"starting run"
	);

	let mut walker = Walker::new(options, filters, report, destination);
	for (name, value) in &options.symbols {
		walker.ctx.define(name.clone(), value.clone());
	}

	if let Some(init_file) = &options.init_file {
		walker.load_init_file(init_file);
	}

	walker.walk(&source)?;
	let summary = walker.finish();

	info!(
		processed = summary.processed.len(),
		skipped = summary.skipped.len(),
		failed = summary.failed.len(),
		"run completed"
	);

	Ok(summary)
}

/// Validate a single file against `comment_mark` without processing it.
///
/// Returns [`PreprocessError::Structural`] for the first structural problem
/// and [`PreprocessError::FileIo`] when the file cannot be read.
pub fn check_file(path: &Path, comment_mark: &str) -> PreprocessResult<()> {
	let lines = io::read_lines(path).map_err(|e| PreprocessError::file_io(path, e))?;
	validator::check(&lines, comment_mark)
		.map_err(|diagnostic| PreprocessError::structural(path, &diagnostic))
}

/// Validate every file under `source_root` without writing anything.
///
/// Returns the rejected files. Passthrough and excluded entries are not
/// checked.
pub fn check_tree(
	source_root: &Path,
	options: &RunOptions,
	report: &mut dyn Report,
) -> PreprocessResult<Vec<SkippedFile>> {
	let source = resolve_root(source_root, RootRole::Source, report)?;
	let filters = Filters::new(&source, options)?;
	let mut rejected = Vec::new();
	let mut files = Vec::new();
	collect_files(&source, &filters, &mut files, &mut HashSet::new())?;

	for file in files {
		if filters.is_passthrough(&file) {
			continue;
		}

		match check_file(&file, &options.comment_mark) {
			Ok(()) => debug!(path = %file.display(), "valid"),
			Err(PreprocessError::Structural { line, message, .. }) => {
				report.report(&format!(
					"[Warning] Skipping {}: line {line}: {message}",
					file.display()
				));
				rejected.push(SkippedFile {
					file,
					line,
					reason: message,
				});
			}
			Err(e) => report.report(&format!("[Error] {e}")),
		}
	}

	Ok(rejected)
}

fn collect_files(
	dir: &Path,
	filters: &Filters,
	files: &mut Vec<PathBuf>,
	visited_dirs: &mut HashSet<PathBuf>,
) -> PreprocessResult<()> {
	if !dir.is_dir() {
		files.push(dir.to_path_buf());
		return Ok(());
	}

	if !visited_dirs.insert(canonical(dir)) {
		return Ok(());
	}

	for entry in sorted_entries(dir)? {
		if filters.is_excluded(&entry) {
			continue;
		}
		collect_files(&entry, filters, files, visited_dirs)?;
	}

	Ok(())
}

fn resolve_root(path: &Path, role: RootRole, report: &mut dyn Report) -> PreprocessResult<PathBuf> {
	let resolved = path
		.canonicalize()
		.ok()
		.filter(|resolved| role == RootRole::Source || resolved.is_dir());

	resolved.ok_or_else(|| {
		report.report(&format!("[Error] [{role}] = {} does not exist.", path.display()));
		PreprocessError::MissingRoot {
			role,
			path: path.display().to_string(),
		}
	})
}

fn canonical(path: &Path) -> PathBuf {
	path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Directory entries sorted by file name so runs are reproducible.
fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
	let mut entries = std::fs::read_dir(dir)?
		.map(|entry| entry.map(|entry| entry.path()))
		.collect::<std::io::Result<Vec<_>>>()?;
	entries.sort();
	Ok(entries)
}

fn skip_message(file: &Path, diagnostic: &SyntaxDiagnostic) -> String {
	format!(
		"[Warning] Skipping {}: line {}: {}",
		file.display(),
		diagnostic.line,
		diagnostic.kind
	)
}

/// Exclude and passthrough matchers, rooted at the source root.
struct Filters {
	root: PathBuf,
	exclude: Gitignore,
	passthrough: GlobSet,
}

impl Filters {
	fn new(source: &Path, options: &RunOptions) -> PreprocessResult<Self> {
		let root = if source.is_dir() {
			source.to_path_buf()
		} else {
			source.parent().map_or_else(PathBuf::new, Path::to_path_buf)
		};

		let mut exclude = GitignoreBuilder::new(&root);
		for pattern in &options.exclude_patterns {
			exclude
				.add_line(None, pattern)
				.map_err(|e| PreprocessError::InvalidPattern {
					pattern: pattern.clone(),
					reason: e.to_string(),
				})?;
		}
		let exclude = exclude.build().map_err(|e| PreprocessError::InvalidPattern {
			pattern: options.exclude_patterns.join(", "),
			reason: e.to_string(),
		})?;

		let mut passthrough = GlobSetBuilder::new();
		for pattern in &options.passthrough_patterns {
			let glob = Glob::new(pattern).map_err(|e| PreprocessError::InvalidPattern {
				pattern: pattern.clone(),
				reason: e.to_string(),
			})?;
			passthrough.add(glob);
		}
		let passthrough = passthrough
			.build()
			.map_err(|e| PreprocessError::InvalidPattern {
				pattern: options.passthrough_patterns.join(", "),
				reason: e.to_string(),
			})?;

		Ok(Self {
			root,
			exclude,
			passthrough,
		})
	}

	fn is_excluded(&self, path: &Path) -> bool {
		self.exclude.matched(path, path.is_dir()).is_ignore()
	}

	fn is_passthrough(&self, path: &Path) -> bool {
		let relative = path.strip_prefix(&self.root).unwrap_or(path);
		self.passthrough.is_match(relative)
	}
}

struct Walker<'r> {
	ctx: Context,
	mode: ProcessMode,
	filters: Filters,
	/// The destination root and every mirror directory this run created.
	written_dirs: HashSet<PathBuf>,
	visited_dirs: HashSet<PathBuf>,
	cancel: Option<Arc<AtomicBool>>,
	report: &'r mut dyn Report,
	summary: RunSummary,
}

impl<'r> Walker<'r> {
	fn new(
		options: &RunOptions,
		filters: Filters,
		report: &'r mut dyn Report,
		destination_root: PathBuf,
	) -> Self {
		let mut ctx = Context::new(options.export, options.comment_mark.clone());
		ctx.set_dest_root(&destination_root);

		Self {
			ctx,
			mode: ProcessMode {
				apply_defines: true,
				expand_symbols: options.expand_symbols,
			},
			filters,
			written_dirs: HashSet::from([destination_root]),
			visited_dirs: HashSet::new(),
			cancel: options.cancel.clone(),
			report,
			summary: RunSummary::default(),
		}
	}

	fn finish(mut self) -> RunSummary {
		self.summary.symbols = self.ctx.symbols().clone();
		self.summary
	}

	fn check_cancelled(&self) -> PreprocessResult<()> {
		if self
			.cancel
			.as_ref()
			.is_some_and(|flag| flag.load(Ordering::Relaxed))
		{
			return Err(PreprocessError::Cancelled);
		}

		Ok(())
	}

	fn load_init_file(&mut self, path: &Path) {
		let display = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
		if !path.is_file() {
			self.report.report(&format!(
				"[Warning] Fail to load init file: {}",
				display.display()
			));
			return;
		}

		self.report
			.report(&format!("Loading init file: {}", display.display()));
		self.process_for_side_effects(path);
	}

	fn walk(&mut self, path: &Path) -> PreprocessResult<()> {
		if path.is_dir() {
			return self.walk_dir(path);
		}

		self.check_cancelled()?;
		self.process_file(path);
		Ok(())
	}

	fn walk_dir(&mut self, dir: &Path) -> PreprocessResult<()> {
		if !self.visited_dirs.insert(canonical(dir)) {
			self.report.report(&format!(
				"[Warning] Symlink cycle at {}, skipping",
				dir.display()
			));
			return Ok(());
		}

		let Some(name) = dir.file_name() else {
			return Ok(());
		};

		let target = self.ctx.push_dest(name);
		let result = self.walk_children(dir, &target);
		self.ctx.pop_dest();
		result
	}

	fn walk_children(&mut self, dir: &Path, target: &Path) -> PreprocessResult<()> {
		if let Err(e) = std::fs::create_dir_all(target) {
			self.fail(dir, &e);
			return Ok(());
		}
		self.written_dirs.insert(canonical(target));

		let entries = match sorted_entries(dir) {
			Ok(entries) => entries,
			Err(e) => {
				self.fail(dir, &e);
				return Ok(());
			}
		};

		for entry in entries {
			if self.filters.is_excluded(&entry) {
				debug!(path = %entry.display(), "excluded");
				continue;
			}

			if self.written_dirs.contains(&canonical(&entry)) {
				continue;
			}

			self.walk(&entry)?;
		}

		Ok(())
	}

	fn fail(&mut self, path: &Path, error: &std::io::Error) {
		warn!(path = %path.display(), %error, "io failure");
		self.report.report(&format!(
			"[Error] Failed to process {}: {error}",
			path.display()
		));
		self.summary.failed.push(FailedFile {
			file: path.to_path_buf(),
			reason: error.to_string(),
		});
	}

	fn skip(&mut self, path: &Path, diagnostic: &SyntaxDiagnostic) {
		warn!(path = %path.display(), line = diagnostic.line, reason = %diagnostic.kind, "skipping file");
		self.report.report(&skip_message(path, diagnostic));
		self.summary.skipped.push(SkippedFile {
			file: path.to_path_buf(),
			line: diagnostic.line,
			reason: diagnostic.kind.to_string(),
		});
	}

	/// Process a file reached by the tree walk and write it into the active
	/// destination directory.
	fn process_file(&mut self, path: &Path) {
		let key = canonical(path);
		let visit = self.ctx.visit_of(&key);
		if visit == Some(Visit::Emitted) {
			debug!(path = %path.display(), "already visited");
			return;
		}

		let Some(name) = path.file_name() else {
			return;
		};
		let target = self.ctx.dest_path().join(name);

		if self.filters.is_passthrough(path) {
			self.report
				.report(&format!("Copying: {}", path.display()));
			self.ctx.mark_visited(key, Visit::Emitted);
			match io::copy_file(path, &target) {
				Ok(()) => self.summary.copied.push(path.to_path_buf()),
				Err(e) => self.fail(path, &e),
			}
			return;
		}

		self.report
			.report(&format!("Processing: {}", path.display()));

		let lines = match io::read_lines(path) {
			Ok(lines) => lines,
			Err(e) => {
				self.fail(path, &e);
				return;
			}
		};

		if let Err(diagnostic) = validator::check(&lines, self.ctx.comment_mark()) {
			self.skip(path, &diagnostic);
			return;
		}

		self.ctx.mark_visited(key, Visit::Emitted);
		let mode = ProcessMode {
			// Definitions already applied when the file was included.
			apply_defines: visit.is_none(),
			..self.mode
		};

		let previous = self.ctx.set_namespace(Some(path.to_path_buf()));
		let result = processor::process(self, &lines, mode);
		self.ctx.set_namespace(previous);

		match result {
			Ok(output) => {
				match io::write_lines(&target, &output) {
					Ok(()) => self.summary.processed.push(path.to_path_buf()),
					Err(e) => self.fail(path, &e),
				}
			}
			Err(diagnostic) => self.skip(path, &diagnostic),
		}
	}

	/// Process a file for its definitions only. Output is discarded.
	fn process_for_side_effects(&mut self, path: &Path) {
		let Ok(key) = path.canonicalize() else {
			let from = self
				.ctx
				.namespace()
				.map_or_else(|| "command line".to_string(), |ns| ns.display().to_string());
			self.report.report(&format!(
				"[Warning] Include not found: {} (from {from})",
				path.display()
			));
			return;
		};

		if self.ctx.is_visited(&key) {
			debug!(path = %path.display(), "include already visited");
			return;
		}

		let lines = match io::read_lines(&key) {
			Ok(lines) => lines,
			Err(e) => {
				self.fail(&key, &e);
				return;
			}
		};

		if let Err(diagnostic) = validator::check(&lines, self.ctx.comment_mark()) {
			self.skip(&key, &diagnostic);
			return;
		}

		self.report
			.report(&format!("Including: {}", key.display()));
		self.ctx.mark_visited(key.clone(), Visit::Included);

		let mode = ProcessMode {
			apply_defines: true,
			expand_symbols: false,
		};
		let previous = self.ctx.set_namespace(Some(key.clone()));
		let result = processor::process(self, &lines, mode);
		self.ctx.set_namespace(previous);

		match result {
			Ok(_) => self.summary.included.push(key),
			Err(diagnostic) => self.skip(&key, &diagnostic),
		}
	}
}

impl Session for Walker<'_> {
	fn context(&mut self) -> &mut Context {
		&mut self.ctx
	}

	// Cancellation is only observed between files, so an include always runs.
	fn include(&mut self, path: &Path) {
		self.process_for_side_effects(path);
	}
}
