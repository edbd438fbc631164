use std::path::Path;
use std::path::PathBuf;

use tracing::debug;

use crate::context::Context;
use crate::dispatch::Directive;
use crate::dispatch::Keyword;
use crate::dispatch::Predicate;
use crate::dispatch::Subject;
use crate::dispatch::select;
use crate::expand::expand_symbols;
use crate::validator::SyntaxDiagnostic;
use crate::validator::SyntaxErrorKind;

/// What the directive processors need from the surrounding run.
pub trait Session {
	fn context(&mut self) -> &mut Context;

	/// Process `path` for its side effects only. Called for `include`
	/// directives in active regions, with relative paths already resolved
	/// against the including file's directory.
	fn include(&mut self, path: &Path);
}

/// Forward cursor over a file's materialized lines with look-ahead.
#[derive(Debug, Clone)]
pub struct LineCursor<'a> {
	lines: &'a [String],
	position: usize,
}

impl<'a> LineCursor<'a> {
	pub fn new(lines: &'a [String]) -> Self {
		Self { lines, position: 0 }
	}

	pub fn peek(&self) -> Option<&'a str> {
		self.lines.get(self.position).map(String::as_str)
	}

	pub fn advance(&mut self) -> Option<&'a str> {
		let line = self.peek()?;
		self.position += 1;
		Some(line)
	}

	/// Number of lines consumed so far.
	pub fn position(&self) -> usize {
		self.position
	}

	/// 1-indexed number of the most recently consumed line.
	pub fn line_number(&self) -> usize {
		self.position.max(1)
	}
}

/// Per-file processing switches.
#[derive(Debug, Clone, Copy)]
pub struct ProcessMode {
	/// When false, `define` directives are parsed but have no effect. Used
	/// when a file already applied its definitions through an include.
	pub apply_defines: bool,
	pub expand_symbols: bool,
}

impl Default for ProcessMode {
	fn default() -> Self {
		Self {
			apply_defines: true,
			expand_symbols: false,
		}
	}
}

/// One nested `if` block.
#[derive(Debug, Clone, Copy)]
struct ConditionalFrame {
	/// Whether the currently selected branch of this frame is enabled.
	branch_active: bool,
	/// Whether every enclosing frame was active when this one opened.
	enclosing_enabled: bool,
	/// Whether some branch of this frame has already been selected.
	taken: bool,
}

impl ConditionalFrame {
	fn is_active(self) -> bool {
		self.enclosing_enabled && self.branch_active
	}
}

struct FileProcessor<'a, 's, S: Session + ?Sized> {
	session: &'s mut S,
	cursor: LineCursor<'a>,
	frames: Vec<ConditionalFrame>,
	output: Vec<String>,
	mode: ProcessMode,
	comment_mark: String,
}

/// Run every line of a file through the dispatcher and return the lines to
/// write.
///
/// Plain lines are copied when every open conditional frame is active;
/// directive lines are handed to their processor and never copied. The
/// frame stack is empty again when this returns `Ok`.
pub fn process<S: Session + ?Sized>(
	session: &mut S,
	lines: &[String],
	mode: ProcessMode,
) -> Result<Vec<String>, SyntaxDiagnostic> {
	let comment_mark = session.context().comment_mark().to_string();
	let mut processor = FileProcessor {
		session,
		cursor: LineCursor::new(lines),
		frames: Vec::new(),
		output: Vec::with_capacity(lines.len()),
		mode,
		comment_mark,
	};

	while let Some(line) = processor.cursor.advance() {
		processor.dispatch(line)?;
	}

	debug_assert!(processor.frames.is_empty());
	Ok(processor.output)
}

impl<S: Session + ?Sized> FileProcessor<'_, '_, S> {
	fn error(&self, kind: SyntaxErrorKind) -> SyntaxDiagnostic {
		SyntaxDiagnostic {
			line: self.cursor.line_number(),
			kind,
		}
	}

	fn is_active(&self) -> bool {
		self.frames.last().is_none_or(|frame| frame.is_active())
	}

	fn emit(&mut self, line: &str) {
		if !self.is_active() {
			return;
		}

		if self.mode.expand_symbols {
			let expanded = expand_symbols(line, self.session.context().symbols()).into_owned();
			self.output.push(expanded);
		} else {
			self.output.push(line.to_string());
		}
	}

	fn parse_line(&self, line: &str) -> Result<Option<Directive>, SyntaxDiagnostic> {
		select(line, &self.comment_mark)
			.map(|tag| tag.parse().map_err(|kind| self.error(kind)))
			.transpose()
	}

	/// Handle one line taken from the cursor. Returns how many further lines
	/// were consumed.
	fn dispatch(&mut self, line: &str) -> Result<usize, SyntaxDiagnostic> {
		match self.parse_line(line)? {
			Some(directive) => self.execute(directive),
			None => {
				self.emit(line);
				Ok(0)
			}
		}
	}

	fn execute(&mut self, directive: Directive) -> Result<usize, SyntaxDiagnostic> {
		debug!(line = self.cursor.line_number(), ?directive, "directive");

		match directive {
			Directive::If(predicate) => self.conditional(&predicate),
			Directive::ElseIf(_) => Err(self.error(SyntaxErrorKind::Unmatched(Keyword::ElseIf))),
			Directive::Else => Err(self.error(SyntaxErrorKind::Unmatched(Keyword::Else))),
			Directive::EndIf => Err(self.error(SyntaxErrorKind::Unmatched(Keyword::EndIf))),
			Directive::Define { name, value } => {
				if self.is_active() && self.mode.apply_defines {
					self.session.context().define(name, value);
				}
				Ok(0)
			}
			Directive::Include(path) => {
				if self.is_active() {
					let resolved = self.resolve_include(&path);
					self.session.include(&resolved);
				}
				Ok(0)
			}
			Directive::Export(polarity) => Ok(self.export_gate(polarity)),
		}
	}

	fn evaluate(&mut self, predicate: &Predicate) -> bool {
		let context = self.session.context();
		let holds = match &predicate.subject {
			Subject::Export => context.export(),
			Subject::Symbol(name) => context.is_defined(name),
		};

		holds != predicate.negated
	}

	/// Consume an `if` block through its matching `endif`.
	///
	/// Nested blocks recurse through [`execute`](Self::execute), so an inner
	/// `endif` only ever closes the inner frame. Predicates of frames nested
	/// inside an inactive region are not evaluated.
	fn conditional(&mut self, predicate: &Predicate) -> Result<usize, SyntaxDiagnostic> {
		let opened_at = self.cursor.line_number();
		let start = self.cursor.position();
		let enclosing_enabled = self.is_active();
		let selected = enclosing_enabled && self.evaluate(predicate);

		self.frames.push(ConditionalFrame {
			branch_active: selected,
			enclosing_enabled,
			taken: selected,
		});

		loop {
			let Some(line) = self.cursor.advance() else {
				return Err(self.error(SyntaxErrorKind::Unterminated { opened_at }));
			};

			match self.parse_line(line)? {
				None => self.emit(line),
				Some(Directive::ElseIf(predicate)) => {
					let taken = self.frames.last().is_some_and(|frame| frame.taken);
					let selected = !taken && enclosing_enabled && self.evaluate(&predicate);
					if let Some(frame) = self.frames.last_mut() {
						frame.branch_active = selected;
						frame.taken |= selected;
					}
				}
				Some(Directive::Else) => {
					if let Some(frame) = self.frames.last_mut() {
						frame.branch_active = !frame.taken;
						frame.taken = true;
					}
				}
				Some(Directive::EndIf) => {
					self.frames.pop();
					return Ok(self.cursor.position() - start);
				}
				Some(directive) => {
					self.execute(directive)?;
				}
			}
		}
	}

	/// Consume the run of plain lines after an `export` gate, up to the next
	/// directive, keeping them only when the export flag matches `polarity`.
	fn export_gate(&mut self, polarity: bool) -> usize {
		let start = self.cursor.position();
		let visible = self.session.context().export() == polarity;

		while let Some(line) = self.cursor.peek() {
			if select(line, &self.comment_mark).is_some() {
				break;
			}

			self.cursor.advance();
			if visible {
				self.emit(line);
			}
		}

		self.cursor.position() - start
	}

	fn resolve_include(&mut self, path: &Path) -> PathBuf {
		if path.is_absolute() {
			return path.to_path_buf();
		}

		let base = self
			.session
			.context()
			.namespace()
			.and_then(Path::parent)
			.map(Path::to_path_buf);

		match base {
			Some(base) => base.join(path),
			None => path.to_path_buf(),
		}
	}
}
