use thiserror::Error;

use crate::dispatch::Directive;
use crate::dispatch::Keyword;
use crate::dispatch::LineKind;
use crate::dispatch::classify;

/// Why a file's directive structure was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SyntaxErrorKind {
	#[error("unknown directive `{0}`")]
	UnknownDirective(String),
	#[error("`{0}` without a matching `if`")]
	Unmatched(Keyword),
	#[error("`elseif` after `else`")]
	ElseIfAfterElse,
	#[error("second `else` in the same block")]
	DuplicateElse,
	#[error("`if` opened on line {opened_at} is never closed")]
	Unterminated { opened_at: usize },
	#[error("`{0}` needs an argument")]
	MissingArgument(Keyword),
	#[error("invalid predicate `{0}`, expected `NAME`, `!NAME`, `export` or `!export`")]
	InvalidPredicate(String),
	#[error("invalid definition `{0}`, expected `NAME` or `NAME=value`")]
	InvalidDefine(String),
	#[error("invalid include path `{0}`")]
	InvalidInclude(String),
	#[error("invalid export polarity `{0}`, expected `on` or `off`")]
	InvalidPolarity(String),
	#[error("`else if` is written `elseif`")]
	ElseIfSpelledApart,
}

/// A structural problem found while pre-scanning a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxDiagnostic {
	/// 1-indexed line number.
	pub line: usize,
	pub kind: SyntaxErrorKind,
}

impl SyntaxDiagnostic {
	fn new(line: usize, kind: SyntaxErrorKind) -> Self {
		Self { line, kind }
	}
}

/// One open `if` seen during the pre-scan.
struct OpenBlock {
	opened_at: usize,
	seen_else: bool,
}

/// Scan every line of a file without producing output and report the first
/// structural problem.
///
/// Directive arguments are checked in every branch, active or not, so a
/// broken directive is caught regardless of the symbols in play.
pub fn check<S: AsRef<str>>(lines: &[S], comment_mark: &str) -> Result<(), SyntaxDiagnostic> {
	let mut open: Vec<OpenBlock> = Vec::new();

	for (index, line) in lines.iter().enumerate() {
		let number = index + 1;
		let tag = match classify(line.as_ref(), comment_mark) {
			LineKind::Plain => continue,
			LineKind::Unknown(word) => {
				return Err(SyntaxDiagnostic::new(
					number,
					SyntaxErrorKind::UnknownDirective(word.to_string()),
				));
			}
			LineKind::Tag(tag) => tag,
		};

		let directive = tag
			.parse()
			.map_err(|kind| SyntaxDiagnostic::new(number, kind))?;

		match directive {
			Directive::If(_) => {
				open.push(OpenBlock {
					opened_at: number,
					seen_else: false,
				});
			}
			Directive::ElseIf(_) => {
				let Some(block) = open.last() else {
					return Err(SyntaxDiagnostic::new(
						number,
						SyntaxErrorKind::Unmatched(Keyword::ElseIf),
					));
				};
				if block.seen_else {
					return Err(SyntaxDiagnostic::new(number, SyntaxErrorKind::ElseIfAfterElse));
				}
			}
			Directive::Else => {
				let Some(block) = open.last_mut() else {
					return Err(SyntaxDiagnostic::new(
						number,
						SyntaxErrorKind::Unmatched(Keyword::Else),
					));
				};
				if block.seen_else {
					return Err(SyntaxDiagnostic::new(number, SyntaxErrorKind::DuplicateElse));
				}
				block.seen_else = true;
			}
			Directive::EndIf => {
				if open.pop().is_none() {
					return Err(SyntaxDiagnostic::new(
						number,
						SyntaxErrorKind::Unmatched(Keyword::EndIf),
					));
				}
			}
			Directive::Define { .. } | Directive::Include(_) | Directive::Export(_) => {}
		}
	}

	match open.last() {
		Some(block) => Err(SyntaxDiagnostic::new(
			lines.len(),
			SyntaxErrorKind::Unterminated {
				opened_at: block.opened_at,
			},
		)),
		None => Ok(()),
	}
}

/// `true` when [`check`] finds nothing wrong.
pub fn validate<S: AsRef<str>>(lines: &[S], comment_mark: &str) -> bool {
	check(lines, comment_mark).is_ok()
}
