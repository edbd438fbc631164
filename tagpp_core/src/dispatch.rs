use std::fmt::Display;
use std::path::PathBuf;

use logos::Logos;
use snailquote::unescape;

use crate::context::SymbolValue;
use crate::validator::SyntaxErrorKind;

/// Tokens recognised at the head of a comment body, right after the comment
/// mark.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum HeadToken {
	#[token("#")]
	Sigil,
	#[regex(r"[ \t]+")]
	Whitespace,
	#[token("if")]
	If,
	#[token("elseif")]
	ElseIf,
	#[token("else")]
	Else,
	#[token("endif")]
	EndIf,
	#[token("define")]
	Define,
	#[token("include")]
	Include,
	#[token("export")]
	Export,
	#[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
	Word,
}

/// Tokens of a predicate or a `define` head.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum ArgToken {
	#[token("!")]
	Bang,
	#[token("=")]
	Equals,
	#[regex(r"[ \t]+")]
	Whitespace,
	#[regex(r"[A-Za-z_][A-Za-z0-9_.\-]*")]
	Ident,
}

/// The closed set of directive keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
	If,
	ElseIf,
	Else,
	EndIf,
	Define,
	Include,
	Export,
}

impl Keyword {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::If => "if",
			Self::ElseIf => "elseif",
			Self::Else => "else",
			Self::EndIf => "endif",
			Self::Define => "define",
			Self::Include => "include",
			Self::Export => "export",
		}
	}

	fn from_token(token: HeadToken) -> Option<Self> {
		match token {
			HeadToken::If => Some(Self::If),
			HeadToken::ElseIf => Some(Self::ElseIf),
			HeadToken::Else => Some(Self::Else),
			HeadToken::EndIf => Some(Self::EndIf),
			HeadToken::Define => Some(Self::Define),
			HeadToken::Include => Some(Self::Include),
			HeadToken::Export => Some(Self::Export),
			HeadToken::Sigil | HeadToken::Whitespace | HeadToken::Word => None,
		}
	}
}

impl Display for Keyword {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

/// A directive line split into its keyword and raw argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
	pub keyword: Keyword,
	pub argument: Option<String>,
}

/// How a single input line is classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
	/// Ordinary content, copied verbatim when active.
	Plain,
	/// A directive.
	Tag(Tag),
	/// A `#`-sigil directive whose keyword is not in the closed set.
	Unknown(&'a str),
}

/// Classify `line` against the configured comment mark.
///
/// The line is left-trimmed and must start with `mark`. The comment body may
/// begin with whitespace and then a keyword, or with the `#` sigil directly
/// followed by a keyword (`//#if FOO`). A keyword only counts when it ends at
/// whitespace or at the end of the line, so `// ifdef` and `// if(x)` are
/// plain comments.
pub fn classify<'a>(line: &'a str, mark: &str) -> LineKind<'a> {
	if mark.is_empty() {
		return LineKind::Plain;
	}

	let Some(body) = line.trim_start().strip_prefix(mark) else {
		return LineKind::Plain;
	};

	let mut lexer = HeadToken::lexer(body);
	let (token, sigil) = match lexer.next() {
		Some(Ok(HeadToken::Sigil)) => match lexer.next() {
			Some(Ok(token)) => (token, true),
			_ => return LineKind::Plain,
		},
		Some(Ok(HeadToken::Whitespace)) => match lexer.next() {
			Some(Ok(token)) => (token, false),
			_ => return LineKind::Plain,
		},
		Some(Ok(token)) => (token, false),
		_ => return LineKind::Plain,
	};

	head_to_kind(token, &lexer, sigil)
}

fn head_to_kind<'a>(
	token: HeadToken,
	lexer: &logos::Lexer<'a, HeadToken>,
	sigil: bool,
) -> LineKind<'a> {
	let word = lexer.slice();
	let rest = lexer.remainder();
	let at_boundary = rest.is_empty() || rest.starts_with(char::is_whitespace);

	if let Some(keyword) = Keyword::from_token(token) {
		if at_boundary {
			let argument = rest.trim();
			return LineKind::Tag(Tag {
				keyword,
				argument: (!argument.is_empty()).then(|| argument.to_string()),
			});
		}
	}

	if sigil
		&& at_boundary
		&& token == HeadToken::Word
		&& word.chars().all(|ch| ch.is_ascii_lowercase())
	{
		return LineKind::Unknown(word);
	}

	LineKind::Plain
}

/// Select the directive for a line, if it is one.
pub fn select(line: &str, mark: &str) -> Option<Tag> {
	match classify(line, mark) {
		LineKind::Tag(tag) => Some(tag),
		LineKind::Plain | LineKind::Unknown(_) => None,
	}
}

/// What a conditional predicate tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
	/// The run-wide export flag.
	Export,
	/// Whether a symbol is defined.
	Symbol(String),
}

/// `!`? followed by `export` or a symbol name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
	pub negated: bool,
	pub subject: Subject,
}

/// A fully parsed directive. Processing dispatches on this tagged union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
	If(Predicate),
	ElseIf(Predicate),
	Else,
	EndIf,
	Define { name: String, value: SymbolValue },
	Include(PathBuf),
	/// The polarity the export flag must have for the gated lines to show.
	Export(bool),
}

impl Tag {
	/// Parse the argument according to the keyword.
	pub fn parse(&self) -> Result<Directive, SyntaxErrorKind> {
		let argument = self.argument.as_deref();
		match self.keyword {
			Keyword::If => parse_predicate(self.keyword, argument).map(Directive::If),
			Keyword::ElseIf => parse_predicate(self.keyword, argument).map(Directive::ElseIf),
			// Trailing text after `else`/`endif` is a label.
			Keyword::Else if argument.is_some_and(|label| label.split_whitespace().next() == Some("if")) => {
				Err(SyntaxErrorKind::ElseIfSpelledApart)
			}
			Keyword::Else => Ok(Directive::Else),
			Keyword::EndIf => Ok(Directive::EndIf),
			Keyword::Define => parse_define(argument),
			Keyword::Include => parse_include(argument),
			Keyword::Export => parse_polarity(argument).map(Directive::Export),
		}
	}
}

fn parse_predicate(keyword: Keyword, argument: Option<&str>) -> Result<Predicate, SyntaxErrorKind> {
	let Some(argument) = argument else {
		return Err(SyntaxErrorKind::MissingArgument(keyword));
	};
	let invalid = || SyntaxErrorKind::InvalidPredicate(argument.to_string());

	let mut lexer = ArgToken::lexer(argument);
	let mut negated = false;
	let mut name = None;

	while let Some(token) = lexer.next() {
		match token.map_err(|()| invalid())? {
			ArgToken::Whitespace => {}
			ArgToken::Bang if !negated && name.is_none() => negated = true,
			ArgToken::Ident if name.is_none() => name = Some(lexer.slice()),
			_ => return Err(invalid()),
		}
	}

	let subject = match name {
		Some("export") => Subject::Export,
		Some(symbol) => Subject::Symbol(symbol.to_string()),
		None => return Err(invalid()),
	};

	Ok(Predicate { negated, subject })
}

fn parse_define(argument: Option<&str>) -> Result<Directive, SyntaxErrorKind> {
	let Some(argument) = argument else {
		return Err(SyntaxErrorKind::MissingArgument(Keyword::Define));
	};
	let invalid = || SyntaxErrorKind::InvalidDefine(argument.to_string());

	let mut lexer = ArgToken::lexer(argument);
	let name = match lexer.next() {
		Some(Ok(ArgToken::Ident)) => lexer.slice().to_string(),
		_ => return Err(invalid()),
	};

	loop {
		match lexer.next() {
			None => {
				return Ok(Directive::Define {
					name,
					value: SymbolValue::Flag(true),
				});
			}
			Some(Ok(ArgToken::Whitespace)) => {}
			Some(Ok(ArgToken::Equals)) => break,
			Some(_) => return Err(invalid()),
		}
	}

	let literal = lexer.remainder().trim();
	let value = if is_quoted(literal) {
		SymbolValue::Text(unescape(literal).map_err(|_| invalid())?)
	} else {
		SymbolValue::from_literal(literal)
	};

	Ok(Directive::Define { name, value })
}

fn parse_include(argument: Option<&str>) -> Result<Directive, SyntaxErrorKind> {
	let Some(argument) = argument else {
		return Err(SyntaxErrorKind::MissingArgument(Keyword::Include));
	};

	let path = if is_quoted(argument) {
		unescape(argument).map_err(|_| SyntaxErrorKind::InvalidInclude(argument.to_string()))?
	} else {
		argument.to_string()
	};

	if path.is_empty() {
		return Err(SyntaxErrorKind::InvalidInclude(argument.to_string()));
	}

	Ok(Directive::Include(PathBuf::from(path)))
}

fn parse_polarity(argument: Option<&str>) -> Result<bool, SyntaxErrorKind> {
	match argument {
		None | Some("on" | "true" | "yes") => Ok(true),
		Some("off" | "false" | "no") => Ok(false),
		Some(other) => Err(SyntaxErrorKind::InvalidPolarity(other.to_string())),
	}
}

fn is_quoted(text: &str) -> bool {
	text.len() >= 2
		&& ((text.starts_with('"') && text.ends_with('"'))
			|| (text.starts_with('\'') && text.ends_with('\'')))
}
