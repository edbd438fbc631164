use std::borrow::Cow;

use crate::context::SymbolTable;

/// Replace `${NAME}` references in `line` with the bound symbol's text.
///
/// Names that are not bound, and `${` sequences without a closing brace, are
/// left as they are.
pub fn expand_symbols<'a>(line: &'a str, symbols: &SymbolTable) -> Cow<'a, str> {
	if !line.contains("${") {
		return Cow::Borrowed(line);
	}

	let mut output = String::with_capacity(line.len());
	let mut rest = line;

	while let Some(start) = rest.find("${") {
		output.push_str(&rest[..start]);
		let after_open = &rest[start + 2..];

		let Some(end) = after_open.find('}') else {
			output.push_str(&rest[start..]);
			return Cow::Owned(output);
		};

		let name = &after_open[..end];
		match symbols.get(name) {
			Some(value) => output.push_str(&value.to_string()),
			None => output.push_str(&rest[start..start + 2 + end + 1]),
		}
		rest = &after_open[end + 1..];
	}

	output.push_str(rest);
	Cow::Owned(output)
}
