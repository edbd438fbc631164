use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

/// Normalize CRLF and lone CR line endings to LF.
pub fn normalize_line_endings(content: &str) -> String {
	if content.contains('\r') {
		content.replace("\r\n", "\n").replace('\r', "\n")
	} else {
		content.to_string()
	}
}

/// Read a file and materialize its lines without terminators.
pub fn read_lines(path: &Path) -> std::io::Result<Vec<String>> {
	let raw = std::fs::read_to_string(path)?;
	Ok(normalize_line_endings(&raw)
		.lines()
		.map(ToString::to_string)
		.collect())
}

fn temp_file_for(path: &Path) -> std::io::Result<NamedTempFile> {
	let dir = path
		.parent()
		.filter(|parent| !parent.as_os_str().is_empty())
		.unwrap_or_else(|| Path::new("."));
	tempfile::Builder::new().prefix(".tagpp-").tempfile_in(dir)
}

/// Write `lines`, each terminated by `\n`, to `path`.
///
/// The content goes to a uniquely named sibling temporary file first and is
/// renamed into place, so a failure never leaves a partially written
/// destination. The temporary file is removed when it is not persisted.
pub fn write_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
	let mut temp = temp_file_for(path)?;
	{
		let mut writer = std::io::BufWriter::new(temp.as_file_mut());
		for line in lines {
			writer.write_all(line.as_bytes())?;
			writer.write_all(b"\n")?;
		}
		writer.flush()?;
	}

	temp.persist(path).map(drop).map_err(|e| e.error)
}

/// Copy `from` to `to` byte-for-byte with the same temporary-file discipline
/// as [`write_lines`].
pub fn copy_file(from: &Path, to: &Path) -> std::io::Result<()> {
	let mut source = std::fs::File::open(from)?;
	let mut temp = temp_file_for(to)?;
	std::io::copy(&mut source, temp.as_file_mut())?;

	temp.persist(to).map(drop).map_err(|e| e.error)
}
