use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Produce export-safe and variant-specific copies of annotated source trees.",
	long_about = "tagpp is a directive-driven text preprocessor. Comment lines such as `// if \
	              export`, `// define NAME=value` and `// include common.def` decide which lines \
	              of each source file reach the destination tree.\n\nQuick start:\n  tagpp init   \
	              Create a sample config and init file\n  tagpp check  Validate directive \
	              structure\n  tagpp run    Preprocess a source tree"
)]
pub struct TagppCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to a config file. Defaults to the first of `tagpp.toml`,
	/// `.tagpp.toml` or `.config/tagpp.toml` in the current directory.
	#[arg(long, short, global = true)]
	pub config: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Create a sample `tagpp.toml` and `global.def` in the current
	/// directory.
	///
	/// Existing files are left untouched.
	Init,
	/// Preprocess a source tree into a destination directory.
	///
	/// A directory source is mirrored as a same-named directory inside the
	/// destination. Files with structural errors are reported and skipped;
	/// the rest of the tree is still processed.
	Run {
		/// Source file or directory.
		#[arg(long, short)]
		source: PathBuf,

		/// Existing destination directory.
		#[arg(long, short)]
		dest: PathBuf,

		/// Set export mode, overriding the config file. A bare `--export`
		/// turns it on; `--export false` turns it off.
		#[arg(long, short, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
		export: Option<bool>,

		/// File processed before the tree for its definitions. Defaults to
		/// the configured init file, or `global.def` when that exists.
		#[arg(long)]
		init_file: Option<PathBuf>,

		/// Prefix that marks a directive line.
		#[arg(long)]
		comment_mark: Option<String>,

		/// Define a symbol before the init file runs, as `NAME` or
		/// `NAME=value`. May be repeated.
		#[arg(long = "define", short = 'D', value_name = "NAME[=VALUE]")]
		define: Vec<String>,

		/// Replace `${NAME}` references in emitted lines.
		#[arg(long, default_value_t = false)]
		expand: bool,

		/// Output format for the run summary.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// Validate the directive structure of every file without writing
	/// anything.
	///
	/// Exits with a non-zero status code if any file would be skipped.
	Check {
		/// Source file or directory.
		#[arg(long, short)]
		source: PathBuf,

		/// Prefix that marks a directive line.
		#[arg(long)]
		comment_mark: Option<String>,

		/// Output format for check results.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors and formatting.
	Text,
	/// JSON output for programmatic consumption.
	Json,
}
