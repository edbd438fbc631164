use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use owo_colors::OwoColorize;
use tagpp_cli::Commands;
use tagpp_cli::OutputFormat;
use tagpp_cli::TagppCli;
use tagpp_core::DEFAULT_INIT_FILE;
use tagpp_core::Report;
use tagpp_core::RunOptions;
use tagpp_core::RunSummary;
use tagpp_core::SkippedFile;
use tagpp_core::TagppConfig;
use tagpp_core::check_tree;
use tagpp_core::parse_symbol_assignment;
use tagpp_core::preprocess;
use tracing::debug;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
}

/// Flags of the `run` subcommand.
struct RunArgs<'a> {
	source: &'a Path,
	dest: &'a Path,
	export: Option<bool>,
	init_file: Option<&'a Path>,
	comment_mark: Option<&'a str>,
	define: &'a [String],
	expand: bool,
	format: OutputFormat,
}

fn main() {
	let args = TagppCli::parse();

	// Respect NO_COLOR env var, --no-color flag and terminal support.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stderr).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose);

	let result = match &args.command {
		Some(Commands::Init) => run_init().map(|()| true),
		Some(Commands::Run {
			source,
			dest,
			export,
			init_file,
			comment_mark,
			define,
			expand,
			format,
		}) => {
			let run = RunArgs {
				source,
				dest,
				export: *export,
				init_file: init_file.as_deref(),
				comment_mark: comment_mark.as_deref(),
				define,
				expand: *expand,
				format: *format,
			};
			run_preprocess(&args, &run).map(|()| true)
		}
		Some(Commands::Check {
			source,
			comment_mark,
			format,
		}) => run_check(&args, source, comment_mark.as_deref(), *format),
		None => {
			eprintln!("No subcommand specified. Run `tagpp --help` for usage.");
			process::exit(1);
		}
	};

	match result {
		Ok(true) => {}
		Ok(false) => process::exit(1),
		Err(e) => {
			// Try to render through miette for rich diagnostics with help text
			// and error codes.
			match e.downcast::<tagpp_core::PreprocessError>() {
				Ok(error) => {
					let report: miette::Report = (*error).into();
					eprintln!("{report:?}");
				}
				Err(e) => {
					eprintln!("{} {e}", colored!("error:", red));
				}
			}
			process::exit(2);
		}
	}
}

/// Log to stderr. `TAGPP_LOG` takes precedence over `--verbose`.
fn init_tracing(verbose: bool) {
	let default = if verbose { "tagpp_core=debug" } else { "error" };
	let filter = EnvFilter::try_from_env("TAGPP_LOG").unwrap_or_else(|_| EnvFilter::new(default));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.init();
}

/// Prints report messages to stderr, coloring warnings and errors.
struct ConsoleReport;

impl Report for ConsoleReport {
	fn report(&mut self, message: &str) {
		if message.starts_with("[Error]") {
			eprintln!("{}", colored!(message, red));
		} else if message.starts_with("[Warning]") {
			eprintln!("{}", colored!(message, yellow));
		} else {
			eprintln!("{message}");
		}
	}
}

fn load_config(args: &TagppCli) -> Result<Option<TagppConfig>, Box<dyn std::error::Error>> {
	if let Some(path) = &args.config {
		debug!(path = %path.display(), "loading explicit config");
		return Ok(Some(TagppConfig::load_from(path)?));
	}

	let cwd = std::env::current_dir()?;
	let config = TagppConfig::load(&cwd)?;
	debug!(found = config.is_some(), "config discovery");
	Ok(config)
}

fn run_init() -> Result<(), Box<dyn std::error::Error>> {
	let config_path = PathBuf::from("tagpp.toml");
	let init_path = PathBuf::from(DEFAULT_INIT_FILE);

	if config_path.exists() {
		println!("Config file already exists: {}", config_path.display());
	} else {
		let sample_config = "# tagpp configuration\n\n# Turn export mode on for every \
		                     run.\n# export = true\n\n# Prefix that marks a directive \
		                     line.\ncomment_mark = \"//\"\n\n# File processed before the tree \
		                     for its definitions.\ninit_file = \"global.def\"\n\n# Replace \
		                     ${NAME} references in emitted lines.\n# expand_symbols = \
		                     true\n\n# [symbols]\n# VENDOR = \"acme\"\n\n# [exclude]\n# patterns = \
		                     [\"target/\"]\n\n# [passthrough]\n# patterns = [\"*.png\", \
		                     \"*.jar\"]\n";

		std::fs::write(&config_path, sample_config)?;
		println!("Created {}", config_path.display());
	}

	if init_path.exists() {
		println!("Init file already exists: {}", init_path.display());
	} else {
		let sample_init = "// Definitions loaded before every run.\n// Example: define VENDOR=acme\n";
		std::fs::write(&init_path, sample_init)?;
		println!("Created {}", init_path.display());
	}

	println!();
	println!("Next steps:");
	println!("  1. Add directives to your sources:");
	println!("     // if export");
	println!("     // endif");
	println!("  2. Run `tagpp check --source <dir>` to validate them");
	println!("  3. Run `tagpp run --source <dir> --dest <dir> --export`");

	Ok(())
}

fn run_preprocess(args: &TagppCli, run: &RunArgs<'_>) -> Result<(), Box<dyn std::error::Error>> {
	let config = load_config(args)?;
	let mut options = RunOptions::from_config(config.as_ref());

	if let Some(export) = run.export {
		options.export = export;
	}
	options.expand_symbols |= run.expand;
	if let Some(mark) = run.comment_mark {
		options.comment_mark = mark.to_string();
	}
	if let Some(init_file) = run.init_file {
		options.init_file = Some(init_file.to_path_buf());
	} else if options.init_file.is_none() && Path::new(DEFAULT_INIT_FILE).is_file() {
		options.init_file = Some(PathBuf::from(DEFAULT_INIT_FILE));
	}
	for raw in run.define {
		options.symbols.push(parse_symbol_assignment(raw)?);
	}

	let summary = preprocess(run.source, run.dest, &options, &mut ConsoleReport)?;

	match run.format {
		OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
		OutputFormat::Text => print_summary(&summary),
	}

	Ok(())
}

fn print_summary(summary: &RunSummary) {
	let status = if summary.is_ok() {
		colored!("Done:", green)
	} else {
		colored!("Done with problems:", yellow)
	};

	println!(
		"{status} {} processed, {} copied, {} included, {} skipped, {} failed",
		summary.processed.len(),
		summary.copied.len(),
		summary.included.len(),
		summary.skipped.len(),
		summary.failed.len()
	);

	print_skipped(&summary.skipped);
	for failed in &summary.failed {
		println!("  failed {}: {}", failed.file.display(), failed.reason);
	}
}

fn print_skipped(skipped: &[SkippedFile]) {
	for file in skipped {
		println!(
			"  skipped {}:{}: {}",
			file.file.display(),
			file.line,
			file.reason
		);
	}
}

fn run_check(
	args: &TagppCli,
	source: &Path,
	comment_mark: Option<&str>,
	format: OutputFormat,
) -> Result<bool, Box<dyn std::error::Error>> {
	let config = load_config(args)?;
	let mut options = RunOptions::from_config(config.as_ref());
	if let Some(mark) = comment_mark {
		options.comment_mark = mark.to_string();
	}

	let rejected = check_tree(source, &options, &mut ConsoleReport)?;
	let ok = rejected.is_empty();

	match format {
		OutputFormat::Json => {
			let output = serde_json::json!({
				"ok": ok,
				"rejected": rejected,
			});
			println!("{output}");
		}
		OutputFormat::Text if ok => {
			println!("Check passed: every directive is well formed.");
		}
		OutputFormat::Text => {
			println!(
				"{} {} file(s) would be skipped",
				colored!("Check failed:", red),
				rejected.len()
			);
			print_skipped(&rejected);
		}
	}

	Ok(ok)
}
