mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[command(flatten)]
	verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Run the batch band-math pipeline over an area and time range
	Compute(tools::compute::Subcommand),

	/// Export raw bands as per-scene multi-band GeoTIFFs
	Extract(tools::extract::Subcommand),

	/// Render a single XYZ map tile
	Tile(tools::tile::Subcommand),

	/// Search the scene catalog and print the matching features
	Search(tools::search::Subcommand),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	env_logger::Builder::new()
		.filter_level(cli.verbose.log_level_filter())
		.format_timestamp(None)
		.init();

	run(cli)
}

fn run(cli: Cli) -> Result<()> {
	match &cli.command {
		Commands::Compute(arguments) => tools::compute::run(arguments),
		Commands::Extract(arguments) => tools::extract::run(arguments),
		Commands::Tile(arguments) => tools::tile::run(arguments),
		Commands::Search(arguments) => tools::search::run(arguments),
	}
}

#[cfg(test)]
mod tests {
	use crate::Cli;
	use clap::Parser;

	#[test]
	fn help_lists_the_subcommands() {
		let err = Cli::try_parse_from(["vcube"]).unwrap_err().to_string();
		assert!(err.contains("Usage: vcube"));
		for name in ["compute", "extract", "tile", "search"] {
			assert!(err.contains(name), "help must mention '{name}'");
		}
	}

	#[test]
	fn version_flag_parses() {
		let err = Cli::try_parse_from(["vcube", "-V"]).unwrap_err().to_string();
		assert!(err.starts_with("vcube "));
	}

	#[test]
	fn compute_requires_a_bbox() {
		let err = Cli::try_parse_from(["vcube", "compute", "--output-dir", "/tmp/x"]).unwrap_err();
		assert!(err.to_string().contains("--bbox"));
	}
}
