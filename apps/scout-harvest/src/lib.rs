use std::{fs, path::PathBuf};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use scout_config::Config;
use scout_service::{HarvestReport, Harvester};

#[derive(Debug, Parser)]
#[command(
	version = scout_cli::VERSION,
	rename_all = "kebab",
	styles = scout_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Overrides `search.filter`.
	#[arg(long, value_name = "QUERY")]
	pub filter: Option<String>,
	/// Overrides `search.max_pages`.
	#[arg(long, value_name = "N")]
	pub max_pages: Option<u32>,
	/// Report destination. Defaults to stdout.
	#[arg(long, short = 'o', value_name = "FILE")]
	pub output: Option<PathBuf>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = load_config(&args)?;
	init_tracing(&config)?;
	let harvester = Harvester::new(config)?;
	let cancel = CancellationToken::new();
	let interrupt = cancel.clone();

	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			tracing::warn!("Interrupt received. Letting in-flight requests finish.");
			interrupt.cancel();
		}
	});

	let report = harvester.run(&cancel).await?;

	write_report(&report, args.output.as_ref())?;

	Ok(())
}

/// Loads the file, then applies and re-validates command-line overrides.
pub fn load_config(args: &Args) -> color_eyre::Result<Config> {
	let mut config = scout_config::load(&args.config)?;

	if let Some(filter) = args.filter.as_deref().map(str::trim).filter(|filter| !filter.is_empty()) {
		config.search.filter = Some(filter.to_string());
	}
	if let Some(max_pages) = args.max_pages {
		config.search.max_pages = max_pages;
	}

	scout_config::validate(&config)?;

	Ok(config)
}

fn write_report(report: &HarvestReport, output: Option<&PathBuf>) -> color_eyre::Result<()> {
	let json = serde_json::to_string_pretty(report)?;

	match output {
		Some(path) => {
			fs::write(path, json)?;
			tracing::info!(path = %path.display(), "Report written.");
		},
		None => println!("{json}"),
	}

	Ok(())
}

fn init_tracing(config: &Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init().ok();
	Ok(())
}
