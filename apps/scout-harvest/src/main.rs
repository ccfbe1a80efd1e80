use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = scout_harvest::Args::parse();
	scout_harvest::run(args).await
}
