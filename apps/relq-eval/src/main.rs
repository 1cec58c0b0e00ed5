// crates.io
use clap::Parser;
// self
use relq_eval::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = Args::parse();
	relq_eval::run(args).await
}
