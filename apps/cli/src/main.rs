//! nirvana-assets CLI: keeps the Nirvana app's bundled assets up to date.
//!
//! Regenerates the dietary dashboard WebView page and fetches the food
//! recognition model into `app/src/main/assets`.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
