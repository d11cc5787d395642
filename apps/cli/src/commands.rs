//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use nirvana_assets_dashboard::{
    DashboardOutcome, FetchOutcome, FixedAnswer, OverwritePrompt, UpdateDashboardConfig,
    update_dashboard,
};
use nirvana_assets_models::{
    DirectDownloadOptions, HubClient, HubOptions, ModelHandle, copy_model_assets,
    download_model_file,
};
use nirvana_assets_shared::{AppConfig, ProgressReporter, init_config, resolve_config};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// nirvana-assets: regenerate the Nirvana app's dashboard and model assets.
#[derive(Parser)]
#[command(
    name = "nirvana-assets",
    version,
    about = "Regenerate the Nirvana app's dietary dashboard and fetch its food recognition model.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.nirvana-assets/nirvana-assets.toml).
    #[arg(long, global = true, env = "NIRVANA_ASSETS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Clone the notebook repository and regenerate the dashboard HTML.
    Dashboard {
        /// Notebook repository to clone.
        #[arg(long)]
        repo_url: Option<String>,

        /// Directory receiving dashboard.html.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Delete an existing checkout and clone again without asking.
        #[arg(long, conflicts_with = "reuse")]
        yes: bool,

        /// Reuse an existing checkout without asking.
        #[arg(long)]
        reuse: bool,

        /// Skip the nbconvert availability check.
        #[arg(long)]
        skip_requirements: bool,
    },

    /// Fetch the food recognition model.
    Model {
        #[command(subcommand)]
        source: ModelSource,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Where the model comes from.
#[derive(Subcommand)]
pub(crate) enum ModelSource {
    /// Download from the Kaggle model hub and copy allow-listed files into assets.
    Hub {
        /// Model handle: owner/model/framework/variation[/version].
        #[arg(long)]
        handle: Option<String>,

        /// Assets directory receiving the model files.
        #[arg(long)]
        assets_dir: Option<PathBuf>,
    },
    /// Download a single model file from a URL.
    Url {
        /// Model file URL.
        #[arg(long)]
        url: Option<String>,

        /// Destination file.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "nirvana_assets=info",
        1 => "nirvana_assets=debug",
        _ => "nirvana_assets=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Dashboard {
            repo_url,
            output_dir,
            yes,
            reuse,
            skip_requirements,
        } => {
            cmd_dashboard(
                config_path,
                repo_url,
                output_dir,
                answer_from_flags(yes, reuse),
                skip_requirements,
            )
            .await
        }
        Command::Model { source } => match source {
            ModelSource::Hub { handle, assets_dir } => {
                cmd_model_hub(config_path, handle, assets_dir).await
            }
            ModelSource::Url { url, out } => cmd_model_url(config_path, url, out).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

/// `--yes` / `--reuse` replace the interactive prompt.
fn answer_from_flags(yes: bool, reuse: bool) -> Option<FixedAnswer> {
    match (yes, reuse) {
        (true, _) => Some(FixedAnswer(true)),
        (_, true) => Some(FixedAnswer(false)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_dashboard(
    config_path: Option<&Path>,
    repo_url: Option<String>,
    output_dir: Option<PathBuf>,
    answer: Option<FixedAnswer>,
    skip_requirements: bool,
) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(url) = repo_url {
        config.dashboard.repo_url = url;
    }
    if let Some(dir) = output_dir {
        config.dashboard.output_dir = dir.to_string_lossy().into_owned();
    }
    config.validate()?;

    let mut pipeline = UpdateDashboardConfig::from(&config);
    pipeline.check_requirements = !skip_requirements;

    info!(
        repo = %pipeline.repo_url,
        output_dir = %pipeline.output_dir.display(),
        "updating dashboard"
    );

    let reporter = CliProgress::new();
    let stdin_prompt = StdinPrompt {
        spinner: reporter.spinner.clone(),
    };
    let prompt: &dyn OverwritePrompt = match &answer {
        Some(fixed) => fixed,
        None => &stdin_prompt,
    };

    let outcome = update_dashboard(&pipeline, prompt, &reporter).await;
    reporter.spinner.finish_and_clear();

    match outcome? {
        DashboardOutcome::Updated {
            html_path,
            notebook,
            fetch,
            elapsed,
        } => {
            let checkout = match fetch {
                FetchOutcome::Cloned => "cloned",
                FetchOutcome::Reused => "reused",
            };
            println!();
            println!("  Dashboard updated successfully!");
            println!("  Notebook:  {notebook}");
            println!("  Checkout:  {checkout}");
            println!("  Output:    {}", html_path.display());
            println!("  Time:      {:.1}s", elapsed.as_secs_f64());
            println!();
        }
        DashboardOutcome::NoNotebooks => {
            println!("No Jupyter notebooks found in the repository.");
        }
    }

    Ok(())
}

async fn cmd_model_hub(
    config_path: Option<&Path>,
    handle: Option<String>,
    assets_dir: Option<PathBuf>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let handle: ModelHandle = handle.as_deref().unwrap_or(&config.hub.handle).parse()?;
    let assets_dir = assets_dir.unwrap_or_else(|| PathBuf::from(&config.hub.assets_dir));

    let options = HubOptions::from_config(&config.hub)?;
    info!(
        %handle,
        cache = %options.cache_root.display(),
        "fetching model from hub"
    );
    let client = HubClient::new(options)?;

    let reporter = CliProgress::new();
    let download = client.model_download(&handle, &reporter).await;
    reporter.spinner.finish_and_clear();
    let download = download?;

    println!("Model downloaded to: {}", download.path.display());

    let copied = copy_model_assets(&download.path, &assets_dir, &config.hub.extensions)?;
    for path in &copied {
        println!("Copied {} to assets folder", path.display());
    }

    println!();
    println!("  Model assets updated!");
    println!("  Version:  {}", download.version);
    println!("  Cached:   {}", if download.cached { "yes" } else { "no" });
    println!("  Files:    {}", copied.len());
    println!("  Assets:   {}", assets_dir.display());
    println!();

    Ok(())
}

async fn cmd_model_url(
    config_path: Option<&Path>,
    url: Option<String>,
    out: Option<PathBuf>,
) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(url) = url {
        config.direct.url = url;
    }
    if let Some(out) = out {
        config.direct.destination = out.to_string_lossy().into_owned();
    }
    let options = DirectDownloadOptions::try_from(&config.direct)?;

    let reporter = CliProgress::new();
    let outcome = download_model_file(&options, &reporter).await;
    reporter.spinner.finish_and_clear();
    let outcome = outcome?;

    println!();
    println!("  Model downloaded successfully!");
    println!("  Path:     {}", outcome.final_path.display());
    println!("  Size:     {}", HumanBytes(outcome.bytes_downloaded));
    println!("  SHA-256:  {}", outcome.checksum);
    println!();

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .map(|style| style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]))
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn bytes_downloaded(&self, current: u64, total: Option<u64>) {
        let message = match total {
            Some(total) => format!("Downloading {} / {}", HumanBytes(current), HumanBytes(total)),
            None => format!("Downloading {}", HumanBytes(current)),
        };
        self.spinner.set_message(message);
    }

    fn done(&self) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Interactive overwrite prompt
// ---------------------------------------------------------------------------

/// Asks on stdin whether to replace an existing checkout.
struct StdinPrompt {
    spinner: ProgressBar,
}

impl OverwritePrompt for StdinPrompt {
    fn confirm_overwrite(&self, path: &Path) -> bool {
        self.spinner.suspend(|| {
            println!("Directory {} already exists.", path.display());
            print!("Do you want to delete it and clone again? (y/n): ");
            let _ = std::io::stdout().flush();

            let mut answer = String::new();
            match std::io::stdin().read_line(&mut answer) {
                Ok(_) => is_yes(&answer),
                Err(_) => false,
            }
        })
    }
}

fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}
