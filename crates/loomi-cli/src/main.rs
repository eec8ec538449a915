mod scrape;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "loomi")]
#[command(about = "Scrape apparel storefront catalogs into CSV")]
struct Cli {
    /// Site key to scrape (see --list).
    #[arg(default_value = loomi_core::DEFAULT_SITE_KEY)]
    site: String,

    /// Print the configured sites and their strategy chains, then exit.
    #[arg(long, conflicts_with = "env")]
    list: bool,

    /// Print the detected environment capabilities, then exit.
    #[arg(long)]
    env: bool,

    /// Ignore any existing output and overwrite it instead of resuming.
    #[arg(long)]
    fresh: bool,

    /// Product-page concurrency for static fetching (overrides LOOMI_SCRAPER_MAX_WORKERS).
    #[arg(long)]
    workers: Option<usize>,

    /// Site profiles YAML file (overrides LOOMI_SITES_PATH).
    #[arg(long)]
    sites: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = loomi_core::load_app_config_from_env()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let sites_path = cli.sites.as_deref().or(config.sites_path.as_deref());
    let registry = scrape::load_registry(sites_path)?;

    if cli.list {
        print!("{}", scrape::format_sites(&registry));
        return Ok(());
    }
    if cli.env {
        let caps = scrape::probe(&config).await;
        print!("{}", scrape::format_capabilities(&caps));
        return Ok(());
    }

    let options = scrape::RunOptions {
        fresh: cli.fresh,
        workers: cli.workers,
    };
    let summary = scrape::run_site(&config, &registry, &cli.site, &options).await?;
    println!("{summary}");
    Ok(())
}
