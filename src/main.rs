use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use gazette::config::Config;
use gazette::engine::Aggregator;

#[derive(Parser, Debug)]
#[command(
    name = "gazette",
    about = "Aggregates RSS/Atom feeds into paginated static HTML"
)]
struct Args {
    /// Directory to store html files (created if necessary)
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Timeout in seconds when fetching feeds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Minutes to wait between updates
    #[arg(long, value_name = "MINS")]
    wait: Option<u64>,

    /// Number of items per page. A new archive page is created whenever the
    /// index holds 2x that number
    #[arg(long, value_name = "N")]
    items: Option<usize>,

    /// Minimum seconds between requests to the same domain, to avoid flooding
    #[arg(long, value_name = "SECS")]
    noflood: Option<u64>,

    /// Custom page template file to use when generating .html files
    #[arg(long, value_name = "FILE")]
    template: Option<PathBuf>,

    /// OPML file containing feed URLs to import. Existing feeds are
    /// overwritten, not duplicated
    #[arg(long, value_name = "FILE")]
    opml: Option<PathBuf>,

    /// Optional TOML config file; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose mode outputs extra info when enabled
    #[arg(long)]
    verbose: bool,
}

impl Args {
    /// Layer flag values over the (possibly file-loaded) config.
    fn apply_to(self, mut config: Config) -> Config {
        if let Some(dir) = self.dir {
            config.output_dir = dir;
        }
        if let Some(timeout) = self.timeout {
            config.fetch_timeout_secs = timeout;
        }
        if let Some(wait) = self.wait {
            config.update_interval_mins = wait;
        }
        if let Some(items) = self.items {
            config.items_per_page = items;
        }
        if let Some(noflood) = self.noflood {
            config.min_domain_interval_secs = noflood;
        }
        if let Some(template) = self.template {
            config.template_file = Some(template);
        }
        if let Some(opml) = self.opml {
            config.opml_file = Some(opml);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let config = match &args.config {
        Some(path) => Config::load(path).context("Failed to load config file")?,
        None => Config::default(),
    };
    let config = args.apply_to(config).clamped();

    let mut aggregator = Aggregator::new(&config).context("Failed to construct aggregator")?;

    if let Some(path) = &config.opml_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read OPML file {}", path.display()))?;
        let imported = aggregator
            .import_opml(&content)
            .context("Could not import OPML file")?;
        tracing::info!(
            imported,
            subscribed = aggregator.feed_count(),
            "imported feeds from OPML file"
        );
    }

    run_scheduler(&mut aggregator, &config, async {
        // If the handler can't be installed, keep running rather than
        // shutting down instantly.
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    })
    .await;

    println!("Bye :)");
    Ok(())
}

/// Drives update cycles on a fixed interval until `shutdown` resolves.
///
/// The shutdown future is created once and polled across iterations, so a
/// signal arriving while a cycle is running is acted on as soon as the cycle
/// completes: no new cycle starts, and the in-flight one is never aborted
/// mid-write.
async fn run_scheduler(
    aggregator: &mut Aggregator,
    config: &Config,
    shutdown: impl std::future::Future<Output = ()>,
) {
    // First tick fires immediately; a missed tick (cycle ran long) delays
    // rather than bursts.
    let mut ticker = tokio::time::interval(config.update_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                tracing::info!(feeds = aggregator.feed_count(), "fetching news from feed sources");
                match aggregator.run_cycle().await {
                    Ok(report) => {
                        tracing::info!(
                            fetched = report.fetched,
                            new_items = report.merged,
                            failed = report.failed.len(),
                            wait_mins = config.update_interval_mins,
                            "update complete, waiting for next cycle"
                        );
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to write output, retrying next cycle");
                    }
                }
            }
        }
    }
}
