use crate::config::cli::{Args, Command};
use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::infrastructure::{find_chromium, BrowserSettings, ChromiumNavigator, StatLocator};
use crate::server::AppState;
use crate::services::{BatchScraper, RosterStore, TrackerService};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod domain;
mod error;
mod infrastructure;
mod server;
mod services;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_args(args)?;
    let settings = config.browser_settings();
    ensure_browser(&settings)?;

    let navigator = Arc::new(ChromiumNavigator::new(settings));
    let scraper = BatchScraper::new(
        navigator,
        Arc::new(StatLocator::default()),
        config.args.max_workers,
        config.wait_timeout(),
    );
    let tracker = Arc::new(TrackerService::new(
        scraper,
        config.args.single_workers,
        RosterStore::new(config.roster.clone()),
    ));

    match &config.args.command {
        Some(Command::Scrape { output }) => scrape_once(&tracker, output.as_deref()).await,
        None => {
            let state = AppState {
                tracker,
                roster_path: config.roster_path().to_path_buf(),
            };
            server::serve(&config.args.host, config.args.port, state).await
        }
    }
}

fn ensure_browser(settings: &BrowserSettings) -> Result<()> {
    match &settings.chrome_path {
        Some(path) if path.exists() => Ok(()),
        Some(path) => Err(TrackerError::Browser(format!(
            "browser binary {} does not exist",
            path.display()
        ))),
        None => find_chromium().map(|_| ()).ok_or_else(|| {
            TrackerError::Browser(
                "no Chrome or Chromium found on PATH, set --chrome-path or CHROME_PATH".into(),
            )
        }),
    }
}

async fn scrape_once(tracker: &TrackerService, output: Option<&Path>) -> Result<()> {
    let roster = tracker.roster().snapshot().await;
    if roster.player_count() == 0 {
        return Err(TrackerError::Config("roster is empty, nothing to scrape".into()));
    }

    let pb = ProgressBar::new(roster.tasks().len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .map_err(|e| TrackerError::Other(e.to_string()))?,
    );

    let report = tracker
        .scraper()
        .run_with_progress(roster, |result| {
            pb.set_message(format!("{} {}", result.key, result.page));
            pb.inc(1);
        })
        .await;
    pb.finish_with_message("Done scraping!");

    let json = serde_json::to_string_pretty(&report)?;
    match output {
        Some(path) => {
            tokio::fs::write(path, json).await?;
            info!("Saved report to {:?}", path);
        }
        None => println!("{json}"),
    }

    info!(
        "Scraping completed: {} players, {} with errors",
        report.len(),
        report.error_count()
    );
    Ok(())
}
