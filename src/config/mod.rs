use crate::config::cli::Args;
use crate::domain::Roster;
use crate::error::Result;
use crate::infrastructure::BrowserSettings;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub(crate) mod cli;
pub(crate) mod roster_file;

pub use roster_file::save_roster;

pub struct Config {
    pub args: Args,
    pub roster: Roster,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self> {
        let roster = if args.roster_file.exists() {
            roster_file::load_roster(&args.roster_file)?
        } else {
            warn!(
                "Roster file {:?} not found, starting with an empty roster",
                args.roster_file
            );
            Roster::default()
        };

        info!(
            "Config ready: {} workers per batch, {} for single lookups",
            args.max_workers, args.single_workers
        );
        Ok(Self { args, roster })
    }

    pub fn roster_path(&self) -> &Path {
        &self.args.roster_file
    }

    pub fn browser_settings(&self) -> BrowserSettings {
        BrowserSettings {
            chrome_path: self.args.chrome_path.clone(),
            page_load_timeout: Duration::from_secs(self.args.page_load_timeout),
            ..BrowserSettings::default()
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.args.wait_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn missing_roster_file_gives_empty_roster() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.txt");
        let args = Args::parse_from(["siege_scout", "--roster-file", missing.to_str().unwrap()]);

        let config = Config::from_args(args).unwrap();
        assert_eq!(config.roster.player_count(), 0);
        assert_eq!(config.browser_settings().page_load_timeout, Duration::from_secs(30));
    }

    #[test]
    fn loads_existing_roster_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.txt");
        std::fs::write(&path, "[main]\nplatform: xbox\nusername: Alice\n").unwrap();
        let args = Args::parse_from([
            "siege_scout",
            "--roster-file",
            path.to_str().unwrap(),
            "--chrome-path",
            "/usr/bin/chromium",
        ]);

        let config = Config::from_args(args).unwrap();
        assert_eq!(config.roster.player_count(), 1);
        assert!(config.browser_settings().chrome_path.is_some());
    }
}
