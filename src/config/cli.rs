use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the roster file with the main player and allies
    #[arg(long, default_value = "config.txt")]
    pub roster_file: PathBuf,

    /// Address the dashboard API binds to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 5000)]
    pub port: u16,

    /// Concurrent page loads for a full batch
    #[arg(long, default_value_t = 10)]
    pub max_workers: usize,

    /// Concurrent page loads shared by single-player lookups
    #[arg(long, default_value_t = 2)]
    pub single_workers: usize,

    /// Chrome or Chromium binary; looked up on the PATH when omitted
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Page load ceiling in seconds
    #[arg(long, default_value_t = 30)]
    pub page_load_timeout: u64,

    /// Ceiling in seconds for waiting on rendered stats
    #[arg(long, default_value_t = 15)]
    pub wait_timeout: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Scrape the configured roster once and print the report as JSON
    Scrape {
        /// Write the report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["siege_scout"]);
        assert!(args.command.is_none());
        assert_eq!(args.port, 5000);
        assert_eq!(args.max_workers, 10);
        assert_eq!(args.single_workers, 2);
        assert_eq!(args.roster_file, PathBuf::from("config.txt"));
    }

    #[test]
    fn scrape_subcommand() {
        let args = Args::parse_from(["siege_scout", "--max-workers", "4", "scrape", "--output", "out.json"]);
        assert_eq!(args.max_workers, 4);
        match args.command {
            Some(Command::Scrape { output }) => assert_eq!(output, Some(PathBuf::from("out.json"))),
            None => panic!("expected scrape subcommand"),
        }
    }
}
