pub mod commands;
pub mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl from a start URL until there is nothing left to fetch
    Crawl {
        /// Start URL
        #[arg(required = true)]
        url: String,

        /// Site profile to use instead of the default configuration
        #[arg(short, long)]
        profile: Option<String>,

        /// Maximum crawling depth
        #[arg(short, long)]
        depth: Option<u32>,

        /// Extra accepted primary domain (repeatable)
        #[arg(long = "domain")]
        domains: Vec<String>,

        /// File receiving the extracted items as JSON lines
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage configuration profiles
    Config {
        /// Profile name to manage
        #[arg(required = false)]
        profile: Option<String>,

        /// List all available profiles
        #[arg(short, long)]
        list: bool,
    },
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Crawl { url, profile, depth, domains, output } => {
            info!("Starting crawl on {}", url);
            let overrides = commands::CrawlOverrides { depth, domains, output };
            commands::crawl(url, profile, overrides).await
        }
        Commands::Config { profile, list } => {
            if list {
                info!("Listing all configuration profiles");
                commands::list_profiles()
            } else if let Some(profile_name) = profile {
                info!("Managing configuration profile: {}", profile_name);
                commands::manage_profile(profile_name)
            } else {
                info!("Showing current configuration");
                commands::show_config()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert()
    }

    #[test]
    fn test_parse_crawl() {
        let cli = Cli::try_parse_from([
            "crawler",
            "crawl",
            "https://example.com/",
            "--depth",
            "2",
            "--domain",
            "example.org",
            "--domain",
            "example.net",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Crawl { url, depth, domains, profile, output } => {
                assert_eq!(url, "https://example.com/");
                assert_eq!(depth, Some(2));
                assert_eq!(domains, vec!["example.org", "example.net"]);
                assert!(profile.is_none() && output.is_none());
            }
            Commands::Config { .. } => panic!("parsed the wrong command"),
        }
    }
}
