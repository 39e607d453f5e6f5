use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::cli::config::CrawlerConfig;
use crate::crawler::controller::CrawlerController;

/// Command line values that override the loaded configuration
#[derive(Debug, Default, Clone)]
pub struct CrawlOverrides {
    pub depth: Option<u32>,
    pub domains: Vec<String>,
    pub output: Option<PathBuf>,
}

impl CrawlOverrides {
    pub fn apply(self, config: &mut CrawlerConfig) {
        if let Some(depth) = self.depth {
            config.request.max_depth = depth;
        }
        for domain in self.domains {
            if !config.request.accepted_domains.contains(&domain) {
                config.request.accepted_domains.push(domain);
            }
        }
        if let Some(output) = self.output {
            config.output.items_file = output;
        }
    }
}

/// Run a crawl and print its summary
pub async fn crawl(url: String, profile: Option<String>, overrides: CrawlOverrides) -> Result<()> {
    let mut config = match &profile {
        Some(profile) => CrawlerConfig::load_profile(profile)
            .context(format!("Failed to load profile: {}", profile))?,
        None => CrawlerConfig::load_default()?,
    };
    overrides.apply(&mut config);

    let controller = CrawlerController::new(config)?;
    info!("Crawl run {} started", controller.run_id());

    let report = controller.run(&url).await?;

    println!("Run ID: {}", report.run_id);
    println!("URLs crawled: {}", report.summary.num_urls);
    println!("Items written: {} ({})", report.items_written, report.output.display());
    if !report.errors.is_empty() {
        println!("Errors: {}", report.errors.len());
        for error in report.errors.iter().take(10) {
            println!("  - {}", error);
        }
    }
    println!("{}", report.summary.to_json().context("Failed to serialize the crawl summary")?);

    Ok(())
}

/// List all available configuration profiles
pub fn list_profiles() -> Result<()> {
    let profiles = CrawlerConfig::list_profiles()?;

    println!("Available configuration profiles:");
    for profile in profiles {
        println!("  - {}", profile);
    }

    Ok(())
}

/// Show a profile, creating it from the defaults if it does not exist yet
pub fn manage_profile(profile_name: String) -> Result<()> {
    match CrawlerConfig::load_profile(&profile_name) {
        Ok(config) => {
            println!("Profile: {}", profile_name);
            println!("{}", serde_yaml::to_string(&config)?);
        }
        Err(_) => {
            warn!("Profile '{}' does not exist. Creating a default profile.", profile_name);
            let config = CrawlerConfig::default();
            config.save_as_profile(&profile_name)?;
            println!("Created default profile: {}", profile_name);
        }
    }

    Ok(())
}

/// Show the current configuration
pub fn show_config() -> Result<()> {
    let config = CrawlerConfig::load_default()?;
    println!("Current configuration:");
    println!("{}", serde_yaml::to_string(&config)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let mut config = CrawlerConfig::default();
        config.request.accepted_domains = vec!["example.com".to_string()];

        CrawlOverrides {
            depth: Some(1),
            domains: vec!["example.com".to_string(), "example.org".to_string()],
            output: Some(PathBuf::from("out/items.jsonl")),
        }
        .apply(&mut config);

        assert_eq!(config.request.max_depth, 1);
        assert_eq!(config.request.accepted_domains, vec!["example.com", "example.org"]);
        assert_eq!(config.output.items_file, PathBuf::from("out/items.jsonl"));

        CrawlOverrides::default().apply(&mut config);
        assert_eq!(config.request.max_depth, 1);
    }
}
