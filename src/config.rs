//! Configuration handling for the name checker.

use crate::registry::client::{ClientOptions, DEFAULT_ALL_DOCS_URL, DEFAULT_INFO_URL};
use crate::registry::{FeedOptions, RegistryEndpoints};
use crate::sync::DEFAULT_CHANGE_COST_RATIO;
use crate::types::Result;
use clap::Parser;
use std::path::PathBuf;

/// Default snapshot age, in minutes, before a refresh is attempted.
pub const DEFAULT_MAX_AGE_MINUTES: u64 = 60;

/// Listing documents per kilobyte, measured on the public registry.
pub const DEFAULT_DOCS_PER_KILOBYTE: f64 = 9.3;

/// Check whether an npm package name is available or too similar to an
/// existing one.
#[derive(Parser, Debug, Clone)]
#[command(name = "npm-name-check")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Package name to validate
    pub package_name: String,

    /// Time in minutes before the local name list is refreshed
    #[arg(long = "max-age", visible_alias = "maxAge", default_value_t = DEFAULT_MAX_AGE_MINUTES)]
    pub max_age: u64,

    /// URL to get registry info (update sequence and package count)
    #[arg(long, default_value = DEFAULT_INFO_URL)]
    pub url: String,

    /// URL to get all package names
    #[arg(long = "url-all", visible_alias = "urlAll", default_value = DEFAULT_ALL_DOCS_URL)]
    pub url_all: String,

    /// URL of the change feed (defaults to <url>/_changes)
    #[arg(long)]
    pub changes_url: Option<String>,

    /// Directory holding the downloaded name list
    #[arg(long, env = "NPM_NAME_CHECK_DIR")]
    pub download_dir: Option<PathBuf>,

    /// Change feed pages fetched in parallel
    #[arg(long, default_value = "5")]
    pub concurrency: usize,

    /// Sequence numbers per change feed page
    #[arg(long, default_value = "1000")]
    pub page_size: usize,

    /// Change feed requests per second
    #[arg(long, default_value = "10")]
    pub rate_limit: u32,

    /// Request timeout in seconds
    #[arg(long, default_value = "600")]
    pub timeout: u64,

    /// Output the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Only check naming rules, do not download anything
    #[arg(long)]
    pub syntax_only: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode: no progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl Config {
    /// Sync settings derived from the command line.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            download_dir: self
                .download_dir
                .clone()
                .unwrap_or_else(default_download_dir),
            max_age_minutes: self.max_age,
            page_size: self.page_size,
            concurrency: self.concurrency,
            ..SyncConfig::default()
        }
    }

    /// Registry endpoints from the URL options.
    pub fn endpoints(&self) -> Result<RegistryEndpoints> {
        RegistryEndpoints::new(&self.url, &self.url_all, self.changes_url.as_deref())
    }

    /// HTTP settings for the registry client.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout_secs: self.timeout,
            rate_limit: self.rate_limit,
            docs_per_kilobyte: DEFAULT_DOCS_PER_KILOBYTE,
            ..ClientOptions::default()
        }
    }
}

/// Tunables of the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Where the snapshot artifacts live.
    pub download_dir: PathBuf,
    /// Snapshot age, in minutes, after which it is refreshed.
    pub max_age_minutes: u64,
    /// Change records that cost as much as one listing row.
    pub change_cost_ratio: u64,
    /// Sequence numbers per change feed page.
    pub page_size: usize,
    /// Change feed pages in flight.
    pub concurrency: usize,
}

impl SyncConfig {
    pub fn feed_options(&self) -> FeedOptions {
        FeedOptions {
            page_size: self.page_size,
            concurrency: self.concurrency,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        let feed = FeedOptions::default();
        Self {
            download_dir: default_download_dir(),
            max_age_minutes: DEFAULT_MAX_AGE_MINUTES,
            change_cost_ratio: DEFAULT_CHANGE_COST_RATIO,
            page_size: feed.page_size,
            concurrency: feed.concurrency,
        }
    }
}

/// `<user cache dir>/npm-name-check`, or the temp dir when there is none.
pub fn default_download_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("npm-name-check")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["npm-name-check", "my-package"]);
        assert_eq!(config.package_name, "my-package");
        assert_eq!(config.max_age, 60);
        assert_eq!(config.url, DEFAULT_INFO_URL);

        let sync = config.sync_config();
        assert_eq!(sync.change_cost_ratio, 6);
        assert_eq!(sync.feed_options(), FeedOptions::default());
        assert!(sync.download_dir.ends_with("npm-name-check"));
    }

    #[test]
    fn test_legacy_option_names() {
        let config = Config::parse_from([
            "npm-name-check",
            "pkg",
            "--maxAge",
            "1440",
            "--urlAll",
            "https://mirror.example.com/_all_docs",
        ]);
        assert_eq!(config.max_age, 1440);
        assert_eq!(config.url_all, "https://mirror.example.com/_all_docs");
    }

    #[test]
    fn test_endpoints_from_options() {
        let config = Config::parse_from([
            "npm-name-check",
            "pkg",
            "--url",
            "https://mirror.example.com/",
            "--download-dir",
            "/tmp/names",
        ]);
        let endpoints = config.endpoints().unwrap();
        assert_eq!(endpoints.changes.as_str(), "https://mirror.example.com/_changes");
        assert_eq!(config.sync_config().download_dir, PathBuf::from("/tmp/names"));
    }

    #[test]
    fn test_client_options() {
        let config = Config::parse_from(["npm-name-check", "pkg", "--rate-limit", "3"]);
        let options = config.client_options();
        assert_eq!(options.rate_limit, 3);
        assert_eq!(options.docs_per_kilobyte, DEFAULT_DOCS_PER_KILOBYTE);
    }
}
