use anyhow::{Context, Result};
use std::path::PathBuf;
use url::Url;

pub const DEFAULT_SCRATCH_DIR: &str = "temp";
pub const DEFAULT_STORE_PATH: &str = "db.json";

/// Settings for one scraping run, built once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Base that relative bulletin and PDF links are resolved against
    pub base_url: Url,
    /// Index page listing the bulletins
    pub scraping_url: String,
    /// Cumulative CSV the extracted rows are appended to
    pub output_path: PathBuf,
    pub scratch_dir: PathBuf,
    pub store_path: PathBuf,
}

impl Config {
    pub fn new(
        base_url: &str,
        scraping_url: &str,
        output_path: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
        store_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        // Url::join drops the last segment of a base without a trailing slash
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url =
            Url::parse(&base).with_context(|| format!("Invalid base URL: {}", base_url))?;

        Ok(Self {
            base_url,
            scraping_url: scraping_url.to_string(),
            output_path: output_path.into(),
            scratch_dir: scratch_dir.into(),
            store_path: store_path.into(),
        })
    }
}
