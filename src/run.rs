//! One scraping run: discover, fetch, normalize, append

use anyhow::{bail, Context, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::bulletin::{fetch_bulletin, SavedPdf};
use crate::config::Config;
use crate::discover::discover;
use crate::fetch::Fetch;
use crate::normalize::{normalize_pdf_tables, SkippedTable};
use crate::output::append_rows;
use crate::pdf::TableSource;
use crate::period::BulletinPeriod;
use crate::store::SeenUrlStore;
use crate::types::CanonicalRow;

/// Working directory for downloaded PDFs, removed when dropped.
///
/// An existing directory is only taken over when it is empty.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            let occupied = fs::read_dir(&path)
                .with_context(|| format!("Failed to open scratch dir {}", path.display()))?
                .next()
                .is_some();
            if occupied {
                bail!(
                    "Scratch dir {} already exists and is not empty; remove it or choose another --scratch-dir",
                    path.display()
                );
            }
        }
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create scratch dir {}", path.display()))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed scratch dir"),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove scratch dir")
            }
        }
    }
}

/// A bulletin or PDF that could not be processed
#[derive(Debug)]
pub struct Failure {
    /// Bulletin URL or PDF path
    pub subject: String,
    pub error: anyhow::Error,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub new_links: usize,
    pub saved: Vec<SavedPdf>,
    pub rows_appended: usize,
    pub skipped_tables: Vec<SkippedTable>,
    pub failures: Vec<Failure>,
}

impl RunSummary {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    /// Every bulletin on the index page was already known
    NoUpdate,
    Updated(RunSummary),
    /// The run stopped before finishing
    Failed(anyhow::Error),
}

impl RunOutcome {
    pub fn is_failure(&self) -> bool {
        match self {
            RunOutcome::NoUpdate => false,
            RunOutcome::Updated(summary) => summary.is_partial(),
            RunOutcome::Failed(_) => true,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::NoUpdate => write!(f, "no update"),
            RunOutcome::Updated(s) => write!(
                f,
                "{} new bulletins, {} PDFs, {} rows appended, {} tables skipped, {} failures",
                s.new_links,
                s.saved.len(),
                s.rows_appended,
                s.skipped_tables.len(),
                s.failures.len()
            ),
            RunOutcome::Failed(e) => write!(f, "failed: {:#}", e),
        }
    }
}

/// Run every stage. The scratch directory is removed on every path out.
pub fn run(config: &Config, fetcher: &dyn Fetch, tables: &dyn TableSource) -> RunOutcome {
    let scratch = match ScratchDir::create(&config.scratch_dir) {
        Ok(scratch) => scratch,
        Err(e) => return RunOutcome::Failed(e),
    };

    let outcome = run_stages(config, fetcher, tables, scratch.path()).unwrap_or_else(RunOutcome::Failed);
    drop(scratch);
    outcome
}

fn run_stages(
    config: &Config,
    fetcher: &dyn Fetch,
    tables: &dyn TableSource,
    scratch: &Path,
) -> Result<RunOutcome> {
    let mut store = SeenUrlStore::load(&config.store_path)?;
    let discovery = discover(fetcher, config, &store)?;
    if !discovery.has_update() {
        tracing::debug!(links = discovery.links.len(), "all bulletins already downloaded");
        return Ok(RunOutcome::NoUpdate);
    }

    let mut summary = RunSummary {
        new_links: discovery.new_links.len(),
        ..Default::default()
    };

    for link in &discovery.new_links {
        match fetch_bulletin(fetcher, &config.base_url, link, scratch, &mut store) {
            Ok(saved) => summary.saved.push(saved),
            Err(e) => {
                tracing::warn!(url = %link, error = %e, "bulletin failed");
                summary.failures.push(Failure {
                    subject: link.clone(),
                    error: e.into(),
                });
            }
        }
    }

    if store.is_dirty() {
        store.save()?;
        tracing::info!(urls = store.len(), "updated URL store");
    }

    let batch = normalize_scratch(scratch, tables, &mut summary)?;
    summary.rows_appended = append_rows(&config.output_path, &batch)?;

    Ok(RunOutcome::Updated(summary))
}

/// Normalize every PDF in the scratch directory into one batch
fn normalize_scratch(
    scratch: &Path,
    tables: &dyn TableSource,
    summary: &mut RunSummary,
) -> Result<Vec<CanonicalRow>> {
    let mut pdfs: Vec<PathBuf> = fs::read_dir(scratch)
        .with_context(|| format!("Failed to list {}", scratch.display()))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "pdf"))
        .collect();
    pdfs.sort();

    let mut batch = Vec::new();
    for path in pdfs {
        match normalize_pdf(&path, tables) {
            Ok((rows, skipped)) => {
                tracing::info!(path = %path.display(), rows = rows.len(), "normalized PDF");
                batch.extend(rows);
                summary.skipped_tables.extend(skipped);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %format!("{:#}", e), "PDF failed");
                summary.failures.push(Failure {
                    subject: path.display().to_string(),
                    error: e,
                });
            }
        }
    }
    Ok(batch)
}

fn normalize_pdf(
    path: &Path,
    tables: &dyn TableSource,
) -> Result<(Vec<CanonicalRow>, Vec<SkippedTable>)> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("No file name: {}", path.display()))?;
    let period = BulletinPeriod::from_file_stem(stem)?;
    let raw = tables.read_tables(path)?;
    let normalized = normalize_pdf_tables(&raw, &period);
    Ok((normalized.rows, normalized.skipped))
}
