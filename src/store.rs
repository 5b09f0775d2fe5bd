//! Set of bulletin URLs already downloaded by earlier runs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// The single record kept in the store file
#[derive(Debug, Default, Serialize, Deserialize)]
struct SeenRecord {
    urls: Vec<String>,
}

/// Accepted on-disk layouts. `Tables` is the table/id nesting left behind by
/// document stores (`{"_default": {"1": {"urls": [...]}}}`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredDocument {
    Record(SeenRecord),
    Tables(BTreeMap<String, BTreeMap<String, SeenRecord>>),
}

impl StoredDocument {
    fn into_urls(self) -> Vec<String> {
        match self {
            StoredDocument::Record(record) => record.urls,
            StoredDocument::Tables(tables) => tables
                .into_values()
                .flat_map(|records| records.into_values())
                .flat_map(|record| record.urls)
                .collect(),
        }
    }
}

/// Grow-only set of seen URLs backed by a JSON file
#[derive(Debug)]
pub struct SeenUrlStore {
    path: PathBuf,
    urls: BTreeSet<String>,
    dirty: bool,
}

impl SeenUrlStore {
    /// Load the store; a missing file is an empty set
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let urls = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read URL store: {}", path.display()))?;
            let document: StoredDocument = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse URL store: {}", path.display()))?;
            document.into_urls().into_iter().collect()
        } else {
            BTreeSet::new()
        };

        Ok(Self {
            path,
            urls,
            dirty: false,
        })
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Links not yet in the store
    pub fn unseen<I, S>(&self, links: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        links
            .into_iter()
            .filter(|link| !self.contains(link.as_ref()))
            .map(|link| link.as_ref().to_string())
            .collect()
    }

    /// Returns true if the URL was not already present
    pub fn insert(&mut self, url: &str) -> bool {
        let added = self.urls.insert(url.to_string());
        self.dirty |= added;
        added
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replace the file contents with the full set
    pub fn save(&mut self) -> Result<()> {
        let record = SeenRecord {
            urls: self.urls.iter().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&record)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write URL store: {}", self.path.display()))?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = SeenUrlStore::load(dir.path().join("db.json")).unwrap();
        assert_eq!(store.len(), 0);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_unseen_and_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, r#"{"urls": ["https://a.example/1.html"]}"#).unwrap();

        let mut store = SeenUrlStore::load(&path).unwrap();
        let new = store.unseen(["https://a.example/1.html", "https://a.example/2.html"]);
        assert_eq!(new.into_iter().collect::<Vec<_>>(), vec!["https://a.example/2.html"]);

        assert!(!store.insert("https://a.example/1.html"));
        assert!(!store.is_dirty());
        assert!(store.insert("https://a.example/2.html"));
        assert!(store.is_dirty());
        store.save().unwrap();

        let reloaded = SeenUrlStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("https://a.example/2.html"));
    }

    #[test]
    fn test_reads_nested_document_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(
            &path,
            r#"{"_default": {"1": {"urls": ["https://a.example/1.html", "https://a.example/1.html"]}}}"#,
        )
        .unwrap();

        let store = SeenUrlStore::load(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains("https://a.example/1.html"));
    }

    #[test]
    fn test_save_error_names_the_directory() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let mut store = SeenUrlStore::load(blocker.join("db.json")).unwrap();
        store.insert("https://a.example/1.html");
        let err = store.save().unwrap_err();
        assert!(format!("{:#}", err).contains(&blocker.display().to_string()));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, "not json").unwrap();
        assert!(SeenUrlStore::load(&path).is_err());
    }
}
