//! The cumulative availability CSV (no header, canonical column order)

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::types::{CanonicalRow, FACILITY_LABEL};

/// Append rows to the CSV, creating it if needed. Returns the rows written.
pub fn append_rows(path: &Path, rows: &[CanonicalRow]) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!(path = %path.display(), rows = rows.len(), "appended rows");
    Ok(rows.len())
}

/// Read every row back. A hand-added header line is skipped.
pub fn read_rows(path: &Path) -> Result<Vec<CanonicalRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for (i, record) in reader.deserialize::<CanonicalRow>().enumerate() {
        match record {
            Ok(row) if i == 0 && row.facility_name == FACILITY_LABEL => continue,
            Ok(row) => rows.push(row),
            Err(e) => {
                return Err(e).with_context(|| format!("Bad row {} in {}", i + 1, path.display()))
            }
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(facility: &str, month: &str) -> CanonicalRow {
        CanonicalRow {
            facility_name: facility.to_string(),
            address: "青葉区1-1".to_string(),
            age0: "○".to_string(),
            age1: "△".to_string(),
            age2: "×".to_string(),
            age3: "-".to_string(),
            age4: "×".to_string(),
            age5: "×".to_string(),
            year: "2023".to_string(),
            month: month.to_string(),
        }
    }

    #[test]
    fn test_append_has_no_header_and_accumulates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("all.csv");

        assert_eq!(append_rows(&path, &[row("青葉保育園", "01")]).unwrap(), 1);
        assert_eq!(append_rows(&path, &[row("若葉保育園", "02")]).unwrap(), 1);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "青葉保育園,青葉区1-1,○,△,×,-,×,×,2023,01\n若葉保育園,青葉区1-1,○,△,×,-,×,×,2023,02\n"
        );
        assert_eq!(read_rows(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_batch_does_not_create_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("all.csv");
        assert_eq!(append_rows(&path, &[]).unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_append_error_names_the_directory() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let err = append_rows(&blocker.join("all.csv"), &[row("青葉保育園", "01")]).unwrap_err();
        assert!(format!("{:#}", err).contains(&blocker.display().to_string()));
    }

    #[test]
    fn test_read_skips_header_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("all.csv");
        fs::write(
            &path,
            "施設名,住所,0歳,1歳,2歳,3歳,4歳,5歳,年,月\n青葉保育園,青葉区1-1,○,△,×,-,×,×,2023,01\n",
        )
        .unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows, vec![row("青葉保育園", "01")]);
    }
}
