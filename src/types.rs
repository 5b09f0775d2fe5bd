//! Table and row types shared by the extraction pipeline

use serde::{Deserialize, Serialize};

/// Facility-name column label, also used to spot a hand-written header row
pub const FACILITY_LABEL: &str = "施設名";

/// Label of the merged column that carries the 2- and 3-year-old slots in one cell
pub const COMBINED_STATUS_LABEL: &str = "受入れ状況";

/// Canonical column labels, in output order (without the year/month stamp)
pub const CANONICAL_LABELS: [&str; 8] = [
    FACILITY_LABEL,
    "住所",
    "0歳",
    "1歳",
    "2歳",
    "3歳",
    "4歳",
    "5歳",
];

/// Marker written for a missing or unknown slot value
pub const UNKNOWN_SLOT: &str = "-";

/// One table as read from a PDF page.
///
/// A `None` header is an unnamed column; a `None` cell is blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    /// Zero-based page the table was found on
    pub page: usize,
    pub columns: Vec<Option<String>>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(page: usize, columns: Vec<Option<String>>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            page,
            columns,
            rows,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_unnamed(&self, index: usize) -> bool {
        matches!(self.columns.get(index), Some(None))
    }

    /// Index of the first column whose trimmed header equals `label`
    pub fn position(&self, label: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.as_deref().map(str::trim) == Some(label))
    }
}

/// One facility's availability for one reporting period.
///
/// Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRow {
    pub facility_name: String,
    pub address: String,
    pub age0: String,
    pub age1: String,
    pub age2: String,
    pub age3: String,
    pub age4: String,
    pub age5: String,
    pub year: String,
    pub month: String,
}

impl CanonicalRow {
    pub fn slots(&self) -> [&str; 6] {
        [
            &self.age0, &self.age1, &self.age2, &self.age3, &self.age4, &self.age5,
        ]
    }

    pub fn slots_mut(&mut self) -> [&mut String; 6] {
        [
            &mut self.age0,
            &mut self.age1,
            &mut self.age2,
            &mut self.age3,
            &mut self.age4,
            &mut self.age5,
        ]
    }
}

/// Availability glyph printed in a slot cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Open,
    Maybe,
    Closed,
    Unknown,
    Other,
}

impl SlotStatus {
    pub fn classify(glyph: &str) -> Self {
        match glyph.trim() {
            "○" => SlotStatus::Open,
            "△" => SlotStatus::Maybe,
            "×" => SlotStatus::Closed,
            "" | UNKNOWN_SLOT => SlotStatus::Unknown,
            _ => SlotStatus::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Open => "open",
            SlotStatus::Maybe => "maybe",
            SlotStatus::Closed => "closed",
            SlotStatus::Unknown => "unknown",
            SlotStatus::Other => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_ignores_surrounding_whitespace() {
        let table = RawTable::new(
            0,
            vec![None, Some(" 受入れ状況 ".to_string())],
            Vec::new(),
        );
        assert_eq!(table.position(COMBINED_STATUS_LABEL), Some(1));
        assert!(table.is_unnamed(0));
        assert!(!table.is_unnamed(1));
        assert!(!table.is_unnamed(2));
    }

    #[test]
    fn test_slot_status() {
        assert_eq!(SlotStatus::classify("○"), SlotStatus::Open);
        assert_eq!(SlotStatus::classify(" △ "), SlotStatus::Maybe);
        assert_eq!(SlotStatus::classify("×"), SlotStatus::Closed);
        assert_eq!(SlotStatus::classify("-"), SlotStatus::Unknown);
        assert_eq!(SlotStatus::classify("要相談"), SlotStatus::Other);
    }
}
