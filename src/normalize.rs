//! Coerces the bulletin table layouts into the canonical row shape

use crate::period::BulletinPeriod;
use crate::types::{CanonicalRow, RawTable, COMBINED_STATUS_LABEL, UNKNOWN_SLOT};

/// Unnamed spacer column of the 9-column layout
const NINE_COLUMN_FILLER: usize = 5;

/// Header remnants at the top of a 9-column table
const NINE_COLUMN_HEADER_ROWS: usize = 2;

/// Recognized table layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Canonical columns plus an unnamed spacer at index 5
    NineColumn,
    /// Unnamed leading column; the 2- and 3-year-old slots share the
    /// `受入れ状況` cell, space separated
    CombinedStatus { status: usize },
    /// Already the canonical columns
    Canonical,
    Unrecognized {
        columns: usize,
        reason: &'static str,
    },
}

pub fn classify(table: &RawTable) -> Layout {
    match table.column_count() {
        9 if table.is_unnamed(NINE_COLUMN_FILLER) => Layout::NineColumn,
        9 => Layout::Unrecognized {
            columns: 9,
            reason: "9 columns without the unnamed spacer column",
        },
        8 => match table.position(COMBINED_STATUS_LABEL) {
            Some(status) if table.is_unnamed(0) => Layout::CombinedStatus { status },
            _ => Layout::Canonical,
        },
        columns => Layout::Unrecognized {
            columns,
            reason: "unexpected column count",
        },
    }
}

/// A table left out of the output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTable {
    pub page: usize,
    /// Position of the table within its PDF
    pub index: usize,
    pub columns: usize,
    pub reason: &'static str,
}

#[derive(Debug, Default)]
pub struct Normalized {
    pub rows: Vec<CanonicalRow>,
    pub skipped: Vec<SkippedTable>,
}

/// Normalize every table of one PDF.
///
/// The first table is the legend and is always discarded.
pub fn normalize_pdf_tables(tables: &[RawTable], period: &BulletinPeriod) -> Normalized {
    let mut out = Normalized::default();

    for (index, table) in tables.iter().enumerate().skip(1) {
        match classify(table) {
            Layout::Unrecognized { columns, reason } => {
                tracing::debug!(page = table.page, index, columns, reason, %period, "skipping table");
                out.skipped.push(SkippedTable {
                    page: table.page,
                    index,
                    columns,
                    reason,
                });
            }
            layout => out.rows.extend(normalize_table(table, layout, period)),
        }
    }

    out
}

/// Rows of one table in the given layout, stamped with the period
pub fn normalize_table(
    table: &RawTable,
    layout: Layout,
    period: &BulletinPeriod,
) -> Vec<CanonicalRow> {
    match layout {
        Layout::NineColumn => table
            .rows
            .iter()
            .skip(NINE_COLUMN_HEADER_ROWS)
            .map(|row| {
                let cells = (0..9)
                    .filter(|&i| i != NINE_COLUMN_FILLER)
                    .map(|i| filled(cell(row, i)));
                stamped(cells, period)
            })
            .collect(),
        Layout::Canonical => table
            .rows
            .iter()
            .map(|row| stamped((0..8).map(|i| filled(cell(row, i))), period))
            .collect(),
        Layout::CombinedStatus { status } => table
            .rows
            .iter()
            .filter_map(|row| split_combined_row(row, status, period))
            .collect(),
        Layout::Unrecognized { .. } => Vec::new(),
    }
}

/// Rebuild one combined-status row: the leading unnamed column is dropped,
/// rows with any blank cell are dropped, and the combined cell is split into
/// the 2- and 3-year-old slots.
fn split_combined_row(
    row: &[Option<String>],
    status: usize,
    period: &BulletinPeriod,
) -> Option<CanonicalRow> {
    let cells: Vec<&str> = (1..8)
        .map(|i| cell(row, i))
        .collect::<Option<_>>()?;

    // facility, address, 0, 1, 4, 5 in table order
    let rest: Vec<&str> = (1..8)
        .zip(cells.iter())
        .filter(|(i, _)| *i != status)
        .map(|(_, c)| *c)
        .collect();

    let combined = cell(row, status)?;
    let glyphs: Vec<&str> = combined.split_whitespace().collect();
    let (age2, age3) = match glyphs.as_slice() {
        [one] => (*one, UNKNOWN_SLOT),
        [two, three] => (*two, *three),
        _ => {
            tracing::warn!(cell = combined, "cannot split combined status cell, dropping row");
            return None;
        }
    };

    let ordered = [rest[0], rest[1], rest[2], rest[3], age2, age3, rest[4], rest[5]];
    Some(stamped(ordered.into_iter().map(str::to_string), period))
}

/// Non-blank trimmed cell content
fn cell(row: &[Option<String>], index: usize) -> Option<&str> {
    row.get(index)
        .and_then(|c| c.as_deref())
        .map(str::trim)
        .filter(|c| !c.is_empty())
}

fn filled(cell: Option<&str>) -> String {
    cell.unwrap_or(UNKNOWN_SLOT).to_string()
}

fn stamped(cells: impl IntoIterator<Item = String>, period: &BulletinPeriod) -> CanonicalRow {
    let mut cells = cells.into_iter();
    let mut next = || cells.next().unwrap_or_else(|| UNKNOWN_SLOT.to_string());
    CanonicalRow {
        facility_name: next(),
        address: next(),
        age0: next(),
        age1: next(),
        age2: next(),
        age3: next(),
        age4: next(),
        age5: next(),
        year: period.year_str(),
        month: period.month_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CANONICAL_LABELS;

    fn cells(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
            .collect()
    }

    fn period() -> BulletinPeriod {
        BulletinPeriod::from_title("令和4年1月").unwrap()
    }

    fn legend() -> RawTable {
        RawTable::new(0, cells(&["記号", "意味"]), vec![cells(&["○", "空きあり"])])
    }

    fn row(values: [&str; 8]) -> CanonicalRow {
        CanonicalRow {
            facility_name: values[0].to_string(),
            address: values[1].to_string(),
            age0: values[2].to_string(),
            age1: values[3].to_string(),
            age2: values[4].to_string(),
            age3: values[5].to_string(),
            age4: values[6].to_string(),
            age5: values[7].to_string(),
            year: "2023".to_string(),
            month: "01".to_string(),
        }
    }

    fn nine_column() -> RawTable {
        RawTable::new(
            1,
            cells(&["施設名", "住所", "0歳", "1歳", "2歳", "", "3歳", "4歳", "5歳"]),
            vec![
                cells(&["", "", "", "", "", "", "", "", ""]),
                cells(&["", "", "歳児", "歳児", "歳児", "", "歳児", "歳児", "歳児"]),
                cells(&["青葉保育園", "青葉区1-1", "○", "△", "×", "", "", "○", "×"]),
                cells(&["若葉保育園", "", "×", "×", "○", "", "△", "", ""]),
            ],
        )
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&nine_column()), Layout::NineColumn);

        let canonical = RawTable::new(1, cells(&CANONICAL_LABELS), Vec::new());
        assert_eq!(classify(&canonical), Layout::Canonical);

        let combined = RawTable::new(
            1,
            cells(&["", "施設名", "住所", "0歳", "1歳", "受入れ状況", "4歳", "5歳"]),
            Vec::new(),
        );
        assert_eq!(classify(&combined), Layout::CombinedStatus { status: 5 });

        let named_ninth = RawTable::new(
            1,
            cells(&["施設名", "住所", "0歳", "1歳", "2歳", "備考", "3歳", "4歳", "5歳"]),
            Vec::new(),
        );
        assert!(matches!(classify(&named_ninth), Layout::Unrecognized { columns: 9, .. }));

        let seven = RawTable::new(1, cells(&["a", "b", "c", "d", "e", "f", "g"]), Vec::new());
        assert!(matches!(classify(&seven), Layout::Unrecognized { columns: 7, .. }));
    }

    #[test]
    fn test_nine_column_layout() {
        let rows = normalize_table(&nine_column(), Layout::NineColumn, &period());
        assert_eq!(
            rows,
            vec![
                row(["青葉保育園", "青葉区1-1", "○", "△", "×", "-", "○", "×"]),
                row(["若葉保育園", "-", "×", "×", "○", "△", "-", "-"]),
            ]
        );
    }

    #[test]
    fn test_canonical_layout_fills_blanks() {
        let table = RawTable::new(
            2,
            cells(&CANONICAL_LABELS),
            vec![cells(&["青葉保育園", "青葉区1-1", "○", "", "△", "×", "×", ""])],
        );
        let rows = normalize_table(&table, Layout::Canonical, &period());
        assert_eq!(
            rows,
            vec![row(["青葉保育園", "青葉区1-1", "○", "-", "△", "×", "×", "-"])]
        );
    }

    #[test]
    fn test_combined_status_layout_matches_canonical_shape() {
        let table = RawTable::new(
            1,
            cells(&["", "施設名", "住所", "0歳", "1歳", "受入れ状況", "4歳", "5歳"]),
            vec![
                cells(&["1", "青葉保育園", "青葉区1-1", "○", "×", "○ △", "×", "×"]),
                cells(&["2", "若葉保育園", "若葉区2-2", "×", "△", "× ○", "○", "△"]),
                cells(&["3", "緑保育園", "", "×", "×", "× ×", "×", "×"]),
            ],
        );
        let layout = classify(&table);
        let rows = normalize_table(&table, layout, &period());
        assert_eq!(
            rows,
            vec![
                row(["青葉保育園", "青葉区1-1", "○", "×", "○", "△", "×", "×"]),
                row(["若葉保育園", "若葉区2-2", "×", "△", "×", "○", "○", "△"]),
            ]
        );
    }

    #[test]
    fn test_combined_status_odd_glyph_counts() {
        let table = RawTable::new(
            1,
            cells(&["", "施設名", "住所", "0歳", "1歳", "受入れ状況", "4歳", "5歳"]),
            vec![
                cells(&["1", "青葉保育園", "青葉区1-1", "○", "×", "○", "×", "×"]),
                cells(&["2", "若葉保育園", "若葉区2-2", "×", "△", "× ○ △", "○", "△"]),
            ],
        );
        let rows = normalize_table(&table, classify(&table), &period());
        assert_eq!(
            rows,
            vec![row(["青葉保育園", "青葉区1-1", "○", "×", "○", "-", "×", "×"])]
        );
    }

    #[test]
    fn test_pdf_drops_legend_and_reports_unrecognized() {
        let odd = RawTable::new(4, cells(&["a", "b", "c"]), vec![cells(&["1", "2", "3"])]);
        let canonical = RawTable::new(
            2,
            cells(&CANONICAL_LABELS),
            vec![cells(&["青葉保育園", "青葉区1-1", "○", "○", "○", "○", "○", "○"])],
        );

        let out = normalize_pdf_tables(&[canonical.clone(), odd, canonical], &period());
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].year, "2023");
        assert_eq!(out.rows[0].month, "01");
        assert_eq!(
            out.skipped,
            vec![SkippedTable {
                page: 4,
                index: 1,
                columns: 3,
                reason: "unexpected column count",
            }]
        );

        assert!(normalize_pdf_tables(&[legend()], &period()).rows.is_empty());
    }
}
