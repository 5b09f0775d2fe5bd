//! Per-facility availability pages rendered from the cumulative CSV

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

use crate::output::read_rows;
use crate::types::{CanonicalRow, SlotStatus, CANONICAL_LABELS};

pub fn run_view(input: &Path, facilities: &[String], output: &Path) -> Result<()> {
    let mut rows = read_rows(input)?;
    rows.iter_mut().for_each(normalize_slots);

    if facilities.is_empty() {
        let names = facility_names(&rows);
        println!("{} facilities in {}:", names.len(), input.display());
        for name in names {
            println!("  {}", name);
        }
        println!("\nPass --facility <NAME> (repeatable) to render their history.");
        return Ok(());
    }

    let mut sections = Vec::new();
    for name in facilities {
        let history = facility_history(&rows, name);
        if history.is_empty() {
            eprintln!("  No rows for facility: {}", name);
            continue;
        }
        sections.push((name.as_str(), history));
    }

    fs::write(output, render_page(&sections))
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Wrote {} facilities to {}",
        sections.len(),
        file_link(output)
    );
    Ok(())
}

/// Fold width and compatibility variants of the glyphs (e.g. half-width ｰ) together
pub fn normalize_slots(row: &mut CanonicalRow) {
    for slot in row.slots_mut() {
        *slot = slot.nfkc().collect();
    }
}

/// Unique facility names in first-seen order
pub fn facility_names(rows: &[CanonicalRow]) -> Vec<&str> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|r| r.facility_name.as_str())
        .filter(|name| seen.insert(*name))
        .collect()
}

/// One facility's rows ordered by year, then month
pub fn facility_history<'a>(rows: &'a [CanonicalRow], name: &str) -> Vec<&'a CanonicalRow> {
    let mut history: Vec<&CanonicalRow> = rows.iter().filter(|r| r.facility_name == name).collect();
    history.sort_by_key(|r| (numeric(&r.year), numeric(&r.month)));
    history
}

fn numeric(s: &str) -> u32 {
    s.trim().parse().unwrap_or(u32::MAX)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn css_styles() -> &'static str {
    r#"
body {
    font-family: sans-serif;
    color: #1a202c;
    margin: 2rem;
}

h2 {
    margin: 2rem 0 0.5rem;
}

table {
    border-collapse: collapse;
}

th, td {
    border: 1px solid #e2e8f0;
    padding: 0.25rem 0.75rem;
    text-align: center;
}

td.open {
    background-color: #fde;
}

td.maybe {
    background-color: #ffe;
}
"#
}

fn slot_cell(glyph: &str) -> String {
    let class = match SlotStatus::classify(glyph) {
        status @ (SlotStatus::Open | SlotStatus::Maybe) => {
            format!(r#" class="{}""#, status.as_str())
        }
        _ => String::new(),
    };
    format!("<td{}>{}</td>", class, html_escape(glyph))
}

pub fn render_page(sections: &[(&str, Vec<&CanonicalRow>)]) -> String {
    let mut html = format!(
        r#"<!DOCTYPE html>
<html lang="ja">
<head>
    <meta charset="UTF-8">
    <title>保育施設の空き状況</title>
    <style>{}</style>
</head>
<body>
"#,
        css_styles()
    );

    let header: String = ["年", "月"]
        .iter()
        .chain(CANONICAL_LABELS[2..].iter())
        .map(|label| format!("<th>{}</th>", label))
        .collect();

    for (name, history) in sections {
        html.push_str(&format!("<h2>{}</h2>\n", html_escape(name)));
        html.push_str(&format!("<table>\n<tr>{}</tr>\n", header));
        for row in history {
            html.push_str("<tr>");
            html.push_str(&format!("<td>{}</td>", html_escape(&row.year)));
            html.push_str(&format!("<td>{}</td>", html_escape(&row.month)));
            for slot in row.slots() {
                html.push_str(&slot_cell(slot));
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// OSC 8 file:// hyperlink for terminal output
fn file_link(path: &Path) -> String {
    let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!(
        "\x1b]8;;file://{}\x1b\\{}\x1b]8;;\x1b\\",
        target.display(),
        path.display()
    )
}
