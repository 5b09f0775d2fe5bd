//! Table extraction from bulletin PDFs
//!
//! Bulletins are simple grids, so tables are recovered from glyph positions:
//! 1. Glyphs whose baselines agree form a line; a wide horizontal gap starts a new cell
//! 2. Consecutive lines with at least two cells form a table region
//! 3. Overlapping cell extents across the region form column bands
//! 4. Every cell is placed in the band holding its center; empty bands stay blank
//!
//! The first line of a region is its header row.

use anyhow::{anyhow, Context, Result};
use pdf_extract::{Document, MediaBox, OutputDev, OutputError, Transform};
use std::fs;
use std::path::Path;

use crate::types::RawTable;

/// Baselines closer than this many glyph sizes belong to the same line
const ROW_TOLERANCE: f64 = 0.5;

/// Horizontal gap, in glyph sizes, that separates two cells
const CELL_GAP: f64 = 1.2;

/// Horizontal gap, in glyph sizes, rendered as a space inside a cell
const WORD_GAP: f64 = 0.15;

/// Vertical distance, in glyph sizes, that ends a table region
const REGION_GAP: f64 = 3.0;

/// Produces every table of a PDF, in page order
pub trait TableSource {
    fn read_tables(&self, path: &Path) -> Result<Vec<RawTable>>;
}

/// Glyph-position table reader backed by `pdf-extract`
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextTables;

impl TableSource for PdfTextTables {
    fn read_tables(&self, path: &Path) -> Result<Vec<RawTable>> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

        // pdf_extract can panic on malformed PDFs
        let glyphs = std::panic::catch_unwind(|| collect_glyphs(&bytes))
            .map_err(|_| anyhow!("PDF extraction panicked (malformed PDF): {}", path.display()))?
            .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;

        let tables = tables_from_glyphs(&glyphs);
        tracing::debug!(path = %path.display(), glyphs = glyphs.len(), tables = tables.len(), "read PDF");
        Ok(tables)
    }
}

/// One positioned character, in points from the top-left of its page
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Zero-based page
    pub page: usize,
    pub x: f64,
    /// Baseline, growing downwards
    pub y: f64,
    pub advance: f64,
    pub size: f64,
    pub text: String,
}

fn collect_glyphs(bytes: &[u8]) -> Result<Vec<Glyph>> {
    let mut doc = Document::load_mem(bytes).map_err(|e| anyhow!("Failed to parse PDF: {}", e))?;
    if doc.is_encrypted() {
        doc.decrypt("")
            .map_err(|e| anyhow!("Failed to decrypt PDF: {}", e))?;
    }

    let mut collector = GlyphCollector::default();
    pdf_extract::output_doc(&doc, &mut collector).map_err(|e| anyhow!("{}", e))?;
    Ok(collector.glyphs)
}

#[derive(Default)]
struct GlyphCollector {
    page: usize,
    page_top: f64,
    glyphs: Vec<Glyph>,
}

impl OutputDev for GlyphCollector {
    fn begin_page(
        &mut self,
        page_num: u32,
        media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> Result<(), OutputError> {
        self.page = page_num.saturating_sub(1) as usize;
        self.page_top = media_box.ury;
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        text: &str,
    ) -> Result<(), OutputError> {
        let scale = (trm.m11 * trm.m22 - trm.m12 * trm.m21).abs().sqrt();
        self.glyphs.push(Glyph {
            page: self.page,
            x: trm.m31,
            y: self.page_top - trm.m32,
            advance: width * font_size * trm.m11.abs(),
            size: font_size * scale,
            text: text.to_string(),
        });
        Ok(())
    }

    fn begin_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}

/// A run of glyphs on one line with no wide gap inside
#[derive(Debug, Clone, PartialEq)]
struct TextCell {
    text: String,
    x: f64,
    right: f64,
    y: f64,
    size: f64,
}

impl TextCell {
    fn center_x(&self) -> f64 {
        (self.x + self.right) / 2.0
    }
}

/// Recover the tables laid out in the given glyphs, page by page
pub fn tables_from_glyphs(glyphs: &[Glyph]) -> Vec<RawTable> {
    let mut pages: Vec<usize> = glyphs.iter().map(|g| g.page).collect();
    pages.sort_unstable();
    pages.dedup();

    let mut tables = Vec::new();
    for page in pages {
        let on_page: Vec<&Glyph> = glyphs.iter().filter(|g| g.page == page).collect();
        let lines = cluster_lines(on_page).iter().map(|line| cells_in_line(line)).collect();
        tables.extend(
            table_regions(lines)
                .iter()
                .filter_map(|region| table_from_region(page, region)),
        );
    }
    tables
}

fn cluster_lines(mut glyphs: Vec<&Glyph>) -> Vec<Vec<&Glyph>> {
    glyphs.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

    let mut lines: Vec<Vec<&Glyph>> = Vec::new();
    for glyph in glyphs {
        match lines.last_mut() {
            Some(line)
                if (glyph.y - line[0].y).abs() <= ROW_TOLERANCE * glyph.size.max(line[0].size) =>
            {
                line.push(glyph)
            }
            _ => lines.push(vec![glyph]),
        }
    }

    for line in &mut lines {
        line.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    lines
}

fn cells_in_line(line: &[&Glyph]) -> Vec<TextCell> {
    let mut cells: Vec<TextCell> = Vec::new();

    // Space glyphs are dropped; word breaks come back from the gaps they leave
    for glyph in line.iter().filter(|g| !g.text.trim().is_empty()) {
        match cells.last_mut() {
            Some(cell) if glyph.x - cell.right <= CELL_GAP * glyph.size.max(cell.size) => {
                if glyph.x - cell.right > WORD_GAP * glyph.size {
                    cell.text.push(' ');
                }
                cell.text.push_str(&glyph.text);
                cell.right = cell.right.max(glyph.x + glyph.advance);
            }
            _ => cells.push(TextCell {
                text: glyph.text.clone(),
                x: glyph.x,
                right: glyph.x + glyph.advance,
                y: glyph.y,
                size: glyph.size,
            }),
        }
    }

    cells
}

/// Runs of at least two consecutive multi-cell lines
fn table_regions(lines: Vec<Vec<TextCell>>) -> Vec<Vec<Vec<TextCell>>> {
    let mut regions = Vec::new();
    let mut current: Vec<Vec<TextCell>> = Vec::new();

    for line in lines {
        let adjacent = match (current.last().and_then(|l| l.first()), line.first()) {
            (Some(prev), Some(cell)) => cell.y - prev.y <= REGION_GAP * cell.size.max(prev.size),
            _ => true,
        };
        if line.len() < 2 || !adjacent {
            let region = std::mem::take(&mut current);
            if region.len() >= 2 {
                regions.push(region);
            }
        }
        if line.len() >= 2 {
            current.push(line);
        }
    }

    if current.len() >= 2 {
        regions.push(current);
    }
    regions
}

fn table_from_region(page: usize, region: &[Vec<TextCell>]) -> Option<RawTable> {
    let bands = column_bands(region);
    if bands.len() < 2 {
        return None;
    }

    let mut rows = region.iter().map(|line| place_cells(line, &bands));
    let columns = rows.next()?;
    Some(RawTable::new(page, columns, rows.collect()))
}

/// Left and right edges of each column, from overlapping cell extents
fn column_bands(region: &[Vec<TextCell>]) -> Vec<(f64, f64)> {
    let mut extents: Vec<(f64, f64)> = region
        .iter()
        .flatten()
        .map(|cell| (cell.x, cell.right))
        .collect();
    extents.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut bands: Vec<(f64, f64)> = Vec::new();
    for (left, right) in extents {
        match bands.last_mut() {
            Some(band) if left < band.1 => band.1 = band.1.max(right),
            _ => bands.push((left, right)),
        }
    }
    bands
}

fn place_cells(line: &[TextCell], bands: &[(f64, f64)]) -> Vec<Option<String>> {
    let mut cells: Vec<Option<String>> = vec![None; bands.len()];

    for cell in line {
        let center = cell.center_x();
        let column = bands
            .iter()
            .rposition(|&(left, _)| left <= center)
            .unwrap_or(0);
        if let Some(existing) = &mut cells[column] {
            existing.push(' ');
            existing.push_str(&cell.text);
        } else {
            cells[column] = Some(cell.text.clone());
        }
    }

    cells
}
