//! Monthly CSV and PDF exports
//!
//! The CSV is rendered by the backend and only downloaded here. The PDF is
//! rendered locally from the reports currently on the dashboard.

use crate::{DashboardError, Result};
use chrono::Local;
use clinick_client::ApiClient;
use clinick_core::{MonthFilter, Report};
use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Document title
pub const PDF_TITLE: &str = "Clinick Dashboard Report";

/// Table columns, in order
pub const PDF_COLUMNS: [&str; 7] = [
    "Role",
    "Patient Name",
    "Location",
    "Incident",
    "Severity",
    "Symptoms",
    "Time",
];

// Landscape A4
const PAGE_WIDTH: f32 = 297.0;
const PAGE_HEIGHT: f32 = 210.0;
const MARGIN: f32 = 14.0;
const BOTTOM: f32 = 14.0;
const LINE_HEIGHT: f32 = 4.2;
const ROW_GAP: f32 = 1.8;
const FONT_SIZE: f32 = 8.5;
// Title and subtitle above the first header row
const TITLE_BLOCK: f32 = 16.0;
// Header row down to the first table line
const HEADER_STEP: f32 = LINE_HEIGHT + ROW_GAP;

// Widths sum to PAGE_WIDTH - 2 * MARGIN
const COLUMN_WIDTHS: [f32; 7] = [22.0, 38.0, 34.0, 40.0, 22.0, 75.0, 38.0];

// Helvetica at FONT_SIZE averages roughly 1.7mm per character
const MM_PER_CHAR: f32 = 1.7;

/// `clinick-report-YYYY-MM.<extension>`
#[must_use]
pub fn export_file_name(filter: MonthFilter, extension: &str) -> String {
    format!(
        "clinick-report-{:04}-{:02}.{extension}",
        filter.year(),
        filter.month()
    )
}

/// Subtitle line under the title
#[must_use]
pub fn pdf_subtitle(filter: MonthFilter) -> String {
    format!("Month: {:02}   Year: {}", filter.month(), filter.year())
}

/// Cell values for one report, in [`PDF_COLUMNS`] order
#[must_use]
pub fn report_row(report: &Report) -> [String; 7] {
    [
        report.role.map(|r| r.to_string()).unwrap_or_default(),
        report.patient_name.clone(),
        report.location.clone(),
        report.incident.clone(),
        report.severity.map(|s| s.to_string()).unwrap_or_default(),
        report.symptoms.replace(['\r', '\n'], " "),
        report
            .created_at
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default(),
    ]
}

/// Download the backend CSV for `filter` and write it under `output`
///
/// `output` may be a directory or a full file path.
///
/// # Errors
///
/// Returns [`DashboardError::MonthRequired`] without a filter, and a client
/// or I/O error if the download or write fails.
#[instrument(skip(client))]
pub async fn export_csv(
    client: &ApiClient,
    filter: Option<MonthFilter>,
    output: &Path,
) -> Result<PathBuf> {
    let filter = filter.ok_or(DashboardError::MonthRequired)?;
    let body = client.download_csv(filter).await?;

    let path = resolve_output(output, &export_file_name(filter, "csv"));
    write_file(&path, &body)?;
    info!(path = %path.display(), bytes = body.len(), "CSV export written");
    Ok(path)
}

/// Render `reports` as a PDF and write it under `output`
///
/// # Errors
///
/// Returns [`DashboardError::MonthRequired`] without a filter and
/// [`DashboardError::Export`] if rendering or writing fails.
#[instrument(skip(reports), fields(rows = reports.len()))]
pub fn export_pdf(reports: &[Report], filter: Option<MonthFilter>, output: &Path) -> Result<PathBuf> {
    let filter = filter.ok_or(DashboardError::MonthRequired)?;
    let bytes = render_pdf(reports, filter)?;

    let path = resolve_output(output, &export_file_name(filter, "pdf"));
    write_file(&path, &bytes).map_err(|e| {
        warn!(error = %e, "PDF export failed");
        DashboardError::export(e.to_string())
    })?;
    info!(path = %path.display(), rows = reports.len(), "PDF export written");
    Ok(path)
}

/// Render the report table to PDF bytes
///
/// # Errors
///
/// Returns [`DashboardError::Export`] if a font cannot be loaded or the
/// document cannot be serialized.
pub fn render_pdf(reports: &[Report], filter: MonthFilter) -> Result<Vec<u8>> {
    let (doc, page, layer) =
        PdfDocument::new(PDF_TITLE, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| DashboardError::export(format!("PDF font error: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| DashboardError::export(format!("PDF font error: {e}")))?;

    let mut layer = doc.get_page(page).get_layer(layer);
    let top = PAGE_HEIGHT - MARGIN;
    layer.use_text(PDF_TITLE, 16.0, Mm(MARGIN), Mm(top), &bold);
    layer.use_text(pdf_subtitle(filter), 10.0, Mm(MARGIN), Mm(top - 7.0), &font);
    draw_header(&layer, Mm(top - TITLE_BLOCK), &bold);

    let rows: Vec<Vec<Vec<String>>> = reports
        .iter()
        .map(|report| -> Vec<Vec<String>> {
            report_row(report)
                .iter()
                .zip(COLUMN_WIDTHS)
                .map(|(value, width)| wrap_cell(value, column_chars(width)))
                .collect()
        })
        .collect();
    let heights: Vec<usize> = rows
        .iter()
        .map(|cells| cells.iter().map(Vec::len).max().unwrap_or(1))
        .collect();

    let mut current_page = 0;
    for (cells, positions) in rows.iter().zip(layout_rows(&heights)) {
        for (index, position) in positions.into_iter().enumerate() {
            if position.page != current_page {
                layer = new_page(&doc);
                draw_header(&layer, Mm(top), &bold);
                current_page = position.page;
            }

            let mut x = MARGIN;
            for (cell, width) in cells.iter().zip(COLUMN_WIDTHS) {
                if let Some(line) = cell.get(index) {
                    layer.use_text(line.as_str(), FONT_SIZE, Mm(x), Mm(position.y), &font);
                }
                x += width;
            }
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| DashboardError::export(format!("PDF save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| DashboardError::export(format!("PDF buffer error: {e}")))
}

/// Where one table line lands
#[derive(Debug, Clone, Copy, PartialEq)]
struct LinePosition {
    page: usize,
    y: f32,
}

/// Place every line of every row, breaking pages between lines
///
/// A row that fits on a fresh page is moved there whole; a row taller than a
/// page continues on the following pages.
fn layout_rows(row_lines: &[usize]) -> Vec<Vec<LinePosition>> {
    let page_top = PAGE_HEIGHT - MARGIN - HEADER_STEP;
    let mut page = 0;
    let mut y = PAGE_HEIGHT - MARGIN - TITLE_BLOCK - HEADER_STEP;

    row_lines
        .iter()
        .map(|&lines| {
            let lines = lines.max(1);
            #[allow(clippy::cast_precision_loss)]
            let height = lines as f32 * LINE_HEIGHT;
            if y - height < BOTTOM && y < page_top {
                page += 1;
                y = page_top;
            }

            let positions: Vec<LinePosition> = (0..lines)
                .map(|_| {
                    if y - LINE_HEIGHT < BOTTOM {
                        page += 1;
                        y = page_top;
                    }
                    let position = LinePosition { page, y };
                    y -= LINE_HEIGHT;
                    position
                })
                .collect();
            y -= ROW_GAP;
            positions
        })
        .collect()
}

fn new_page(doc: &PdfDocumentReference) -> PdfLayerReference {
    let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    doc.get_page(page).get_layer(layer)
}

fn draw_header(layer: &PdfLayerReference, y: Mm, bold: &IndirectFontRef) {
    let mut x = MARGIN;
    for (title, width) in PDF_COLUMNS.iter().zip(COLUMN_WIDTHS) {
        layer.use_text(*title, 9.0, Mm(x), y, bold);
        x += width;
    }
}

fn column_chars(width: f32) -> usize {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let chars = ((width - 2.0) / MM_PER_CHAR).floor() as usize;
    chars.max(4)
}

/// Word-wrap `text` to `max_chars` per line, splitting words that do not fit
///
/// A `max_chars` of zero returns the text as a single line.
fn wrap_cell(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let current_len = current.chars().count();
        if !current.is_empty() && current_len + 1 + word.len() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn resolve_output(output: &Path, file_name: &str) -> PathBuf {
    if output.is_dir() {
        output.join(file_name)
    } else {
        output.to_path_buf()
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}
