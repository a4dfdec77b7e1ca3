// PDF report of the download log.

use std::{fs, path::{Path, PathBuf}};

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use tracing::info;

use crate::constants::REPORT_FILE_NAME;
use crate::error::{DashboardError, Result};
use crate::export::{unique_path, LogEntry};

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN_X: f32 = 14.0;
const TITLE_Y: f32 = PAGE_H - 16.0;
const TABLE_TOP: f32 = PAGE_H - 24.0;
const ROW_H: f32 = 6.0;
const BOTTOM: f32 = 15.0;
const FONT_SIZE: f32 = 9.0;

pub const HEADERS: [&str; 5] = ["Status", "Start Time", "End Time", "Duration", "Error"];

// (x offset from margin in mm, max chars)
const COLUMNS: [(f32, usize); 5] = [(0.0, 9), (18.0, 20), (55.0, 20), (92.0, 12), (115.0, 45)];

pub fn row_cells(entry: &LogEntry) -> [String; 5] {
    [
        entry.status.to_string(),
        entry.start_label(),
        entry.end_label(),
        entry.duration_label(),
        entry.error.clone(),
    ]
}

fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max.saturating_sub(3)).collect();
    clipped.push_str("...");
    clipped
}

fn draw_row(layer: &PdfLayerReference, font: &IndirectFontRef, cells: &[String], y: f32) {
    for (cell, (dx, max)) in cells.iter().zip(COLUMNS) {
        layer.use_text(clip(cell, max), FONT_SIZE, Mm(MARGIN_X + dx), Mm(y), font);
    }
}

fn pdf_err(err: impl std::fmt::Display) -> DashboardError {
    DashboardError::Report(err.to_string())
}

pub fn render(logs: &[LogEntry]) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new("Download Logs", Mm(PAGE_W), Mm(PAGE_H), "Logs");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?;

    let mut current = doc.get_page(page).get_layer(layer);
    current.use_text("Download Logs", 16.0, Mm(MARGIN_X), Mm(TITLE_Y), &bold);

    let headers = HEADERS.map(str::to_string);
    draw_row(&current, &bold, &headers, TABLE_TOP);
    let mut y = TABLE_TOP - ROW_H;

    for entry in logs {
        if y < BOTTOM {
            let (page, layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Logs");
            current = doc.get_page(page).get_layer(layer);
            draw_row(&current, &bold, &headers, TITLE_Y);
            y = TITLE_Y - ROW_H;
        }
        draw_row(&current, &font, &row_cells(entry), y);
        y -= ROW_H;
    }
    drop(current);

    doc.save_to_bytes().map_err(pdf_err)
}

/// Writes the report next to the downloads and returns its path.
pub fn write_report(logs: &[LogEntry], dir: &Path) -> Result<PathBuf> {
    let bytes = render(logs)?;
    fs::create_dir_all(dir)?;
    let path = unique_path(dir, REPORT_FILE_NAME);
    fs::write(&path, bytes)?;
    info!(file = %path.display(), rows = logs.len(), "report written");
    Ok(path)
}
