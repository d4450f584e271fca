//! Summaries of CSV files and Excel workbooks

use calamine::{open_workbook_auto_from_rs, Reader};
use std::io::Cursor;

/// Rows shown verbatim in the summary
const PREVIEW_ROWS: usize = 5;

/// Column names listed in the summary
const PREVIEW_COLUMNS: usize = 40;

/// Shape and preview of a parsed table
#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub sheet: String,
    pub columns: Vec<String>,
    pub row_count: usize,
    /// Header plus the first rows, re-encoded as CSV
    pub head_csv: String,
}

impl TableSummary {
    fn from_rows(sheet: String, columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, String> {
        let head_csv = encode_head(&columns, &rows)?;
        Ok(Self {
            sheet,
            columns,
            row_count: rows.len(),
            head_csv,
        })
    }

    /// Render the prompt-facing summary
    pub fn render(&self, file_name: &str) -> String {
        let preview = self
            .columns
            .iter()
            .take(PREVIEW_COLUMNS)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "Uploaded file: {}\nType: tabular\nSheet: {}\nRows: {}, Columns: {}\nColumns preview: {}\nTop {} rows (CSV):\n{}",
            file_name,
            self.sheet,
            self.row_count,
            self.columns.len(),
            preview,
            PREVIEW_ROWS,
            self.head_csv
        )
    }
}

/// Parse CSV bytes; the first record is the header
pub fn summarize_csv(bytes: &[u8]) -> Result<TableSummary, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    TableSummary::from_rows("csv".to_string(), columns, rows)
}

/// Parse the first worksheet of an xlsx/xls workbook
pub fn summarize_workbook(bytes: &[u8]) -> Result<TableSummary, String> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| e.to_string())?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| "workbook has no sheets".to_string())?;

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| e.to_string())?;

    let mut cells = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<String>>());
    let columns = cells.next().unwrap_or_default();
    let rows: Vec<Vec<String>> = cells.collect();

    TableSummary::from_rows(sheet, columns, rows)
}

fn encode_head(columns: &[String], rows: &[Vec<String>]) -> Result<String, String> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
    writer.write_record(columns).map_err(|e| e.to_string())?;
    for row in rows.iter().take(PREVIEW_ROWS) {
        writer.write_record(row).map_err(|e| e.to_string())?;
    }
    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}
