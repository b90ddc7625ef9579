use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto_from_rs};

use crate::error::{Error, Result};
use crate::table::{CellValue, DataTable};

/// Parse an uploaded spreadsheet into a [`DataTable`].
///
/// The format is chosen from the file extension: `.xlsx`/`.xls` go through
/// calamine, `.csv` through the plain-text row parser. The first row is
/// treated as headers, rows with no non-blank cell are skipped, and blank
/// cells normalize to empty values.
///
/// # Arguments
/// * `bytes` - Raw file contents as received from the upload
/// * `file_name` - Original file name, used only for format detection
///
/// # Returns
/// * `Result<DataTable>` - The parsed table or a parse/unsupported-type error
pub fn from_bytes(bytes: &[u8], file_name: &str) -> Result<DataTable> {
    match extension_of(file_name).as_deref() {
        Some("xlsx") | Some("xls") => from_excel_bytes(bytes),
        Some("csv") => from_csv_text(&String::from_utf8_lossy(bytes)),
        Some(ext) => Err(Error::UnsupportedFile(format!(".{}", ext))),
        None => Err(Error::UnsupportedFile("(no extension)".to_string())),
    }
}

/// Load a spreadsheet from disk, detecting the format from the extension.
pub fn load_table(filepath: impl AsRef<Path>) -> Result<DataTable> {
    let path = filepath.as_ref();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let bytes = std::fs::read(path)?;
    from_bytes(&bytes, file_name)
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

fn from_excel_bytes(bytes: &[u8]) -> Result<DataTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| Error::Parse(e.to_string()))?;

    // First sheet only
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::Parse("No sheets found in the workbook".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| Error::Parse(e.to_string()))?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(first) => first.iter().map(header_text).collect(),
        None => return Err(Error::Parse("The first sheet is empty".to_string())),
    };

    let rows: Vec<Vec<CellValue>> = rows_iter
        .map(|row| row.iter().map(cell_value).collect::<Vec<CellValue>>())
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect();

    Ok(DataTable::new(headers, rows))
}

fn header_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        other => CellValue::Text(other.to_string()),
    }
}

fn from_csv_text(text: &str) -> Result<DataTable> {
    let mut lines = text.lines();
    let headers = match lines.next() {
        Some(line) => parse_csv_row(line),
        None => return Err(Error::Parse("CSV file is empty".to_string())),
    };

    let rows: Vec<Vec<CellValue>> = lines
        .map(parse_csv_row)
        .filter(|fields| fields.iter().any(|f| !f.trim().is_empty()))
        .map(|fields| fields.into_iter().map(csv_cell_value).collect())
        .collect();

    Ok(DataTable::new(headers, rows))
}

fn csv_cell_value(field: String) -> CellValue {
    if field.is_empty() {
        CellValue::Empty
    } else if let Ok(num) = field.parse::<f64>() {
        CellValue::Number(num)
    } else {
        CellValue::Text(field)
    }
}

// Parse a CSV row into a vector of fields, honoring quoted fields and
// doubled quotes inside them.
fn parse_csv_row(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if let Some(&next) = chars.peek() {
                    if next == '"' && in_quotes {
                        // Doubled quote inside a quoted field
                        current_field.push('"');
                        chars.next();
                    } else {
                        in_quotes = !in_quotes;
                    }
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                result.push(current_field);
                current_field = String::new();
            }
            _ => {
                current_field.push(c);
            }
        }
    }

    result.push(current_field);
    result
}
