use crate::table::DataTable;

/// Render the table as CSV text: one header row, then one row per record
/// with every data field quoted and embedded quotes doubled.
///
/// # Arguments
/// * `table` - The table to export
///
/// # Returns
/// * `String` - The CSV content
///
/// # Examples
/// ```
/// use athena::table::{CellValue, DataTable};
/// use athena::downloader::to_csv;
///
/// let table = DataTable::new(
///     vec!["A".to_string(), "B".to_string()],
///     vec![vec![CellValue::Number(1.0), CellValue::Text("x".into())]],
/// );
/// assert_eq!(to_csv(&table), "A,B\n\"1\",\"x\"");
/// ```
pub fn to_csv(table: &DataTable) -> String {
    let mut lines = Vec::with_capacity(table.row_count() + 1);
    lines.push(table.headers().join(","));

    for row in table.rows() {
        let fields: Vec<String> = row
            .iter()
            .map(|value| format!("\"{}\"", value.to_string().replace('"', "\"\"")))
            .collect();
        lines.push(fields.join(","));
    }

    lines.join("\n")
}

/// Derive the download filename from the uploaded file's name by replacing
/// its extension with `_analysis.csv`.
pub fn export_filename(source_name: &str) -> String {
    let lower = source_name.to_lowercase();
    for ext in [".xlsx", ".xls", ".csv"] {
        if lower.ends_with(ext) {
            let stem = &source_name[..source_name.len() - ext.len()];
            return format!("{}_analysis.csv", stem);
        }
    }
    format!("{}_analysis.csv", source_name)
}
