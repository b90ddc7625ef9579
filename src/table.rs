use serde::{Serialize, Serializer};
use serde_json::Value;

/// A single cell value: text, number, or blank.
///
/// Blank cells serialize to an empty string so that row records match the
/// shape the analysis prompt and the table view expect.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// JSON representation used for row records and the table snapshot.
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Empty => Value::String(String::new()),
            CellValue::Number(n) => {
                // Whole numbers render without a trailing ".0"
                if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 {
                    Value::from(*n as i64)
                } else {
                    Value::from(*n)
                }
            }
            CellValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// The uploaded table: an ordered header list plus positionally aligned rows.
///
/// Every row holds exactly `headers.len()` values; the value at index `i`
/// belongs to the column named `headers[i]`. Renaming a column therefore
/// never touches the row data, which guarantees positional stability.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DataTable {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl DataTable {
    /// Build a table from raw headers and rows.
    ///
    /// Headers are sanitized (trimmed, blanks replaced by `Column_<i+1>`)
    /// and every row is padded or truncated to the header count so the
    /// positional invariant holds from the start.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let headers = sanitize_headers(&headers);
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();
        DataTable { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Apply a proposed header list positionally.
    ///
    /// Blank or whitespace-only names become `Column_<i+1>`. If the proposed
    /// list is shorter than the current header list, the trailing columns
    /// keep their existing names; extra proposed names are ignored.
    pub fn rename_headers(&mut self, proposed: &[String]) {
        for (i, name) in self.headers.iter_mut().enumerate() {
            if let Some(p) = proposed.get(i) {
                let trimmed = p.trim();
                *name = if trimmed.is_empty() {
                    placeholder(i)
                } else {
                    trimmed.to_string()
                };
            }
        }
    }

    /// Project each row into an ordered column-name -> value record.
    pub fn records(&self) -> Vec<serde_json::Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .zip(row)
                    .map(|(h, v)| (h.clone(), v.to_json()))
                    .collect()
            })
            .collect()
    }

    /// The full table as a JSON array of row records, in row order.
    pub fn snapshot(&self) -> Value {
        Value::Array(self.records().into_iter().map(Value::Object).collect())
    }
}

/// Trim proposed header names and replace blanks with `Column_<i+1>`.
pub fn sanitize_headers(proposed: &[String]) -> Vec<String> {
    proposed
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let trimmed = h.trim();
            if trimmed.is_empty() {
                placeholder(i)
            } else {
                trimmed.to_string()
            }
        })
        .collect()
}

fn placeholder(index: usize) -> String {
    format!("Column_{}", index + 1)
}
