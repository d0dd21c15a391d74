//! Feature Frame - CSV input parsed into the canonical feature layout
//!
//! Headers are checked against `FEATURE_LAYOUT` before any cell is parsed, so
//! a schema violation is reported ahead of any bad value. Only the 30 feature
//! columns (plus an optional label column) are parsed; extra columns are
//! skipped and may hold arbitrary text.

use std::io::Read;

use ndarray::Array2;
use serde_json::{Map, Number, Value};

use super::layout::{missing_columns, FEATURE_COUNT, FEATURE_LAYOUT};

/// Cell spellings read as a missing value
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("No columns to parse from file")]
    NoColumns,

    #[error("Missing columns: {}", format_column_list(.0))]
    MissingColumns(Vec<String>),

    #[error("\"['{0}'] not found in axis\"")]
    MissingLabel(String),

    #[error("could not convert string to float: '{value}'")]
    InvalidNumber { column: String, value: String },

    #[error("Error tokenizing data. Expected {expected} fields in line {line}, saw {found}")]
    Tokenize { line: u64, expected: usize, found: usize },

    #[error("{0}")]
    Csv(#[from] csv::Error),
}

/// Render column names as a bracketed, single-quoted list: `['V1', 'Amount']`
pub fn format_column_list(columns: &[String]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| format!("'{}'", c)).collect();
    format!("[{}]", quoted.join(", "))
}

// ============================================================================
// CELLS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cell {
    Missing,
    Int(i64),
    Float(f64),
}

fn parse_cell(raw: &str) -> Option<Cell> {
    if NA_VALUES.contains(&raw) {
        return Some(Cell::Missing);
    }
    if let Ok(v) = raw.parse::<i64>() {
        return Some(Cell::Int(v));
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_nan() => Some(Cell::Missing),
        Ok(v) => Some(Cell::Float(v)),
        Err(_) => None,
    }
}

/// Parse a single cell as a number; `Ok(None)` for missing-value markers
pub fn parse_number(raw: &str) -> Result<Option<f64>, FrameError> {
    match parse_cell(raw.trim()) {
        Some(Cell::Missing) => Ok(None),
        Some(Cell::Int(v)) => Ok(Some(v as f64)),
        Some(Cell::Float(v)) => Ok(Some(v)),
        None => Err(FrameError::InvalidNumber {
            column: String::new(),
            value: raw.to_string(),
        }),
    }
}

// ============================================================================
// COLUMNS
// ============================================================================

/// One feature column; `integral` stays true while every cell is an integer literal
///
/// Integer cells are kept as `i64` next to their `f64` value so they are
/// echoed back exactly, even past 2^53.
#[derive(Debug, Clone)]
pub struct FeatureColumn {
    pub name: &'static str,
    pub values: Vec<Option<f64>>,
    pub integral: bool,
    integers: Vec<i64>,
}

impl FeatureColumn {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            values: Vec::new(),
            integral: true,
            integers: Vec::new(),
        }
    }

    fn demote(&mut self) {
        self.integral = false;
        self.integers = Vec::new();
    }

    fn push(&mut self, raw: &str) -> Result<(), FrameError> {
        match parse_cell(raw) {
            Some(Cell::Missing) => {
                self.demote();
                self.values.push(None);
            }
            Some(Cell::Int(v)) => {
                if self.integral {
                    self.integers.push(v);
                }
                self.values.push(Some(v as f64));
            }
            Some(Cell::Float(v)) => {
                self.demote();
                self.values.push(Some(v));
            }
            None => {
                return Err(FrameError::InvalidNumber {
                    column: self.name.to_string(),
                    value: raw.to_string(),
                })
            }
        }
        Ok(())
    }

    fn json_value(&self, row: usize) -> Value {
        if self.integral {
            return self.integers.get(row).map_or(Value::Null, |&v| Value::from(v));
        }
        match self.values.get(row).copied().flatten() {
            None => Value::Null,
            Some(v) => Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
        }
    }
}

// ============================================================================
// FEATURE FRAME
// ============================================================================

/// Rows of the 30 feature columns in canonical order
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    columns: Vec<FeatureColumn>,
    n_rows: usize,
}

/// Feature frame plus the raw label column read alongside it
#[derive(Debug, Clone)]
pub struct LabeledFrame {
    pub features: FeatureFrame,
    pub labels: Vec<Option<f64>>,
}

impl FeatureFrame {
    /// Parse CSV with a header row, keeping only the feature columns
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, FrameError> {
        read_frame(reader, None).map(|labeled| labeled.features)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        Self::from_reader(bytes)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&FeatureColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Dense `(rows, FEATURE_COUNT)` matrix, NaN for missing cells
    pub fn to_matrix(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.n_rows, FEATURE_COUNT), |(row, col)| {
            self.columns[col].values[row].unwrap_or(f64::NAN)
        })
    }

    /// First `limit` rows as field-name-to-value maps, keys in layout order
    pub fn head_records(&self, limit: usize) -> Vec<Map<String, Value>> {
        (0..self.n_rows.min(limit))
            .map(|row| {
                self.columns
                    .iter()
                    .map(|column| (column.name.to_string(), column.json_value(row)))
                    .collect()
            })
            .collect()
    }
}

impl LabeledFrame {
    /// Parse a training dataset: the feature columns plus `label`
    pub fn from_reader<R: Read>(reader: R, label: &str) -> Result<Self, FrameError> {
        read_frame(reader, Some(label))
    }
}

fn read_frame<R: Read>(reader: R, label: Option<&str>) -> Result<LabeledFrame, FrameError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Fields)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.iter().all(str::is_empty) {
        return Err(FrameError::NoColumns);
    }
    let names: Vec<&str> = headers.iter().collect();

    let missing = missing_columns(&names);
    if !missing.is_empty() {
        return Err(FrameError::MissingColumns(missing));
    }

    // First occurrence wins for duplicated header names
    let positions: Vec<usize> = FEATURE_LAYOUT
        .iter()
        .filter_map(|name| names.iter().position(|h| h == name))
        .collect();

    let label_position = label
        .map(|l| {
            names
                .iter()
                .position(|h| *h == l)
                .ok_or_else(|| FrameError::MissingLabel(l.to_string()))
        })
        .transpose()?;

    let mut columns: Vec<FeatureColumn> = FEATURE_LAYOUT.iter().map(|&n| FeatureColumn::new(n)).collect();
    let mut labels = Vec::new();
    let mut n_rows = 0;

    let mut record = csv::StringRecord::new();
    while rdr.read_record(&mut record)? {
        if record.len() > names.len() {
            return Err(FrameError::Tokenize {
                line: record.position().map(|p| p.line()).unwrap_or(0),
                expected: names.len(),
                found: record.len(),
            });
        }

        for (column, &pos) in columns.iter_mut().zip(&positions) {
            column.push(record.get(pos).unwrap_or(""))?;
        }

        if let Some(pos) = label_position {
            let raw = record.get(pos).unwrap_or("");
            let value = parse_number(raw).map_err(|_| FrameError::InvalidNumber {
                column: names[pos].to_string(),
                value: raw.to_string(),
            })?;
            labels.push(value);
        }

        n_rows += 1;
    }

    tracing::debug!("Parsed {} rows ({} header fields)", n_rows, names.len());

    Ok(LabeledFrame {
        features: FeatureFrame { columns, n_rows },
        labels,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> String {
        FEATURE_LAYOUT.join(",")
    }

    fn zero_row() -> String {
        vec!["0"; FEATURE_COUNT].join(",")
    }

    #[test]
    fn test_parse_canonical_upload() {
        let csv = format!("{}\n{}\n{}\n", header(), zero_row(), zero_row());
        let frame = FeatureFrame::from_bytes(csv.as_bytes()).unwrap();

        assert_eq!(frame.n_rows(), 2);
        assert_eq!(frame.columns().len(), FEATURE_COUNT);
        assert_eq!(frame.to_matrix().dim(), (2, FEATURE_COUNT));
        assert!(frame.columns().iter().all(|c| c.integral));
    }

    #[test]
    fn test_reorders_and_drops_extras() {
        // Reverse the layout and add an extra text column
        let mut names: Vec<&str> = FEATURE_LAYOUT.iter().rev().copied().collect();
        names.insert(3, "merchant");
        let values: Vec<String> = names
            .iter()
            .map(|n| match *n {
                "merchant" => "Coffee Shop".to_string(),
                "Amount" => "12.5".to_string(),
                "Time" => "7".to_string(),
                _ => "0".to_string(),
            })
            .collect();
        let csv = format!("{}\n{}\n", names.join(","), values.join(","));

        let frame = FeatureFrame::from_bytes(csv.as_bytes()).unwrap();
        let matrix = frame.to_matrix();

        assert_eq!(matrix[[0, 0]], 7.0);
        assert_eq!(matrix[[0, 29]], 12.5);

        let records = frame.head_records(5);
        let keys: Vec<&str> = records[0].keys().map(String::as_str).collect();
        assert_eq!(keys, FEATURE_LAYOUT.to_vec());
        assert!(!records[0].contains_key("merchant"));
    }

    #[test]
    fn test_missing_columns_listed_exactly() {
        let names: Vec<&str> = FEATURE_LAYOUT.iter().copied().filter(|n| *n != "Amount").collect();
        let csv = format!("{}\n", names.join(","));

        match FeatureFrame::from_bytes(csv.as_bytes()) {
            Err(FrameError::MissingColumns(cols)) => assert_eq!(cols, vec!["Amount".to_string()]),
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_columns_message() {
        let err = FrameError::MissingColumns(vec!["V1".to_string(), "Amount".to_string()]);
        assert_eq!(err.to_string(), "Missing columns: ['V1', 'Amount']");
    }

    #[test]
    fn test_empty_upload() {
        assert!(matches!(FeatureFrame::from_bytes(b""), Err(FrameError::NoColumns)));
    }

    #[test]
    fn test_invalid_number() {
        let mut cells = vec!["0".to_string(); FEATURE_COUNT];
        cells[5] = "abc".to_string();
        let csv = format!("{}\n{}\n", header(), cells.join(","));

        let err = FeatureFrame::from_bytes(csv.as_bytes()).unwrap_err();
        assert_eq!(err.to_string(), "could not convert string to float: 'abc'");
    }

    #[test]
    fn test_text_in_extra_column_is_ignored() {
        let csv = format!("{},note\n{},hello world\n", header(), zero_row());
        assert!(FeatureFrame::from_bytes(csv.as_bytes()).is_ok());
    }

    #[test]
    fn test_missing_values_become_null_and_nan() {
        let mut cells = vec!["1".to_string(); FEATURE_COUNT];
        cells[1] = "".to_string();
        cells[2] = "NA".to_string();
        let csv = format!("{}\n{}\n", header(), cells.join(","));

        let frame = FeatureFrame::from_bytes(csv.as_bytes()).unwrap();
        let matrix = frame.to_matrix();
        assert!(matrix[[0, 1]].is_nan());
        assert!(matrix[[0, 2]].is_nan());

        let record = &frame.head_records(1)[0];
        assert_eq!(record["V1"], Value::Null);
        assert_eq!(record["V2"], Value::Null);
        assert_eq!(record["V3"], Value::from(1));
        assert!(!frame.column("V1").unwrap().integral);
    }

    #[test]
    fn test_float_column_reported_as_float() {
        let mut first = vec!["0".to_string(); FEATURE_COUNT];
        let mut second = vec!["0".to_string(); FEATURE_COUNT];
        first[29] = "10".to_string();
        second[29] = "2.75".to_string();
        let csv = format!("{}\n{}\n{}\n", header(), first.join(","), second.join(","));

        let frame = FeatureFrame::from_bytes(csv.as_bytes()).unwrap();
        let records = frame.head_records(5);

        assert!(records[0]["Amount"].is_f64());
        assert_eq!(records[0]["Amount"].as_f64(), Some(10.0));
        assert!(records[0]["Time"].is_i64());
    }

    #[test]
    fn test_large_integers_echoed_exactly() {
        let mut cells = vec!["0".to_string(); FEATURE_COUNT];
        cells[0] = "9007199254740993".to_string();
        cells[29] = "-9223372036854775808".to_string();
        let csv = format!("{}\n{}\n", header(), cells.join(","));

        let frame = FeatureFrame::from_bytes(csv.as_bytes()).unwrap();
        let record = &frame.head_records(1)[0];

        assert_eq!(record["Time"], Value::from(9_007_199_254_740_993_i64));
        assert_eq!(record["Amount"], Value::from(i64::MIN));
        assert_eq!(frame.to_matrix()[[0, 0]], 9_007_199_254_740_993_i64 as f64);
    }

    #[test]
    fn test_spreadsheet_na_markers() {
        let markers = ["#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "1.#IND", "1.#QNAN"];
        let mut cells = vec!["1".to_string(); FEATURE_COUNT];
        for (i, marker) in markers.iter().enumerate() {
            cells[i + 1] = marker.to_string();
        }
        let csv = format!("{}\n{}\n", header(), cells.join(","));

        let frame = FeatureFrame::from_bytes(csv.as_bytes()).unwrap();
        let matrix = frame.to_matrix();
        let record = &frame.head_records(1)[0];
        for i in 1..=markers.len() {
            assert!(matrix[[0, i]].is_nan());
            assert_eq!(record[FEATURE_LAYOUT[i]], Value::Null);
        }
        assert_eq!(record["V7"], Value::from(1));
    }

    #[test]
    fn test_headers_are_not_trimmed() {
        let names: Vec<&str> = FEATURE_LAYOUT
            .iter()
            .map(|n| if *n == "Amount" { " Amount " } else { *n })
            .collect();
        let csv = format!("{}\n{}\n", names.join(","), zero_row());

        match FeatureFrame::from_bytes(csv.as_bytes()) {
            Err(FrameError::MissingColumns(cols)) => assert_eq!(cols, vec!["Amount".to_string()]),
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_cells_are_trimmed() {
        let mut cells = vec!["0".to_string(); FEATURE_COUNT];
        cells[29] = " 12.5 ".to_string();
        let csv = format!("{}\n{}\n", header(), cells.join(","));

        let frame = FeatureFrame::from_bytes(csv.as_bytes()).unwrap();
        assert_eq!(frame.to_matrix()[[0, 29]], 12.5);
    }

    #[test]
    fn test_short_rows_padded_long_rows_rejected() {
        let short = vec!["0"; FEATURE_COUNT - 1].join(",");
        let csv = format!("{}\n{}\n", header(), short);
        let frame = FeatureFrame::from_bytes(csv.as_bytes()).unwrap();
        assert!(frame.to_matrix()[[0, 29]].is_nan());

        let long = vec!["0"; FEATURE_COUNT + 1].join(",");
        let csv = format!("{}\n{}\n", header(), long);
        assert!(matches!(
            FeatureFrame::from_bytes(csv.as_bytes()),
            Err(FrameError::Tokenize { expected: 30, found: 31, .. })
        ));
    }

    #[test]
    fn test_head_records_truncates() {
        let rows: Vec<String> = (0..8).map(|_| zero_row()).collect();
        let csv = format!("{}\n{}\n", header(), rows.join("\n"));
        let frame = FeatureFrame::from_bytes(csv.as_bytes()).unwrap();

        assert_eq!(frame.n_rows(), 8);
        assert_eq!(frame.head_records(5).len(), 5);
    }

    #[test]
    fn test_labeled_frame() {
        let csv = format!("{},Class\n{},\"0\"\n{},1\n", header(), zero_row(), zero_row());
        let labeled = LabeledFrame::from_reader(csv.as_bytes(), "Class").unwrap();
        assert_eq!(labeled.labels, vec![Some(0.0), Some(1.0)]);

        let err = LabeledFrame::from_reader(csv.as_bytes(), "Label").unwrap_err();
        assert!(matches!(err, FrameError::MissingLabel(_)));
    }
}
