//! CSV loader with encoding and delimiter auto-detection.
//!
//! Converts delimited text into a typed [`Dataset`]. Cells that are empty or
//! match a missing token become [`Cell::Missing`], cells that parse as a
//! number become [`Cell::Number`], anything else is kept as text.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;

use crate::models::{Cell, Dataset};

/// CSV parsing error with context
#[derive(Debug, Clone)]
pub struct CsvError {
    pub line: usize,
    pub column: Option<String>,
    pub value: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.column, &self.value) {
            (Some(col), Some(val)) => {
                write!(f, "Line {}, column '{}' (value '{}'): {}", self.line, col, val, self.message)
            }
            (Some(col), None) => {
                write!(f, "Line {}, column '{}': {}", self.line, col, self.message)
            }
            _ => {
                write!(f, "Line {}: {}", self.line, self.message)
            }
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Options controlling how raw text becomes cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Explicit delimiter (auto-detected when `None`)
    #[serde(default)]
    pub delimiter: Option<char>,
    /// Tokens read as missing values (compared after trimming)
    #[serde(default = "default_missing_tokens")]
    pub missing_tokens: Vec<String>,
}

fn default_missing_tokens() -> Vec<String> {
    ["", "NA", "N/A", "NaN", "."]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            missing_tokens: default_missing_tokens(),
        }
    }
}

impl LoadOptions {
    /// Convert one raw field into a cell.
    pub fn parse_cell(&self, raw: &str) -> Cell {
        let value = raw.trim();
        if self.missing_tokens.iter().any(|t| t == value) {
            return Cell::Missing;
        }
        match value.parse::<f64>() {
            Ok(v) if !v.is_nan() => Cell::Number(v),
            _ => Cell::Text(value.to_string()),
        }
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed dataset
    pub dataset: Dataset,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // Fallback: UTF-8 with lossy conversion
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV from a reader into a dataset.
///
/// # Example
/// ```
/// use tableone::parser::{parse_csv, LoadOptions};
///
/// let csv = "age,diabetes\n50,pos\n31,NA";
/// let dataset = parse_csv(csv.as_bytes(), ',', &LoadOptions::default()).unwrap();
///
/// assert_eq!(dataset.row_count(), 2);
/// assert!(dataset.column("diabetes").unwrap().cells[1].is_missing());
/// ```
pub fn parse_csv<R: Read>(reader: R, delimiter: char, options: &LoadOptions) -> Result<Dataset, CsvError> {
    let delimiter = u8::try_from(delimiter)
        .map_err(|_| CsvError::new(0, format!("Delimiter '{}' is not a single byte", delimiter)))?;

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|e| CsvError::new(1, format!("Cannot read header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::new(1, "No headers found"));
    }

    let mut seen = HashSet::new();
    for header in &headers {
        if header.is_empty() {
            return Err(CsvError::new(1, "Empty column name in header"));
        }
        if !seen.insert(header.as_str()) {
            return Err(CsvError::new(1, "Duplicate column name").with_column(header.clone()));
        }
    }

    let mut rows = Vec::new();
    for (idx, record) in csv_reader.records().enumerate() {
        let line_num = idx + 2; // +1 for 0-index, +1 for header
        let record = record.map_err(|e| CsvError::new(line_num, format!("Cannot read record: {}", e)))?;

        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        rows.push(record.iter().map(|field| options.parse_cell(field)).collect());
    }

    Dataset::from_rows(headers, rows).map_err(|e| CsvError::new(0, e.to_string()))
}

/// Parse CSV text with an explicit delimiter.
pub fn csv_to_dataset(csv: &str, delimiter: char) -> Result<Dataset, CsvError> {
    parse_csv(csv.as_bytes(), delimiter, &LoadOptions::default())
}

/// Parse CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<ParseResult, CsvError> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| CsvError::new(0, format!("Cannot read file '{}': {}", path.as_ref().display(), e)))?;

    parse_bytes_auto(&bytes, options)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8], options: &LoadOptions) -> Result<ParseResult, CsvError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(CsvError::new(1, "Empty CSV file"));
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = options.delimiter.unwrap_or_else(|| detect_delimiter(&content));

    let dataset = parse_csv(content.as_bytes(), delimiter, options)?;
    let headers = dataset.column_names();

    Ok(ParseResult {
        dataset,
        encoding,
        delimiter,
        headers,
    })
}

/// Write a dataset as delimited text, missing cells as empty fields.
pub fn write_csv<W: Write>(dataset: &Dataset, writer: W, delimiter: char) -> Result<(), CsvError> {
    let delimiter = u8::try_from(delimiter)
        .map_err(|_| CsvError::new(0, format!("Delimiter '{}' is not a single byte", delimiter)))?;

    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    csv_writer
        .write_record(dataset.column_names())
        .map_err(|e| CsvError::new(1, format!("Cannot write header: {}", e)))?;

    for i in 0..dataset.row_count() {
        let row: Vec<String> = dataset
            .columns()
            .iter()
            .map(|c| c.cells[i].to_string())
            .collect();
        csv_writer
            .write_record(&row)
            .map_err(|e| CsvError::new(i + 2, format!("Cannot write record: {}", e)))?;
    }

    csv_writer
        .flush()
        .map_err(|e| CsvError::new(0, format!("Cannot flush output: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let ds = csv_to_dataset("pregnant;age\n6;50\n1;31", ';').unwrap();

        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.column("pregnant").unwrap().cells[0], Cell::Number(6.0));
        assert_eq!(ds.column("age").unwrap().cells[1], Cell::Number(31.0));
    }

    #[test]
    fn test_text_and_missing_cells() {
        let ds = csv_to_dataset("glucose,diabetes\n148,pos\nNA,neg\n,pos", ',').unwrap();

        let glucose = &ds.column("glucose").unwrap().cells;
        assert_eq!(glucose[0], Cell::Number(148.0));
        assert!(glucose[1].is_missing());
        assert!(glucose[2].is_missing());
        assert_eq!(ds.column("diabetes").unwrap().cells[1], Cell::Text("neg".into()));
    }

    #[test]
    fn test_quoted_values() {
        let csv = "name;value\n\"Alice\";\"Hello; World\"";
        let ds = csv_to_dataset(csv, ';').unwrap();

        assert_eq!(ds.column("value").unwrap().cells[0], Cell::Text("Hello; World".into()));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let ds = csv_to_dataset("a;b\n1;2\n\n3;4\n", ';').unwrap();
        assert_eq!(ds.row_count(), 2);
    }

    #[test]
    fn test_short_rows_padded() {
        let ds = csv_to_dataset("a;b;c\n1;2", ';').unwrap();
        assert!(ds.column("c").unwrap().cells[0].is_missing());
    }

    #[test]
    fn test_duplicate_header_error() {
        let err = csv_to_dataset("age,age\n1,2", ',').unwrap_err();
        assert!(err.to_string().contains("column 'age'"));
    }

    #[test]
    fn test_error_message_format() {
        let err = CsvError::new(5, "Invalid value")
            .with_column("age")
            .with_value("abc");

        let msg = err.to_string();
        assert!(msg.contains("Line 5"));
        assert!(msg.contains("column 'age'"));
        assert!(msg.contains("value 'abc'"));
    }

    #[test]
    fn test_empty_csv_error() {
        let result = parse_bytes_auto(b"", &LoadOptions::default());
        let err = result.unwrap_err();
        assert!(err.message.contains("Empty"));
    }

    #[test]
    fn test_custom_missing_tokens() {
        let options = LoadOptions {
            delimiter: Some(','),
            missing_tokens: vec!["".into(), "-99".into()],
        };
        let ds = parse_csv("x\n-99\nNA".as_bytes(), ',', &options).unwrap();
        let cells = &ds.column("x").unwrap().cells;
        assert!(cells[0].is_missing());
        assert_eq!(cells[1], Cell::Text("NA".into()));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_auto_parse() {
        let csv = "pregnant,glucose\n6,148\n1,85";
        let result = parse_bytes_auto(csv.as_bytes(), &LoadOptions::default()).unwrap();

        assert_eq!(result.delimiter, ',');
        assert_eq!(result.dataset.row_count(), 2);
        assert_eq!(result.headers, vec!["pregnant", "glucose"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_write_csv_roundtrips_missing_as_empty() {
        let ds = csv_to_dataset("a,b\n1,x\nNA,2.5", ',').unwrap();
        let mut out = Vec::new();
        write_csv(&ds, &mut out, ',').unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "a,b\n1,x\n,2.5\n");
    }
}
