//! Writing rendered tables to disk.

use std::fs;
use std::path::Path;

use super::render::{render, Format};
use super::Table;
use crate::error::{ExportError, ExportResult};

/// Format implied by a path's extension.
pub fn format_for_path(path: &Path) -> ExportResult<Format> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ExportError::MissingExtension(path.to_path_buf()))?;
    Format::from_extension(ext)
}

/// Render `table` in the format implied by `path` and write it there.
///
/// Nothing is written when the format is not supported.
pub fn export(table: &Table, path: &Path) -> ExportResult<Format> {
    let format = format_for_path(path)?;
    let content = render(table, format)?;
    fs::write(path, content)?;
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{RowKind, TableRow};
    use tempfile::tempdir;

    fn table() -> Table {
        Table {
            caption: None,
            spanners: Vec::new(),
            headers: vec!["Characteristic".into(), "Overall, N = 3".into()],
            strata: Vec::new(),
            rows: vec![TableRow {
                label: "Age".into(),
                indent: 0,
                cells: vec!["40.0 (10.0)".into()],
                kind: RowKind::Continuous,
            }],
            footnotes: vec!["Mean (SD)".into()],
        }
    }

    #[test]
    fn test_export_by_extension() {
        let dir = tempdir().unwrap();

        let path = dir.path().join("table1.html");
        assert_eq!(export(&table(), &path).unwrap(), Format::Html);
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("<td>40.0 (10.0)</td>"));

        let path = dir.path().join("table1.MD");
        assert_eq!(export(&table(), &path).unwrap(), Format::Markdown);
    }

    #[test]
    fn test_office_formats_rejected() {
        let dir = tempdir().unwrap();
        for ext in ["docx", "xlsx", "pptx", "odt"] {
            let path = dir.path().join(format!("table1.{}", ext));
            assert!(matches!(
                export(&table(), &path),
                Err(ExportError::UnsupportedFormat(_))
            ));
            assert!(!path.exists());
        }
    }

    #[test]
    fn test_missing_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table1");
        assert!(matches!(
            export(&table(), &path),
            Err(ExportError::MissingExtension(_))
        ));
    }

    #[test]
    fn test_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("table1.csv");
        assert!(matches!(export(&table(), &path), Err(ExportError::Io(_))));
    }
}
