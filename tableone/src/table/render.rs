//! Rendering of an assembled [`Table`] into document formats.
//!
//! Every format is produced from the same [`Table`], so cell text is
//! identical across outputs; only layout and escaping differ.

use std::fmt::Write as _;
use std::str::FromStr;

use super::{RowKind, Table};
use crate::error::{ExportError, ExportResult};

/// Output format of a rendered table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Markdown,
    Html,
    Latex,
    Rtf,
    Csv,
    Json,
}

/// Office formats we recognize but cannot produce.
const UNSUPPORTED_EXTENSIONS: [&str; 4] = ["docx", "xlsx", "pptx", "odt"];

impl Format {
    pub const ALL: [Format; 7] = [
        Format::Text,
        Format::Markdown,
        Format::Html,
        Format::Latex,
        Format::Rtf,
        Format::Csv,
        Format::Json,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Markdown => "markdown",
            Format::Html => "html",
            Format::Latex => "latex",
            Format::Rtf => "rtf",
            Format::Csv => "csv",
            Format::Json => "json",
        }
    }

    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Text => "txt",
            Format::Markdown => "md",
            Format::Html => "html",
            Format::Latex => "tex",
            Format::Rtf => "rtf",
            Format::Csv => "csv",
            Format::Json => "json",
        }
    }

    /// Format for a file extension, case-insensitive.
    pub fn from_extension(ext: &str) -> ExportResult<Self> {
        let ext = ext.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Ok(Format::Text),
            "md" => Ok(Format::Markdown),
            "html" | "htm" => Ok(Format::Html),
            "tex" => Ok(Format::Latex),
            "rtf" => Ok(Format::Rtf),
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            e if UNSUPPORTED_EXTENSIONS.contains(&e) => {
                Err(ExportError::UnsupportedFormat(format!("{} (office documents are not produced)", e)))
            }
            e => Err(ExportError::UnsupportedFormat(e.to_string())),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Format::Text),
            "markdown" | "md" => Ok(Format::Markdown),
            "html" => Ok(Format::Html),
            "latex" | "tex" => Ok(Format::Latex),
            "rtf" => Ok(Format::Rtf),
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Render a table in the given format.
pub fn render(table: &Table, format: Format) -> ExportResult<String> {
    match format {
        Format::Text => Ok(render_text(table)),
        Format::Markdown => Ok(render_markdown(table)),
        Format::Html => Ok(render_html(table)),
        Format::Latex => Ok(render_latex(table)),
        Format::Rtf => Ok(render_rtf(table)),
        Format::Csv => render_csv(table),
        Format::Json => Ok(serde_json::to_string_pretty(table)?),
    }
}

/// Label column text with indentation expressed by `pad` per level.
fn indented(label: &str, indent: usize, pad: &str) -> String {
    format!("{}{}", pad.repeat(indent), label)
}

// =============================================================================
// Plain text
// =============================================================================

fn render_text(table: &Table) -> String {
    let lines: Vec<Vec<String>> = std::iter::once(table.headers.clone())
        .chain(table.rows.iter().map(|r| {
            std::iter::once(indented(&r.label, r.indent, "  "))
                .chain(r.cells.iter().cloned())
                .collect()
        }))
        .collect();

    let mut widths = vec![0; table.column_count()];
    for line in &lines {
        for (i, cell) in line.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }
    // Spanner labels must fit over the columns they cover.
    for s in &table.spanners {
        let covered: usize = widths[s.start..s.start + s.span].iter().sum::<usize>() + 3 * (s.span - 1);
        let needed = s.label.chars().count();
        if needed > covered {
            widths[s.start + s.span - 1] += needed - covered;
        }
    }
    let total: usize = widths.iter().sum::<usize>() + 3 * widths.len().saturating_sub(1);

    let mut out = String::new();
    if let Some(ref caption) = table.caption {
        out.push_str(caption);
        out.push('\n');
    }

    if !table.spanners.is_empty() {
        let mut line = String::new();
        let mut col = 0;
        while col < widths.len() {
            if col > 0 {
                line.push_str("   ");
            }
            match table.spanners.iter().find(|s| s.start == col) {
                Some(s) => {
                    let width = widths[col..col + s.span].iter().sum::<usize>() + 3 * (s.span - 1);
                    let _ = write!(line, "{:^width$}", s.label, width = width);
                    col += s.span;
                }
                None => {
                    line.push_str(&" ".repeat(widths[col]));
                    col += 1;
                }
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out.push_str(&"-".repeat(total));
    out.push('\n');
    for (n, line) in lines.iter().enumerate() {
        let mut text = String::new();
        for (i, cell) in line.iter().enumerate() {
            if i > 0 {
                text.push_str("   ");
            }
            let _ = write!(text, "{:<width$}", cell, width = widths[i]);
        }
        out.push_str(text.trim_end());
        out.push('\n');
        if n == 0 {
            out.push_str(&"-".repeat(total));
            out.push('\n');
        }
    }
    out.push_str(&"-".repeat(total));
    out.push('\n');

    for note in &table.footnotes {
        out.push_str(note);
        out.push('\n');
    }
    out
}

// =============================================================================
// Markdown
// =============================================================================

fn escape_markdown(s: &str) -> String {
    s.replace('\\', "\\\\").replace('|', "\\|")
}

fn render_markdown(table: &Table) -> String {
    let mut out = String::new();
    if let Some(ref caption) = table.caption {
        let _ = writeln!(out, "**{}**\n", escape_markdown(caption));
    }

    // Markdown has a single header row; spanners prefix the headers they cover.
    let headers: Vec<String> = table
        .headers
        .iter()
        .enumerate()
        .map(|(i, h)| match table.spanner_at(i) {
            Some(s) => format!("{}: {}", escape_markdown(&s.label), escape_markdown(h)),
            None => escape_markdown(h),
        })
        .collect();
    let _ = writeln!(out, "| {} |", headers.join(" | "));

    let align: Vec<&str> = (0..table.column_count())
        .map(|i| if i == 0 { ":---" } else { ":---:" })
        .collect();
    let _ = writeln!(out, "| {} |", align.join(" | "));

    for row in &table.rows {
        let label = match row.kind {
            RowKind::Categorical | RowKind::Continuous | RowKind::Dichotomous => {
                format!("**{}**", escape_markdown(&row.label))
            }
            _ => indented(&escape_markdown(&row.label), row.indent, "&nbsp;&nbsp;&nbsp;&nbsp;"),
        };
        let cells: Vec<String> = row.cells.iter().map(|c| escape_markdown(c)).collect();
        if cells.is_empty() {
            let _ = writeln!(out, "| {} |", label);
        } else {
            let _ = writeln!(out, "| {} | {} |", label, cells.join(" | "));
        }
    }

    if !table.footnotes.is_empty() {
        out.push('\n');
        for note in &table.footnotes {
            let _ = writeln!(out, "{}  ", escape_markdown(note));
        }
    }
    out
}

// =============================================================================
// HTML
// =============================================================================

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_html(table: &Table) -> String {
    let mut out = String::from("<table class=\"tableone\">\n");
    if let Some(ref caption) = table.caption {
        let _ = writeln!(out, "  <caption>{}</caption>", escape_html(caption));
    }

    out.push_str("  <thead>\n");
    if !table.spanners.is_empty() {
        out.push_str("    <tr>");
        let mut col = 0;
        while col < table.column_count() {
            match table.spanners.iter().find(|s| s.start == col) {
                Some(s) => {
                    let _ = write!(
                        out,
                        "<th colspan=\"{}\" class=\"spanner\">{}</th>",
                        s.span,
                        escape_html(&s.label)
                    );
                    col += s.span;
                }
                None => {
                    out.push_str("<th></th>");
                    col += 1;
                }
            }
        }
        out.push_str("</tr>\n");
    }
    out.push_str("    <tr>");
    for h in &table.headers {
        let _ = write!(out, "<th>{}</th>", escape_html(h));
    }
    out.push_str("</tr>\n  </thead>\n  <tbody>\n");

    for row in &table.rows {
        let _ = write!(
            out,
            "    <tr class=\"{}\"><td style=\"padding-left: {}em\">{}</td>",
            row_class(row.kind),
            row.indent * 2,
            escape_html(&row.label)
        );
        for cell in &row.cells {
            let _ = write!(out, "<td>{}</td>", escape_html(cell));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("  </tbody>\n");

    if !table.footnotes.is_empty() {
        out.push_str("  <tfoot>\n");
        for note in &table.footnotes {
            let _ = writeln!(
                out,
                "    <tr><td colspan=\"{}\">{}</td></tr>",
                table.column_count(),
                escape_html(note)
            );
        }
        out.push_str("  </tfoot>\n");
    }
    out.push_str("</table>\n");
    out
}

fn row_class(kind: RowKind) -> &'static str {
    match kind {
        RowKind::Continuous => "continuous",
        RowKind::Categorical => "categorical",
        RowKind::Level => "level",
        RowKind::Dichotomous => "dichotomous",
        RowKind::Unknown => "unknown",
    }
}

// =============================================================================
// LaTeX (booktabs)
// =============================================================================

fn escape_latex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

fn render_latex(table: &Table) -> String {
    let cols = table.column_count();
    let mut out = String::from("\\begin{table}[ht]\n\\centering\n");
    if let Some(ref caption) = table.caption {
        let _ = writeln!(out, "\\caption{{{}}}", escape_latex(caption));
    }
    let _ = writeln!(out, "\\begin{{tabular}}{{l{}}}", "c".repeat(cols.saturating_sub(1)));
    out.push_str("\\toprule\n");

    if !table.spanners.is_empty() {
        let mut cells = Vec::new();
        let mut col = 0;
        while col < cols {
            match table.spanners.iter().find(|s| s.start == col) {
                Some(s) => {
                    cells.push(format!("\\multicolumn{{{}}}{{c}}{{{}}}", s.span, escape_latex(&s.label)));
                    col += s.span;
                }
                None => {
                    cells.push(String::new());
                    col += 1;
                }
            }
        }
        let _ = writeln!(out, "{} \\\\", cells.join(" & "));
        for s in &table.spanners {
            let _ = writeln!(out, "\\cmidrule(lr){{{}-{}}}", s.start + 1, s.start + s.span);
        }
    }

    let headers: Vec<String> = table.headers.iter().map(|h| escape_latex(h)).collect();
    let _ = writeln!(out, "{} \\\\", headers.join(" & "));
    out.push_str("\\midrule\n");

    for row in &table.rows {
        let mut cells = vec![indented(&escape_latex(&row.label), row.indent, "\\quad ")];
        cells.extend(row.cells.iter().map(|c| escape_latex(c)));
        let _ = writeln!(out, "{} \\\\", cells.join(" & "));
    }
    out.push_str("\\bottomrule\n");
    for note in &table.footnotes {
        let _ = writeln!(
            out,
            "\\multicolumn{{{}}}{{l}}{{\\footnotesize {}}} \\\\",
            cols,
            escape_latex(note)
        );
    }
    out.push_str("\\end{tabular}\n\\end{table}\n");
    out
}

// =============================================================================
// RTF
// =============================================================================

fn escape_rtf(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() => out.push(c),
            c => {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf) {
                    let _ = write!(out, "\\u{}?", *unit as i16);
                }
            }
        }
    }
    out
}

/// Column width in twips.
const RTF_LABEL_WIDTH: usize = 3600;
const RTF_CELL_WIDTH: usize = 2000;

fn rtf_row(out: &mut String, cells: &[String], bold: bool) {
    out.push_str("\\trowd\\trgaph108");
    let mut edge = 0;
    for i in 0..cells.len() {
        edge += if i == 0 { RTF_LABEL_WIDTH } else { RTF_CELL_WIDTH };
        let _ = write!(out, "\\cellx{}", edge);
    }
    out.push('\n');
    for (i, cell) in cells.iter().enumerate() {
        let align = if i == 0 { "\\ql" } else { "\\qc" };
        if bold {
            let _ = write!(out, "\\pard\\intbl{} {{\\b {}}}\\cell", align, cell);
        } else {
            let _ = write!(out, "\\pard\\intbl{} {}\\cell", align, cell);
        }
    }
    out.push_str("\\row\n");
}

fn render_rtf(table: &Table) -> String {
    let mut out = String::from("{\\rtf1\\ansi\\deff0{\\fonttbl{\\f0 Times New Roman;}}\\fs20\n");
    if let Some(ref caption) = table.caption {
        let _ = writeln!(out, "\\pard\\qc{{\\b {}}}\\par", escape_rtf(caption));
    }

    if !table.spanners.is_empty() {
        let cells: Vec<String> = (0..table.column_count())
            .map(|i| match table.spanners.iter().find(|s| s.start == i) {
                Some(s) => escape_rtf(&s.label),
                None => String::new(),
            })
            .collect();
        rtf_row(&mut out, &cells, true);
    }
    let headers: Vec<String> = table.headers.iter().map(|h| escape_rtf(h)).collect();
    rtf_row(&mut out, &headers, true);

    for row in &table.rows {
        let mut cells = vec![indented(&escape_rtf(&row.label), row.indent, "    ")];
        cells.extend(row.cells.iter().map(|c| escape_rtf(c)));
        rtf_row(&mut out, &cells, false);
    }

    for note in &table.footnotes {
        let _ = writeln!(out, "\\pard\\ql{{\\fs16 {}}}\\par", escape_rtf(note));
    }
    out.push('}');
    out.push('\n');
    out
}

// =============================================================================
// CSV
// =============================================================================

fn render_csv(table: &Table) -> ExportResult<String> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
    let csv_err = |e: csv::Error| ExportError::Csv(e.to_string());

    if let Some(ref caption) = table.caption {
        writer.write_record([caption.as_str()]).map_err(csv_err)?;
    }
    if !table.spanners.is_empty() {
        let record: Vec<&str> = (0..table.column_count())
            .map(|i| match table.spanners.iter().find(|s| s.start == i) {
                Some(s) => s.label.as_str(),
                None => "",
            })
            .collect();
        writer.write_record(&record).map_err(csv_err)?;
    }
    writer.write_record(&table.headers).map_err(csv_err)?;
    for row in &table.rows {
        let mut record = vec![indented(&row.label, row.indent, "  ")];
        record.extend(row.cells.iter().cloned());
        writer.write_record(&record).map_err(csv_err)?;
    }
    for note in &table.footnotes {
        writer.write_record([note.as_str()]).map_err(csv_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Csv(e.to_string()))
}
