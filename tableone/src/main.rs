//! tableone CLI - Descriptive summary tables from CSV files
//!
//! # Main Commands
//!
//! ```bash
//! tableone summarize data.csv --by diabetes --overall   # Build a table
//! tableone serve                                        # Start HTTP server (port 3000)
//! tableone theme list                                   # Manage stored themes
//! ```
//!
//! # Helper Commands
//!
//! ```bash
//! tableone derive data.csv --source age --target age_group \
//!     --boundaries=-inf,40,60,inf --labels "<40,40-60,>60"
//! tableone inspect data.csv        # Column types and missing values
//! tableone example-config          # Show example configuration
//! ```

use clap::{Parser, Subcommand};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tableone::{
    build_table, derive_categorical, example_config, export, parse_csv_file_auto, render,
    write_csv, Boundary, BucketSpec, Closed, FieldConfig, Format, LoadOptions, PercentMode,
    TableConfig, Theme, ThemeRegistry,
};

#[derive(Parser)]
#[command(name = "tableone")]
#[command(about = "Build descriptive summary tables (Table 1) from CSV files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a CSV file into a table
    Summarize {
        /// Input CSV file
        input: PathBuf,

        /// Table configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Grouping column
        #[arg(short, long)]
        by: Option<String>,

        /// Field to summarize (repeatable, replaces the config's fields)
        #[arg(short, long = "field")]
        fields: Vec<String>,

        /// Percentage denominator: column, row or cell
        #[arg(long, value_parser = parse_percent)]
        percent: Option<PercentMode>,

        /// Add an overall column
        #[arg(long)]
        overall: bool,

        /// Decimal places
        #[arg(long)]
        digits: Option<usize>,

        /// Table caption
        #[arg(long)]
        caption: Option<String>,

        /// Footnote (repeatable)
        #[arg(long = "footnote")]
        footnotes: Vec<String>,

        /// Stored theme ID
        #[arg(short, long)]
        theme: Option<String>,

        /// Output format for stdout: text, markdown, html, latex, rtf, csv, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Output file, format taken from the extension (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Add a categorical column bucketed from a numeric one
    Derive {
        /// Input CSV file
        input: PathBuf,

        /// Numeric source column
        #[arg(long)]
        source: String,

        /// Name of the new column
        #[arg(long)]
        target: String,

        /// Interval edges, comma separated ("-inf" and "inf" allowed)
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        boundaries: Vec<String>,

        /// One label per interval, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        labels: Vec<String>,

        /// Closed side of each interval: right or left
        #[arg(long, default_value = "right", value_parser = parse_closed)]
        closed: Closed,

        /// Also close the outermost finite edge
        #[arg(long)]
        include_lowest: bool,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show encoding, delimiter and column summary of a CSV file
    Inspect {
        /// Input CSV file
        input: PathBuf,
    },

    /// Show example table configuration
    ExampleConfig,

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage stored themes
    Theme {
        #[command(subcommand)]
        action: ThemeAction,
    },
}

#[derive(Subcommand)]
enum ThemeAction {
    /// List all stored themes
    List,

    /// Show a theme
    Show {
        /// Theme ID
        id: String,
    },

    /// Import a theme JSON file
    Import {
        /// Theme JSON file to import
        file: PathBuf,
        /// Name for the theme
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Delete a theme
    Delete {
        /// Theme ID
        id: String,
    },

    /// Print the built-in default theme
    Default,
}

fn parse_percent(s: &str) -> Result<PercentMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "column" => Ok(PercentMode::Column),
        "row" => Ok(PercentMode::Row),
        "cell" => Ok(PercentMode::Cell),
        other => Err(format!("unknown percent mode '{}' (column, row, cell)", other)),
    }
}

fn parse_closed(s: &str) -> Result<Closed, String> {
    match s.to_ascii_lowercase().as_str() {
        "right" => Ok(Closed::Right),
        "left" => Ok(Closed::Left),
        other => Err(format!("unknown interval side '{}' (right, left)", other)),
    }
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Summarize {
            input,
            config,
            by,
            fields,
            percent,
            overall,
            digits,
            caption,
            footnotes,
            theme,
            format,
            output,
        } => {
            let overrides = Overrides {
                by,
                fields,
                percent,
                overall,
                digits,
                caption,
                footnotes,
            };
            cmd_summarize(
                &input,
                config.as_deref(),
                overrides,
                theme.as_deref(),
                &format,
                output.as_deref(),
            )
        }

        Commands::Derive {
            input,
            source,
            target,
            boundaries,
            labels,
            closed,
            include_lowest,
            output,
        } => cmd_derive(
            &input,
            source,
            target,
            &boundaries,
            labels,
            closed,
            include_lowest,
            output.as_deref(),
        ),

        Commands::Inspect { input } => cmd_inspect(&input),

        Commands::ExampleConfig => cmd_example_config(),

        Commands::Serve { port } => cmd_serve(port).await,

        Commands::Theme { action } => cmd_theme(action),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Command-line options that take precedence over the config file
struct Overrides {
    by: Option<String>,
    fields: Vec<String>,
    percent: Option<PercentMode>,
    overall: bool,
    digits: Option<usize>,
    caption: Option<String>,
    footnotes: Vec<String>,
}

impl Overrides {
    fn apply(self, config: &mut TableConfig) {
        if self.by.is_some() {
            config.by = self.by;
        }
        if !self.fields.is_empty() {
            config.fields = self.fields.into_iter().map(FieldConfig::named).collect();
        }
        if self.percent.is_some() {
            config.percent = self.percent;
        }
        if self.overall {
            config.overall = Some(true);
        }
        if self.digits.is_some() {
            config.digits = self.digits;
        }
        if self.caption.is_some() {
            config.caption = self.caption;
        }
        config.footnotes.extend(self.footnotes);
    }
}

fn cmd_summarize(
    input: &Path,
    config_path: Option<&Path>,
    overrides: Overrides,
    theme_id: Option<&str>,
    format: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let mut config = match config_path {
        Some(path) => {
            eprintln!("   Config: {}", path.display());
            TableConfig::from_json(&fs::read_to_string(path)?)?
        }
        None => TableConfig::default(),
    };
    overrides.apply(&mut config);

    let theme = match theme_id {
        Some(id) => {
            let mut registry = ThemeRegistry::new();
            let theme = registry.touch(id)?;
            eprintln!("   Theme: {}", id);
            theme
        }
        None => Theme::default(),
    };

    // Parse the format before running so a typo fails fast.
    let format: Format = format.parse()?;

    let result = build_table(input, &config, &theme)?;

    match output {
        Some(path) => {
            let written = export(&result.table, path)?;
            eprintln!("💾 Table written to: {} ({})", path.display(), written);
        }
        None => {
            print!("{}", render(&result.table, format)?);
        }
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_derive(
    input: &Path,
    source: String,
    target: String,
    boundaries: &[String],
    labels: Vec<String>,
    closed: Closed,
    include_lowest: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🧮 Deriving '{}' from '{}' in {}", target, source, input.display());

    let boundaries = boundaries
        .iter()
        .map(|b| {
            b.parse::<Boundary>()
                .map_err(|e| format!("Invalid boundary '{}': {}", b, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let spec = BucketSpec {
        source,
        target,
        boundaries,
        labels,
        closed,
        include_lowest,
    };

    let parsed = parse_csv_file_auto(input, &LoadOptions::default())?;
    let dataset = derive_categorical(&parsed.dataset, &spec)?;

    if let Some(column) = dataset.column(&spec.target) {
        for level in column.distinct_levels() {
            let n = column
                .cells
                .iter()
                .filter(|c| c.level_key().as_deref() == Some(level.as_str()))
                .count();
            eprintln!("   {:<24} {:>6}", level, n);
        }
        eprintln!("   {:<24} {:>6}", "(missing)", column.missing_count());
    }

    match output {
        Some(path) => {
            write_csv(&dataset, fs::File::create(path)?, parsed.delimiter)?;
            eprintln!("💾 Output written to: {}", path.display());
        }
        None => write_csv(&dataset, io::stdout().lock(), parsed.delimiter)?,
    }
    Ok(())
}

fn cmd_inspect(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = parse_csv_file_auto(input, &LoadOptions::default())?;
    let dataset = &parsed.dataset;

    println!("📄 {}", input.display());
    println!("   Encoding:  {}", parsed.encoding);
    println!("   Delimiter: '{}'", tableone::transform::format_delimiter(parsed.delimiter));
    println!("   Rows:      {}", dataset.row_count());
    println!();

    let resolved = TableConfig::default().resolve(dataset, &Theme::default())?;
    println!("📋 Columns ({}):", dataset.columns().len());
    for (column, field) in dataset.columns().iter().zip(&resolved.summary.fields) {
        println!(
            "   {:<24} {:<8} {:<12} {:>4} levels  {:>4} missing",
            column.name,
            column.column_type().to_string(),
            format!("{:?}", field.kind).to_lowercase(),
            column.distinct_levels().len(),
            column.missing_count()
        );
    }
    Ok(())
}

fn cmd_example_config() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", example_config().to_json()?);
    Ok(())
}

async fn cmd_serve(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    tableone::server::start_server(port).await
}

fn cmd_theme(action: ThemeAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = ThemeRegistry::new();

    match action {
        ThemeAction::List => {
            let themes = registry.list();
            if themes.is_empty() {
                eprintln!("📋 No themes stored yet in {}.", registry.dir().display());
                eprintln!("   Use 'tableone theme import <file>' to add one.");
                return Ok(());
            }

            eprintln!("📋 Stored themes ({}):\n", themes.len());
            for t in themes {
                println!("  🎨 {} ({})", t.name, t.id);
                println!("     Digits: {}, percent: {:?}", t.theme.digits, t.theme.percent);
                println!("     Uses: {}", t.use_count);
                if let Some(ref last) = t.last_used {
                    println!("     Last used: {}", last);
                }
                println!();
            }
        }

        ThemeAction::Show { id } => {
            let t = registry.require(&id)?;
            println!("🎨 Theme: {} ({})\n", t.name, t.id);
            println!("Created: {}", t.created_at);
            println!("Uses: {}", t.use_count);
            println!("\n{}", serde_json::to_string_pretty(&t.theme)?);
        }

        ThemeAction::Import { file, name } => {
            eprintln!("📥 Importing theme from: {}", file.display());
            let id = registry.import(&file, name.as_deref())?;
            eprintln!("✅ Theme saved with ID: {}", id);
        }

        ThemeAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("🗑️  Theme deleted: {}", id);
        }

        ThemeAction::Default => {
            println!("{}", serde_json::to_string_pretty(&Theme::default())?);
        }
    }

    Ok(())
}
