use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use record_store_core::{Record, Value};
use record_store_sqlite::{OnConflict, RecordStore, Row, StoreConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Output format for fetched rows.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Table,
}

#[derive(Debug, Parser)]
#[command(name = "record-store", version)]
#[command(about = "Store semi-structured JSON records in self-evolving SQLite tables")]
struct Cli {
    /// YAML store configuration (busy timeout, journal mode, default primary key).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add records from a JSON array or JSON Lines file.
    Add(AddArgs),
    /// Update selected fields of one record.
    Update(UpdateArgs),
    /// Print the number of rows in a table.
    Count(TargetArgs),
    /// Print a table's columns in order.
    Columns(TargetArgs),
    /// Print a table's rows.
    Fetch(FetchArgs),
    /// Check whether any row holds a value in a column.
    Exists(ExistsArgs),
    /// Delete one record by primary key.
    Delete(DeleteArgs),
}

#[derive(Debug, Args)]
struct TargetArgs {
    /// Path to the SQLite store file.
    #[arg(long)]
    db: PathBuf,
    /// Table name.
    #[arg(long)]
    table: String,
}

#[derive(Debug, Args)]
struct AddArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Input file with a JSON array of objects or one object per line (`-` for stdin).
    #[arg(long)]
    input: PathBuf,
    /// Primary key field (defaults to the configured key).
    #[arg(long)]
    primary_key: Option<String>,
    /// Overwrite existing rows instead of skipping them.
    #[arg(long)]
    overwrite: bool,
}

#[derive(Debug, Args)]
struct UpdateArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Primary key value of the row to update.
    #[arg(long)]
    id: String,
    /// JSON object with the fields to set.
    #[arg(long)]
    fields: String,
    /// Primary key field (defaults to the configured key).
    #[arg(long)]
    primary_key: Option<String>,
}

#[derive(Debug, Args)]
struct FetchArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Comma-separated columns to return (default: all).
    #[arg(long)]
    columns: Option<String>,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct ExistsArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Column to probe.
    #[arg(long)]
    column: String,
    /// JSON value to look for; text that is not valid JSON is taken as a string.
    #[arg(long)]
    value: String,
}

#[derive(Debug, Args)]
struct DeleteArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Primary key value of the row to delete.
    #[arg(long)]
    id: String,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = load_config(cli.config.as_ref()).and_then(|config| match cli.command {
        Command::Add(args) => run_add(args, config),
        Command::Update(args) => run_update(args, config),
        Command::Count(args) => run_count(args, config),
        Command::Columns(args) => run_columns(args, config),
        Command::Fetch(args) => run_fetch(args, config),
        Command::Exists(args) => run_exists(args, config),
        Command::Delete(args) => run_delete(args, config),
    });

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("record_store=debug,record_store_sqlite=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<StoreConfig, String> {
    match path {
        Some(path) => StoreConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display())),
        None => Ok(StoreConfig::default()),
    }
}

fn open_store(target: &TargetArgs, config: StoreConfig) -> RecordStore {
    debug!(db = %target.db.display(), table = %target.table, "opening store");
    RecordStore::with_config(&target.db, config)
}

fn run_add(args: AddArgs, config: StoreConfig) -> Result<(), String> {
    let text = read_input(&args.input)?;
    let records = parse_records(&text)?;
    let primary_key = args
        .primary_key
        .unwrap_or_else(|| config.primary_key.clone());
    let on_conflict = if args.overwrite {
        OnConflict::Overwrite
    } else {
        OnConflict::Ignore
    };

    let store = open_store(&args.target, config);
    let report = store
        .add_records(&args.target.table, &records, &primary_key, on_conflict)
        .map_err(|e| format!("Failed to add records to '{}': {e}", args.target.table))?;

    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| format!("Failed to serialize report: {e}"))?;
    println!("{json}");
    Ok(())
}

fn run_update(args: UpdateArgs, config: StoreConfig) -> Result<(), String> {
    let fields = parse_record(&args.fields)?;
    let primary_key = args
        .primary_key
        .unwrap_or_else(|| config.primary_key.clone());

    let store = open_store(&args.target, config);
    let changed = store
        .update_by_id(&args.target.table, &args.id, &fields, &primary_key)
        .map_err(|e| format!("Failed to update '{}': {e}", args.id))?;
    println!("{changed}");
    Ok(())
}

fn run_count(args: TargetArgs, config: StoreConfig) -> Result<(), String> {
    let count = open_store(&args, config)
        .count_rows(&args.table)
        .map_err(|e| format!("Failed to count rows: {e}"))?;
    println!("{count}");
    Ok(())
}

fn run_columns(args: TargetArgs, config: StoreConfig) -> Result<(), String> {
    let columns = open_store(&args, config)
        .list_columns(&args.table)
        .map_err(|e| format!("Failed to list columns: {e}"))?;
    for column in columns {
        println!("{column}");
    }
    Ok(())
}

fn run_fetch(args: FetchArgs, config: StoreConfig) -> Result<(), String> {
    let requested = parse_csv_list(args.columns);
    let projection: Vec<&str> = requested.iter().map(String::as_str).collect();
    let columns = (!projection.is_empty()).then_some(projection.as_slice());

    let rows = open_store(&args.target, config)
        .fetch_rows(&args.target.table, columns)
        .map_err(|e| format!("Failed to fetch rows: {e}"))?;

    match args.format {
        CliOutputFormat::Json => {
            let json = serde_json::Value::Array(rows.iter().map(Row::to_json).collect());
            let text = serde_json::to_string_pretty(&json)
                .map_err(|e| format!("Failed to serialize rows: {e}"))?;
            println!("{text}");
        }
        CliOutputFormat::Table => print!("{}", format_table(&rows)),
    }
    Ok(())
}

fn run_exists(args: ExistsArgs, config: StoreConfig) -> Result<(), String> {
    let value = parse_probe(&args.value);
    let found = open_store(&args.target, config)
        .exists_value(&args.target.table, &args.column, &value)
        .map_err(|e| format!("Failed to probe '{}': {e}", args.column))?;
    println!("{found}");
    Ok(())
}

fn run_delete(args: DeleteArgs, config: StoreConfig) -> Result<(), String> {
    let removed = open_store(&args.target, config)
        .delete_by_id(&args.target.table, &args.id)
        .map_err(|e| format!("Failed to delete '{}': {e}", args.id))?;
    println!("{removed}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_input(path: &Path) -> Result<String, String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| format!("Failed to read stdin: {e}"))?;
        return Ok(text);
    }
    fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {e}", path.display()))
}

/// Parses a JSON array of objects, or JSON Lines with one object per line.
fn parse_records(text: &str) -> Result<Vec<Record>, String> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        let items: Vec<serde_json::Value> =
            serde_json::from_str(trimmed).map_err(|e| format!("Invalid JSON array: {e}"))?;
        return items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                Record::try_from(item).map_err(|e| format!("Record {index}: {e}"))
            })
            .collect();
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            let item: serde_json::Value = serde_json::from_str(line)
                .map_err(|e| format!("Line {}: invalid JSON: {e}", index + 1))?;
            Record::try_from(item).map_err(|e| format!("Line {}: {e}", index + 1))
        })
        .collect()
}

fn parse_record(text: &str) -> Result<Record, String> {
    let item: serde_json::Value =
        serde_json::from_str(text).map_err(|e| format!("Invalid JSON fields: {e}"))?;
    Record::try_from(item).map_err(|e| format!("Invalid fields: {e}"))
}

fn parse_probe(text: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(text)
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(text))
}

fn parse_csv_list(raw: Option<String>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    })
    .unwrap_or_default()
}

fn render_line(values: &[&str], widths: &[usize]) -> String {
    values
        .iter()
        .zip(widths)
        .map(|(value, width)| format!("{value:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Renders rows as an aligned text table; `NULL` cells print as `NULL`.
fn format_table(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return "(0 rows)\n".to_string();
    };
    let headers = first.columns();
    let cells: Vec<Vec<&str>> = rows
        .iter()
        .map(|row| row.cells().iter().map(|c| c.as_deref().unwrap_or("NULL")).collect())
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let header_line: Vec<&str> = headers.iter().map(String::as_str).collect();
    let rule_line: Vec<&str> = rule.iter().map(String::as_str).collect();

    let mut out = String::new();
    for line in [&header_line, &rule_line].into_iter().chain(&cells) {
        out.push_str(&render_line(line, &widths));
        out.push('\n');
    }
    out.push_str(&format!("({} rows)\n", rows.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::{parse_csv_list, parse_probe, parse_records};
    use record_store_core::Value;

    #[test]
    fn test_parse_csv_list_trims_and_drops_empty() {
        let parsed = parse_csv_list(Some(" id, color, ,size ".to_string()));
        assert_eq!(parsed, vec!["id", "color", "size"]);
    }

    #[test]
    fn test_parse_records_array() {
        let records = parse_records(r#"  [{"id": "1"}, {"id": "2", "a": {"b": 1}}]"#).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[1].get("a").unwrap().as_record().is_some());
    }

    #[test]
    fn test_parse_records_json_lines() {
        let records = parse_records("{\"id\": \"1\"}\n\n{\"id\": \"2\"}\n").unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_parse_records_rejects_non_objects() {
        let err = parse_records("{\"id\": \"1\"}\n[1, 2]\n").unwrap_err();
        assert!(err.starts_with("Line 2"), "{err}");
    }

    #[test]
    fn test_parse_probe_falls_back_to_text() {
        assert_eq!(parse_probe("3"), Value::from(3));
        assert_eq!(parse_probe("\"red\""), Value::from("red"));
        assert_eq!(parse_probe("red"), Value::from("red"));
    }
}
