use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use serde_json::{Map, Value as Json};
use tracing_subscriber::EnvFilter;

use sas7bdat_reader::metadata::{Column, ColumnKind};
use sas7bdat_reader::{CharacterOutput, MissingValue, ReadOptions, SasReader, Value};

#[derive(Parser)]
#[command(name = "sas7rd", version, about = "Inspect and dump SAS7BDAT datasets")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print file properties and the column schema.
    Inspect(InspectArgs),
    /// Print the first rows as JSON lines.
    Head(HeadArgs),
}

#[derive(Parser)]
struct InspectArgs {
    input: PathBuf,
    /// Emit JSON instead of human readable output.
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct HeadArgs {
    input: PathBuf,

    /// Number of rows to print.
    #[arg(short = 'n', long = "rows", default_value_t = 10)]
    rows: u64,

    /// Project a subset of columns by name (comma-separated).
    #[arg(long = "columns", value_delimiter = ',')]
    columns: Option<Vec<String>>,

    /// Keep character cells as raw bytes.
    #[arg(long)]
    bytes: bool,

    /// Override the encoding announced by the file.
    #[arg(long)]
    encoding: Option<String>,

    /// Print date, datetime and time columns as raw numbers.
    #[arg(long)]
    raw_dates: bool,
}

type AnyError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Inspect(args) => run_inspect(&args),
        Command::Head(args) => run_head(&args),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    // RUST_LOG wins over the command-line level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},sas7bdat_reader={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run_inspect(args: &InspectArgs) -> Result<(), AnyError> {
    let reader = SasReader::open_path(&args.input)?;
    let properties = reader.properties();
    if args.json {
        #[derive(serde::Serialize)]
        struct InspectJson<'a> {
            properties: &'a sas7bdat_reader::FileProperties,
            columns: &'a [Column],
        }
        let payload = InspectJson {
            properties,
            columns: reader.columns(),
        };
        serde_json::to_writer_pretty(io::stdout(), &payload)?;
        println!();
        return Ok(());
    }

    println!(
        "Rows: {}  Columns: {}  Table: {}  Compression: {:?}",
        properties.row_count,
        properties.column_count,
        properties.dataset_name.as_deref().unwrap_or(""),
        properties.compression,
    );
    if let Some(label) = &properties.file_label {
        println!("Label: {label}");
    }
    for column in reader.columns() {
        let kind = match column.kind {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Character => "character",
        };
        println!(
            "[{idx:>3}] {name:<24}  {kind:<9}  width={w:<4}  fmt={fmt}",
            idx = column.id,
            name = column.name,
            w = column.length,
            fmt = column.format.name,
        );
    }
    Ok(())
}

fn run_head(args: &HeadArgs) -> Result<(), AnyError> {
    let mut options = ReadOptions::new().with_convert_dates(!args.raw_dates);
    if args.bytes {
        options = options.with_character_output(CharacterOutput::Bytes);
    }
    if let Some(label) = &args.encoding {
        options = options.with_encoding(label.clone());
    }
    if let Some(names) = &args.columns {
        options = options.with_column_names(names.iter().cloned());
    }

    let mut reader = SasReader::open_path_with_options(&args.input, &options)?;
    let names: Vec<String> = reader
        .output_columns()
        .iter()
        .map(|column| column.name.clone())
        .collect();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut printed = 0u64;
    while printed < args.rows {
        let Some(row) = reader.read_next()? else {
            break;
        };
        let object: Map<String, Json> = names
            .iter()
            .cloned()
            .zip(row.iter().map(value_to_json))
            .collect();
        serde_json::to_writer(&mut out, &object)?;
        out.write_all(b"\n")?;
        printed += 1;
    }
    out.flush()?;
    Ok(())
}

fn value_to_json(value: &Value<'_>) -> Json {
    match value {
        Value::Int16(v) => Json::from(*v),
        Value::Int64(v) => Json::from(*v),
        Value::Float(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
        Value::Str(text) => Json::String(text.to_string()),
        Value::Bytes(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
        Value::Date(date) => Json::String(date.to_string()),
        Value::DateTime(dt) => Json::String(dt.to_string()),
        Value::Time(duration) => Json::from(duration.as_seconds_f64()),
        Value::Missing(MissingValue::System) => Json::Null,
        Value::Missing(MissingValue::Tagged(tag)) => Json::String(format!(".{tag}")),
    }
}
