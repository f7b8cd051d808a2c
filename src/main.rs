//! Delimitext CLI - inspect and re-delimit flat text files
//!
//! ```bash
//! delimitext inspect data.csv                  # Column names and row count
//! delimitext inspect data.tsv -d $'\t' --json  # Same, as JSON
//! delimitext convert data.csv --to-delimiter '|' --to-qualifier '"' -o out.psv
//! ```

use clap::{Parser, Subcommand};
use delimitext::{
    DelimitedReader, DelimitedSerializer, ReaderOptions, SerializerOptions,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "delimitext")]
#[command(about = "Inspect and convert delimited text files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a file's columns and row count
    Inspect {
        /// Input file
        input: PathBuf,

        /// Column delimiter
        #[arg(short, long, default_value = ",")]
        delimiter: String,

        /// Text qualifier (none if not specified)
        #[arg(short, long)]
        qualifier: Option<String>,

        /// Treat the first line as data, not column names
        #[arg(long)]
        no_header: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rewrite a file with a different delimiter/qualifier convention
    Convert {
        /// Input file
        input: PathBuf,

        /// Input column delimiter
        #[arg(short, long, default_value = ",")]
        delimiter: String,

        /// Input text qualifier (none if not specified)
        #[arg(short, long)]
        qualifier: Option<String>,

        /// Treat the first line as data, not column names
        #[arg(long)]
        no_header: bool,

        /// Output column delimiter
        #[arg(long, default_value = ",")]
        to_delimiter: String,

        /// Output text qualifier (none if not specified)
        #[arg(long)]
        to_qualifier: Option<String>,

        /// Qualify output fields only when they contain the delimiter
        #[arg(long)]
        qualify_only_required: bool,

        /// Drop the header line from the output
        #[arg(long)]
        no_header_out: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect {
            input,
            delimiter,
            qualifier,
            no_header,
            json,
        } => cmd_inspect(&input, delimiter, qualifier, no_header, json),

        Commands::Convert {
            input,
            delimiter,
            qualifier,
            no_header,
            to_delimiter,
            to_qualifier,
            qualify_only_required,
            no_header_out,
            output,
        } => cmd_convert(
            &input,
            ReaderOptions {
                delimiter,
                qualifier,
                has_header_row: !no_header,
            },
            SerializerOptions {
                delimiter: to_delimiter,
                qualifier: to_qualifier,
                qualify_only_required,
            },
            no_header_out,
            output.as_deref(),
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_inspect(
    input: &Path,
    delimiter: String,
    qualifier: Option<String>,
    no_header: bool,
    as_json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = ReaderOptions {
        delimiter,
        qualifier,
        has_header_row: !no_header,
    };

    let mut reader = DelimitedReader::from_path(input, options)?;
    while reader.read()? {}

    if as_json {
        let summary = json!({
            "file": input.display().to_string(),
            "columns": reader.column_names(),
            "rows": reader.records_read(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("File:    {}", input.display());
        println!("Columns: {}", reader.column_names().join(", "));
        println!("Rows:    {}", reader.records_read());
    }

    Ok(())
}

fn cmd_convert(
    input: &Path,
    reader_options: ReaderOptions,
    serializer_options: SerializerOptions,
    no_header_out: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let has_header = reader_options.has_header_row;
    let mut reader = DelimitedReader::from_path(input, reader_options)?;
    let serializer = DelimitedSerializer::new(serializer_options)?;

    let mut lines = Vec::new();
    if has_header && !no_header_out {
        lines.push(serializer.raw_line(reader.column_names()));
    }
    while reader.read()? {
        lines.push(serializer.raw_line(reader.row()));
    }

    eprintln!("Converted {} rows", reader.records_read());
    write_output(&lines.join("\n"), output)?;

    Ok(())
}

fn write_output(content: &str, output: Option<&Path>) -> std::io::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, content)?;
            eprintln!("Saved to {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
