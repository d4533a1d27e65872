//! voc2tfrecord: Pascal VOC to TFRecord dataset conversion.
//!
//! Converts a directory of Pascal VOC XML annotation files plus their JPEG
//! images into one TFRecord file of `tensorflow.Example` messages, and
//! derives (or reuses) the label-map pbtxt file that downstream detection
//! trainers consume.
//!
//! # Modules
//!
//! - [`voc`]: Pascal VOC XML annotation reader
//! - [`label_map`]: class-name to id mapping with pbtxt persistence
//! - [`example`]: feature extraction into per-image example records
//! - [`tfrecord`]: `tensorflow.Example` wire types and record framing
//! - [`convert`]: the sequential four-stage pipeline
//! - [`error`]: error types for voc2tfrecord operations

pub mod bbox;
pub mod convert;
pub mod error;
pub mod example;
pub mod label_map;
pub mod report;
pub mod tfrecord;
pub mod voc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use error::ConvertError;

/// The voc2tfrecord CLI application.
#[derive(Parser)]
#[command(name = "voc2tfrecord")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Convert a Pascal VOC annotation directory into a TFRecord file.
    Convert(ConvertArgs),
    /// Summarize the records inside an existing TFRecord file.
    Inspect(InspectArgs),
}

/// Arguments for the convert subcommand.
#[derive(clap::Args)]
struct ConvertArgs {
    /// Directory containing the .xml annotation files.
    annotations_dir: PathBuf,

    /// Output TFRecord path.
    #[arg(short, long)]
    output: PathBuf,

    /// Label map pbtxt path (loaded if present and non-empty, else written).
    #[arg(long)]
    label_map: PathBuf,

    /// Directory containing the referenced images (defaults to the
    /// annotations directory).
    #[arg(long)]
    images_dir: Option<PathBuf>,

    /// Skip objects flagged difficult.
    #[arg(long)]
    ignore_difficult: bool,

    /// Fail if a pre-existing label map misses any observed class.
    #[arg(long)]
    check_label_map: bool,

    /// Report format on stdout ('text' or 'json').
    #[arg(long, default_value = "text")]
    report: String,
}

/// Arguments for the inspect subcommand.
#[derive(clap::Args)]
struct InspectArgs {
    /// TFRecord file to inspect.
    input: PathBuf,

    /// Print at most this many records (0 prints the summary only).
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

/// Run the voc2tfrecord CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), ConvertError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Convert(args)) => run_convert(args),
        Some(Commands::Inspect(args)) => run_inspect(args),
        None => {
            // No subcommand: print a version banner and exit successfully
            println!("voc2tfrecord {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Convert Pascal VOC detection datasets into TFRecord files.");
            println!();
            println!("Run 'voc2tfrecord --help' for usage information.");
            Ok(())
        }
    }
}

/// Execute the convert subcommand.
fn run_convert(args: ConvertArgs) -> Result<(), ConvertError> {
    let images_dir = args
        .images_dir
        .clone()
        .unwrap_or_else(|| args.annotations_dir.clone());

    let options = convert::ConvertOptions {
        annotations_dir: args.annotations_dir,
        images_dir,
        output_path: args.output,
        label_map_path: args.label_map,
        ignore_difficult_instances: args.ignore_difficult,
        check_label_map: args.check_label_map,
    };

    let report = convert::convert(&options)?;

    match args.report.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print!("{report}"),
    }

    Ok(())
}

/// Execute the inspect subcommand.
fn run_inspect(args: InspectArgs) -> Result<(), ConvertError> {
    let examples = tfrecord::read_tfrecord(&args.input)?;

    for (index, example) in examples.iter().take(args.limit).enumerate() {
        println!("{:>4}  {}", index, tfrecord::describe_example(example));
    }
    if examples.len() > args.limit {
        println!("      ... {} more record(s)", examples.len() - args.limit);
    }
    println!("{} record(s) in {}", examples.len(), args.input.display());

    Ok(())
}
