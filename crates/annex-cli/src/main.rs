use std::path::PathBuf;

use annex_core::{IdRange, PopulateConfig, QueryRequest, SampleConfig, TrainConfig};
use annex_sqlite::SqliteStore;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod commands;
mod config;

use config::ParamArgs;

#[derive(Parser, Debug)]
#[command(name = "annex")]
#[command(about = "Approximate nearest-neighbor search through a trained dimensionality reduction")]
#[command(version)]
struct Args {
    /// SQLite database file
    #[arg(long, default_value = "annex.db", global = true)]
    db: PathBuf,

    /// Keep models in this directory instead of the database
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load records from JSON lines: {"id": "...", "vector": [..] | null}
    Load {
        #[arg(long)]
        input: PathBuf,

        /// Records per insert transaction
        #[arg(long, default_value = "1000")]
        batch_size: usize,
    },

    /// Sample the store, fit a model and save it as the current model
    Train {
        #[command(flatten)]
        params: ParamArgs,

        /// Upper bound on training samples
        #[arg(long, default_value = "100000")]
        sample_size: usize,

        /// Per-record sampling probability
        #[arg(long, default_value = "0.005")]
        probability: f64,
    },

    /// Embed every record that has no embedding yet
    Populate {
        /// Records per read/write round trip
        #[arg(long, default_value = "100")]
        batch_size: usize,

        /// Drop embeddings of another generation before populating
        #[arg(long)]
        reset: bool,

        /// Only ids after this one
        #[arg(long)]
        after: Option<String>,

        /// Only ids up to and including this one
        #[arg(long)]
        through: Option<String>,
    },

    /// Records whose embedding lies within a radius of a query vector
    Query {
        /// Query vector as [x, y, ...]
        #[arg(long, required_unless_present = "vector_file", conflicts_with = "vector_file")]
        vector: Option<String>,

        /// JSON file holding the query vector
        #[arg(long)]
        vector_file: Option<PathBuf>,

        /// Exclusive embedding-space distance bound
        #[arg(long, default_value = "0.25")]
        radius: f32,

        /// Maximum results
        #[arg(long, default_value = "25")]
        limit: usize,

        /// Reorder results by raw-vector distance
        #[arg(long)]
        rerank: bool,
    },

    /// Record counts and model generations
    Status,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries results; logs go to stderr
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!("annex {}", env!("CARGO_PKG_VERSION"));

    let mut store = SqliteStore::open(&args.db)?;
    let model_dir = args.model_dir.as_deref();

    match args.command {
        Command::Load { input, batch_size } => {
            let loaded = commands::load_file(&mut store, &input, batch_size)?;
            println!("loaded {}", loaded);
        }
        Command::Train {
            params,
            sample_size,
            probability,
        } => {
            let config = TrainConfig {
                sample: SampleConfig {
                    target_count: sample_size,
                    probability,
                },
                params: params.resolve()?,
            };
            let model = commands::train_model(&mut store, model_dir, &config)?;
            println!("generation {}", model.generation());
        }
        Command::Populate {
            batch_size,
            reset,
            after,
            through,
        } => {
            let config = PopulateConfig {
                batch_size,
                range: IdRange { after, through },
                ..Default::default()
            };
            let report = commands::populate_store(&mut store, model_dir, &config, reset)?;
            println!(
                "updated {} skipped {} batches {} retries {}",
                report.updated, report.skipped, report.batches, report.retries
            );
        }
        Command::Query {
            vector,
            vector_file,
            radius,
            limit,
            rerank,
        } => {
            let raw_vector = match (vector, vector_file) {
                (Some(text), _) => commands::parse_vector(&text)?,
                (None, Some(path)) => commands::read_vector(&path)?,
                (None, None) => return Err("one of --vector or --vector-file is required".into()),
            };
            let request = QueryRequest::new(raw_vector, radius, limit);
            for hit in commands::run_query(&store, model_dir, &request, rerank)? {
                println!("{}\t{}", hit.id, hit.distance);
            }
        }
        Command::Status => {
            let status = commands::status(&store, model_dir)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
