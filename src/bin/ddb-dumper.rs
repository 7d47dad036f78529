use std::path::PathBuf;
use std::process::ExitCode;

use aws_config::meta::region::RegionProviderChain;
use aws_sdk_dynamodb::config::Region;
use clap::Parser;

use ddb_mover::runner::{run_dump, DumpConfig};
use ddb_mover::store::Dynamo;

/// DynamoDB Dumper: dump tables to newline-delimited JSON files with ease.
#[derive(Parser)]
#[command(name = "ddb-dumper", version, about)]
struct Cli {
    /// The region to connect to.
    #[arg(short, long, default_value = "us-east-1")]
    region: String,

    /// The host url to connect to (for use with DynamoDB Local).
    #[arg(short = 's', long)]
    host: Option<String>,

    /// Total number of segments for the parallel scan (defaults to the
    /// worker count).
    #[arg(short, long)]
    total_segments: Option<i32>,

    /// Dump only the items under these hash keys instead of scanning the
    /// whole table. May be given more than once.
    #[arg(short = 'k', long = "hash-key")]
    hash_keys: Vec<String>,

    /// Number of workers running at once.
    #[arg(short = 'p', long, default_value_t = 4)]
    parallelism: usize,

    /// Compress output files with gzip.
    #[arg(short, long)]
    compress: bool,

    /// Fraction of the table's provisioned read capacity to consume,
    /// between 0.01 and 1.0.
    #[arg(long, default_value_t = 0.5)]
    capacity: f64,

    /// Directory to write dump files into.
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// The name of the table to dump.
    table_name: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let region = RegionProviderChain::first_try(Region::new(cli.region.clone()));
    let mut loader = aws_config::from_env().region(region);
    if let Some(host) = &cli.host {
        loader = loader.endpoint_url(host);
    }
    let config = loader.load().await;
    let store = Dynamo::new(aws_sdk_dynamodb::Client::new(&config));

    let dump = DumpConfig {
        table: cli.table_name,
        total_segments: cli.total_segments.unwrap_or(cli.parallelism as i32),
        hash_keys: cli.hash_keys,
        workers: cli.parallelism,
        compress: cli.compress,
        capacity_fraction: cli.capacity,
        output_dir: cli.out_dir,
    };

    match run_dump(store, dump).await {
        Ok(summary) => {
            log::info!(
                "dumped {} items into {} files",
                summary.items,
                summary.files.len()
            );
            println!("Done.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
