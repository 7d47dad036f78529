use std::path::PathBuf;
use std::process::ExitCode;

use aws_config::meta::region::RegionProviderChain;
use aws_sdk_dynamodb::config::Region;
use clap::Parser;

use ddb_mover::runner::{run_load, LoadConfig};
use ddb_mover::store::Dynamo;

/// DynamoDB Loader: restore tables dumped by ddb-dumper with ease.
#[derive(Parser)]
#[command(name = "ddb-loader", version, about)]
struct Cli {
    /// The region to connect to.
    #[arg(short, long, default_value = "us-east-1")]
    region: String,

    /// The host url to connect to (for use with DynamoDB Local).
    #[arg(short = 's', long)]
    host: Option<String>,

    /// The dump files to load, as created by ddb-dumper.
    #[arg(short = 'l', long = "load-files", required = true, num_args = 1..)]
    load_files: Vec<PathBuf>,

    /// Number of workers running at once.
    #[arg(short = 'p', long, default_value_t = 4)]
    parallelism: usize,

    /// The name of the table to load into.
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

    let load = LoadConfig {
        table: cli.table_name,
        files: cli.load_files,
        workers: cli.parallelism,
    };

    match run_load(store, load).await {
        Ok(summary) => {
            log::info!("loaded {} items from {} files", summary.items, summary.files);
            println!("Done.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
