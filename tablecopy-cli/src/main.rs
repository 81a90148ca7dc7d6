//! Copies the full contents of one DynamoDB table into another.

use clap::Parser;
use tablecopy::clients::dynamodb::DynamoDbTableClient;
use tablecopy::pipeline::{CopyConfig, CopyPipeline, CopyStats};
use tablecopy_cli::{aws, init_tracing};
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "tablecopy",
    version,
    about = "Copy the full contents of one DynamoDB table into another",
    arg_required_else_help = true
)]
struct AppArgs {
    /// The source table to copy from
    #[arg(long, short = 's')]
    source_table: String,

    /// AWS region that hosts the source table (default: current region)
    #[arg(long)]
    source_table_region: Option<String>,

    /// ARN of an IAM role to assume for reading from the source table
    /// (default: ambient credentials)
    #[arg(long)]
    source_table_role_arn: Option<String>,

    /// The target table to copy to
    #[arg(long, short = 't')]
    target_table: String,

    /// AWS region that hosts the target table (default: current region)
    #[arg(long)]
    target_table_region: Option<String>,

    /// ARN of an IAM role to assume for writing to the target table
    /// (default: ambient credentials)
    #[arg(long)]
    target_table_role_arn: Option<String>,

    /// Number of items to copy per second
    #[arg(long, short = 'r')]
    rate: u32,

    /// Number of segments for the parallel scan
    #[arg(long, short = 'p', default_value_t = 20)]
    parallelism: u32,
}

#[tokio::main]
async fn main() {
    init_tracing("tablecopy=info");

    let args = AppArgs::parse();

    // The error is reported, but "Done" is printed either way; callers watch
    // stderr rather than the exit status.
    match run(args).await {
        Ok(stats) => {
            info!(
                items = stats.items_copied,
                batches = stats.batches_written,
                "copy finished"
            );
            println!("Done");
        }
        Err(err) => {
            eprintln!("{err:#}");
            println!("Done");
        }
    }
}

async fn run(args: AppArgs) -> anyhow::Result<CopyStats> {
    let source = DynamoDbTableClient::new(
        aws::dynamodb_client(args.source_table_region, args.source_table_role_arn).await,
    );
    let target = DynamoDbTableClient::new(
        aws::dynamodb_client(args.target_table_region, args.target_table_role_arn).await,
    );

    let config = CopyConfig {
        source_table: args.source_table,
        target_table: args.target_table,
        rate_per_second: args.rate,
        parallelism: args.parallelism,
    };

    let pipeline = CopyPipeline::new(config, source, target)?;
    Ok(pipeline.copy().await?)
}
