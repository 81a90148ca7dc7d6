//! Fills a DynamoDB table with generated items, for trying out the copy tool.

use std::pin::pin;

use clap::Parser;
use futures::{StreamExt, stream};
use rand::Rng;
use tablecopy::clients::dynamodb::DynamoDbTableClient;
use tablecopy::types::{AttributeValue, Item};
use tablecopy::writer::BatchWriter;
use tablecopy_cli::{aws, init_tracing};
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "fill-table",
    version,
    about = "Write generated items to a table at a bounded rate",
    arg_required_else_help = true
)]
struct AppArgs {
    /// The target table to write items to
    #[arg(long, short = 't')]
    target_table: String,

    /// Number of items to write per second
    #[arg(long, short = 'r')]
    rate: u32,

    /// Number of items to generate
    #[arg(long, short = 'n')]
    num_items: u64,

    /// The name of the partition key attribute of the given table
    #[arg(long, short = 'p')]
    partition_key: String,
}

#[tokio::main]
async fn main() {
    init_tracing("tablecopy=info,fill_table=info");

    let args = AppArgs::parse();

    match run(args).await {
        Ok(written) => {
            info!(items = written, "fill finished");
            println!("Done");
        }
        Err(err) => {
            eprintln!("{err:#}");
            println!("Done");
        }
    }
}

fn generated_item(partition_key: &str, index: u64) -> Item {
    let payload: u64 = rand::thread_rng().r#gen();

    Item::new()
        .with_attribute(partition_key, AttributeValue::string(index.to_string()))
        .with_attribute("payload", AttributeValue::number(payload.to_string()))
}

async fn run(args: AppArgs) -> anyhow::Result<u64> {
    let client = DynamoDbTableClient::new(aws::dynamodb_client(None, None).await);
    let writer = BatchWriter::new(client, args.target_table, args.rate)?;

    let partition_key = args.partition_key;
    let items =
        stream::iter((0..args.num_items).map(move |i| Ok(generated_item(&partition_key, i))));

    let mut accepted = pin!(writer.write_stream(items));

    let mut written = 0u64;
    while let Some(batch) = accepted.next().await {
        written += batch?.len() as u64;
    }

    Ok(written)
}
