//! buckets command - List buckets
//!
//! Pages are fetched as the listing is consumed.

use clap::Args;
use futures::{StreamExt, TryStreamExt};
use s3cm_core::BucketRef;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};
use crate::shell::{ConnectionArgs, Shell};

/// List buckets
#[derive(Args, Debug)]
pub struct BucketsArgs {
    /// Stop after this many buckets
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct BucketsOutput {
    buckets: Vec<BucketRef>,
    total: usize,
}

/// Execute the buckets command
pub async fn execute(
    args: BucketsArgs,
    conn: &ConnectionArgs,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let shell = match Shell::connect(conn).await {
        Ok(shell) => shell,
        Err(e) => return formatter.fail(&e),
    };

    let stream = match shell.buckets.list_buckets() {
        Ok(stream) => stream,
        Err(e) => return formatter.fail(&e),
    };

    let collected = match args.limit {
        Some(limit) => stream.take(limit).try_collect::<Vec<_>>().await,
        None => stream.try_collect::<Vec<_>>().await,
    };
    let buckets = match collected {
        Ok(buckets) => buckets,
        Err(e) => return formatter.fail(&e),
    };

    if formatter.is_json() {
        formatter.json(&BucketsOutput {
            total: buckets.len(),
            buckets,
        });
    } else {
        for bucket in &buckets {
            formatter.println(&formatter.style_name(&bucket.name));
        }
        formatter.println(&format!("\nTotal: {} buckets", buckets.len()));
    }
    ExitCode::Success
}
