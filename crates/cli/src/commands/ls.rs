//! ls command - List objects in a bucket
//!
//! Objects are listed flat (no delimiter), optionally filtered by key prefix.

use clap::Args;
use futures::TryStreamExt;
use s3cm_core::ObjectKey;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};
use crate::shell::{ConnectionArgs, Shell};

/// List objects in a bucket
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Bucket name
    pub bucket: String,

    /// Only list keys starting with this prefix
    pub prefix: Option<String>,

    /// Summarize output (show totals only)
    #[arg(long)]
    pub summarize: bool,
}

/// Output structure for ls command (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput {
    bucket: String,
    items: Vec<ObjectKey>,
    summary: Summary,
}

#[derive(Debug, Serialize)]
struct Summary {
    total_objects: usize,
    total_size_bytes: i64,
    total_size_human: String,
}

impl Summary {
    fn of(items: &[ObjectKey]) -> Self {
        let total_size_bytes: i64 = items.iter().map(|i| i.size_bytes).sum();
        Self {
            total_objects: items.len(),
            total_size_bytes,
            total_size_human: humansize::format_size(
                total_size_bytes.max(0) as u64,
                humansize::BINARY,
            ),
        }
    }
}

/// Execute the ls command
pub async fn execute(args: LsArgs, conn: &ConnectionArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let shell = match Shell::with_bucket(conn, &args.bucket).await {
        Ok(shell) => shell,
        Err(e) => return formatter.fail(&e),
    };

    let stream = match shell.transfers.list_objects(args.prefix.as_deref()) {
        Ok(stream) => stream,
        Err(e) => return formatter.fail(&e),
    };
    let items: Vec<ObjectKey> = match stream.try_collect().await {
        Ok(items) => items,
        Err(e) => return formatter.fail(&e),
    };

    let summary = Summary::of(&items);

    if formatter.is_json() {
        formatter.json(&LsOutput {
            bucket: args.bucket,
            items,
            summary,
        });
        return ExitCode::Success;
    }

    if !args.summarize {
        let rows = items.iter().map(object_row).collect();
        formatter.table(&["Key", "Size", "Last modified"], rows);
    }
    formatter.println(&format!(
        "Total: {} objects, {}",
        summary.total_objects, summary.total_size_human
    ));

    ExitCode::Success
}

fn object_row(item: &ObjectKey) -> Vec<String> {
    let date = item
        .last_modified
        .map(|d| d.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    vec![item.key.clone(), item.size_human(), date]
}
