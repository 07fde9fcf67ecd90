//! mb command - Make bucket
//!
//! Creates a new bucket in the session's region. Names are checked against the
//! provider's naming rules before any request is sent.

use clap::Args;
use s3cm_core::Error;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};
use crate::shell::{ConnectionArgs, Shell};

/// Create a bucket
#[derive(Args, Debug)]
pub struct MbArgs {
    /// Bucket name
    pub name: String,

    /// Ignore error if bucket already exists
    #[arg(short = 'p', long)]
    pub ignore_existing: bool,
}

#[derive(Debug, Serialize)]
struct MbOutput {
    status: &'static str,
    bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Execute the mb command
pub async fn execute(args: MbArgs, conn: &ConnectionArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let shell = match Shell::connect(conn).await {
        Ok(shell) => shell,
        Err(e) => return formatter.fail(&e),
    };

    match shell.buckets.create_bucket(&args.name).await {
        Ok(bucket) => {
            if formatter.is_json() {
                formatter.json(&MbOutput {
                    status: "success",
                    bucket: bucket.name,
                    message: None,
                });
            } else {
                formatter.success(&format!(
                    "Bucket '{}' created successfully.",
                    formatter.style_name(&bucket.name)
                ));
            }
            ExitCode::Success
        }
        Err(Error::NameConflict(_)) if args.ignore_existing => {
            if formatter.is_json() {
                formatter.json(&MbOutput {
                    status: "success",
                    bucket: args.name,
                    message: Some("Bucket already exists".to_string()),
                });
            } else {
                formatter.success(&format!("Bucket '{}' already exists.", args.name));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}
