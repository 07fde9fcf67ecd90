//! rm command - Remove an object
//!
//! Fails with "not found" when the key does not exist.

use clap::Args;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};
use crate::shell::{ConnectionArgs, Shell};

/// Remove an object
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Bucket name
    pub bucket: String,

    /// Object key
    pub key: String,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    bucket: String,
    deleted: String,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, conn: &ConnectionArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let shell = match Shell::with_bucket(conn, &args.bucket).await {
        Ok(shell) => shell,
        Err(e) => return formatter.fail(&e),
    };

    if let Err(e) = shell.transfers.delete(&args.key).await {
        return formatter.fail(&e);
    }

    if formatter.is_json() {
        formatter.json(&RmOutput {
            status: "success",
            bucket: args.bucket,
            deleted: args.key,
        });
    } else {
        formatter.success(&format!(
            "Removed '{}/{}'",
            args.bucket,
            formatter.style_name(&args.key)
        ));
    }
    ExitCode::Success
}
