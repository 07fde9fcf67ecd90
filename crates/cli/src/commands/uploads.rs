//! uploads command - Unfinished multipart uploads
//!
//! Lists uploads that were started but never completed or aborted, and can
//! abort them to release their stored parts.

use clap::Args;
use s3cm_core::PendingUpload;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};
use crate::shell::{ConnectionArgs, Shell};

/// List or abort unfinished multipart uploads
#[derive(Args, Debug)]
pub struct UploadsArgs {
    /// Bucket name
    pub bucket: String,

    /// Only uploads whose key starts with this prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Abort every listed upload
    #[arg(long)]
    pub abort: bool,
}

#[derive(Debug, Serialize)]
struct UploadsOutput {
    bucket: String,
    uploads: Vec<PendingUpload>,
    aborted: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed: Vec<String>,
}

/// Execute the uploads command
pub async fn execute(
    args: UploadsArgs,
    conn: &ConnectionArgs,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let shell = match Shell::with_bucket(conn, &args.bucket).await {
        Ok(shell) => shell,
        Err(e) => return formatter.fail(&e),
    };

    let uploads = match shell.transfers.pending_uploads(args.prefix.as_deref()).await {
        Ok(uploads) => uploads,
        Err(e) => return formatter.fail(&e),
    };

    let mut aborted = 0;
    let mut failed = Vec::new();
    let mut exit_code = ExitCode::Success;

    if args.abort {
        for upload in &uploads {
            match shell
                .transfers
                .abort_pending_upload(&upload.key, &upload.upload_id)
                .await
            {
                Ok(()) => aborted += 1,
                Err(e) => {
                    tracing::warn!(key = %upload.key, error = %e, "abort failed");
                    if !formatter.is_json() {
                        formatter.error(&format!("Failed to abort '{}': {e}", upload.key));
                    }
                    exit_code = ExitCode::from_error(&e);
                    failed.push(upload.key.clone());
                }
            }
        }
    }

    if formatter.is_json() {
        formatter.json(&UploadsOutput {
            bucket: args.bucket,
            uploads,
            aborted,
            failed,
        });
        return exit_code;
    }

    if uploads.is_empty() {
        formatter.println("No unfinished uploads");
        return exit_code;
    }

    let rows = uploads.iter().map(upload_row).collect();
    formatter.table(&["Key", "Upload ID", "Initiated"], rows);
    if args.abort {
        formatter.success(&format!("Aborted {aborted} of {} uploads", uploads.len()));
    }
    exit_code
}

fn upload_row(upload: &PendingUpload) -> Vec<String> {
    let initiated = upload
        .initiated
        .map(|d| d.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    vec![upload.key.clone(), upload.upload_id.clone(), initiated]
}
