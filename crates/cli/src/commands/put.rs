//! put command - Upload a local file
//!
//! Files at or above the provider's multipart threshold are sent in parts.
//! Ctrl+C cancels the transfer and aborts any unfinished multipart upload.

use std::path::{Path, PathBuf};

use clap::Args;
use s3cm_core::TransferOptions;

use super::{cancel_on_ctrl_c, report_transfer};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};
use crate::shell::{ConnectionArgs, Shell};

/// Upload a local file
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Target bucket
    pub bucket: String,

    /// Local file to upload
    pub file: PathBuf,

    /// Object key (defaults to the file name)
    pub key: Option<String>,

    /// Content type (guessed from the file extension when omitted)
    #[arg(long)]
    pub content_type: Option<String>,
}

/// Execute the put command
pub async fn execute(
    args: PutArgs,
    conn: &ConnectionArgs,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let Some(key) = args.key.clone().or_else(|| default_key(&args.file)) else {
        formatter.error(&format!(
            "Cannot derive an object key from '{}'; pass one explicitly",
            args.file.display()
        ));
        return ExitCode::UsageError;
    };

    let shell = match Shell::with_bucket(conn, &args.bucket).await {
        Ok(shell) => shell,
        Err(e) => return formatter.fail(&e),
    };

    let content_type = args
        .content_type
        .clone()
        .unwrap_or_else(|| guess_content_type(&args.file));
    let progress = ProgressBar::new(formatter.config(), &key);
    let options = TransferOptions::default()
        .with_cancel(cancel_on_ctrl_c())
        .with_observer(progress.clone())
        .with_content_type(content_type);

    let result = shell.transfers.upload(&args.file, &key, &options).await;
    report_transfer(&formatter, &progress, result)
}

fn default_key(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}

fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
