//! get command - Download an object
//!
//! Data is written to `<dest>.part` and renamed on completion; the partial
//! file is removed if the download fails or is cancelled.

use std::path::{Path, PathBuf};

use clap::Args;
use s3cm_core::TransferOptions;

use super::{cancel_on_ctrl_c, report_transfer};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};
use crate::shell::{ConnectionArgs, Shell};

/// Download an object
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Source bucket
    pub bucket: String,

    /// Object key
    pub key: String,

    /// Destination file or directory (defaults to the key's last segment)
    pub dest: Option<PathBuf>,
}

/// Execute the get command
pub async fn execute(
    args: GetArgs,
    conn: &ConnectionArgs,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let Some(dest) = destination(&args.key, args.dest.as_deref()) else {
        formatter.error(&format!(
            "Cannot derive a file name from key '{}'; pass a destination",
            args.key
        ));
        return ExitCode::UsageError;
    };

    let shell = match Shell::with_bucket(conn, &args.bucket).await {
        Ok(shell) => shell,
        Err(e) => return formatter.fail(&e),
    };

    let progress = ProgressBar::new(formatter.config(), &args.key);
    let options = TransferOptions::default()
        .with_cancel(cancel_on_ctrl_c())
        .with_observer(progress.clone());

    let result = shell.transfers.download(&args.key, &dest, &options).await;
    report_transfer(&formatter, &progress, result)
}

/// Resolve the local path for `key`; a directory destination gets the key's file name
fn destination(key: &str, dest: Option<&Path>) -> Option<PathBuf> {
    let file_name = key.rsplit('/').next().filter(|name| !name.is_empty());
    match dest {
        Some(dir) if dir.is_dir() => file_name.map(|name| dir.join(name)),
        Some(path) => Some(path.to_path_buf()),
        None => file_name.map(PathBuf::from),
    }
}
