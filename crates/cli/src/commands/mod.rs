//! CLI command definitions and execution
//!
//! Each command connects once, runs one operation and maps the outcome to an
//! exit code.

use clap::{Parser, Subcommand};
use s3cm_core::{CancellationToken, Result, TransferDirection, TransferStatus, TransferTask};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};
use crate::shell::ConnectionArgs;

mod buckets;
pub mod completions;
mod connect;
mod get;
mod ls;
mod mb;
mod put;
mod rm;
mod uploads;

/// s3cm - multi-provider S3 client
///
/// Browse buckets and move files to and from AWS S3, ArvanCloud and other
/// S3-compatible storage.
#[derive(Parser, Debug)]
#[command(name = "s3cm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect and show the session
    Connect(connect::ConnectArgs),

    /// List buckets
    Buckets(buckets::BucketsArgs),

    /// Create a bucket
    Mb(mb::MbArgs),

    /// List objects in a bucket
    Ls(ls::LsArgs),

    /// Upload a local file
    Put(put::PutArgs),

    /// Download an object
    Get(get::GetArgs),

    /// Remove an object
    Rm(rm::RmArgs),

    /// List or abort unfinished multipart uploads
    Uploads(uploads::UploadsArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };
    let conn = &cli.connection;

    match cli.command {
        Commands::Connect(args) => connect::execute(args, conn, output_config).await,
        Commands::Buckets(args) => buckets::execute(args, conn, output_config).await,
        Commands::Mb(args) => mb::execute(args, conn, output_config).await,
        Commands::Ls(args) => ls::execute(args, conn, output_config).await,
        Commands::Put(args) => put::execute(args, conn, output_config).await,
        Commands::Get(args) => get::execute(args, conn, output_config).await,
        Commands::Rm(args) => rm::execute(args, conn, output_config).await,
        Commands::Uploads(args) => uploads::execute(args, conn, output_config).await,
        Commands::Completions(args) => completions::execute(args),
    }
}

/// Token cancelled on the first Ctrl+C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received, cancelling transfer");
            child.cancel();
        }
    });
    token
}

/// Report a finished upload or download
fn report_transfer(
    formatter: &Formatter,
    progress: &ProgressBar,
    result: Result<TransferTask>,
) -> ExitCode {
    progress.finish_and_clear();

    let task = match result {
        Ok(task) => task,
        Err(e) => return formatter.fail(&e),
    };

    if formatter.is_json() {
        formatter.json(&task);
    }

    match task.status {
        TransferStatus::Cancelled => {
            formatter.warning(&format!("Transfer of '{}' cancelled", task.remote_key));
            ExitCode::Interrupted
        }
        _ => {
            let size = humansize::format_size(task.total_bytes, humansize::BINARY);
            let (verb, from, to) = match task.direction {
                TransferDirection::Upload => (
                    "Uploaded",
                    task.local_path.display().to_string(),
                    format!("{}/{}", task.bucket.name, task.remote_key),
                ),
                TransferDirection::Download => (
                    "Downloaded",
                    format!("{}/{}", task.bucket.name, task.remote_key),
                    task.local_path.display().to_string(),
                ),
            };
            formatter.success(&format!(
                "{verb} {} -> {} ({size})",
                formatter.style_name(&from),
                formatter.style_name(&to)
            ));
            ExitCode::Success
        }
    }
}
