//! connect command - Open a session and show its parameters
//!
//! Useful to check a profile and credentials before running transfers.

use clap::Args;
use s3cm_core::SessionStatus;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};
use crate::shell::{ConnectionArgs, Shell};

/// Connect and show the session
#[derive(Args, Debug)]
pub struct ConnectArgs {}

/// Execute the connect command
pub async fn execute(
    _args: ConnectArgs,
    conn: &ConnectionArgs,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let shell = match Shell::connect(conn).await {
        Ok(shell) => shell,
        Err(e) => return formatter.fail(&e),
    };

    let Some(status) = shell.sessions.status() else {
        return formatter.fail(&s3cm_core::Error::NoActiveSession);
    };

    if formatter.is_json() {
        formatter.json(&status);
    } else {
        formatter.success(&format!("Connected to {}", status.provider));
        formatter.table(&["Setting", "Value"], status_rows(&status));
    }
    ExitCode::Success
}

fn status_rows(status: &SessionStatus) -> Vec<Vec<String>> {
    vec![
        vec!["Provider".into(), status.provider.to_string()],
        vec!["Endpoint".into(), status.endpoint.clone()],
        vec!["Region".into(), status.region.clone()],
        vec!["Addressing".into(), status.addressing_style.to_string()],
        vec!["Access key".into(), status.access_key.clone()],
        vec![
            "Connected at".into(),
            status.connected_at.strftime("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    ]
}
