//! Progress bar for transfers
//!
//! Renders a [`TransferTask`]'s progress; plugs into the transfer engine as
//! its observer.

use s3cm_core::{TransferObserver, TransferStatus, TransferTask};

use super::OutputConfig;

const BAR_TEMPLATE: &str =
    "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})";

/// Progress bar wrapper
///
/// Handles progress display based on output configuration.
/// In quiet or JSON mode, progress is suppressed.
#[derive(Debug, Clone)]
pub struct ProgressBar {
    bar: Option<indicatif::ProgressBar>,
}

impl ProgressBar {
    /// Create a hidden-until-sized progress bar labelled with `message`
    pub fn new(config: &OutputConfig, message: &str) -> Self {
        let bar = if config.quiet || config.json || config.no_progress {
            None
        } else {
            let bar = indicatif::ProgressBar::new(0);
            if let Ok(style) = indicatif::ProgressStyle::default_bar().template(BAR_TEMPLATE) {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar.set_message(message.to_string());
            Some(bar)
        };

        Self { bar }
    }

    /// Finish and clear the progress bar
    pub fn finish_and_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    /// Check if progress bar is visible
    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }
}

impl TransferObserver for ProgressBar {
    fn on_update(&self, task: &TransferTask) {
        let Some(bar) = &self.bar else {
            return;
        };
        bar.set_length(task.total_bytes);
        bar.set_position(task.transferred_bytes);
        match task.status {
            TransferStatus::Completed | TransferStatus::Failed | TransferStatus::Cancelled => {
                bar.finish_and_clear();
            }
            TransferStatus::Pending | TransferStatus::InProgress => {}
        }
    }
}
