//! Transfer progress with CI fallback

use super::context::UiContext;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::info;

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Byte-level progress for one download.
///
/// Draws an indicatif bar on stderr in interactive mode. In CI the bar is
/// hidden but still counts, and start/finish lines go through tracing.
/// Clones share the same counter, so a clone can be moved into a blocking
/// transfer thread.
#[derive(Clone)]
pub struct TransferProgress {
    bar: ProgressBar,
    label: String,
    interactive: bool,
}

impl TransferProgress {
    /// Create a progress indicator; `total` of 0 means unknown length
    pub fn new(ctx: &UiContext, label: &str, total: u64) -> Self {
        let interactive = ctx.use_fancy_output();
        let bar = if interactive {
            let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
            if let Ok(style) = ProgressStyle::default_bar().template(
                "  {spinner:.cyan} {prefix}  {bar:30.cyan/dim} {bytes}/{total_bytes} {bytes_per_sec:.dim}  {eta:.dim}",
            ) {
                bar.set_style(style.progress_chars("━╸─"));
            }
            bar.set_prefix(label.to_string());
            bar
        } else {
            info!(
                "Downloading {} ({})",
                label,
                if total > 0 {
                    format_bytes(total)
                } else {
                    "unknown size".to_string()
                }
            );
            let bar = ProgressBar::hidden();
            bar.set_length(total);
            bar
        };

        Self {
            bar,
            label: label.to_string(),
            interactive,
        }
    }

    /// Progress that never draws, for tests and nested transfers
    pub fn hidden(label: &str) -> Self {
        Self {
            bar: ProgressBar::hidden(),
            label: label.to_string(),
            interactive: false,
        }
    }

    /// Update the expected total once it is known
    pub fn set_total(&self, total: u64) {
        self.bar.set_length(total);
    }

    /// Record `n` newly written bytes
    pub fn add(&self, n: u64) {
        self.bar.inc(n);
    }

    /// Take back bytes written by an attempt that is being retried
    pub fn rewind(&self, n: u64) {
        let position = self.bar.position();
        self.bar.set_position(position.saturating_sub(n));
    }

    /// Bytes recorded so far
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Finish and clear the bar
    pub fn finish(&self) {
        if self.interactive {
            self.bar.finish_and_clear();
        }
        info!(
            "Downloaded {} ({})",
            self.label,
            format_bytes(self.bar.position())
        );
    }
}
