//! # Progress Display
//!
//! Barra di avanzamento da terminale alimentata dagli snapshot di un job.
//!
//! ## Responsabilità:
//! - Progress bar `indicatif` con file elaborati, byte e file corrente
//! - Spinner per le fasi senza totale (analisi, scrittura progetto)
//! - Riepilogo finale con errori e avvisi
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [████████████████░░░░░░░░] 40% 12/30 Processing · trim A001.mov
//! ```

use crate::file_manager::FileManager;
use crate::job::{ConsolidationProgress, ConsolidationStatus};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Bar resolution, the bar shows percent of files done
const BAR_STEPS: u64 = 100;

/// Terminal view of one consolidation job
pub struct ProgressManager {
    bar: ProgressBar,
    seen_errors: usize,
}

impl ProgressManager {
    pub fn new() -> Self {
        let bar = ProgressBar::new(BAR_STEPS);
        bar.set_style(Self::bar_style());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar, seen_errors: 0 }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    /// Spinner for work without a known total.
    pub fn spinner(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }

    /// Redraw from the latest snapshot.
    pub fn update(&mut self, progress: &ConsolidationProgress) {
        self.bar
            .set_position((progress.fraction() * BAR_STEPS as f64).round() as u64);

        for error in progress.errors.iter().skip(self.seen_errors) {
            self.bar
                .println(format!("❌ {}: {}", error.file_path, error.error_message));
        }
        self.seen_errors = progress.errors.len();

        let detail = match (&progress.current_operation, &progress.current_file) {
            (Some(op), Some(file)) => format!(" · {} {}", op, file),
            (Some(op), None) => format!(" · {}", op),
            (None, Some(file)) => format!(" · {}", file),
            (None, None) => String::new(),
        };
        self.bar.set_message(format!(
            "{}/{} {}{}",
            progress.files_processed, progress.files_total, progress.status, detail
        ));
    }

    /// Close the bar with the final summary line.
    pub fn finish(&self, progress: &ConsolidationProgress) {
        self.bar.finish_with_message(format_summary(progress));
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_summary(progress: &ConsolidationProgress) -> String {
    let icon = match progress.status {
        ConsolidationStatus::Completed => "✅",
        ConsolidationStatus::Cancelled => "⏹️",
        ConsolidationStatus::Failed => "❌",
        _ => "⏳",
    };
    format!(
        "{} {} | Files: {}/{} | Written: {} | Errors: {} | Warnings: {}",
        icon,
        progress.status,
        progress.files_processed,
        progress.files_total,
        FileManager::format_size(progress.bytes_processed),
        progress.errors.len(),
        progress.warnings.len()
    )
}
