//! Per-file progress bars for the directory runs.

use indicatif::{ProgressBar, ProgressStyle};

/// A bar drawn with `style`, or a hidden one when there is no style (tests,
/// non-interactive runs).
pub fn file_bar(style: Option<&ProgressStyle>, msg: impl Into<String>) -> ProgressBar {
    match style {
        Some(style) => {
            let bar = ProgressBar::new(0);
            bar.set_style(style.clone());
            bar.set_message(msg.into());
            bar
        }
        None => ProgressBar::hidden(),
    }
}
