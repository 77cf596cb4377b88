//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: indicatif bars, one per scroll, advanced once per page.
//! Non-TTY mode: hidden bars; logs are the only progress output.
//! Bars are observational — nothing in the pipeline branches on them.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Page-count bar, shown once the declared total is known.
fn pages_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<20.dim} {bar:30.green/dim} {pos:>6}/{len:6} pages {eta:>4} {wide_msg:.dim}")
        .expect("invalid template")
        .progress_chars("--")
}

/// Pending style — shown before the first page reports a total.
fn pending_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<20.dim} {pos:>6} pages {wide_msg:.dim}")
        .expect("invalid template")
}

/// Upgrade a scroll bar from pending to a page-count bar.
///
/// Called when the first page reports the declared total.
pub fn upgrade_to_pages(pb: &ProgressBar, total_pages: u64) {
    pb.set_length(total_pages);
    pb.set_style(pages_style());
}

/// Central progress context managing multi-progress bars.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        let is_tty = std::io::stderr().is_terminal();
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Per-scroll progress bar.
    ///
    /// TTY: visible bar in pending style until the declared total is known
    /// (see [`upgrade_to_pages`]). Non-TTY: hidden, every call a no-op.
    pub fn scroll_bar(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(pending_style());
        // Truncate long index names to keep bars aligned
        let display = if name.len() > 20 { &name[..20] } else { name };
        pb.set_prefix(display.to_string());
        pb
    }

    /// Spinner status line for a pipeline stage.
    ///
    /// Update with `pb.set_message(...)`; `pb.finish()` stops the spinner.
    pub fn stage_line(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {prefix:<10.cyan.bold} {wide_msg}")
                .expect("invalid template"),
        );
        pb.set_prefix(name.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Print a line above managed progress bars.
    ///
    /// Use this instead of `eprintln!` when bars are active.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Whether running in TTY mode.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for the log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
