//! Single-line spinner for long-running network steps.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Start a spinner showing `msg`. Hidden when `quiet` is set.
pub(crate) fn spinner(msg: impl Into<String>, quiet: bool) -> ProgressBar {
    let pb = if quiet {
        ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
    } else {
        ProgressBar::new_spinner()
    };
    if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
        pb.set_style(style.tick_chars("/-\\|"));
    }
    pb.set_message(msg.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
