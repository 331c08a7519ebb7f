use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(80);

/// Yellow braille spinner shown while a step is running.
fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[33m{spinner}\x1b[0m {wide_msg}")
        .unwrap()
        .tick_strings(&["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"])
}

fn ok_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[32m✔\x1b[0m {wide_msg}").unwrap()
}

fn err_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[31m✘\x1b[0m {wide_msg}").unwrap()
}

/// Start a spinner line, attached to `mp` when given.
pub fn start(mp: Option<&MultiProgress>, msg: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let pb = match mp {
        Some(mp) => mp.add(pb),
        None => pb,
    };
    pb.set_style(spinner_style());
    pb.set_message(msg);
    pb.enable_steady_tick(TICK);
    pb
}

pub fn finish_ok(pb: &ProgressBar, msg: String) {
    pb.set_style(ok_style());
    pb.finish_with_message(msg);
}

pub fn finish_err(pb: &ProgressBar, msg: String) {
    pb.set_style(err_style());
    pb.finish_with_message(msg);
}
