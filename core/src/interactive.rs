use std::{io, time::Duration};

use dialoguer::{theme::ColorfulTheme, Confirm};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

/// Blocks on stdin; call through `spawn_blocking` from async code.
pub fn ask_confirm(prompt: &str) -> io::Result<bool> {
    Confirm::with_theme(&theme())
        .with_prompt(prompt)
        .default(false)
        .interact()
}

pub fn add_spinner(container: &MultiProgress, msg: String) -> ProgressBar {
    let style = ProgressStyle::default_spinner()
        .template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let bar = container.add(ProgressBar::new_spinner()).with_style(style);
    bar.set_message(msg);
    bar.enable_steady_tick(Duration::from_millis(50));
    bar
}
