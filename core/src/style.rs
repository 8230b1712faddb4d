use std::fmt::Write as _;

use colored::{Color, ColoredString, Colorize};
use crossterm::terminal;

use crate::{
    controller::ConsoleView,
    execution::{classify_error_line, ExecutionOutcome, OutcomeKind},
    harness::{count_passed, TestResult},
};

pub fn is_truecolor_supported() -> bool {
    let Ok(v) = std::env::var("COLORTERM") else {
        return false
    };
    matches!(v.as_str(), "truecolor" | "24bit")
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for OutcomeKind {
    fn color(&self) -> Color {
        use OutcomeKind::*;
        match self {
            Log => Color::White,
            Result => Color::Green,
            Error => Color::BrightRed,
        }
    }
}

fn verdict_color(passed: bool) -> Color {
    match (passed, is_truecolor_supported()) {
        (true, false) => Color::Green,
        (false, false) => Color::Red,
        (true, true) => Color::TrueColor {
            r: 30,
            g: 180,
            b: 40,
        },
        (false, true) => Color::TrueColor {
            r: 220,
            g: 42,
            b: 42,
        },
    }
}

pub fn verdict_icon(passed: bool) -> ColoredString {
    let label = if passed { " PASS " } else { " FAIL " };
    label
        .on_color(verdict_color(passed))
        .bold()
        .color(Color::BrightWhite)
}

fn terminal_cols() -> usize {
    let (cols, _) = terminal::size().unwrap_or((60, 40));
    usize::from(cols).clamp(20, 120)
}

/// `mm:ss` countdown label.
pub fn format_remaining(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

pub fn render_raw_output(lines: &[ExecutionOutcome]) -> String {
    if lines.is_empty() {
        return format!("{}\n", "<NO OUTPUT>".magenta().dimmed());
    }
    let mut s = String::new();
    for line in lines {
        let rendered = match line.kind {
            OutcomeKind::Log => line.content.normal(),
            OutcomeKind::Result => format!("=> {}", line.content).color(line.kind.color()),
            OutcomeKind::Error => format!("[{}] {}", classify_error_line(&line.content), line.content)
                .color(line.kind.color())
                .bold(),
        };
        let _ = writeln!(s, "{}", rendered);
    }
    s
}

pub fn render_test_result_summary(results: &[TestResult]) -> String {
    let bar = "-".repeat(5);
    let num_total = results.len();
    let num_passed = count_passed(results);
    let num_failed = num_total - num_passed;

    let msg = if num_total == 0 {
        "No test cases".yellow()
    } else if num_passed == num_total {
        format!("All {} tests passed ✨", num_total).green()
    } else if num_passed > 0 {
        format!("{}/{} tests failed 💣", num_failed, num_total).bright_red()
    } else {
        format!("All {} tests failed 💀", num_total).bright_red()
    };
    format!("{} {} {}\n", bar, msg, bar)
}

pub fn render_test_result_detail(index: usize, res: &TestResult) -> String {
    let cols = terminal_cols();
    const BOLD_LINE: &str = "━";
    const THIN_LINE: &str = "─";
    let bold_bar = BOLD_LINE.repeat(cols).blue().bold();

    let title = if res.description.is_empty() {
        format!("Case #{}", index + 1)
    } else {
        format!("Case #{}: {}", index + 1, res.description)
    };

    let mut s = String::new();
    let _ = writeln!(
        s,
        "\n{} {}\n{}",
        title.color(Color::BrightYellow).bold(),
        verdict_icon(res.passed),
        bold_bar
    );

    let sub_title = |s: &mut String, name: &str| {
        let _ = writeln!(
            s,
            "{}{}",
            name.cyan().bold(),
            THIN_LINE.repeat(cols.saturating_sub(name.len() + 1)).bright_black()
        );
    };
    let body = |s: &mut String, text: &str| {
        if text.trim().is_empty() {
            let _ = writeln!(s, "{}", "<EMPTY>".magenta().dimmed());
        } else {
            let _ = writeln!(s, "{}", text.trim_end());
        }
    };

    sub_title(&mut s, "[input]");
    body(&mut s, &res.input);
    sub_title(&mut s, "[expected]");
    body(&mut s, &res.expected_output);
    sub_title(&mut s, "[actual]");
    body(&mut s, &res.actual_output);
    let _ = writeln!(s, "{}", bold_bar);
    s
}

/// Verdict line per case, then details (failed cases only unless `show_passed`),
/// then the summary.
pub fn render_breakdown(results: &[TestResult], show_passed: bool) -> String {
    let mut s = String::new();
    for (i, res) in results.iter().enumerate() {
        let _ = writeln!(
            s,
            "Case #{} ... {} {}",
            i + 1,
            verdict_icon(res.passed),
            res.description.dimmed()
        );
    }
    results
        .iter()
        .enumerate()
        .filter(|(_, r)| show_passed || !r.passed)
        .for_each(|(i, r)| s.push_str(&render_test_result_detail(i, r)));
    s.push_str(&render_test_result_summary(results));
    s
}

pub fn render_console(view: &ConsoleView, show_passed: bool) -> String {
    match view {
        ConsoleView::RawOutput(lines) => render_raw_output(lines),
        ConsoleView::Breakdown(results) => render_breakdown(results, show_passed),
    }
}

pub fn print_console(view: &ConsoleView, show_passed: bool) {
    print!("{}", render_console(view, show_passed));
}
