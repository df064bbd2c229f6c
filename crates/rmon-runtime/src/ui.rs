use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use rmon_core::severity::{Severity, Stream};

// ---------------------------------------------------------------------------
// Severity rendering
// ---------------------------------------------------------------------------

fn prefix(severity: Severity) -> String {
    match severity {
        Severity::Critical => "[rmon]".bold().red().to_string(),
        _ => "[rmon]".bold().cyan().to_string(),
    }
}

/// Render a message as it appears on the terminal.
pub fn render(severity: Severity, msg: &str) -> String {
    let body = match severity {
        Severity::Debug => format!("[DEBUG] {}", msg).blue().to_string(),
        Severity::Info => msg.to_string(),
        Severity::Success => msg.green().to_string(),
        Severity::Warning => msg.yellow().to_string(),
        Severity::Critical => msg.red().to_string(),
    };
    format!("{} {}", prefix(severity), body)
}

/// Print a message to the stream its severity routes to.
///
/// Debug messages go to the `tracing` subscriber instead of the terminal,
/// so they only show up when `RUST_LOG` asks for them.
pub fn emit(severity: Severity, msg: &str) {
    if severity == Severity::Debug {
        tracing::debug!("{}", msg);
        return;
    }
    let line = render(severity, msg);
    match severity.stream() {
        Stream::Stdout => println!("{}", line),
        Stream::Stderr => eprintln!("{}", line),
    }
}

/// Print an informational message: [rmon] message
pub fn info(msg: &str) {
    emit(Severity::Info, msg);
}

/// Print a success message: [rmon] message (in green)
pub fn success(msg: &str) {
    emit(Severity::Success, msg);
}

/// Print a warning message: [rmon] message (in yellow)
pub fn warn(msg: &str) {
    emit(Severity::Warning, msg);
}

/// Print an error message: [rmon] message (in red, on stderr)
pub fn error(msg: &str) {
    emit(Severity::Critical, msg);
}

/// Print a numbered step: [rmon] Step n/total: message
pub fn step(n: u32, total: u32, msg: &str) {
    println!(
        "\n{} {} {}",
        prefix(Severity::Info),
        format!("Step {}/{}:", n, total).bold().yellow(),
        msg,
    );
}

/// Render `items` as an indented bullet list.
pub fn bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("\n  - {}", i))
        .collect::<String>()
}

// ---------------------------------------------------------------------------
// Banner
// ---------------------------------------------------------------------------

/// Print a magenta bold banner box.
pub fn banner(lines: &[&str]) {
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    let rule = "=".repeat(width);

    println!();
    println!("{}", rule.bold().magenta());
    for line in lines {
        let pad = width - line.len() - 4;
        println!(
            "{}",
            format!("  {}{}  ", line, " ".repeat(pad)).bold().magenta()
        );
    }
    println!("{}", rule.bold().magenta());
    println!();
}

// ---------------------------------------------------------------------------
// Spinners
// ---------------------------------------------------------------------------

/// Create and start a spinner with the given message.
/// Call `.finish_and_clear()` when done.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.cyan} {msg}")
            .expect("invalid spinner template"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}
