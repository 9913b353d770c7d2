//! Log formatting and console output
//!
//! Console lines carry a dimmed time prefix plus colored, fixed-width tag and
//! level columns. Multi-line messages continue under the message column.
//! Every line is mirrored to the log file without ANSI codes.

use super::config::get_logger_config;
use super::file::write_to_file;
use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 10;
const LEVEL_WIDTH: usize = 8;

/// Format and output a log message
pub fn format_and_log(tag: &LogTag, level: LogLevel, message: &str) {
    let now = Local::now();
    let use_colors = get_logger_config().use_colors;

    let time = now.format("%H:%M:%S").to_string();
    let tag_label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    let level_label = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);

    let prefix = if use_colors {
        format!(
            "{} [{}] [{}] ",
            time.dimmed(),
            color_tag(tag, &tag_label),
            color_level(level, &level_label)
        )
    } else {
        format!("{} [{}] [{}] ", time, tag_label, level_label)
    };
    let indent = " ".repeat(time.len() + TAG_WIDTH + LEVEL_WIDTH + 7);

    let timestamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
    let tag_plain = tag.to_plain_string();

    for (index, line) in message.split('\n').enumerate() {
        if index == 0 {
            print_stdout_safe(&format!("{}{}", prefix, line));
        } else {
            print_stdout_safe(&format!("{}{}", indent, line));
        }
        write_to_file(&format!(
            "{} [{}] [{}] {}",
            timestamp,
            tag_plain,
            level.as_str(),
            line
        ));
    }
}

/// Color a tag label per subsystem
fn color_tag(tag: &LogTag, label: &str) -> ColoredString {
    match tag {
        LogTag::Channel => label.bright_cyan().bold(),
        LogTag::Updates => label.bright_green().bold(),
        LogTag::Telemetry => label.bright_magenta().bold(),
        LogTag::Api => label.bright_purple().bold(),
        LogTag::Config => label.bright_yellow().bold(),
        LogTag::System => label.bright_white().bold(),
        LogTag::Test => label.bright_blue().bold(),
        LogTag::Other(_) => label.white().bold(),
    }
}

fn color_level(level: LogLevel, label: &str) -> ColoredString {
    match level {
        LogLevel::Error => label.bright_red().bold(),
        LogLevel::Warning => label.bright_yellow().bold(),
        LogLevel::Info => label.white().bold(),
        LogLevel::Debug | LogLevel::Verbose => label.dimmed(),
    }
}

/// Print to stdout but ignore broken pipe errors
fn print_stdout_safe(message: &str) {
    let mut out = stdout().lock();
    if let Err(e) = writeln!(out, "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        let _ = writeln!(std::io::stderr(), "Logger stdout error: {}", e);
    }
    let _ = out.flush();
}
