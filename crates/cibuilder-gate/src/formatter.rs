//! Human readable rendering of gate results.

use std::collections::BTreeMap;

use colored::{ColoredString, Colorize};

use crate::diagnostic::{FileMessages, MessageCategory, MessageInfo};
use crate::results::ProjectResults;
use crate::status::{ExitCode, ProjectStatus};

const MAX_MESSAGE_WIDTH: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

fn align(msg: &str, alignment: Align, size: usize) -> String {
    let pad = " ".repeat(size.saturating_sub(msg.chars().count()));
    match alignment {
        Align::Left => format!("{msg}{pad}"),
        Align::Right => format!("{pad}{msg}"),
    }
}

/// Split `msg` on spaces into lines of at most `size` characters. Words
/// longer than `size` get a line of their own.
fn break_msg(msg: &str, size: usize) -> Vec<String> {
    let mut result = Vec::new();
    let mut line: Vec<&str> = Vec::new();
    let mut length = 0;
    for word in msg.split(' ') {
        let len = word.chars().count();
        if length + len <= size || line.is_empty() {
            line.push(word);
            length += len + 1;
        } else {
            result.push(line.join(" "));
            line = vec![word];
            length = len + 1;
        }
    }
    result.push(line.join(" ").trim().to_string());
    result
}

fn paint(category: MessageCategory, text: &str) -> ColoredString {
    match category {
        MessageCategory::Error => text.red(),
        MessageCategory::Warning => text.yellow(),
        MessageCategory::Info => text.blue(),
        MessageCategory::Log => text.cyan(),
        MessageCategory::Debug => text.bright_black(),
    }
}

struct Row {
    category: MessageCategory,
    line: String,
    character: String,
    message: String,
    code: String,
}

fn column_width<'a>(values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(|v| v.chars().count().min(MAX_MESSAGE_WIDTH))
        .max()
        .unwrap_or(0)
}

fn format_rows(buf: &mut String, rows: &[Row]) {
    let line_w = column_width(rows.iter().map(|r| r.line.as_str()));
    let char_w = column_width(rows.iter().map(|r| r.character.as_str()));
    let msg_w = column_width(rows.iter().map(|r| r.message.as_str()));

    for row in rows {
        let main = break_msg(&row.message, msg_w);
        buf.push_str("  ");
        buf.push_str(&paint(row.category, &align(&row.line, Align::Right, line_w)).to_string());
        buf.push(':');
        buf.push_str(&paint(row.category, &align(&row.character, Align::Left, char_w)).to_string());
        buf.push_str("  ");
        let first = align(&main[0], Align::Left, msg_w);
        if main.len() > 1 {
            buf.push_str(&first);
        } else {
            buf.push_str(&first.underline().to_string());
        }
        buf.push_str("  ");
        buf.push_str(&paint(row.category, &row.code).dimmed().to_string());
        buf.push('\n');

        let indent = " ".repeat(5 + line_w + char_w);
        for (index, rest) in main.iter().enumerate().skip(1) {
            let text = align(rest, Align::Left, msg_w);
            if index == main.len() - 1 {
                buf.push_str(&format!("{indent}{}\n", text.underline()));
            } else {
                buf.push_str(&format!("{indent}{text}\n"));
            }
        }
    }
}

/// Every diagnostic, grouped by file.
pub fn format_results(results: &BTreeMap<String, FileMessages>) -> String {
    let mut buf = String::new();
    for (file_name, file) in results {
        let n = file.messages.len();
        if n == 0 {
            continue;
        }
        let word = if n == 1 { "MESSAGE" } else { "MESSAGES" };
        buf.push_str(&format!(
            "\n{} in {}:\n\n",
            format!("{n} {word}").magenta(),
            file_name.underline().magenta()
        ));
        let rows: Vec<Row> = file
            .messages
            .iter()
            .map(|m| Row {
                category: m.category,
                line: m.line.to_string(),
                character: m.character.to_string(),
                message: m.message.clone(),
                code: m.code.clone(),
            })
            .collect();
        format_rows(&mut buf, &rows);
    }
    buf
}

/// Condensed output: per code, the first `list_limit` files and the
/// positions in each.
pub fn format_ci_results(by_message: &BTreeMap<String, MessageInfo>, list_limit: usize) -> String {
    let mut buf = String::new();
    for (code, info) in by_message {
        if info.count == 0 {
            continue;
        }
        buf.push_str(&format!("\n{}:\n\n", format!("{} {code}", info.count).magenta()));

        let mut files: Vec<&str> = Vec::new();
        for r in &info.references {
            if !files.contains(&r.file_info.abs_path.as_str()) {
                files.push(&r.file_info.abs_path);
            }
        }
        for path in files.iter().take(list_limit) {
            let locations: Vec<String> = info
                .references
                .iter()
                .filter(|r| r.file_info.abs_path == *path)
                .map(|r| format!("{}:{}", r.message.line.to_string().red(), r.message.character))
                .collect();
            buf.push_str(&format!("  - {path}\n"));
            buf.push_str(&format!("    {}\n", locations.join(", ")));
        }
        if files.len() > list_limit {
            buf.push_str("    ...\n");
        }
    }
    buf
}

struct StatLine<'a> {
    failed: bool,
    code: &'a str,
    found: usize,
    /// `None` for codes that are not allow-listed.
    allowed: Option<usize>,
}

fn format_stats(buf: &mut String, stats: &[StatLine<'_>]) {
    let size = stats.iter().map(|s| s.code.chars().count()).max().unwrap_or(0);
    for s in stats {
        let warn = s.allowed.is_some_and(|allowed| s.found < allowed);
        let name = align(s.code, Align::Left, size);
        buf.push_str("  ");
        if warn {
            buf.push_str(&"✗".yellow().to_string());
        } else if s.failed {
            buf.push_str(&"✗".red().to_string());
        } else {
            buf.push_str(&"✓".green().to_string());
        }
        buf.push(' ');
        if s.failed {
            buf.push_str(&name.red().to_string());
        } else if warn {
            buf.push_str(&name.yellow().to_string());
        } else {
            buf.push_str(&name.green().to_string());
        }
        buf.push(' ');
        match s.allowed {
            _ if s.failed => {
                let allowed = s
                    .allowed
                    .map(|a| format!(", {} allowed", a.to_string().yellow()))
                    .unwrap_or_default();
                buf.push_str(&format!("{} found{allowed}\n", s.found.to_string().red()));
            }
            Some(allowed) if warn => buf.push_str(&format!(
                "{} found, {} allowed\n",
                s.found.to_string().green(),
                allowed.to_string().yellow()
            )),
            allowed => buf.push_str(
                &format!("{} found, {} allowed\n", s.found, allowed.unwrap_or(0))
                    .bright_black()
                    .to_string(),
            ),
        }
    }
}

/// Full report printed when the verdict is not OK: diagnostics (condensed in
/// CI mode once there are `ci_limit` of them) followed by per-code stats.
pub fn format_project_results(
    status: &ProjectStatus,
    results: &ProjectResults,
    ci: bool,
    ci_limit: usize,
    ci_files_per_message: usize,
) -> String {
    let all_messages = if !ci || results.num_messages < ci_limit {
        format_results(&results.results)
    } else {
        format_ci_results(&results.by_message, ci_files_per_message)
    };

    let mut codes: Vec<&str> = results
        .by_message
        .keys()
        .chain(status.exceptions.keys())
        .map(String::as_str)
        .collect();
    codes.sort_unstable();
    codes.dedup();

    let stats: Vec<StatLine<'_>> = codes
        .into_iter()
        .map(|code| match status.exceptions.get(code) {
            Some(e) => StatLine {
                failed: e.failed,
                code,
                found: e.found,
                allowed: Some(e.allowed),
            },
            None => StatLine {
                failed: true,
                code,
                found: results.by_message.get(code).map_or(0, |m| m.count),
                allowed: None,
            },
        })
        .collect();

    let mut buf = String::new();
    format_stats(&mut buf, &stats);
    let exceptions = if stats.is_empty() {
        String::new()
    } else {
        format!("{}\n\n{buf}", "STATS:".magenta())
    };

    if status.status == ExitCode::NeedsReadjustment {
        return format!("{exceptions}\n\n");
    }
    format!("{all_messages}\n\n{exceptions}\n\n")
}

/// One-line summary of a failed gate, suitable for chat notifications.
pub fn format_failure_message(status: &ProjectStatus, results: &ProjectResults, tsconfig: &str) -> String {
    if status.status == ExitCode::NeedsReadjustment {
        return format!("Number of allowed messages need to be lowered in `{tsconfig}`");
    }

    let item = |name: &str, count: usize| {
        let plural = if count == 1 { "" } else { "s" };
        format!("`{count}` _{name}{plural}_")
    };

    let mut stats = Vec::new();
    if results.num_errors > 0 {
        stats.push(item("error", results.num_errors));
    }
    if results.num_warnings > 0 {
        stats.push(item("warning", results.num_warnings));
    }
    format!(
        "{} found over the span of {}",
        stats.join(" and "),
        item("file", results.files_with_messages())
    )
}
