//! Shared output formatting for gi commands.

use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::issue::Issue;
use crate::property::{Field, Property, RenderAttr};
use crate::record::Record;

pub const SCHEMA_VERSION: &str = "gi.v1";

const ID_WIDTH: usize = 5;
const TITLE_WIDTH: usize = 40;
const ASSIGNEE_WIDTH: usize = 24;
const OPTION_WIDTH: usize = 9;

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
    pub color: bool,
}

impl OutputOptions {
    /// Color only for a terminal, and never when `NO_COLOR` is set.
    pub fn detect(json: bool, quiet: bool) -> Self {
        let color = !json && std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_tty();
        Self { json, quiet, color }
    }
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    /// Raw line printed under the header, no bullet.
    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let warnings = human.map(|h| h.warnings.clone()).unwrap_or_default();

        #[derive(Serialize)]
        struct Envelope<'a, T: Serialize> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            data: &'a T,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            warnings: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data,
            warnings,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if options.quiet {
        return Ok(());
    }

    if let Some(human) = human {
        println!("{}", format_human(human));
    }

    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    if json {
        #[derive(Serialize)]
        struct ErrorBody<'a> {
            message: &'a str,
            code: i32,
            kind: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<serde_json::Value>,
        }

        #[derive(Serialize)]
        struct Envelope<'a> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            error: ErrorBody<'a>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            error: ErrorBody {
                message: &err.to_string(),
                code: err.exit_code(),
                kind: error_kind(err),
                details: err.details(),
            },
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = Vec::new();
    lines.push(output.header.clone());
    lines.extend(output.details.iter().cloned());

    push_summary(&mut lines, &output.summary);
    push_section(&mut lines, "Warnings", &output.warnings);
    push_section(&mut lines, "Next steps", &output.next_steps);

    lines.join("\n")
}

/// Command name for error envelopes, taken from the raw arguments.
pub fn infer_command_name_from_args() -> String {
    let mut args = std::env::args().skip(1);
    let mut expects_value = false;
    for arg in args.by_ref() {
        if expects_value {
            expects_value = false;
            continue;
        }
        if matches!(arg.as_str(), "--repo" | "--user") {
            expects_value = true;
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return arg;
    }
    "gi".to_string()
}

/// Table of issues: short id, title, assignee, type and status.
pub fn issue_table(issues: &[&Issue], color: bool) -> Vec<String> {
    let mut lines = Vec::with_capacity(issues.len() + 2);
    let header = format!(
        "{:<ID_WIDTH$} {:<TITLE_WIDTH$} {:<ASSIGNEE_WIDTH$} {:<OPTION_WIDTH$} {:<OPTION_WIDTH$}",
        "ID", "Title", "Assigned To", "Type", "Status"
    );
    let rule = "-".repeat(header.len());
    if color {
        lines.push(header.white().bold().to_string());
    } else {
        lines.push(header);
    }
    lines.push(rule);

    for issue in issues {
        let id: String = issue.id().chars().take(ID_WIDTH).collect();
        lines.push(format!(
            "{:<ID_WIDTH$} {:<TITLE_WIDTH$} {:<ASSIGNEE_WIDTH$} {} {}",
            id,
            truncate(&issue.title(), TITLE_WIDTH),
            truncate(&issue.assigned_to(), ASSIGNEE_WIDTH),
            option_cell(issue, "type", color),
            option_cell(issue, "status", color),
        ));
    }
    lines
}

/// Detail view of an issue followed by its comments, when given.
pub fn issue_detail<C: Record>(issue: &Issue, comments: Option<&[C]>, color: bool) -> Vec<String> {
    let mut lines = vec![issue.display(color)];
    if let Some(comments) = comments {
        lines.push(String::new());
        let heading = format!("Comments ({})", comments.len());
        if color {
            lines.push(heading.white().bold().to_string());
        } else {
            lines.push(heading);
        }
        for comment in comments {
            lines.push("-".repeat(ID_WIDTH * 4));
            lines.push(comment.display(color));
        }
    }
    lines
}

fn option_cell(issue: &Issue, name: &str, color: bool) -> String {
    let Ok(field) = issue.get_property(name) else {
        return format!("{:<OPTION_WIDTH$}", "");
    };
    let text = format!("{:<OPTION_WIDTH$}", field.render(RenderAttr::Value, false));
    match field {
        Field::Option(option) if color => match option.color() {
            Some(shade) => text.with(shade).to_string(),
            None => text,
        },
        _ => text,
    }
}

fn truncate(text: &str, width: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= width {
        return line.to_string();
    }
    let mut short: String = line.chars().take(width.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

fn error_kind(err: &Error) -> &'static str {
    match err.exit_code() {
        2 => "user_error",
        3 => "cancelled",
        _ => "operation_failed",
    }
}

fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::NotFound { .. } => vec!["gi list --all".to_string()],
        Error::Conflict(conflict) => {
            let longer = conflict
                .entries
                .first()
                .map(|entry| entry.id.chars().take(conflict.threshold + 1).collect::<String>())
                .unwrap_or_default();
            vec![format!("use a longer id prefix, e.g. gi show {longer}")]
        }
        Error::RepoNotFound(_) => vec!["run gi inside a git repository or pass --repo".to_string()],
        Error::InvalidConfig(_) => vec!["fix .gi.toml then retry".to_string()],
        Error::BranchMoved { .. } => vec!["run the command again to pick up the new issues".to_string()],
        Error::PropertyNotFound { .. } => vec![
            "known fields: id, title, type, reported_from, assigned_to, created_on, updated_on, status, description"
                .to_string(),
        ],
        _ => Vec::new(),
    }
}

fn push_summary(lines: &mut Vec<String>, summary: &[(String, String)]) {
    if summary.is_empty() {
        return;
    }

    lines.push(String::new());
    for (key, value) in summary {
        if value.is_empty() {
            lines.push(format!("- {key}"));
        } else {
            lines.push(format!("- {key}: {value}"));
        }
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push(format!("{title}:"));
    for item in items {
        lines.push(format!("- {item}"));
    }
}
