//! Shared output formatting for task CLI commands.

use serde::Serialize;

use crate::error::{Error, JsonError, Result};
use crate::task::{TaskPosition, TaskStatus};

pub const SCHEMA_VERSION: &str = "task.v1";

const INCOMPLETE_MARK: &str = "🔴";
const COMPLETE_MARK: &str = "✅";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Human-readable rendering of a command result.
///
/// An empty header is skipped, so list-style commands can print only their
/// body.
#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    body: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            body: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_line(&mut self, value: impl Into<String>) {
        self.body.push(value.into());
    }

    /// Append a blank line followed by `block`, unless `block` is empty.
    pub fn push_block(&mut self, block: impl Into<String>) {
        let block = block.into();
        if block.is_empty() {
            return;
        }
        if !self.header.is_empty() || !self.body.is_empty() {
            self.body.push(String::new());
        }
        self.body.push(block);
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

/// JSON shape of a task in command output
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub id: u64,
    pub description: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl From<&TaskPosition> for TaskView {
    fn from(position: &TaskPosition) -> Self {
        let task = &position.task;
        TaskView {
            id: position.id,
            description: task.description.clone(),
            status: task.status,
            tag: task.tag().map(str::to_string),
            created_at: task.created_at.clone(),
            completed_at: (!task.completed_at.is_empty()).then(|| task.completed_at.clone()),
        }
    }
}

pub fn task_views(positions: &[TaskPosition]) -> Vec<TaskView> {
    positions.iter().map(TaskView::from).collect()
}

/// One line per task: `id: description mark`, or `id: tag: description mark`
/// when `show_tags` is set.
pub fn format_tasks(positions: &[TaskPosition], show_tags: bool) -> String {
    positions
        .iter()
        .map(|position| {
            let task = &position.task;
            let mark = if task.is_complete() {
                COMPLETE_MARK
            } else {
                INCOMPLETE_MARK
            };
            if show_tags {
                format!("{}: {}: {} {}", position.id, task.tag, task.description, mark)
            } else {
                format!("{}: {} {}", position.id, task.description, mark)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Archive listing: `id: description`.
pub fn format_archive(positions: &[TaskPosition]) -> String {
    positions
        .iter()
        .map(|position| format!("{}: {}", position.id, position.task.description))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let warnings = human.map(|h| h.warnings.clone()).unwrap_or_default();
        let next_steps = human.map(|h| h.next_steps.clone()).unwrap_or_default();

        #[derive(Serialize)]
        struct Envelope<'a, T: Serialize> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            data: &'a T,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            warnings: Vec<String>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data,
            warnings,
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if options.quiet {
        return Ok(());
    }

    if let Some(human) = human {
        let text = format_human(human);
        if !text.is_empty() {
            println!("{text}");
        }
    }

    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    let hint = next_steps.first().map(|step| step.as_str());
    if json {
        #[derive(Serialize)]
        struct Envelope<'a> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            error: JsonError,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            error: JsonError::from(err),
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = hint {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = Vec::new();
    if !output.header.is_empty() {
        lines.push(output.header.clone());
    }
    lines.extend(output.body.iter().cloned());

    push_section(&mut lines, "Warnings", &output.warnings);
    push_section(&mut lines, "Next steps", &output.next_steps);

    lines.join("\n")
}

pub fn infer_command_name_from_args() -> String {
    command_name_from(std::env::args().skip(1))
}

/// First positional argument, skipping flags and the value of `--dir`.
fn command_name_from(args: impl IntoIterator<Item = String>) -> String {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--dir" {
            args.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return arg;
    }
    "task".to_string()
}

fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::TaskNotFound { .. } => vec!["task list".to_string()],
        Error::NoTasks | Error::CollectionNotFound(_) => {
            vec!["task add <description>".to_string()]
        }
        Error::LockTimeout(_) => vec!["wait for the other task command to finish".to_string()],
        Error::InvalidConfig(_) => vec!["fix config.toml then retry".to_string()],
        _ => Vec::new(),
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
