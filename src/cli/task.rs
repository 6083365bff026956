//! task command implementations.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::{
    emit_success, format_archive, format_tasks, task_views, HumanOutput, OutputOptions, TaskView,
};
use crate::query::filter_by_tags;
use crate::storage::Storage;
use crate::store::{Completion, FinishReport, TaskStore, UpdateOptions};
use crate::tags::parse_tags;
use crate::task::{Collection, TaskPosition};

/// Flags shared by every command
#[derive(Debug, Clone)]
pub struct CommonOptions {
    pub dir: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

impl CommonOptions {
    pub(crate) fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }
}

pub struct AddOptions {
    pub text: Vec<String>,
    pub common: CommonOptions,
}

pub struct DoOptions {
    pub ids: Vec<String>,
    pub finish: bool,
    pub common: CommonOptions,
}

pub struct UpdateCmdOptions {
    pub id: String,
    pub description: Option<String>,
    pub flip_status: bool,
    pub common: CommonOptions,
}

pub struct ListOptions {
    pub tags: Vec<String>,
    pub show_tags: bool,
    pub exclude: Vec<String>,
    pub common: CommonOptions,
}

pub struct DeleteOptions {
    pub ids: Vec<String>,
    pub common: CommonOptions,
}

pub struct ArchiveOptions {
    pub clear: bool,
    pub common: CommonOptions,
}

pub(crate) struct TaskContext {
    pub(crate) store: TaskStore,
    pub(crate) config: Config,
}

pub(crate) fn load_context(dir: Option<PathBuf>) -> Result<TaskContext> {
    let storage = Storage::resolve(dir)?;
    storage.ensure_dirs()?;
    let config = Config::load_from_dir(storage.data_dir());
    let store = TaskStore::open(
        storage.db_path(&config.store.file),
        config.store.lock_timeout_ms,
    )?;
    Ok(TaskContext { store, config })
}

#[derive(Serialize)]
struct AddOutput {
    id: u64,
    task: TaskView,
}

#[derive(Serialize)]
struct DoOutput {
    completed: Vec<u64>,
    already_complete: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finished: Option<FinishReport>,
    tasks: Vec<TaskView>,
}

#[derive(Serialize)]
struct UpdateOutput {
    id: u64,
    task: TaskView,
    tasks: Vec<TaskView>,
}

#[derive(Serialize)]
struct ListOutput {
    tasks: Vec<TaskView>,
}

#[derive(Serialize)]
struct FinishOutput {
    #[serde(flatten)]
    report: FinishReport,
    tasks: Vec<TaskView>,
}

#[derive(Serialize)]
struct DeleteOutput {
    deleted: Vec<u64>,
    tasks: Vec<TaskView>,
}

#[derive(Serialize)]
struct ClearOutput {
    collection: Collection,
    cleared: bool,
}

#[derive(Serialize)]
struct CountOutput {
    total: usize,
}

#[derive(Serialize)]
struct TagsOutput {
    tags: Vec<String>,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let ctx = load_context(options.common.dir.clone())?;
    let (id, task) = ctx.store.add_task(&options.text.join(" "))?;

    let human = HumanOutput::new(format!("Added task: '{}'", task.description));
    let output = AddOutput {
        id,
        task: TaskView::from(&TaskPosition { id, task }),
    };
    emit_success(options.common.output(), "add", &output, Some(&human))
}

pub fn run_do(options: DoOptions) -> Result<()> {
    let ctx = load_context(options.common.dir.clone())?;
    let count = ctx.store.count(Collection::Tasks)?;
    let ids = parse_ids(&options.ids, count)?;

    let mut human = HumanOutput::new("");
    let mut completed = Vec::new();
    let mut already_complete = Vec::new();
    for id in &ids {
        match ctx.store.complete_task(*id)? {
            Completion::Completed => {
                human.push_line(format!("Completed task {id}"));
                completed.push(*id);
            }
            Completion::AlreadyComplete => {
                human.push_warning(format!("task {id} is already complete"));
                already_complete.push(*id);
            }
        }
    }

    let finished = if options.finish {
        let selected: HashSet<u64> = ids.iter().copied().collect();
        let report = ctx.store.finish_selected(&selected)?;
        human.push_line(format!("Archived {} task(s)", report.archived));
        Some(report)
    } else {
        None
    };

    let tasks = ctx.store.scan(Collection::Tasks)?;
    human.push_block(format_tasks(&tasks, ctx.config.list.show_tags));

    let output = DoOutput {
        completed,
        already_complete,
        finished,
        tasks: task_views(&tasks),
    };
    emit_success(options.common.output(), "do", &output, Some(&human))
}

pub fn run_update(options: UpdateCmdOptions) -> Result<()> {
    let ctx = load_context(options.common.dir.clone())?;
    let count = ctx.store.count(Collection::Tasks)?;
    let id = parse_id(&options.id, count)?;

    let task = ctx.store.update_task(
        id,
        &UpdateOptions {
            description: options.description,
            flip_status: options.flip_status,
        },
    )?;

    let tasks = ctx.store.scan(Collection::Tasks)?;
    let mut human = HumanOutput::new(format!("Updated task {id}"));
    human.push_block(format_tasks(&tasks, ctx.config.list.show_tags));

    let output = UpdateOutput {
        id,
        task: TaskView::from(&TaskPosition { id, task }),
        tasks: task_views(&tasks),
    };
    emit_success(options.common.output(), "update", &output, Some(&human))
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let include = if options.tags.is_empty() {
        Vec::new()
    } else {
        parse_tags(&options.tags.join(" ")).tags
    };
    let exclude: Vec<String> = options
        .exclude
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    if !include.is_empty() && !exclude.is_empty() {
        return Err(Error::InvalidArgument(
            "can't use tag filtering in combination with --exclude".to_string(),
        ));
    }

    let ctx = load_context(options.common.dir.clone())?;
    let tasks = filter_by_tags(ctx.store.scan(Collection::Tasks)?, &include, &exclude);

    let mut human = HumanOutput::new("");
    human.push_block(format_tasks(
        &tasks,
        options.show_tags || ctx.config.list.show_tags,
    ));

    let output = ListOutput {
        tasks: task_views(&tasks),
    };
    emit_success(options.common.output(), "list", &output, Some(&human))
}

pub fn run_finish(common: CommonOptions) -> Result<()> {
    let ctx = load_context(common.dir.clone())?;
    let report = ctx.store.finish()?;

    let tasks = ctx.store.scan(Collection::Tasks)?;
    let mut human = HumanOutput::new(format!(
        "Moved {} completed task(s) to the archive",
        report.archived
    ));
    human.push_block(format_tasks(&tasks, ctx.config.list.show_tags));
    if report.archived > 0 {
        human.push_next_step("task archive");
    }

    let output = FinishOutput {
        report,
        tasks: task_views(&tasks),
    };
    emit_success(common.output(), "finish", &output, Some(&human))
}

pub fn run_delete(options: DeleteOptions) -> Result<()> {
    let ctx = load_context(options.common.dir.clone())?;
    let count = ctx.store.count(Collection::Tasks)?;
    let ids = parse_ids(&options.ids, count)?;

    let mut human = HumanOutput::new("");
    if let [id] = ids.as_slice() {
        ctx.store.delete(Collection::Tasks, *id)?;
    } else {
        let selected: HashSet<u64> = ids.iter().copied().collect();
        ctx.store.delete_many(Collection::Tasks, &selected)?;
    }
    for id in &ids {
        human.push_line(format!("Deleted task {id}"));
    }

    let tasks = ctx.store.scan(Collection::Tasks)?;
    human.push_block(format_tasks(&tasks, ctx.config.list.show_tags));

    let output = DeleteOutput {
        deleted: ids,
        tasks: task_views(&tasks),
    };
    emit_success(options.common.output(), "delete", &output, Some(&human))
}

pub fn run_clear(common: CommonOptions) -> Result<()> {
    let ctx = load_context(common.dir.clone())?;
    let cleared = ctx.store.drop_collection(Collection::Tasks)?;

    let human = HumanOutput::new("Deleted all tasks");
    let output = ClearOutput {
        collection: Collection::Tasks,
        cleared,
    };
    emit_success(common.output(), "clear", &output, Some(&human))
}

pub fn run_archive(options: ArchiveOptions) -> Result<()> {
    let ctx = load_context(options.common.dir.clone())?;

    if options.clear {
        let cleared = ctx.store.drop_collection(Collection::Archive)?;
        let human = HumanOutput::new("Cleared the archive");
        let output = ClearOutput {
            collection: Collection::Archive,
            cleared,
        };
        return emit_success(options.common.output(), "archive", &output, Some(&human));
    }

    let archived = ctx.store.scan(Collection::Archive)?;
    let human = if archived.is_empty() {
        HumanOutput::new("Archive is empty, finish a task to add it to the archive")
    } else {
        let mut human = HumanOutput::new("");
        human.push_block(format_archive(&archived));
        human
    };

    let output = ListOutput {
        tasks: task_views(&archived),
    };
    emit_success(options.common.output(), "archive", &output, Some(&human))
}

pub fn run_count(common: CommonOptions) -> Result<()> {
    let ctx = load_context(common.dir.clone())?;
    let total = ctx.store.count(Collection::Tasks)?;

    let human = HumanOutput::new(format!("{total} tasks"));
    emit_success(common.output(), "count", &CountOutput { total }, Some(&human))
}

pub fn run_tags(common: CommonOptions) -> Result<()> {
    let ctx = load_context(common.dir.clone())?;
    let tags = ctx.store.tags()?;

    let human = HumanOutput::new(tags.join(","));
    emit_success(common.output(), "tags", &TagsOutput { tags }, Some(&human))
}

/// Parse a user-supplied id and check it names an existing task.
fn parse_id(raw: &str, count: usize) -> Result<u64> {
    let id: u64 = raw
        .trim()
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("{raw} is not a number")))?;
    if id == 0 || id > count as u64 {
        return Err(Error::InvalidArgument(format!(
            "{id} is out of range, only {count} tasks exist"
        )));
    }
    Ok(id)
}

/// Parse every id, keeping the first occurrence of duplicates.
fn parse_ids(raw: &[String], count: usize) -> Result<Vec<u64>> {
    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(raw.len());
    for value in raw {
        let id = parse_id(value, count)?;
        if seen.insert(id) {
            ids.push(id);
        }
    }
    Ok(ids)
}
