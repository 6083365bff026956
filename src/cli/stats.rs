//! task stats command implementation

use chrono::Utc;
use serde::Serialize;

use super::task::{load_context, CommonOptions};
use crate::error::Result;
use crate::output::{emit_success, format_tasks, task_views, HumanOutput, TaskView};
use crate::query::{completed_within, parse_date, CompletionStats, StatsRange, StatsWindow};
use crate::task::Collection;

pub struct StatsOptions {
    pub start: Option<String>,
    pub end: Option<String>,
    pub on: Option<String>,
    pub verbose: bool,
    pub average: bool,
    pub common: CommonOptions,
}

#[derive(Serialize)]
struct StatsOutput {
    window: StatsWindow,
    #[serde(flatten)]
    stats: CompletionStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    tasks: Option<Vec<TaskView>>,
}

pub fn run(options: StatsOptions) -> Result<()> {
    let range = StatsRange {
        start: options.start.as_deref().map(parse_date).transpose()?,
        end: options.end.as_deref().map(parse_date).transpose()?,
        on: options.on.as_deref().map(parse_date).transpose()?,
    };
    let window = StatsWindow::resolve(range, Utc::now())?;

    let ctx = load_context(options.common.dir.clone())?;
    let completed = completed_within(ctx.store.scan(Collection::Archive)?, &window)?;
    let stats = CompletionStats::new(completed.len(), &window);
    let show_average = options.average || ctx.config.stats.show_average;

    let mut human = HumanOutput::new("");
    if options.verbose {
        human.push_block(format_tasks(&completed, false));
    }
    human.push_block(format!(
        "You completed {} tasks from {} to {}",
        stats.completed,
        window.start.format("%-m/%-d/%Y"),
        window.end.format("%-m/%-d/%Y"),
    ));
    if show_average {
        human.push_line(format!("Average: {:.1}/day", stats.average_per_day));
    }

    let output = StatsOutput {
        window,
        stats,
        tasks: options.verbose.then(|| task_views(&completed)),
    };
    emit_success(options.common.output(), "stats", &output, Some(&human))
}
