//! Task lifecycle: add, complete, update, finish

use std::collections::HashSet;

use serde::Serialize;
use sled::transaction::{TransactionResult, TransactionalTree};
use sled::{IVec, Transactional};

use super::{read_entries, read_sequence, write_sequence, RenumberPlan, TaskStore};
use crate::codec::{decode_task, encode_id};
use crate::error::{Error, Result};
use crate::tags::parse_tags;
use crate::task::{Collection, Task};

/// Outcome of [`TaskStore::complete_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    Completed,
    /// The task was already complete; nothing was written.
    AlreadyComplete,
}

/// What an update should change.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// New description, may carry a `+tag`.
    pub description: Option<String>,
    pub flip_status: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FinishReport {
    pub archived: usize,
    pub remaining: usize,
}

impl TaskStore {
    /// Parse `text` for a tag and append the task to the active list.
    pub fn add_task(&self, text: &str) -> Result<(u64, Task)> {
        let parsed = parse_tags(text);
        if parsed.rest.is_empty() {
            return Err(Error::EmptyDescription);
        }

        let task = Task::new(parsed.rest.as_str(), parsed.first_tag().unwrap_or_default());
        let id = self.insert(Collection::Tasks, &task)?;
        Ok((id, task))
    }

    pub fn complete_task(&self, id: u64) -> Result<Completion> {
        let (_, changed) = self.modify(Collection::Tasks, id, |task| {
            if task.is_complete() {
                return Ok(false);
            }
            task.mark_complete();
            Ok(true)
        })?;

        Ok(if changed {
            Completion::Completed
        } else {
            Completion::AlreadyComplete
        })
    }

    /// Change the description and/or flip the status of an active task.
    ///
    /// The status flip happens first. A new description is parsed for a tag;
    /// the stored tag only changes when the description carries one.
    pub fn update_task(&self, id: u64, options: &UpdateOptions) -> Result<Task> {
        if options.description.is_none() && !options.flip_status {
            return Err(Error::InvalidArgument(
                "nothing to update: pass a new description or --status".to_string(),
            ));
        }

        let parsed = options.description.as_deref().map(parse_tags);
        if parsed.as_ref().is_some_and(|parsed| parsed.rest.is_empty()) {
            return Err(Error::EmptyDescription);
        }

        let (task, _) = self.modify(Collection::Tasks, id, |task| {
            if options.flip_status {
                task.toggle_status();
            }
            if let Some(parsed) = &parsed {
                task.description = parsed.rest.clone();
                if let Some(tag) = parsed.first_tag() {
                    task.tag = tag.to_string();
                }
            }
            Ok(true)
        })?;
        Ok(task)
    }

    /// Move every complete task into the archive.
    pub fn finish(&self) -> Result<FinishReport> {
        self.finish_where(|_, task| task.is_complete())
    }

    /// Move the complete tasks whose ids are in `ids` into the archive.
    pub fn finish_selected(&self, ids: &HashSet<u64>) -> Result<FinishReport> {
        self.finish_where(|id, task| task.is_complete() && ids.contains(&id))
    }

    fn finish_where(&self, select: impl Fn(u64, &Task) -> bool) -> Result<FinishReport> {
        let tasks = self.tree(Collection::Tasks)?.ok_or(Error::NoTasks)?;
        let archive = self.tree_or_create(Collection::Archive)?;

        let entries = read_entries(&tasks)?;
        let existing: Vec<u64> = entries.iter().map(|(id, _)| *id).collect();
        let mut moved: Vec<IVec> = Vec::new();
        let mut kept: Vec<IVec> = Vec::new();
        for (id, bytes) in entries {
            let task = decode_task(&bytes)?;
            if select(id, &task) {
                moved.push(bytes);
            } else {
                kept.push(bytes);
            }
        }

        let report = FinishReport {
            archived: moved.len(),
            remaining: kept.len(),
        };
        if moved.is_empty() {
            return Ok(report);
        }

        let plan = RenumberPlan::new(&existing, kept);
        let result: TransactionResult<(), Error> = (&tasks, &archive, &*self.db).transaction(
            |(tx_tasks, tx_archive, meta)| {
                plan.apply(tx_tasks, meta, Collection::Tasks)?;
                append_all(tx_archive, meta, &moved)?;
                Ok(())
            },
        );
        result?;
        self.flush()?;

        tracing::debug!(
            archived = report.archived,
            remaining = report.remaining,
            "finished tasks"
        );
        Ok(report)
    }
}

fn append_all(
    archive: &TransactionalTree,
    meta: &TransactionalTree,
    values: &[IVec],
) -> sled::transaction::ConflictableTransactionResult<(), Error> {
    let mut last = read_sequence(meta, Collection::Archive)?;
    for value in values {
        last += 1;
        archive.insert(&encode_id(last)[..], value.clone())?;
    }
    write_sequence(meta, Collection::Archive, last)
}
