//! Persistent task store backed by sled
//!
//! Each [`Collection`] is a sled tree keyed by 8-byte big-endian ids. The
//! auto-increment sequence of a collection lives in the default tree under
//! `seq/<collection>`, so every mutation touches at most the collection
//! trees plus the default tree inside one transaction.
//!
//! The store holds an exclusive [`FileLock`] for its whole lifetime, which
//! makes it the only writer. Mutations read their inputs up front and then
//! apply all writes in a single transaction followed by a flush.

mod compact;
mod lifecycle;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionResult,
    TransactionalTree,
};
use sled::{IVec, Transactional};

use crate::codec::{decode_id, decode_task, encode_id, encode_task};
use crate::error::{Error, Result};
use crate::lock::FileLock;
use crate::task::{Collection, Task, TaskPosition};

pub use compact::RenumberPlan;
pub use lifecycle::{Completion, FinishReport, UpdateOptions};

/// Handle to an open task database
///
/// Field order matters: sled is closed before the lock is released.
pub struct TaskStore {
    db: sled::Db,
    path: PathBuf,
    _lock: FileLock,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("path", &self.path)
            .finish()
    }
}

impl TaskStore {
    /// Open (or create) the database at `path`.
    ///
    /// The lock file is `<path>.lock`. Waits at most `lock_timeout_ms` for
    /// another process to let go of it.
    pub fn open(path: impl AsRef<Path>, lock_timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock = FileLock::acquire(lock_path_for(&path), lock_timeout_ms)?;
        let db = sled::open(&path)?;

        let store = TaskStore {
            db,
            path,
            _lock: lock,
        };
        store.ensure_collections()?;
        tracing::debug!(path = %store.path.display(), "opened task store");
        Ok(store)
    }

    /// Create any missing collection.
    pub fn ensure_collections(&self) -> Result<()> {
        for collection in Collection::ALL {
            if !self.has_collection(collection) {
                self.db.open_tree(collection.name())?;
                tracing::debug!(%collection, "created collection");
            }
        }
        Ok(())
    }

    pub fn has_collection(&self, collection: Collection) -> bool {
        self.db
            .tree_names()
            .iter()
            .any(|name| name.as_ref() == collection.name().as_bytes())
    }

    /// Tree for `collection`, or `None` without creating it.
    fn tree(&self, collection: Collection) -> Result<Option<sled::Tree>> {
        if !self.has_collection(collection) {
            return Ok(None);
        }
        Ok(Some(self.db.open_tree(collection.name())?))
    }

    fn existing_tree(&self, collection: Collection) -> Result<sled::Tree> {
        self.tree(collection)?
            .ok_or(Error::CollectionNotFound(collection))
    }

    fn tree_or_create(&self, collection: Collection) -> Result<sled::Tree> {
        Ok(self.db.open_tree(collection.name())?)
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Append `task` to `collection`, creating the collection if needed.
    ///
    /// Returns the id assigned by the collection's sequence.
    pub fn insert(&self, collection: Collection, task: &Task) -> Result<u64> {
        let tree = self.tree_or_create(collection)?;
        let value = IVec::from(encode_task(task)?);

        let result: TransactionResult<u64, Error> =
            (&tree, &*self.db).transaction(|(tx, meta)| {
                let id = read_sequence(meta, collection)? + 1;
                tx.insert(&encode_id(id)[..], value.clone())?;
                write_sequence(meta, collection, id)?;
                Ok(id)
            });
        let id = result?;
        self.flush()?;

        tracing::debug!(%collection, id, "inserted task");
        Ok(id)
    }

    pub fn get(&self, collection: Collection, id: u64) -> Result<Task> {
        let tree = self.existing_tree(collection)?;
        match tree.get(encode_id(id))? {
            Some(bytes) => decode_task(&bytes),
            None => Err(Error::TaskNotFound { collection, id }),
        }
    }

    /// Overwrite (or create) the record stored under `id`.
    pub fn put(&self, collection: Collection, id: u64, task: &Task) -> Result<()> {
        let tree = self.existing_tree(collection)?;
        tree.insert(encode_id(id), encode_task(task)?)?;
        self.flush()?;

        tracing::debug!(%collection, id, "stored task");
        Ok(())
    }

    /// Read, change and write back one task inside a single transaction.
    ///
    /// `change` returns false to leave the stored record untouched. Returns
    /// the task as it stands afterwards and whether it was written.
    pub(crate) fn modify(
        &self,
        collection: Collection,
        id: u64,
        change: impl Fn(&mut Task) -> Result<bool>,
    ) -> Result<(Task, bool)> {
        let tree = self.existing_tree(collection)?;
        let key = encode_id(id);

        let result: TransactionResult<(Task, bool), Error> = tree.transaction(|tx| {
            let bytes = tx.get(key)?.ok_or(ConflictableTransactionError::Abort(
                Error::TaskNotFound { collection, id },
            ))?;
            let mut task = decode_task(&bytes).map_err(ConflictableTransactionError::Abort)?;
            let changed = change(&mut task).map_err(ConflictableTransactionError::Abort)?;
            if changed {
                let value = encode_task(&task).map_err(ConflictableTransactionError::Abort)?;
                tx.insert(&key[..], value)?;
            }
            Ok((task, changed))
        });
        let (task, changed) = result?;
        if changed {
            self.flush()?;
            tracing::debug!(%collection, id, "modified task");
        }
        Ok((task, changed))
    }

    /// Number of entries, zero when the collection does not exist.
    pub fn count(&self, collection: Collection) -> Result<usize> {
        Ok(self.tree(collection)?.map_or(0, |tree| tree.len()))
    }

    /// Every task in ascending id order; empty when the collection does not
    /// exist.
    pub fn scan(&self, collection: Collection) -> Result<Vec<TaskPosition>> {
        let Some(tree) = self.tree(collection)? else {
            return Ok(Vec::new());
        };

        read_entries(&tree)?
            .into_iter()
            .map(|(id, bytes)| {
                Ok(TaskPosition {
                    id,
                    task: decode_task(&bytes)?,
                })
            })
            .collect()
    }

    /// Remove one task and renumber the rest.
    pub fn delete(&self, collection: Collection, id: u64) -> Result<()> {
        let tree = self.existing_tree(collection)?;
        if !tree.contains_key(encode_id(id))? {
            return Err(Error::TaskNotFound { collection, id });
        }

        let removed = self.rewrite_without(collection, &tree, &HashSet::from([id]))?;
        tracing::debug!(%collection, id, removed, "deleted task");
        Ok(())
    }

    /// Remove every task whose id is in `ids` and renumber the rest.
    ///
    /// Ids that are not present are ignored. Returns how many entries were
    /// removed.
    pub fn delete_many(&self, collection: Collection, ids: &HashSet<u64>) -> Result<usize> {
        let tree = self.existing_tree(collection)?;
        let removed = self.rewrite_without(collection, &tree, ids)?;
        tracing::debug!(%collection, requested = ids.len(), removed, "deleted tasks");
        Ok(removed)
    }

    fn rewrite_without(
        &self,
        collection: Collection,
        tree: &sled::Tree,
        ids: &HashSet<u64>,
    ) -> Result<usize> {
        let entries = read_entries(tree)?;
        let existing: Vec<u64> = entries.iter().map(|(id, _)| *id).collect();
        let survivors: Vec<IVec> = entries
            .into_iter()
            .filter(|(id, _)| !ids.contains(id))
            .map(|(_, bytes)| bytes)
            .collect();
        let removed = existing.len() - survivors.len();
        let plan = RenumberPlan::new(&existing, survivors);

        let result: TransactionResult<(), Error> =
            (tree, &*self.db).transaction(|(tx, meta)| plan.apply(tx, meta, collection));
        result?;
        self.flush()?;
        Ok(removed)
    }

    /// Delete a collection together with its sequence.
    ///
    /// Returns false when there was nothing to drop.
    pub fn drop_collection(&self, collection: Collection) -> Result<bool> {
        let Some(tree) = self.tree(collection)? else {
            self.db.remove(sequence_key(collection))?;
            self.flush()?;
            return Ok(false);
        };

        // Empty the tree and forget the sequence together, then drop the
        // empty tree.
        let keys = tree.iter().keys().collect::<std::result::Result<Vec<IVec>, _>>()?;
        let result: TransactionResult<(), Error> =
            (&tree, &*self.db).transaction(|(tx, meta)| {
                for key in &keys {
                    tx.remove(key.clone())?;
                }
                meta.remove(sequence_key(collection).as_bytes())?;
                Ok(())
            });
        result?;
        let dropped = self.db.drop_tree(collection.name())?;
        self.flush()?;

        tracing::debug!(%collection, dropped, "dropped collection");
        Ok(dropped)
    }

    /// Distinct non-empty tags of the active tasks, in first-seen order.
    pub fn tags(&self) -> Result<Vec<String>> {
        let mut tags: Vec<String> = Vec::new();
        for position in self.scan(Collection::Tasks)? {
            if let Some(tag) = position.task.tag() {
                if !tags.iter().any(|seen| seen == tag) {
                    tags.push(tag.to_string());
                }
            }
        }
        Ok(tags)
    }
}

/// Lock file path for a database at `db_path`.
pub fn lock_path_for(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

fn sequence_key(collection: Collection) -> String {
    format!("seq/{}", collection.name())
}

fn read_entries(tree: &sled::Tree) -> Result<Vec<(u64, IVec)>> {
    tree.iter()
        .map(|entry| {
            let (key, value) = entry?;
            Ok((decode_id(&key)?, value))
        })
        .collect()
}

fn read_sequence(
    meta: &TransactionalTree,
    collection: Collection,
) -> ConflictableTransactionResult<u64, Error> {
    match meta.get(sequence_key(collection))? {
        Some(bytes) => decode_id(&bytes).map_err(ConflictableTransactionError::Abort),
        None => Ok(0),
    }
}

fn write_sequence(
    meta: &TransactionalTree,
    collection: Collection,
    value: u64,
) -> ConflictableTransactionResult<(), Error> {
    meta.insert(sequence_key(collection).as_bytes(), &encode_id(value)[..])?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) fn open_store(dir: &TempDir) -> TaskStore {
        TaskStore::open(dir.path().join("tasks.db"), 1000).expect("open store")
    }

    pub(crate) fn descriptions(store: &TaskStore, collection: Collection) -> Vec<String> {
        store
            .scan(collection)
            .expect("scan")
            .into_iter()
            .map(|position| position.task.description)
            .collect()
    }

    fn ids(store: &TaskStore, collection: Collection) -> Vec<u64> {
        store
            .scan(collection)
            .expect("scan")
            .into_iter()
            .map(|position| position.id)
            .collect()
    }

    /// Deterministic xorshift64 generator for operation sequences.
    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }

        fn below(&mut self, bound: u64) -> u64 {
            self.next() % bound
        }
    }

    fn fill(store: &TaskStore, items: &[&str]) {
        for item in items {
            store
                .insert(Collection::Tasks, &Task::new(*item, ""))
                .expect("insert");
        }
    }

    #[test]
    fn open_creates_both_collections() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert!(store.has_collection(Collection::Tasks));
        assert!(store.has_collection(Collection::Archive));
        assert_eq!(store.count(Collection::Tasks).unwrap(), 0);
        assert!(store.scan(Collection::Archive).unwrap().is_empty());
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let first = store.insert(Collection::Tasks, &Task::new("a", "")).unwrap();
        let second = store.insert(Collection::Tasks, &Task::new("b", "")).unwrap();
        assert_eq!((first, second), (1, 2));
        assert_eq!(store.get(Collection::Tasks, 2).unwrap().description, "b");
    }

    #[test]
    fn insert_then_delete_keeps_ids_dense() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        fill(&store, &["a", "b", "c", "d"]);
        assert_eq!(store.count(Collection::Tasks).unwrap(), 4);

        store.delete(Collection::Tasks, 1).unwrap();
        assert_eq!(store.count(Collection::Tasks).unwrap(), 3);
        store.delete(Collection::Tasks, 3).unwrap();

        assert_eq!(ids(&store, Collection::Tasks), vec![1, 2]);
        assert_eq!(descriptions(&store, Collection::Tasks), vec!["b", "c"]);
    }

    #[test]
    fn delete_many_preserves_relative_order() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        fill(&store, &["a", "b", "c", "d", "e", "f"]);

        let removed = store
            .delete_many(Collection::Tasks, &HashSet::from([1, 3, 5]))
            .unwrap();

        assert_eq!(removed, 3);
        assert_eq!(ids(&store, Collection::Tasks), vec![1, 2, 3]);
        assert_eq!(descriptions(&store, Collection::Tasks), vec!["b", "d", "f"]);
    }

    #[test]
    fn delete_many_renumbers_survivors() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        fill(&store, &["a", "b", "c", "d"]);

        store
            .delete_many(Collection::Tasks, &HashSet::from([1, 3]))
            .unwrap();

        let positions: Vec<(u64, String)> = store
            .scan(Collection::Tasks)
            .unwrap()
            .into_iter()
            .map(|position| (position.id, position.task.description))
            .collect();
        assert_eq!(positions, vec![(1, "b".to_string()), (2, "d".to_string())]);
    }

    #[test]
    fn delete_many_ignores_unknown_ids() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        fill(&store, &["a", "b"]);

        let removed = store
            .delete_many(Collection::Tasks, &HashSet::from([7]))
            .unwrap();
        assert_eq!(removed, 0);
        assert_eq!(descriptions(&store, Collection::Tasks), vec!["a", "b"]);
    }

    #[test]
    fn sequence_continues_after_renumbering() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        fill(&store, &["a", "b", "c"]);
        store.delete(Collection::Tasks, 2).unwrap();

        let id = store.insert(Collection::Tasks, &Task::new("d", "")).unwrap();
        assert_eq!(id, 3);
        assert_eq!(descriptions(&store, Collection::Tasks), vec!["a", "c", "d"]);
    }

    #[test]
    fn missing_ids_and_collections_are_not_found() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        fill(&store, &["a"]);

        let err = store.get(Collection::Tasks, 9).unwrap_err();
        assert!(matches!(err, Error::TaskNotFound { id: 9, .. }));
        let err = store.delete(Collection::Tasks, 0).unwrap_err();
        assert!(err.is_not_found());

        store.drop_collection(Collection::Archive).unwrap();
        let err = store.get(Collection::Archive, 1).unwrap_err();
        assert!(matches!(err, Error::CollectionNotFound(Collection::Archive)));
        let err = store
            .put(Collection::Archive, 1, &Task::new("x", ""))
            .unwrap_err();
        assert!(err.is_not_found());
        let err = store
            .delete_many(Collection::Archive, &HashSet::from([1]))
            .unwrap_err();
        assert!(err.is_not_found());
        let err = store.delete(Collection::Archive, 1).unwrap_err();
        assert!(matches!(err, Error::CollectionNotFound(Collection::Archive)));
        assert_eq!(store.count(Collection::Archive).unwrap(), 0);
        assert!(store.scan(Collection::Archive).unwrap().is_empty());
    }

    #[test]
    fn put_overwrites_in_place() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        fill(&store, &["a", "b"]);

        let mut task = store.get(Collection::Tasks, 2).unwrap();
        task.description = "bee".to_string();
        store.put(Collection::Tasks, 2, &task).unwrap();

        assert_eq!(descriptions(&store, Collection::Tasks), vec!["a", "bee"]);
    }

    #[test]
    fn put_creates_unset_id() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        fill(&store, &["a"]);

        store
            .put(Collection::Tasks, 2, &Task::new("b", "later"))
            .unwrap();

        assert_eq!(store.count(Collection::Tasks).unwrap(), 2);
        let task = store.get(Collection::Tasks, 2).unwrap();
        assert_eq!((task.description.as_str(), task.tag.as_str()), ("b", "later"));
    }

    #[test]
    fn modify_writes_only_when_changed() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        fill(&store, &["a"]);

        let (task, changed) = store
            .modify(Collection::Tasks, 1, |task| {
                task.description = "ignored".to_string();
                Ok(false)
            })
            .unwrap();
        assert!(!changed);
        assert_eq!(task.description, "ignored");
        assert_eq!(descriptions(&store, Collection::Tasks), vec!["a"]);

        let (_, changed) = store
            .modify(Collection::Tasks, 1, |task| {
                task.description = "b".to_string();
                Ok(true)
            })
            .unwrap();
        assert!(changed);
        assert_eq!(descriptions(&store, Collection::Tasks), vec!["b"]);
    }

    #[test]
    fn modify_error_leaves_record_untouched() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        fill(&store, &["a"]);

        let err = store
            .modify(Collection::Tasks, 1, |task| {
                task.description = "half done".to_string();
                Err(Error::EmptyDescription)
            })
            .unwrap_err();
        assert!(matches!(err, Error::EmptyDescription));
        assert_eq!(descriptions(&store, Collection::Tasks), vec!["a"]);

        let err = store.modify(Collection::Tasks, 5, |_| Ok(true)).unwrap_err();
        assert!(matches!(err, Error::TaskNotFound { id: 5, .. }));
    }

    #[test]
    fn drop_collection_resets_sequence() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        fill(&store, &["a", "b"]);

        assert!(store.drop_collection(Collection::Tasks).unwrap());
        assert!(!store.has_collection(Collection::Tasks));
        assert!(!store.drop_collection(Collection::Tasks).unwrap());

        let id = store.insert(Collection::Tasks, &Task::new("c", "")).unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn drop_collection_clears_entries_and_sequence_together() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        fill(&store, &["a", "b", "c"]);

        assert!(store.drop_collection(Collection::Tasks).unwrap());
        assert!(store.db.get(sequence_key(Collection::Tasks)).unwrap().is_none());
        assert_eq!(store.count(Collection::Tasks).unwrap(), 0);
    }

    #[test]
    fn dropping_absent_collection_forgets_stale_sequence() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.db.drop_tree(Collection::Tasks.name()).unwrap();
        store
            .db
            .insert(sequence_key(Collection::Tasks), &encode_id(5)[..])
            .unwrap();

        assert!(!store.drop_collection(Collection::Tasks).unwrap());
        let id = store.insert(Collection::Tasks, &Task::new("a", "")).unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn random_operation_sequences_keep_ids_dense() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);

        for step in 0..300 {
            let count = store.count(Collection::Tasks).unwrap() as u64;
            match rng.below(6) {
                2 if count > 0 => {
                    store.delete(Collection::Tasks, rng.below(count) + 1).unwrap();
                }
                3 if count > 0 => {
                    let picks: HashSet<u64> = (0..rng.below(3) + 1)
                        .map(|_| rng.below(count) + 1)
                        .collect();
                    store.delete_many(Collection::Tasks, &picks).unwrap();
                }
                4 if count > 0 => {
                    store.complete_task(rng.below(count) + 1).unwrap();
                }
                5 => {
                    store.finish().unwrap();
                }
                _ => {
                    store.add_task(&format!("task {step}")).unwrap();
                }
            }

            for collection in Collection::ALL {
                let expected: Vec<u64> =
                    (1..=store.count(collection).unwrap() as u64).collect();
                assert_eq!(ids(&store, collection), expected, "step {step}");
            }
        }
    }

    #[test]
    fn tags_are_distinct_in_first_seen_order() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        for (desc, tag) in [("a", "work"), ("b", ""), ("c", "home"), ("d", "work")] {
            store.insert(Collection::Tasks, &Task::new(desc, tag)).unwrap();
        }
        assert_eq!(store.tags().unwrap(), vec!["work", "home"]);
    }

    #[test]
    fn corrupt_record_fails_scan() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        fill(&store, &["a"]);
        let tree = store.existing_tree(Collection::Tasks).unwrap();
        tree.insert(encode_id(2), &b"garbage"[..]).unwrap();

        let err = store.scan(Collection::Tasks).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn second_open_times_out_while_locked() {
        let dir = TempDir::new().unwrap();
        let _store = open_store(&dir);

        let err = TaskStore::open(dir.path().join("tasks.db"), 50).unwrap_err();
        assert!(matches!(err, Error::LockTimeout(_)));
    }

    #[test]
    fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = open_store(&dir);
            fill(&store, &["a", "b"]);
        }
        let store = open_store(&dir);
        assert_eq!(descriptions(&store, Collection::Tasks), vec!["a", "b"]);
        assert_eq!(store.insert(Collection::Tasks, &Task::new("c", "")).unwrap(), 3);
    }

    #[test]
    fn lock_path_appends_suffix() {
        assert_eq!(
            lock_path_for(Path::new("/data/tasks.db")),
            PathBuf::from("/data/tasks.db.lock")
        );
    }
}
