//! Renumbering of a collection into the dense id range 1..=N

use sled::transaction::{ConflictableTransactionResult, TransactionResult, TransactionalTree};
use sled::{IVec, Transactional};

use super::{read_entries, write_sequence, TaskStore};
use crate::codec::encode_id;
use crate::error::{Error, Result};
use crate::task::Collection;

/// Writes needed to store `survivors` under ids 1..=N.
///
/// Keys above N that exist today are removed and the sequence is reset to N,
/// so the next insert gets N + 1.
#[derive(Debug, Clone)]
pub struct RenumberPlan {
    survivors: Vec<IVec>,
    stale: Vec<u64>,
}

impl RenumberPlan {
    /// `existing` are the ids currently in the collection; `survivors` the
    /// values to keep, already in their final order.
    pub fn new(existing: &[u64], survivors: Vec<IVec>) -> Self {
        let len = survivors.len() as u64;
        let stale = existing.iter().copied().filter(|id| *id > len).collect();
        RenumberPlan { survivors, stale }
    }

    pub fn len(&self) -> usize {
        self.survivors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.survivors.is_empty()
    }

    /// Apply inside a transaction spanning the collection tree (`tx`) and the
    /// default tree (`meta`).
    pub fn apply(
        &self,
        tx: &TransactionalTree,
        meta: &TransactionalTree,
        collection: Collection,
    ) -> ConflictableTransactionResult<(), Error> {
        for (index, value) in self.survivors.iter().enumerate() {
            let id = index as u64 + 1;
            tx.insert(&encode_id(id)[..], value.clone())?;
        }
        for id in &self.stale {
            tx.remove(&encode_id(*id)[..])?;
        }
        write_sequence(meta, collection, self.len() as u64)
    }
}

impl TaskStore {
    /// Rewrite `collection` so its ids are exactly 1..=count.
    ///
    /// Order is preserved and running it twice changes nothing. Returns the
    /// number of entries.
    pub fn compact(&self, collection: Collection) -> Result<usize> {
        let tree = self.existing_tree(collection)?;
        let entries = read_entries(&tree)?;
        let existing: Vec<u64> = entries.iter().map(|(id, _)| *id).collect();
        let plan = RenumberPlan::new(
            &existing,
            entries.into_iter().map(|(_, value)| value).collect(),
        );

        let result: TransactionResult<(), Error> =
            (&tree, &*self.db).transaction(|(tx, meta)| plan.apply(tx, meta, collection));
        result?;
        self.flush()?;

        tracing::debug!(%collection, entries = plan.len(), "compacted collection");
        Ok(plan.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{descriptions, open_store};
    use crate::task::Task;
    use tempfile::TempDir;

    fn values(items: &[&str]) -> Vec<IVec> {
        items.iter().map(|item| IVec::from(item.as_bytes())).collect()
    }

    #[test]
    fn plan_removes_only_keys_above_new_length() {
        let plan = RenumberPlan::new(&[2, 4, 6, 7], values(&["b", "d"]));
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.stale, vec![4, 6, 7]);
    }

    #[test]
    fn empty_plan_clears_everything() {
        let plan = RenumberPlan::new(&[1, 2], Vec::new());
        assert!(plan.is_empty());
        assert_eq!(plan.stale, vec![1, 2]);
    }

    #[test]
    fn compact_closes_gaps_in_order() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let tree = store.existing_tree(Collection::Tasks).unwrap();
        for (id, desc) in [(3u64, "a"), (7, "b"), (9, "c")] {
            let bytes = crate::codec::encode_task(&Task::new(desc, "")).unwrap();
            tree.insert(encode_id(id), bytes).unwrap();
        }

        assert_eq!(store.compact(Collection::Tasks).unwrap(), 3);

        let ids: Vec<u64> = store
            .scan(Collection::Tasks)
            .unwrap()
            .into_iter()
            .map(|position| position.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(descriptions(&store, Collection::Tasks), vec!["a", "b", "c"]);
        assert_eq!(store.insert(Collection::Tasks, &Task::new("d", "")).unwrap(), 4);
    }

    #[test]
    fn compact_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        for desc in ["a", "b"] {
            store.insert(Collection::Tasks, &Task::new(desc, "")).unwrap();
        }

        store.compact(Collection::Tasks).unwrap();
        let first = store.scan(Collection::Tasks).unwrap();
        store.compact(Collection::Tasks).unwrap();
        assert_eq!(store.scan(Collection::Tasks).unwrap(), first);
    }

    #[test]
    fn compact_missing_collection_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.drop_collection(Collection::Archive).unwrap();

        let err = store.compact(Collection::Archive).unwrap_err();
        assert!(err.is_not_found());
    }
}
