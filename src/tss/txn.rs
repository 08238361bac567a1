use log::debug;

use std::{
    ops::RangeBounds,
    sync::{Arc, MutexGuard},
};

use crate::tss::{store::Tree, Snapshot, Store};

/// Write transaction over a [Store].
///
/// Holds the store's writer gate for its whole life-time and mutates a
/// private copy-on-write clone of the committed snapshot. [Self::commit]
/// publishes the clone atomically; dropping the transaction without
/// commit discards all mutations.
pub struct WriteTxn<'a> {
    store: &'a Store,
    snap: Snapshot,

    _guard: MutexGuard<'a, u32>,
}

impl<'a> WriteTxn<'a> {
    pub(crate) fn new(
        store: &'a Store,
        guard: MutexGuard<'a, u32>,
        snap: Snapshot,
    ) -> WriteTxn<'a> {
        WriteTxn { store, snap, _guard: guard }
    }

    /// Seqno this transaction started from.
    #[inline]
    pub fn to_seqno(&self) -> u64 {
        self.snap.seqno
    }

    /// Return value for `key` in tree `tree`, observing this
    /// transaction's own uncommitted mutations.
    pub fn get(&self, tree: &str, key: &[u8]) -> Option<Vec<u8>> {
        self.snap.get(tree, key)
    }

    /// Upsert `value` under `key` in tree `tree`, creating the tree on
    /// first write. Return the older value, if any.
    pub fn set(&mut self, tree: &str, key: &[u8], value: Vec<u8>) -> Option<Vec<u8>> {
        let tree = self
            .snap
            .trees
            .entry(tree.to_string())
            .or_insert_with(Tree::default);
        tree.entries
            .insert(key.to_vec(), Arc::new(value))
            .map(|v| v.as_ref().clone())
    }

    /// Remove `key` from tree `tree`. Return the older value, if any.
    pub fn delete(&mut self, tree: &str, key: &[u8]) -> Option<Vec<u8>> {
        let tree = self.snap.trees.get_mut(tree)?;
        tree.entries.remove(key).map(|v| v.as_ref().clone())
    }

    /// Full scan of tree `tree`, in key order.
    pub fn iter(&self, tree: &str) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.snap.iter(tree)
    }

    /// Range scan of tree `tree`, in key order.
    pub fn range<R>(&self, tree: &str, range: R) -> Vec<(Vec<u8>, Vec<u8>)>
    where
        R: RangeBounds<Vec<u8>>,
    {
        self.snap.range(tree, range)
    }

    /// Number of entries in tree `tree`.
    pub fn len(&self, tree: &str) -> usize {
        self.snap.len(tree)
    }

    /// Names of trees whose name starts with `prefix`.
    pub fn tree_names(&self, prefix: &str) -> Vec<String> {
        self.snap.tree_names(prefix)
    }

    /// Publish this transaction's mutations as the next committed
    /// snapshot. Return the new commit seqno.
    pub fn commit(mut self) -> u64 {
        self.snap.seqno += 1;
        let seqno = self.snap.seqno;
        debug!(target: "tss", "commit store {:?} seqno {}", self.store.to_name(), seqno);
        *self.store.inner.write() = Arc::new(self.snap);
        seqno
    }
}
