use std::{
    collections::BTreeMap,
    convert::TryFrom,
    ops::RangeBounds,
    sync::{Arc, Mutex},
};

use crate::{
    tss::{Stats, WriteTxn},
    util::Spinlock,
    Error, Result,
};

// Single ordered tree, keys and values are byte-strings. Values are
// reference-counted so that copy-on-write snapshot clones share
// payload storage.
#[derive(Clone, Default)]
pub(crate) struct Tree {
    pub(crate) entries: BTreeMap<Vec<u8>, Arc<Vec<u8>>>,
}

impl Tree {
    fn footprint(&self) -> Result<isize> {
        let mut size = 0_usize;
        for (key, value) in self.entries.iter() {
            size += key.len() + value.len();
        }
        err_at!(FailConvert, isize::try_from(size))
    }
}

/// Point-in-time view of a [Store], all named trees at one committed
/// seqno. Snapshots are cheap to clone and safe to read while a
/// writer is active.
#[derive(Clone, Default)]
pub struct Snapshot {
    pub(crate) seqno: u64,
    pub(crate) trees: BTreeMap<String, Tree>,
}

impl Snapshot {
    /// Return the commit seqno this snapshot was taken at.
    #[inline]
    pub fn to_seqno(&self) -> u64 {
        self.seqno
    }

    /// Return value for `key` in tree `tree`. Missing tree and missing
    /// key are both None.
    pub fn get(&self, tree: &str, key: &[u8]) -> Option<Vec<u8>> {
        let tree = self.trees.get(tree)?;
        tree.entries.get(key).map(|v| v.as_ref().clone())
    }

    /// Full scan of tree `tree` in key order. Missing tree scans empty.
    pub fn iter(&self, tree: &str) -> Vec<(Vec<u8>, Vec<u8>)> {
        match self.trees.get(tree) {
            Some(tree) => tree
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.as_ref().clone()))
                .collect(),
            None => vec![],
        }
    }

    /// Range scan of tree `tree` in key order.
    pub fn range<R>(&self, tree: &str, range: R) -> Vec<(Vec<u8>, Vec<u8>)>
    where
        R: RangeBounds<Vec<u8>>,
    {
        match self.trees.get(tree) {
            Some(tree) => tree
                .entries
                .range(range)
                .map(|(k, v)| (k.clone(), v.as_ref().clone()))
                .collect(),
            None => vec![],
        }
    }

    /// Number of entries in tree `tree`.
    pub fn len(&self, tree: &str) -> usize {
        self.trees.get(tree).map(|t| t.entries.len()).unwrap_or(0)
    }

    /// Names of trees whose name starts with `prefix`, in name order.
    pub fn tree_names(&self, prefix: &str) -> Vec<String> {
        self.trees
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect()
    }
}

/// Store of named ordered trees, thread-safe for concurrent readers
/// with writes serialized into a single transaction at a time.
#[derive(Clone)]
pub struct Store {
    name: String,

    pub(crate) mu: Arc<Mutex<u32>>,
    pub(crate) inner: Arc<Spinlock<Arc<Snapshot>>>,
}

impl Store {
    pub fn new(name: &str) -> Store {
        Store {
            name: name.to_string(),

            mu: Arc::new(Mutex::new(0)),
            inner: Arc::new(Spinlock::new(Arc::new(Snapshot::default()))),
        }
    }

    /// Return name of this store instance.
    #[inline]
    pub fn to_name(&self) -> String {
        self.name.clone()
    }

    /// Return current committed seqno.
    #[inline]
    pub fn to_seqno(&self) -> u64 {
        let inner = Arc::clone(&self.inner.read());
        inner.seqno
    }

    /// Take a read snapshot of the latest committed state.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.inner.read())
    }

    /// Begin a write transaction. Blocks while another writer is
    /// active; there is exactly one write transaction at a time.
    pub fn begin(&self) -> Result<WriteTxn> {
        let guard = match self.mu.lock() {
            Ok(guard) => guard,
            Err(err) => err_at!(Fatal, msg: "poisoned store lock {}", err)?,
        };
        let snap = {
            let inner = Arc::clone(&self.inner.read());
            inner.as_ref().clone()
        };
        Ok(WriteTxn::new(self, guard, snap))
    }

    pub fn to_stats(&self) -> Result<Stats> {
        let inner = Arc::clone(&self.inner.read());

        let mut n_entries = 0;
        let mut footprint = 0;
        for tree in inner.trees.values() {
            n_entries += tree.entries.len();
            footprint += tree.footprint()?;
        }

        Ok(Stats {
            name: self.name.clone(),
            seqno: inner.seqno,
            n_trees: inner.trees.len(),
            n_entries,
            footprint,
            spin_stats: self.inner.as_ref().to_stats()?,
        })
    }

    pub fn close(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
