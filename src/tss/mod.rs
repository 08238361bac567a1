//! Module implement the transactional tree-store substrate.
//!
//! The [mri][crate::mri] engine is written against a page-oriented
//! transactional store supporting ordered trees with snapshot
//! isolation. This module supplies an in-memory reference
//! implementation of that substrate: a [Store] of named ordered trees
//! with,
//!
//! * **Single writer**, write transactions serialize behind a mutex,
//!   refer [Store::begin].
//! * **Snapshot isolation**, readers clone an `Arc` to the current
//!   committed snapshot and observe a consistent point-in-time view
//!   while a writer is active, refer [Store::snapshot].
//! * **All-or-nothing commit**, a [WriteTxn] mutates a copy-on-write
//!   clone of the committed snapshot; dropping the transaction without
//!   [WriteTxn::commit] discards every mutation.
//!
//! Durability (journaling, page allocation, compaction) is out of
//! scope here, production deployments sit this API on top of a
//! memory-mapped pager.

mod store;
mod txn;

pub use store::{Snapshot, Store};
pub use txn::WriteTxn;

use std::{fmt, result};

use crate::util::spinlock;

/// Statistic type, for [Store] type.
pub struct Stats {
    pub name: String,
    pub seqno: u64,
    pub n_trees: usize,
    pub n_entries: usize,
    pub footprint: isize,
    pub spin_stats: spinlock::Stats,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        writeln!(f, "tss.name = {}", self.name)?;
        writeln!(
            f,
            "tss = {{ seqno={}, n_trees={}, n_entries={}, footprint={} }}",
            self.seqno, self.n_trees, self.n_entries, self.footprint,
        )?;
        writeln!(f, "tss.spin_stats = {}", self.spin_stats)
    }
}
