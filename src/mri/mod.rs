//! Module implement incremental map-reduce indexing.
//!
//! An index is driven in batches. Each batch runs under exactly one
//! write transaction against the underlying [tss][crate::tss] store,
//! refer [Index::begin_batch]. Within a batch the indexing context
//! feeds changed documents through [Batch::map_document] and
//! tombstones through [Batch::delete_document]; committing the batch
//! publishes ledger, bucket and id-sequence mutations atomically.
//!
//! Bookkeeping per index, all within the caller supplied store:
//!
//! * *ledger tree*, one record per source document listing the
//!   `(id, hash)` pairs currently attributed to it.
//! * *meta tree*, the persisted index definition and the monotonic
//!   id-sequence.
//! * *kinds tree*, classification record per reduce-key digest naming
//!   the active bucket representation.
//! * *nested tree*, packed payloads for small buckets.
//! * *bucket trees*, one dedicated tree per bucket that outgrew the
//!   nested representation, named `{index}:bucket:{digest:016x}`.
//!
//! Reduction runs against read snapshots, refer [Index::aggregate],
//! and never mutates bucket state; a failed reduce is retried on the
//! next indexing run.

mod aggregate;
mod codec;
mod index;
mod ledger;
mod report;
mod results;
mod writer;

pub use aggregate::Aggregator;
pub use codec::ReduceCodec;
pub use index::{Batch, FieldDefn, FieldOp, Index, IndexDefn};
pub use ledger::MapEntry;
pub use report::Stats;
pub use results::StorageType;
pub use writer::MapResult;

/// Default entry-count limit for the nested bucket representation,
/// beyond which a bucket is promoted to its own tree.
pub const NESTED_LIMIT: usize = 32;
/// Default serialized-size limit, in bytes, for the nested bucket
/// representation.
pub const NESTED_CAP: usize = 4096;

/// Configuration for [Index] type.
#[derive(Debug, Clone)]
pub struct Config {
    /// Uniquely name Index instances within a store.
    pub name: String,
    /// Entry-count limit for a nested bucket, beyond which the bucket
    /// is promoted to tree representation.
    ///
    /// Default: [NESTED_LIMIT]
    pub nested_limit: usize,
    /// Serialized-size limit, in bytes, for a nested bucket, beyond
    /// which the bucket is promoted to tree representation.
    ///
    /// Default: [NESTED_CAP]
    pub nested_cap: usize,
}

impl Config {
    pub fn new(name: &str) -> Config {
        Config {
            name: name.to_string(),
            nested_limit: NESTED_LIMIT,
            nested_cap: NESTED_CAP,
        }
    }

    pub fn set_nested_limit(&mut self, nested_limit: usize) -> &mut Self {
        self.nested_limit = nested_limit;
        self
    }

    pub fn set_nested_cap(&mut self, nested_cap: usize) -> &mut Self {
        self.nested_cap = nested_cap;
        self
    }
}

impl<'a> arbitrary::Arbitrary<'a> for Config {
    fn arbitrary(u: &mut arbitrary::Unstructured) -> arbitrary::Result<Self> {
        let name: String = u.arbitrary()?;
        let nested_limit = *u.choose(&[2, 8, 32, 1024])?;
        let nested_cap = *u.choose(&[64, 512, 4096, 1_000_000])?;

        let config = Config { name, nested_limit, nested_cap };
        Ok(config)
    }
}

// Tree naming, deterministic from the index name and, for promoted
// buckets, the reduce-key digest.

pub(crate) fn ledger_tree(index: &str) -> String {
    format!("{}:ledger", index)
}

pub(crate) fn meta_tree(index: &str) -> String {
    format!("{}:meta", index)
}

pub(crate) fn kinds_tree(index: &str) -> String {
    format!("{}:kinds", index)
}

pub(crate) fn nested_tree(index: &str) -> String {
    format!("{}:nested", index)
}

pub(crate) fn bucket_tree(index: &str, hash: u64) -> String {
    format!("{}:bucket:{:016x}", index, hash)
}

pub(crate) fn bucket_tree_prefix(index: &str) -> String {
    format!("{}:bucket:", index)
}
