use std::{convert::TryFrom, fmt, result};

use crate::{
    mri::{
        bucket_tree, ledger, ledger_tree, nested_tree,
        results::{self, StorageType},
        Config,
    },
    tss::Snapshot,
    Error, Result,
};

/// Storage summary for one index, taken from a committed snapshot.
#[derive(Clone, Debug, Default)]
pub struct Stats {
    pub name: String,
    /// Number of source documents with at least one live map-result.
    pub n_documents: usize,
    /// Number of live map-results across all buckets.
    pub n_entries: usize,
    pub n_nested_buckets: usize,
    pub n_tree_buckets: usize,
    /// Serialized bytes held by nested buckets.
    pub nested_footprint: isize,
    /// Key and payload bytes held by tree buckets.
    pub tree_footprint: isize,
    /// High-water mark of the id sequence, ids allocated so far.
    pub id_watermark: u64,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        writeln!(f, "mri.name = {:?}", self.name)?;
        writeln!(
            f,
            "mri = {{ n_documents={}, n_entries={}, id_watermark={} }}",
            self.n_documents, self.n_entries, self.id_watermark
        )?;
        writeln!(
            f,
            "mri.nested = {{ buckets={}, footprint={} }}",
            self.n_nested_buckets, self.nested_footprint
        )?;
        write!(
            f,
            "mri.tree = {{ buckets={}, footprint={} }}",
            self.n_tree_buckets, self.tree_footprint
        )
    }
}

// Walk every bucket committed in `snap` and total up the summary.
pub(crate) fn generate(snap: &Snapshot, config: &Config) -> Result<Stats> {
    let name = &config.name;

    let mut stats = Stats {
        name: name.clone(),
        n_documents: snap.len(&ledger_tree(name)),
        id_watermark: ledger::read_seq(snap, name)?,
        ..Stats::default()
    };

    for hash in results::list_buckets(snap, name)?.into_iter() {
        match results::read_kind(snap, name, hash)? {
            Some(StorageType::Nested) => {
                stats.n_nested_buckets += 1;
                match snap.get(&nested_tree(name), &hash.to_be_bytes()) {
                    Some(raw) => {
                        stats.nested_footprint += err_at!(FailConvert, isize::try_from(raw.len()))?;
                    }
                    None => err_at!(Corruption, msg: "nested bucket {:x} missing", hash)?,
                }
                stats.n_entries += results::read_bucket(snap, name, hash)?.len();
            }
            Some(StorageType::Tree) => {
                stats.n_tree_buckets += 1;
                for (key, value) in snap.iter(&bucket_tree(name, hash)).into_iter() {
                    let size = key.len() + value.len();
                    stats.tree_footprint += err_at!(FailConvert, isize::try_from(size))?;
                    stats.n_entries += 1;
                }
            }
            None => err_at!(Corruption, msg: "bucket {:x} lost its kind", hash)?,
        }
    }

    Ok(stats)
}

#[cfg(test)]
#[path = "report_test.rs"]
mod report_test;
