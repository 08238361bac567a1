use cbordata::Cborize;
use log::debug;

use std::{collections::HashMap, convert::TryFrom};

use crate::{
    mri::{bucket_tree, kinds_tree, nested_tree, Config},
    tss::{Snapshot, WriteTxn},
    util, Error, Result,
};

/// This value must change only when the shape of persisted bucket
/// records changes. High 16-bits identify the type and lower 16-bits
/// identify the version.
const RESULTS_VER: u32 = 0x00040001;

const FLAG_NESTED: u8 = 0;
const FLAG_TREE: u8 = 1;

/// Active storage representation for one bucket.
///
/// Every bucket starts out [Nested][StorageType::Nested] and is
/// promoted to [Tree][StorageType::Tree] once it outgrows the
/// configured thresholds. Promotion is monotonic, a bucket never
/// regresses to nested, even after all its entries are deleted;
/// reclaiming space from sparse tree buckets is left to storage-level
/// compaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StorageType {
    /// Payloads packed contiguously into a single value in the
    /// nested tree.
    Nested,
    /// Payloads stored in a dedicated tree keyed by entry id.
    Tree,
}

// Persisted classification record, one per bucket in the kinds tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Cborize)]
struct KindRec {
    flag: u8,
}

impl KindRec {
    const ID: u32 = RESULTS_VER;
}

impl From<StorageType> for KindRec {
    fn from(val: StorageType) -> KindRec {
        match val {
            StorageType::Nested => KindRec { flag: FLAG_NESTED },
            StorageType::Tree => KindRec { flag: FLAG_TREE },
        }
    }
}

impl TryFrom<KindRec> for StorageType {
    type Error = Error;

    fn try_from(rec: KindRec) -> Result<StorageType> {
        match rec.flag {
            FLAG_NESTED => Ok(StorageType::Nested),
            FLAG_TREE => Ok(StorageType::Tree),
            flag => err_at!(Corruption, msg: "bucket kind flag {}", flag),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Cborize)]
struct NestedEntry {
    id: u64,
    data: Vec<u8>,
}

impl NestedEntry {
    const ID: u32 = RESULTS_VER;
}

// Packed representation for a small bucket, a single value in the
// nested tree holding every entry.
#[derive(Clone, Debug, Default, Eq, PartialEq, Cborize)]
struct NestedRec {
    entries: Vec<NestedEntry>,
}

impl NestedRec {
    const ID: u32 = RESULTS_VER;
}

/// Per-batch handle over every bucket of one index.
///
/// Carries a transaction-scoped memoization of bucket classifications;
/// the cache has no observable effect on correctness and must not
/// outlive the enclosing write transaction, which is why a fresh
/// ResultsStore is constructed for every batch.
pub(crate) struct ResultsStore {
    index: String,
    kinds: String,
    nested: String,
    nested_limit: usize,
    nested_cap: usize,

    cache: HashMap<u64, StorageType>,
}

impl ResultsStore {
    pub(crate) fn new(config: &Config) -> ResultsStore {
        ResultsStore {
            index: config.name.clone(),
            kinds: kinds_tree(&config.name),
            nested: nested_tree(&config.name),
            nested_limit: config.nested_limit,
            nested_cap: config.nested_cap,

            cache: HashMap::new(),
        }
    }

    fn kind(&mut self, txn: &WriteTxn, hash: u64) -> Result<Option<StorageType>> {
        if let Some(kind) = self.cache.get(&hash) {
            return Ok(Some(*kind));
        }
        match txn.get(&self.kinds, &hash.to_be_bytes()) {
            Some(data) => {
                let (rec, _) = util::from_cbor_bytes::<KindRec>(&data)?;
                let kind = StorageType::try_from(rec)?;
                self.cache.insert(hash, kind);
                Ok(Some(kind))
            }
            None => Ok(None),
        }
    }

    fn set_kind(&mut self, txn: &mut WriteTxn, hash: u64, kind: StorageType) -> Result<()> {
        let data = util::into_cbor_bytes(KindRec::from(kind))?;
        txn.set(&self.kinds, &hash.to_be_bytes(), data);
        self.cache.insert(hash, kind);
        Ok(())
    }

    fn load_nested(&self, txn: &WriteTxn, hash: u64) -> Result<NestedRec> {
        match txn.get(&self.nested, &hash.to_be_bytes()) {
            Some(data) => {
                let (rec, _) = util::from_cbor_bytes::<NestedRec>(&data)?;
                Ok(rec)
            }
            None => err_at!(Corruption, msg: "nested bucket {:x} missing", hash),
        }
    }

    /// Upsert payload `data` under `id` into bucket `hash`. The first
    /// write to a previously-unseen bucket creates a nested bucket;
    /// a write that pushes a nested bucket past the thresholds
    /// migrates every entry, the triggering write included, into a
    /// dedicated tree within the enclosing transaction.
    pub(crate) fn add(
        &mut self,
        txn: &mut WriteTxn,
        hash: u64,
        id: u64,
        data: &[u8],
    ) -> Result<()> {
        let mut rec = match self.kind(txn, hash)? {
            None => NestedRec::default(),
            Some(StorageType::Nested) => self.load_nested(txn, hash)?,
            Some(StorageType::Tree) => {
                let tree = bucket_tree(&self.index, hash);
                txn.set(&tree, &id.to_be_bytes(), data.to_vec());
                return Ok(());
            }
        };
        match rec.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => entry.data = data.to_vec(),
            None => rec.entries.push(NestedEntry { id, data: data.to_vec() }),
        }
        let raw = util::into_cbor_bytes(rec.clone())?;
        if rec.entries.len() > self.nested_limit || raw.len() > self.nested_cap {
            self.promote(txn, hash, rec)
        } else {
            txn.set(&self.nested, &hash.to_be_bytes(), raw);
            self.set_kind(txn, hash, StorageType::Nested)
        }
    }

    // Migrate a nested bucket into its dedicated tree. All-or-nothing
    // within the enclosing transaction.
    fn promote(&mut self, txn: &mut WriteTxn, hash: u64, rec: NestedRec) -> Result<()> {
        let tree = bucket_tree(&self.index, hash);
        debug!(
            target: "mri",
            "promoting bucket {:x} to tree {:?}, {} entries",
            hash, tree, rec.entries.len()
        );
        for entry in rec.entries.into_iter() {
            txn.set(&tree, &entry.id.to_be_bytes(), entry.data);
        }
        txn.delete(&self.nested, &hash.to_be_bytes());
        self.set_kind(txn, hash, StorageType::Tree)
    }

    /// Return the payload stored under `id` in bucket `hash`.
    pub(crate) fn get(
        &mut self,
        txn: &WriteTxn,
        hash: u64,
        id: u64,
    ) -> Result<Option<Vec<u8>>> {
        match self.kind(txn, hash)? {
            None => Ok(None),
            Some(StorageType::Nested) => {
                let rec = self.load_nested(txn, hash)?;
                Ok(rec
                    .entries
                    .into_iter()
                    .find(|e| e.id == id)
                    .map(|e| e.data))
            }
            Some(StorageType::Tree) => {
                let tree = bucket_tree(&self.index, hash);
                Ok(txn.get(&tree, &id.to_be_bytes()))
            }
        }
    }

    /// Remove the payload stored under `id` in bucket `hash`. The
    /// payload must exist, a ledger entry pointing at a missing
    /// payload means the bijection is broken.
    pub(crate) fn delete(&mut self, txn: &mut WriteTxn, hash: u64, id: u64) -> Result<()> {
        match self.kind(txn, hash)? {
            None => err_at!(Corruption, msg: "delete id {} from unknown bucket {:x}", id, hash),
            Some(StorageType::Nested) => {
                let mut rec = self.load_nested(txn, hash)?;
                let m = rec.entries.len();
                rec.entries.retain(|e| e.id != id);
                if rec.entries.len() == m {
                    err_at!(Corruption, msg: "id {} missing in bucket {:x}", id, hash)?
                }
                let raw = util::into_cbor_bytes(rec)?;
                txn.set(&self.nested, &hash.to_be_bytes(), raw);
                Ok(())
            }
            Some(StorageType::Tree) => {
                let tree = bucket_tree(&self.index, hash);
                match txn.delete(&tree, &id.to_be_bytes()) {
                    Some(_) => Ok(()),
                    None => err_at!(Corruption, msg: "id {} missing in bucket {:x}", id, hash),
                }
            }
        }
    }

}

// Read-side access, against a committed snapshot.

/// Classification for bucket `hash` as committed in `snap`.
pub(crate) fn read_kind(snap: &Snapshot, index: &str, hash: u64) -> Result<Option<StorageType>> {
    match snap.get(&kinds_tree(index), &hash.to_be_bytes()) {
        Some(data) => {
            let (rec, _) = util::from_cbor_bytes::<KindRec>(&data)?;
            Ok(Some(StorageType::try_from(rec)?))
        }
        None => Ok(None),
    }
}

/// Enumerate every `(id, payload)` live in bucket `hash` as committed
/// in `snap`.
pub(crate) fn read_bucket(
    snap: &Snapshot,
    index: &str,
    hash: u64,
) -> Result<Vec<(u64, Vec<u8>)>> {
    match read_kind(snap, index, hash)? {
        None => Ok(vec![]),
        Some(StorageType::Nested) => match snap.get(&nested_tree(index), &hash.to_be_bytes()) {
            Some(data) => {
                let (rec, _) = util::from_cbor_bytes::<NestedRec>(&data)?;
                Ok(rec.entries.into_iter().map(|e| (e.id, e.data)).collect())
            }
            None => err_at!(Corruption, msg: "nested bucket {:x} missing", hash),
        },
        Some(StorageType::Tree) => snap
            .iter(&bucket_tree(index, hash))
            .into_iter()
            .map(|(k, v)| Ok((id_from_key(&k)?, v)))
            .collect(),
    }
}

/// Every bucket digest classified in `snap`, in digest order.
pub(crate) fn list_buckets(snap: &Snapshot, index: &str) -> Result<Vec<u64>> {
    snap.iter(&kinds_tree(index))
        .into_iter()
        .map(|(k, _)| id_from_key(&k))
        .collect()
}

pub(crate) fn id_from_key(key: &[u8]) -> Result<u64> {
    let bytes = err_at!(FailConvert, <[u8; 8]>::try_from(key))?;
    Ok(u64::from_be_bytes(bytes))
}

#[cfg(test)]
#[path = "results_test.rs"]
mod results_test;
