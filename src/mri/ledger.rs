use cbordata::Cborize;

use crate::{
    mri::{ledger_tree, meta_tree},
    tss::{Snapshot, WriteTxn},
    util, Error, Result,
};

/// This value must change only when the shape of persisted ledger
/// records changes. High 16-bits identify the type and lower 16-bits
/// identify the version.
const LEDGER_VER: u32 = 0x00030001;

const ID_SEQ_KEY: &[u8] = b"idseq";

/// Persisted `(id, hash)` pair, one per live map-result.
///
/// `id` is allocated from a single monotonically increasing counter
/// scoped to the whole index and never re-used, even after deletes.
/// `hash` is the reduce-key digest naming the bucket holding this
/// result's payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Cborize)]
pub struct MapEntry {
    pub id: u64,
    pub hash: u64,
}

impl MapEntry {
    pub const ID: u32 = LEDGER_VER;

    pub fn new(id: u64, hash: u64) -> MapEntry {
        MapEntry { id, hash }
    }
}

// Ledger record for one source document, entries in map-emission
// order.
#[derive(Clone, Debug, Eq, PartialEq, Cborize)]
struct LedgerRec {
    entries: Vec<MapEntry>,
}

impl LedgerRec {
    const ID: u32 = LEDGER_VER;
}

// Per-document ledger, keyed by source document key in the ledger
// tree.
pub(crate) struct Ledger {
    tree: String,
}

impl Ledger {
    pub(crate) fn new(index: &str) -> Ledger {
        Ledger { tree: ledger_tree(index) }
    }

    // Return the entries currently attributed to `doc_key`, in
    // map-emission order. Unknown documents load as empty, not as an
    // error. A record that fails to decode is fatal for this document
    // only.
    pub(crate) fn load(&self, txn: &WriteTxn, doc_key: &[u8]) -> Result<Vec<MapEntry>> {
        match txn.get(&self.tree, doc_key) {
            Some(data) => match util::from_cbor_bytes::<LedgerRec>(&data) {
                Ok((rec, _)) => Ok(rec.entries),
                Err(err) => {
                    err_at!(Corruption, msg: "ledger for {:?}: {}", doc_key, err)
                }
            },
            None => Ok(vec![]),
        }
    }

    pub(crate) fn replace(
        &self,
        txn: &mut WriteTxn,
        doc_key: &[u8],
        entries: Vec<MapEntry>,
    ) -> Result<()> {
        let data = util::into_cbor_bytes(LedgerRec { entries })?;
        txn.set(&self.tree, doc_key, data);
        Ok(())
    }

    pub(crate) fn delete(&self, txn: &mut WriteTxn, doc_key: &[u8]) {
        txn.delete(&self.tree, doc_key);
    }
}

// Persisted id-sequence record.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Cborize)]
struct SeqRec {
    seqno: u64,
}

impl SeqRec {
    const ID: u32 = LEDGER_VER;
}

// Monotonic id allocator, index-scoped. The current value is itself
// part of the transactionally committed state, a rolled back batch
// reverts it leaving at most benign gaps.
pub(crate) struct IdSeq {
    tree: String,
}

impl IdSeq {
    pub(crate) fn new(index: &str) -> IdSeq {
        IdSeq { tree: meta_tree(index) }
    }

    pub(crate) fn load(&self, txn: &WriteTxn) -> Result<u64> {
        match txn.get(&self.tree, ID_SEQ_KEY) {
            Some(data) => {
                let (rec, _) = util::from_cbor_bytes::<SeqRec>(&data)?;
                Ok(rec.seqno)
            }
            None => Ok(0),
        }
    }

    // Allocate the next id, persisting the watermark within `txn`.
    pub(crate) fn next(&self, txn: &mut WriteTxn) -> Result<u64> {
        let seqno = self.load(txn)? + 1;
        let data = util::into_cbor_bytes(SeqRec { seqno })?;
        txn.set(&self.tree, ID_SEQ_KEY, data);
        Ok(seqno)
    }
}

// Read-side access, against a committed snapshot.

/// Every `(document-key, entries)` pair committed in `snap`, in
/// document-key order.
pub(crate) fn read_all(snap: &Snapshot, index: &str) -> Result<Vec<(Vec<u8>, Vec<MapEntry>)>> {
    let mut out = vec![];
    for (doc_key, data) in snap.iter(&ledger_tree(index)).into_iter() {
        match util::from_cbor_bytes::<LedgerRec>(&data) {
            Ok((rec, _)) => out.push((doc_key, rec.entries)),
            Err(err) => err_at!(Corruption, msg: "ledger for {:?}: {}", doc_key, err)?,
        }
    }
    Ok(out)
}

/// Id-sequence watermark committed in `snap`.
pub(crate) fn read_seq(snap: &Snapshot, index: &str) -> Result<u64> {
    match snap.get(&meta_tree(index), ID_SEQ_KEY) {
        Some(data) => {
            let (rec, _) = util::from_cbor_bytes::<SeqRec>(&data)?;
            Ok(rec.seqno)
        }
        None => Ok(0),
    }
}

#[cfg(test)]
#[path = "ledger_test.rs"]
mod ledger_test;
