use std::collections::VecDeque;

use crate::{
    mri::{
        ledger::{IdSeq, Ledger, MapEntry},
        results::ResultsStore,
    },
    tss::WriteTxn,
    Error, Result,
};

/// Transient map-phase output, one per emitted result for a source
/// document. Consumed immediately by the writer, never persisted
/// as-is.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MapResult {
    /// Reduce-key digest naming the destination bucket.
    pub hash: u64,
    /// Canonical serialized payload.
    pub data: Vec<u8>,
}

// Reconcile storage for one source document, diffing `fresh` against
// the entries previously attributed to the document.
//
// The diff is positional, by emission order, not by content: the map
// phase is assumed to emit results in a stable order per document, so
// the common case of a document whose field values change without
// changing its map cardinality re-uses every id. Payload comparison is
// exact binary equality of the serialized bytes; cosmetic
// serialization differences count as changes.
//
// Return the net live map-result count for the document.
pub(crate) fn map_document(
    txn: &mut WriteTxn,
    ledger: &Ledger,
    results: &mut ResultsStore,
    seq: &IdSeq,
    doc_key: &[u8],
    fresh: Vec<MapResult>,
) -> Result<usize> {
    let mut old: VecDeque<MapEntry> = ledger.load(txn, doc_key)?.into();

    let mut entries = Vec::with_capacity(fresh.len());
    for res in fresh.into_iter() {
        match old.pop_front() {
            // same slot, same bucket: skip if byte-identical,
            // otherwise overwrite in place keeping the id stable.
            Some(prev) if prev.hash == res.hash => {
                let existing = match results.get(txn, prev.hash, prev.id)? {
                    Some(data) => data,
                    None => err_at!(
                        Corruption,
                        msg: "ledgered id {} missing in bucket {:x}", prev.id, prev.hash
                    )?,
                };
                if existing != res.data {
                    results.add(txn, prev.hash, prev.id, &res.data)?;
                }
                entries.push(prev);
            }
            // slot moved buckets: retire the old payload and id.
            Some(prev) => {
                results.delete(txn, prev.hash, prev.id)?;
                let id = seq.next(txn)?;
                results.add(txn, res.hash, id, &res.data)?;
                entries.push(MapEntry::new(id, res.hash));
            }
            // more new results than old.
            None => {
                let id = seq.next(txn)?;
                results.add(txn, res.hash, id, &res.data)?;
                entries.push(MapEntry::new(id, res.hash));
            }
        }
    }

    // more old results than new.
    for prev in old.into_iter() {
        results.delete(txn, prev.hash, prev.id)?;
    }

    let count = entries.len();
    if entries.is_empty() {
        ledger.delete(txn, doc_key);
    } else {
        ledger.replace(txn, doc_key, entries)?;
    }
    Ok(count)
}

// Tombstone path: remove every payload attributed to `doc_key` and
// the ledger record itself.
pub(crate) fn delete_document(
    txn: &mut WriteTxn,
    ledger: &Ledger,
    results: &mut ResultsStore,
    doc_key: &[u8],
) -> Result<()> {
    for entry in ledger.load(txn, doc_key)?.into_iter() {
        results.delete(txn, entry.hash, entry.id)?;
    }
    ledger.delete(txn, doc_key);
    Ok(())
}

#[cfg(test)]
#[path = "writer_test.rs"]
mod writer_test;
