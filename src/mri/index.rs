use cbordata::Cborize;

use std::{
    collections::{BTreeMap, BTreeSet},
    convert::TryFrom,
    sync::{atomic::AtomicBool, Arc},
};

use crate::{
    dbs::{NumericKind, Record},
    mri::{
        aggregate::Aggregator,
        codec::ReduceCodec,
        ledger::{self, IdSeq, Ledger},
        meta_tree, report,
        results::{self, ResultsStore},
        writer::{self, MapResult},
        Config, Stats,
    },
    tss::{Store, WriteTxn},
    util, Error, Result,
};

/// This value must change only when the shape of the persisted index
/// definition changes. High 16-bits identify the type and lower
/// 16-bits identify the version.
const DEFN_VER: u32 = 0x00050001;

const DEFN_KEY: &[u8] = b"defn";
const CONFIG_KEY: &[u8] = b"config";

const OP_NONE: u8 = 0;
const OP_COUNT: u8 = 1;
const OP_SUM: u8 = 2;
const KIND_NONE: u8 = 0;
const KIND_INTEGER: u8 = 1;
const KIND_FLOAT: u8 = 2;

/// Aggregation operation declared for one output field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldOp {
    /// Group-by / passthrough field, participates in the reduce key;
    /// first occurrence for a group wins.
    None,
    /// Contribute `1` per input payload carrying the field, summed as
    /// an integer.
    Count,
    /// Parse the field's value as a number and accumulate into a
    /// same-typed running total, refer [NumericKind].
    Sum(NumericKind),
}

/// Declared output field of a map-reduce index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldDefn {
    pub name: String,
    pub op: FieldOp,
}

impl FieldDefn {
    pub fn new(name: &str, op: FieldOp) -> FieldDefn {
        FieldDefn { name: name.to_string(), op }
    }
}

/// Definition of an auto map-reduce index, the ordered list of output
/// fields with their aggregation operations.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IndexDefn {
    pub fields: Vec<FieldDefn>,
}

impl IndexDefn {
    pub fn new() -> IndexDefn {
        IndexDefn::default()
    }

    /// Append an output field. Field order is significant, it fixes
    /// both the reduce-key layout and the output record layout.
    pub fn add_field(mut self, name: &str, op: FieldOp) -> IndexDefn {
        self.fields.push(FieldDefn::new(name, op));
        self
    }

    /// Group-by field names, in declared order.
    pub fn group_by(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.op == FieldOp::None)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Definition errors are fatal at index-creation time and never
    /// reached at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.group_by().is_empty() {
            err_at!(InvalidDefn, msg: "index needs at least one group-by field")?
        }
        if !self.fields.iter().any(|f| f.op != FieldOp::None) {
            err_at!(InvalidDefn, msg: "index needs at least one aggregated field")?
        }
        let mut names = BTreeSet::new();
        for field in self.fields.iter() {
            if !names.insert(&field.name) {
                err_at!(InvalidDefn, msg: "duplicate field {:?}", field.name)?
            }
        }
        Ok(())
    }
}

// Persisted form of FieldDefn.
#[derive(Clone, Debug, Eq, PartialEq, Cborize)]
struct FieldRec {
    name: String,
    op: u8,
    kind: u8,
}

impl FieldRec {
    const ID: u32 = DEFN_VER;
}

impl From<&FieldDefn> for FieldRec {
    fn from(fd: &FieldDefn) -> FieldRec {
        let (op, kind) = match fd.op {
            FieldOp::None => (OP_NONE, KIND_NONE),
            FieldOp::Count => (OP_COUNT, KIND_NONE),
            FieldOp::Sum(NumericKind::Integer) => (OP_SUM, KIND_INTEGER),
            FieldOp::Sum(NumericKind::Float) => (OP_SUM, KIND_FLOAT),
        };
        FieldRec { name: fd.name.clone(), op, kind }
    }
}

impl TryFrom<FieldRec> for FieldDefn {
    type Error = Error;

    fn try_from(rec: FieldRec) -> Result<FieldDefn> {
        let op = match (rec.op, rec.kind) {
            (OP_NONE, _) => FieldOp::None,
            (OP_COUNT, _) => FieldOp::Count,
            (OP_SUM, KIND_INTEGER) => FieldOp::Sum(NumericKind::Integer),
            (OP_SUM, KIND_FLOAT) => FieldOp::Sum(NumericKind::Float),
            (op, kind) => err_at!(Corruption, msg: "field op {} kind {}", op, kind)?,
        };
        Ok(FieldDefn { name: rec.name, op })
    }
}

// Persisted form of IndexDefn.
#[derive(Clone, Debug, Eq, PartialEq, Cborize)]
struct DefnRec {
    fields: Vec<FieldRec>,
}

impl DefnRec {
    const ID: u32 = DEFN_VER;
}

// Persisted form of Config, definition and thresholds travel with the
// index so that re-opening observes the same promotion behavior.
#[derive(Clone, Debug, Eq, PartialEq, Cborize)]
struct ConfigRec {
    nested_limit: u64,
    nested_cap: u64,
}

impl ConfigRec {
    const ID: u32 = DEFN_VER;
}

/// Index type, one auto map-reduce index over a document collection.
///
/// Obtain a value via [Index::create] or [Index::open]; the definition
/// and configuration are persisted with the index. Mutations run in
/// batches, refer [Index::begin_batch]; reductions run against read
/// snapshots, refer [Index::aggregate].
#[derive(Clone)]
pub struct Index {
    config: Config,
    defn: IndexDefn,
    store: Store,
}

impl Index {
    /// Create a new index named by `config.name` within `store`,
    /// persisting definition and configuration. Fails if the name is
    /// taken or the definition does not validate.
    pub fn create(store: &Store, config: Config, defn: IndexDefn) -> Result<Index> {
        defn.validate()?;

        let meta = meta_tree(&config.name);
        let mut txn = store.begin()?;
        if txn.get(&meta, DEFN_KEY).is_some() {
            err_at!(InvalidInput, msg: "index {:?} already exists", config.name)?
        }
        let drec = DefnRec {
            fields: defn.fields.iter().map(FieldRec::from).collect(),
        };
        let crec = ConfigRec {
            nested_limit: err_at!(FailConvert, u64::try_from(config.nested_limit))?,
            nested_cap: err_at!(FailConvert, u64::try_from(config.nested_cap))?,
        };
        txn.set(&meta, DEFN_KEY, util::into_cbor_bytes(drec)?);
        txn.set(&meta, CONFIG_KEY, util::into_cbor_bytes(crec)?);
        txn.commit();

        Ok(Index { config, defn, store: store.clone() })
    }

    /// Open an existing index named `name` within `store`.
    pub fn open(store: &Store, name: &str) -> Result<Index> {
        let meta = meta_tree(name);
        let snap = store.snapshot();

        let defn = match snap.get(&meta, DEFN_KEY) {
            Some(data) => {
                let (rec, _) = util::from_cbor_bytes::<DefnRec>(&data)?;
                let mut fields = Vec::with_capacity(rec.fields.len());
                for frec in rec.fields.into_iter() {
                    fields.push(FieldDefn::try_from(frec)?);
                }
                IndexDefn { fields }
            }
            None => err_at!(KeyNotFound, msg: "no index {:?}", name)?,
        };
        let config = match snap.get(&meta, CONFIG_KEY) {
            Some(data) => {
                let (rec, _) = util::from_cbor_bytes::<ConfigRec>(&data)?;
                let mut config = Config::new(name);
                config
                    .set_nested_limit(err_at!(
                        FailConvert,
                        usize::try_from(rec.nested_limit)
                    )?)
                    .set_nested_cap(err_at!(FailConvert, usize::try_from(rec.nested_cap))?);
                config
            }
            None => err_at!(Corruption, msg: "index {:?} missing config", name)?,
        };

        Ok(Index { config, defn, store: store.clone() })
    }

    /// Return name of this index instance.
    #[inline]
    pub fn to_name(&self) -> String {
        self.config.name.clone()
    }

    pub fn as_defn(&self) -> &IndexDefn {
        &self.defn
    }

    pub fn to_config(&self) -> Config {
        self.config.clone()
    }

    /// Begin an indexing batch. The batch holds the store's single
    /// write transaction until committed or dropped.
    pub fn begin_batch(&self) -> Result<Batch> {
        let txn = self.store.begin()?;
        Ok(Batch {
            txn,
            codec: ReduceCodec::new(self.defn.group_by()),
            ledger: Ledger::new(&self.config.name),
            seq: IdSeq::new(&self.config.name),
            results: ResultsStore::new(&self.config),
        })
    }

    /// Every bucket digest known to this index, in digest order.
    pub fn list_buckets(&self) -> Result<Vec<u64>> {
        results::list_buckets(&self.store.snapshot(), &self.config.name)
    }

    /// Reduce bucket `hash` into its distinct output records,
    /// observing the latest committed snapshot.
    pub fn aggregate(&self, hash: u64) -> Result<Vec<Record>> {
        let snap = self.store.snapshot();
        let payloads = results::read_bucket(&snap, &self.config.name, hash)?;

        let mut aggr = Aggregator::new(&self.defn);
        aggr.add_all(payloads.iter().map(|(_, data)| data))?;
        aggr.into_records()
    }

    /// Reduce several buckets in one pass, checking `cancel` between
    /// payloads. An aborted pass leaves no partial output anywhere.
    pub fn aggregate_buckets(
        &self,
        hashes: &[u64],
        cancel: Arc<AtomicBool>,
    ) -> Result<Vec<Record>> {
        let snap = self.store.snapshot();

        let mut aggr = Aggregator::new(&self.defn);
        aggr.set_cancel(cancel);
        for hash in hashes.iter() {
            let payloads = results::read_bucket(&snap, &self.config.name, *hash)?;
            aggr.add_all(payloads.iter().map(|(_, data)| data))?;
        }
        aggr.into_records()
    }

    /// Generate the storage summary for this index.
    pub fn to_stats(&self) -> Result<Stats> {
        report::generate(&self.store.snapshot(), &self.config)
    }

    /// Check the ledger/bucket bijection: every id stored in some
    /// bucket is attributed to exactly one document's ledger entry and
    /// vice-versa. Meant for tests and offline fsck-style runs.
    pub fn validate(&self) -> Result<()> {
        let snap = self.store.snapshot();
        let name = &self.config.name;

        let mut ledgered: BTreeMap<u64, BTreeSet<u64>> = BTreeMap::new();
        for (doc_key, entries) in ledger::read_all(&snap, name)?.into_iter() {
            for entry in entries.into_iter() {
                let ids = ledgered.entry(entry.hash).or_insert_with(BTreeSet::new);
                if !ids.insert(entry.id) {
                    err_at!(
                        Corruption,
                        msg: "id {} attributed twice, document {:?}", entry.id, doc_key
                    )?
                }
            }
        }

        let mut n_stored = 0;
        for hash in results::list_buckets(&snap, name)?.into_iter() {
            let empty = BTreeSet::new();
            let ids = ledgered.get(&hash).unwrap_or(&empty);
            let mut seen = BTreeSet::new();
            for (id, _data) in results::read_bucket(&snap, name, hash)?.into_iter() {
                if !ids.contains(&id) {
                    err_at!(Corruption, msg: "orphan id {} in bucket {:x}", id, hash)?
                }
                seen.insert(id);
                n_stored += 1;
            }
            if seen.len() != ids.len() {
                err_at!(
                    Corruption,
                    msg: "bucket {:x} stores {} ids, ledger says {}",
                    hash, seen.len(), ids.len()
                )?
            }
        }

        let n_ledgered: usize = ledgered.values().map(|ids| ids.len()).sum();
        if n_stored != n_ledgered {
            err_at!(Corruption, msg: "{} stored vs {} ledgered", n_stored, n_ledgered)?
        }
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        Ok(())
    }
}

/// Batch type, one indexing run under a single write transaction.
///
/// The indexing context feeds each changed document through
/// [Self::map_document] and each tombstone through
/// [Self::delete_document]; [Self::commit] publishes the whole batch
/// atomically. Dropping the batch without commit discards everything,
/// allocated ids included.
pub struct Batch<'a> {
    txn: WriteTxn<'a>,
    codec: ReduceCodec,
    ledger: Ledger,
    seq: IdSeq,
    results: ResultsStore,
}

impl<'a> Batch<'a> {
    /// Ingest the map-phase output for one changed document.
    /// `emitted` is the sequence of records produced by the map logic,
    /// in emission order; an empty sequence removes the document from
    /// the index. Return the net live map-result count.
    ///
    /// Errors raised before the diff touches storage (a corrupt
    /// ledger record, a record missing a group-by field) leave the
    /// batch usable for other documents. A `Corruption` raised
    /// mid-diff means the id/payload bijection is broken and may
    /// leave partial writes for this document in the transaction;
    /// discard the batch without committing.
    pub fn map_document(&mut self, doc_key: &[u8], emitted: Vec<Record>) -> Result<usize> {
        self.codec.reset();

        let mut fresh = Vec::with_capacity(emitted.len());
        for rec in emitted.into_iter() {
            let (hash, _key) = self.codec.build(&rec)?;
            let data = util::into_cbor_bytes(rec)?;
            fresh.push(MapResult { hash, data });
        }
        writer::map_document(
            &mut self.txn,
            &self.ledger,
            &mut self.results,
            &self.seq,
            doc_key,
            fresh,
        )
    }

    /// Ingest a tombstone for one deleted document.
    pub fn delete_document(&mut self, doc_key: &[u8]) -> Result<()> {
        writer::delete_document(&mut self.txn, &self.ledger, &mut self.results, doc_key)
    }

    /// Seqno this batch's transaction started from.
    #[inline]
    pub fn to_seqno(&self) -> u64 {
        self.txn.to_seqno()
    }

    /// Commit the batch, publishing every mutation atomically. Return
    /// the new commit seqno.
    pub fn commit(self) -> Result<u64> {
        Ok(self.txn.commit())
    }
}

#[cfg(test)]
#[path = "index_test.rs"]
mod index_test;
