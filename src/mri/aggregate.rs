use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering::Relaxed},
        Arc,
    },
};

use crate::{
    dbs::{Field, Number, NumericKind, Record, Scalar},
    hash::CityHasher,
    mri::{
        codec::ReduceCodec,
        index::{FieldOp, IndexDefn},
    },
    Error, Result,
};

/// Reduce aggregator, folds raw map-result payloads, typically one
/// results-store bucket per pass, into the distinct reduced output
/// records for that bucket.
///
/// Grouping identity is **exact**, not hash-based: payloads belong to
/// the same output group iff their serialized group-by bytes are
/// byte-for-byte identical. Digest collisions within one bucket are
/// therefore split into separate output groups, never merged.
///
/// Aggregation never mutates bucket state, a failed pass can simply be
/// retried on the next indexing run.
pub struct Aggregator<'a> {
    defn: &'a IndexDefn,
    codec: ReduceCodec,

    groups: HashMap<Vec<u8>, usize, CityHasher>,
    order: Vec<Group>,
    cancel: Option<Arc<AtomicBool>>,
}

// In-progress aggregation for one distinct reduce-key value, `accs`
// is aligned with the index definition's field list.
struct Group {
    key: Record,
    accs: Vec<Acc>,
}

#[derive(Clone, Copy, Debug)]
enum Acc {
    // group-by slot, value lives in Group.key.
    Pass,
    Count(i64),
    SumZ(i64),
    SumR(f64),
}

impl Acc {
    fn initial(op: FieldOp) -> Acc {
        match op {
            FieldOp::None => Acc::Pass,
            FieldOp::Count => Acc::Count(0),
            FieldOp::Sum(NumericKind::Integer) => Acc::SumZ(0),
            FieldOp::Sum(NumericKind::Float) => Acc::SumR(0.0),
        }
    }

    // Accumulate one input. An integral accumulation meeting a
    // floating input promotes to floating, never the reverse, so
    // fractional totals are never silently truncated. Pass slots are
    // never accumulated into and Count only ever receives `Z(1)`.
    fn accumulate(self, num: Number) -> Acc {
        match (self, num) {
            (Acc::Count(total), Number::Z(n)) => Acc::Count(total + n),
            (Acc::SumZ(total), Number::Z(n)) => Acc::SumZ(total + n),
            (Acc::SumZ(total), Number::R(r)) => Acc::SumR(total as f64 + r),
            (Acc::SumR(total), Number::Z(n)) => Acc::SumR(total + n as f64),
            (Acc::SumR(total), Number::R(r)) => Acc::SumR(total + r),
            (Acc::Pass, _) | (Acc::Count(_), Number::R(_)) => unreachable!(),
        }
    }
}

impl<'a> Aggregator<'a> {
    pub fn new(defn: &'a IndexDefn) -> Aggregator<'a> {
        Aggregator {
            defn,
            codec: ReduceCodec::new(defn.group_by()),

            groups: HashMap::with_hasher(CityHasher::new()),
            order: Vec::default(),
            cancel: None,
        }
    }

    /// Arm a cancellation token; [Self::add] fails with `Cancelled`
    /// once the token is raised. Relying on the enclosing snapshot's
    /// isolation, an aborted pass leaves no partial output anywhere.
    pub fn set_cancel(&mut self, cancel: Arc<AtomicBool>) -> &mut Self {
        self.cancel = Some(cancel);
        self
    }

    /// Fold one raw payload into the in-progress aggregation.
    ///
    /// A payload that fails to decode, or misses a declared group-by
    /// field, or carries an un-parsable value under a Count or Sum
    /// field, is fatal for the whole reduce pass, it indicates a
    /// map/reduce definition mismatch and is never silently skipped.
    pub fn add(&mut self, payload: &[u8]) -> Result<()> {
        if let Some(cancel) = &self.cancel {
            if cancel.load(Relaxed) {
                err_at!(Cancelled, msg: "aggregation pass aborted by caller")?
            }
        }

        let rec = match Record::from_bytes(payload) {
            Ok(rec) => rec,
            Err(err) => err_at!(Corruption, msg: "undecodable payload: {}", err)?,
        };
        let (_digest, key) = self.codec.build(&rec)?;

        let slot = match self.groups.get(&key) {
            Some(slot) => *slot,
            None => {
                let group = Group {
                    key: rec.project(self.codec.as_group_by())?,
                    accs: self.defn.fields.iter().map(|f| Acc::initial(f.op)).collect(),
                };
                let slot = self.order.len();
                self.order.push(group);
                self.groups.insert(key, slot);
                slot
            }
        };
        let group = &mut self.order[slot];

        for (i, fd) in self.defn.fields.iter().enumerate() {
            match fd.op {
                FieldOp::None => (),
                FieldOp::Count => {
                    if let Some(value) = rec.get(&fd.name) {
                        value.to_number()?;
                        group.accs[i] = group.accs[i].accumulate(Number::Z(1));
                    }
                }
                FieldOp::Sum(_) => match rec.get(&fd.name) {
                    Some(value) => {
                        let num = value.to_number()?;
                        group.accs[i] = group.accs[i].accumulate(num);
                    }
                    None => err_at!(
                        ParseFail,
                        msg: "sum field {:?} missing from payload", fd.name
                    )?,
                },
            }
        }
        Ok(())
    }

    /// Fold a batch of raw payloads, refer [Self::add].
    pub fn add_all<I>(&mut self, payloads: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        for payload in payloads.into_iter() {
            self.add(payload.as_ref())?;
        }
        Ok(())
    }

    /// Emit one output record per distinct reduce-key group, fields in
    /// index-declared order, groups in first-seen order.
    pub fn into_records(self) -> Result<Vec<Record>> {
        let mut recs = Vec::with_capacity(self.order.len());
        for group in self.order.into_iter() {
            let mut fields = Vec::with_capacity(self.defn.fields.len());
            for (i, fd) in self.defn.fields.iter().enumerate() {
                let value = match group.accs[i] {
                    Acc::Pass => match group.key.get(&fd.name) {
                        Some(value) => value.clone(),
                        None => err_at!(Fatal, msg: "group-by field {:?} lost", fd.name)?,
                    },
                    Acc::Count(n) => Scalar::from(n),
                    Acc::SumZ(n) => Scalar::from(n),
                    Acc::SumR(r) => Scalar::from(r),
                };
                fields.push(Field { name: fd.name.clone(), value });
            }
            recs.push(Record { fields });
        }
        Ok(recs)
    }

    /// Number of distinct reduce-key groups seen so far.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
#[path = "aggregate_test.rs"]
mod aggregate_test;
