use crate::{dbs, hash, util, Result};

/// Reduce-key codec, derives the bucketing digest and the canonical
/// byte representation of a record's group-by values.
///
/// The digest is stable across runs and processes, no randomized
/// seeding is involved. Two records carrying identical group-by values
/// (field-by-field, in index-declared order) digest identically; the
/// converse need not hold, collisions are permitted and resolved at
/// aggregation time by exact byte comparison of the canonical
/// representation.
///
/// One codec is constructed per batch and re-used for every mapped
/// document via [Self::reset], retaining working buffers across
/// documents.
pub struct ReduceCodec {
    group_by: Vec<String>,
    buf: Vec<u8>,
}

impl ReduceCodec {
    pub fn new(group_by: Vec<String>) -> ReduceCodec {
        ReduceCodec { group_by, buf: Vec::default() }
    }

    /// Make this codec ready for the next document, working buffers
    /// keep their capacity.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Compute `(digest, canonical-bytes)` for `rec`'s group-by
    /// values. A record missing one of the group-by fields is a
    /// map/reduce definition mismatch and fails with `ParseFail`.
    pub fn build(&mut self, rec: &dbs::Record) -> Result<(u64, Vec<u8>)> {
        self.buf.clear();
        let sub = rec.project(&self.group_by)?;
        util::into_cbor_buf(sub, &mut self.buf)?;
        let digest = hash::digest64(&self.buf);
        Ok((digest, self.buf.clone()))
    }

    /// Group-by field names, in index-declared order.
    pub fn as_group_by(&self) -> &[String] {
        &self.group_by
    }
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod codec_test;
