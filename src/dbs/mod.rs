//! Data-model shared by the map and reduce phases.
//!
//! The map phase emits [Record] values, an ordered list of named
//! [Scalar] fields. Records serialize to canonical CBOR byte-strings
//! and byte-equality of those strings is the only equality the engine
//! trusts, cosmetic differences (field re-ordering included) are
//! treated as changes.

// trait-defs: Footprint
// type-defs : Scalar, Number, NumericKind, Field, Record

mod record;
mod scalar;

pub use record::{Field, Record, RECORD_VER};
pub use scalar::{Number, NumericKind, Scalar, SCALAR_VER};

use crate::Result;

/// Trait to be implemented by record-types, key-types and value-types.
///
/// This trait is required to compute the memory or storage foot-print
/// for types persisted by the engine.
///
/// **Note: This can be an approximate measure.**
///
pub trait Footprint {
    /// Return the approximate size of the underlying type, when
    /// stored in memory or serialized on storage.
    ///
    /// NOTE: `isize` is used instead of `usize` because of delta computation.
    fn footprint(&self) -> Result<isize>;
}
