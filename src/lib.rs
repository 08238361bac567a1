//! Mrix implement incremental map-reduce indexing for document
//! databases. Auto-generated map-reduce indexes are kept consistent
//! with a mutating document collection without ever re-computing an
//! index from scratch.
//!
//! For every indexing batch the engine shall, (a) accept the map-phase
//! output for changed documents, (b) diff that output against the
//! results previously attributed to each document, (c) bucket live
//! map-results by a reduce-key digest into storage whose representation
//! adapts to bucket size and, (d) fold whole buckets into reduced
//! output records using per-field operations. All of it within a
//! single write-transaction, so that a crash mid-batch leaves
//! previously committed batches intact.
//!
//! Every live map-result is attributed with a monotonically increasing
//! `id`, scoped to the index and never re-used. For every live
//! map-result there shall be exactly one ledger entry carrying its
//! `id` and exactly one payload stored in the bucket named by its
//! reduce-key digest, and vice-versa.
//!
//! Organisation of modules:
//!
//! * [dbs], data-model shared by the map and reduce phases, refer to
//!   [dbs::Record], [dbs::Scalar].
//! * [tss], in-memory reference implementation of the transactional
//!   tree-store substrate, snapshot-isolated with a single-writer.
//! * [mri], the indexing engine proper, ledger, results-store, writer
//!   and aggregator, driven via [mri::Index] and [mri::Batch].

use std::{error, fmt, result};

/// Short form to compose Error values.
///
/// Here are few possible ways,
///
/// ```ignore
/// use mrix::Error;
/// err_at!(ParseFail, msg: "bad argument");
/// ```
///
/// ```ignore
/// use mrix::Error;
/// err_at!(FailCbor, Cbor::decode(&mut buf));
/// ```
///
/// ```ignore
/// use mrix::Error;
/// err_at!(FailCbor, Cbor::decode(&mut buf), "bucket {}", hash);
/// ```
macro_rules! err_at {
    ($v:ident, msg: $($arg:expr),+) => {{
        let prefix = format!("{}:{}", file!(), line!());
        Err(Error::$v(prefix, format!($($arg),+)))
    }};
    ($v:ident, $e:expr) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                Err(Error::$v(prefix, format!("{}", err)))
            }
        }
    }};
    ($v:ident, $e:expr, $($arg:expr),+) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                let msg = format!($($arg),+);
                Err(Error::$v(prefix, format!("{} {}", err, msg)))
            }
        }
    }};
}

pub mod dbs;
mod hash;
pub mod mri;
pub mod tss;
pub mod util;

pub use crate::hash::CityHasher;

/// Type alias for Result return type, used by this package.
pub type Result<T> = result::Result<T, Error>;

/// Error variants that can be returned by this package's API.
///
/// Each variant carries a prefix, typically identifying the
/// error location, and a message.
pub enum Error {
    /// Inconsistency within the package, typically a bug.
    Fatal(String, String),
    /// Numeric conversion failed.
    FailConvert(String, String),
    /// CBOR encoding or decoding failed.
    FailCbor(String, String),
    /// Index definition is invalid, raised at index-creation time.
    InvalidDefn(String, String),
    /// Supplied argument is not acceptable.
    InvalidInput(String, String),
    /// Requested key is missing from a tree or bucket.
    KeyNotFound(String, String),
    /// Persisted record failed to decode, or the ledger/bucket
    /// bijection is broken.
    Corruption(String, String),
    /// A field value could not be read as required by its declared
    /// aggregation operation.
    ParseFail(String, String),
    /// Aggregation was aborted by the caller's cancellation token.
    Cancelled(String, String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        use Error::*;

        match self {
            Fatal(p, msg) => write!(f, "{} Fatal: {}", p, msg),
            FailConvert(p, msg) => write!(f, "{} FailConvert: {}", p, msg),
            FailCbor(p, msg) => write!(f, "{} FailCbor: {}", p, msg),
            InvalidDefn(p, msg) => write!(f, "{} InvalidDefn: {}", p, msg),
            InvalidInput(p, msg) => write!(f, "{} InvalidInput: {}", p, msg),
            KeyNotFound(p, msg) => write!(f, "{} KeyNotFound: {}", p, msg),
            Corruption(p, msg) => write!(f, "{} Corruption: {}", p, msg),
            ParseFail(p, msg) => write!(f, "{} ParseFail: {}", p, msg),
            Cancelled(p, msg) => write!(f, "{} Cancelled: {}", p, msg),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "{}", self)
    }
}

impl error::Error for Error {}
