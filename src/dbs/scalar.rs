use cbordata::Cborize;

use std::{convert::TryFrom, fmt, result};

use crate::{dbs::Footprint, Error, Result};

/// This value must change only when the shape of Scalar type changes. High 16-bits
/// identify the type and lower 16-bits identify the version.
pub const SCALAR_VER: u32 = 0x00010001;

/// Scalar value held by a single field within a [Record][crate::dbs::Record].
///
/// Variants are terse, `B`oolean, `I`nteger, `F`loat, `T`ext and
/// b`Y`tes. Applications typically construct scalars via the `From`
/// implementations.
#[derive(Clone, Debug, PartialEq, Cborize)]
pub enum Scalar {
    B { value: bool },
    I { value: i64 },
    F { value: f64 },
    T { value: String },
    Y { value: Vec<u8> },
}

impl Scalar {
    pub const ID: u32 = SCALAR_VER;

    /// Classify this scalar as a [Number], applying the same
    /// numeric-parse rule for all phases: native integers stay
    /// integral, native floats stay floating, text is parsed first as
    /// integer and then as float. Everything else is a parse failure.
    pub fn to_number(&self) -> Result<Number> {
        match self {
            Scalar::I { value } => Ok(Number::Z(*value)),
            Scalar::F { value } => Ok(Number::R(*value)),
            Scalar::T { value } => match value.parse::<i64>() {
                Ok(n) => Ok(Number::Z(n)),
                Err(_) => match value.parse::<f64>() {
                    Ok(f) => Ok(Number::R(f)),
                    Err(_) => err_at!(ParseFail, msg: "not a number {:?}", value),
                },
            },
            val => err_at!(ParseFail, msg: "not a number {:?}", val),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match self {
            Scalar::B { value } => write!(f, "{}", value),
            Scalar::I { value } => write!(f, "{}", value),
            Scalar::F { value } => write!(f, "{}", value),
            Scalar::T { value } => write!(f, "{:?}", value),
            Scalar::Y { value } => write!(f, "0x{}", hexstring(value)),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Scalar {
        Scalar::B { value }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Scalar {
        Scalar::I { value }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Scalar {
        Scalar::F { value }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Scalar {
        Scalar::T { value: value.to_string() }
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Scalar {
        Scalar::T { value }
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(value: Vec<u8>) -> Scalar {
        Scalar::Y { value }
    }
}

impl Footprint for Scalar {
    fn footprint(&self) -> Result<isize> {
        use std::mem::size_of;

        let size = size_of::<Scalar>()
            + match self {
                Scalar::T { value } => value.capacity(),
                Scalar::Y { value } => value.capacity(),
                _ => 0,
            };
        err_at!(FailConvert, isize::try_from(size))
    }
}

impl<'a> arbitrary::Arbitrary<'a> for Scalar {
    fn arbitrary(u: &mut arbitrary::Unstructured) -> arbitrary::Result<Self> {
        let val = match u.arbitrary::<u8>()? % 5 {
            0 => Scalar::from(u.arbitrary::<bool>()?),
            1 => Scalar::from(u.arbitrary::<i64>()?),
            2 => Scalar::from(f64::from(u.arbitrary::<i32>()?)),
            3 => Scalar::from(u.arbitrary::<String>()?),
            _ => Scalar::from(u.arbitrary::<Vec<u8>>()?),
        };
        Ok(val)
    }
}

/// Numeric classification of a [Scalar], outcome of the numeric-parse rule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    /// Integral number.
    Z(i64),
    /// Floating number.
    R(f64),
}

/// Declared numeric kind for a Sum field, fixes the accumulator type
/// for that field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NumericKind {
    /// Integral accumulation.
    Integer,
    /// Floating accumulation.
    Float,
}

fn hexstring(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
#[path = "scalar_test.rs"]
mod scalar_test;
