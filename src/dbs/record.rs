use cbordata::Cborize;

use std::convert::TryFrom;

use crate::{
    dbs::{Footprint, Scalar},
    util, Error, Result,
};

/// This value must change only when the shape of Record type changes. High 16-bits
/// identify the type and lower 16-bits identify the version.
pub const RECORD_VER: u32 = 0x00020001;

/// Single named field within a [Record].
#[derive(Clone, Debug, PartialEq, Cborize)]
pub struct Field {
    pub name: String,
    pub value: Scalar,
}

impl Field {
    pub const ID: u32 = RECORD_VER;

    pub fn new<V>(name: &str, value: V) -> Field
    where
        V: Into<Scalar>,
    {
        Field { name: name.to_string(), value: value.into() }
    }
}

impl Footprint for Field {
    fn footprint(&self) -> Result<isize> {
        let size = err_at!(FailConvert, isize::try_from(self.name.capacity()))?;
        Ok(size + self.value.footprint()?)
    }
}

/// Record type, an ordered list of named scalar fields.
///
/// Field order is significant, two records carrying the same fields in
/// different order serialize to different byte-strings and hence are
/// different records. The map phase is expected to emit fields in a
/// stable order.
#[derive(Clone, Debug, Default, PartialEq, Cborize)]
pub struct Record {
    pub fields: Vec<Field>,
}

impl Record {
    pub const ID: u32 = RECORD_VER;

    pub fn new() -> Record {
        Record { fields: Vec::default() }
    }

    /// Append a field, no uniqueness check is made, first occurrence
    /// wins on lookup.
    pub fn push<V>(mut self, name: &str, value: V) -> Record
    where
        V: Into<Scalar>,
    {
        self.fields.push(Field::new(name, value));
        self
    }

    /// Return the value for field `name`, first occurrence.
    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Number of fields in this record.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Project `names`, in the order supplied, into a new record.
    /// Missing fields are fatal to the caller's operation, they signal
    /// a map/reduce definition mismatch.
    pub fn project(&self, names: &[String]) -> Result<Record> {
        let mut fields = Vec::with_capacity(names.len());
        for name in names.iter() {
            match self.get(name) {
                Some(value) => fields.push(Field {
                    name: name.clone(),
                    value: value.clone(),
                }),
                None => err_at!(ParseFail, msg: "missing group-by field {:?}", name)?,
            }
        }
        Ok(Record { fields })
    }

    /// Serialize this record into its canonical byte-string.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        util::into_cbor_bytes(self.clone())
    }

    /// Deserialize a record from its canonical byte-string.
    pub fn from_bytes(data: &[u8]) -> Result<Record> {
        let (rec, _) = util::from_cbor_bytes(data)?;
        Ok(rec)
    }
}

impl Footprint for Record {
    fn footprint(&self) -> Result<isize> {
        use std::mem::size_of;

        let mut size = err_at!(FailConvert, isize::try_from(size_of::<Record>()))?;
        for field in self.fields.iter() {
            size += field.footprint()?;
        }
        Ok(size)
    }
}

#[cfg(test)]
#[path = "record_test.rs"]
mod record_test;
