//! Named record collections.
//!
//! Both containers organize their top-level content as ordered name->value
//! collections: a count, a pointer to an entry table, and per entry a name
//! pointer into the string pool plus a value pointer. Names are unique and
//! non-empty, enforced when an entry is inserted rather than when the dict
//! is serialized.

use ctr_serial::{ReadError, Reader, Record, TaggedRecord, WriteError, Writer};
use serde::{Deserialize, Serialize};

use crate::error::FormatError;

/// Ordered name->value collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dict<T> {
    entries: Vec<(String, T)>,
}

impl<T> Dict<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. Names are the lookup key: empty or duplicate names
    /// are rejected here, at assignment time.
    pub fn insert(&mut self, name: impl Into<String>, value: T) -> Result<(), FormatError> {
        let name = name.into();
        if name.is_empty() {
            return Err(FormatError::EmptyName);
        }
        if self.entries.iter().any(|(n, _)| *n == name) {
            return Err(FormatError::DuplicateName(name));
        }
        self.entries.push((name, value));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    fn entries(&self) -> &[(String, T)] {
        &self.entries
    }
}

impl<T> Default for Dict<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

/// Serialize a dict of plain records.
pub fn write<'v, T: Record>(dict: &'v Dict<T>, w: &mut Writer<'v>) -> Result<(), WriteError> {
    let entries = dict.entries();
    w.deferred(Some(entries.len() as u32), move |w| {
        for (name, value) in entries {
            w.string(name)?;
            w.reference(value)?;
        }
        Ok(())
    })
}

/// Deserialize a dict of plain records.
pub fn read<T: Record>(d: &mut Reader<'_>) -> Result<Dict<T>, ReadError> {
    d.counted(Dict::default(), |d, count| {
        let mut dict = Dict::default();
        for _ in 0..count {
            let at = d.position();
            let name = d.string()?;
            let value = d.reference::<T>()?;
            dict.insert(name, value)
                .map_err(|e| malformed_entry(e, d, at))?;
        }
        Ok(dict)
    })
}

/// Serialize a dict of polymorphic records.
pub fn write_tagged<'v, T: TaggedRecord>(
    dict: &'v Dict<T>,
    w: &mut Writer<'v>,
) -> Result<(), WriteError> {
    let entries = dict.entries();
    w.deferred(Some(entries.len() as u32), move |w| {
        for (name, value) in entries {
            w.string(name)?;
            w.tagged_ref(value)?;
        }
        Ok(())
    })
}

/// Deserialize a dict of polymorphic records.
pub fn read_tagged<T: TaggedRecord>(d: &mut Reader<'_>) -> Result<Dict<T>, ReadError> {
    d.counted(Dict::default(), |d, count| {
        let mut dict = Dict::default();
        for _ in 0..count {
            let at = d.position();
            let name = d.string()?;
            let value = d.tagged_ref::<T>()?;
            dict.insert(name, value)
                .map_err(|e| malformed_entry(e, d, at))?;
        }
        Ok(dict)
    })
}

fn malformed_entry(err: FormatError, d: &Reader<'_>, at: u64) -> ReadError {
    ReadError::Malformed {
        field: d.field(),
        what: match err {
            FormatError::EmptyName => "empty dict entry name",
            _ => "duplicate dict entry name",
        },
        offset: at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_empty_name() {
        let mut dict = Dict::new();
        assert_eq!(dict.insert("", 1u32), Err(FormatError::EmptyName));
    }

    #[test]
    fn insert_rejects_duplicate_name() {
        let mut dict = Dict::new();
        dict.insert("a", 1u32).unwrap();
        assert_eq!(
            dict.insert("a", 2u32),
            Err(FormatError::DuplicateName("a".to_string()))
        );
        assert_eq!(dict.get("a"), Some(&1));
    }

    #[test]
    fn lookup_and_iteration_preserve_insertion_order() {
        let mut dict = Dict::new();
        dict.insert("first", 1u32).unwrap();
        dict.insert("second", 2u32).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get("second"), Some(&2));
        assert!(dict.get("missing").is_none());
        let names: Vec<&str> = dict.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["first", "second"]);
    }
}
