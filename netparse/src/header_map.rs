// SPDX-License-Identifier: Apache-2.0

//! Case-insensitive, multi-valued header storage used by HTTP header capture.

use alloc::vec::Vec;

use crate::parse_error::ParseError;

const SEPARATOR: &[u8] = b": ";
const CRLF: &[u8] = b"\r\n";

/// All values recorded under one header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    name: Vec<u8>,
    values: Vec<Vec<u8>>,
}

impl HeaderEntry {
    /// Name as it was first inserted.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn values(&self) -> impl Iterator<Item = &[u8]> {
        self.values.iter().map(Vec::as_slice)
    }

    pub fn value(&self, idx: usize) -> Option<&[u8]> {
        self.values.get(idx).map(Vec::as_slice)
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    fn line_len(&self, value: &[u8]) -> usize {
        self.name.len() + SEPARATOR.len() + value.len() + CRLF.len()
    }
}

/// Ordered map from header name to values.
///
/// Names compare ASCII case-insensitively. Entries keep the order in which
/// their name was first seen, and values keep insertion order within an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<HeaderEntry>,
    encoded_len: usize,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` under `name`, creating the entry if needed.
    pub fn put(&mut self, name: &[u8], value: &[u8]) -> Result<(), ParseError> {
        let value = copy_bytes(value)?;
        let idx = match self.position(name) {
            Some(idx) => idx,
            None => {
                self.entries.try_reserve(1).map_err(|_| ParseError::System)?;
                self.entries.push(HeaderEntry {
                    name: copy_bytes(name)?,
                    values: Vec::new(),
                });
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[idx];
        entry.values.try_reserve(1).map_err(|_| ParseError::System)?;
        self.encoded_len += entry.line_len(&value);
        entry.values.push(value);
        Ok(())
    }

    pub fn get(&self, name: &[u8]) -> Option<&HeaderEntry> {
        self.position(name).map(|idx| &self.entries[idx])
    }

    /// Removes every value stored under `name`.
    pub fn del(&mut self, name: &[u8]) -> bool {
        let Some(idx) = self.position(name) else {
            return false;
        };
        let entry = self.entries.remove(idx);
        for value in entry.values() {
            self.encoded_len -= entry.line_len(value);
        }
        true
    }

    /// Removes all entries but keeps the allocation.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.encoded_len = 0;
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.entries.iter()
    }

    /// Bytes [`HeaderMap::encode`] will write.
    pub fn encoded_len(&self) -> usize {
        self.encoded_len
    }

    /// Appends every value as a `Name: value\r\n` line, returning bytes written.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<usize, ParseError> {
        out.try_reserve(self.encoded_len)
            .map_err(|_| ParseError::System)?;
        let start = out.len();
        for entry in &self.entries {
            for value in entry.values() {
                out.extend_from_slice(&entry.name);
                out.extend_from_slice(SEPARATOR);
                out.extend_from_slice(value);
                out.extend_from_slice(CRLF);
            }
        }
        Ok(out.len() - start)
    }

    fn position(&self, name: &[u8]) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.name.eq_ignore_ascii_case(name))
    }
}

impl<'a> IntoIterator for &'a HeaderMap {
    type Item = &'a HeaderEntry;
    type IntoIter = core::slice::Iter<'a, HeaderEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// One `Name: value` line per value, non-printable bytes escaped.
impl core::fmt::Display for HeaderMap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for entry in &self.entries {
            for value in entry.values() {
                writeln!(f, "{}: {}", entry.name.escape_ascii(), value.escape_ascii())?;
            }
        }
        Ok(())
    }
}

fn copy_bytes(src: &[u8]) -> Result<Vec<u8>, ParseError> {
    let mut out = Vec::new();
    out.try_reserve_exact(src.len())
        .map_err(|_| ParseError::System)?;
    out.extend_from_slice(src);
    Ok(out)
}
