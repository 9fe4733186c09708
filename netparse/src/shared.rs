// SPDX-License-Identifier: Apache-2.0

//! Pieces shared by every parser: the per-call outcome and byte-class scanning.

/// Outcome of one successful `next` call.
///
/// Counts are always relative to the buffer passed to *that* call. Bytes
/// reported as consumed must not be presented again; after [`Step::Pending`]
/// the caller presents the same bytes again with more appended.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<E> {
    /// A token completed. The caller discards `.0` bytes and handles `.1`.
    Ready(usize, E),
    /// Bytes were absorbed without producing an event.
    Skip(usize),
    /// No complete token yet. Nothing may be discarded.
    Pending,
}

impl<E> Step<E> {
    /// Number of bytes the caller can discard.
    pub fn consumed(&self) -> usize {
        match self {
            Step::Ready(n, _) | Step::Skip(n) => *n,
            Step::Pending => 0,
        }
    }

    /// The completed event, if this call produced one.
    pub fn event(&self) -> Option<&E> {
        match self {
            Step::Ready(_, event) => Some(event),
            _ => None,
        }
    }

    /// Consumes the step, yielding the event.
    pub fn into_event(self) -> Option<E> {
        match self {
            Step::Ready(_, event) => Some(event),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Step::Pending)
    }
}

/// Membership table for one byte class.
pub(crate) type ByteClass = [bool; 256];

/// Builds a class from inclusive byte ranges.
pub(crate) const fn byte_class(ranges: &[(u8, u8)]) -> ByteClass {
    let mut table = [false; 256];
    let mut r = 0;
    while r < ranges.len() {
        let (lo, hi) = ranges[r];
        let mut b = lo as usize;
        while b <= hi as usize {
            table[b] = true;
            b += 1;
        }
        r += 1;
    }
    table
}

/// Returns the index of the first byte at or after `from` that is outside `class`.
pub(crate) fn scan_class(buf: &[u8], from: usize, class: &ByteClass) -> Option<usize> {
    buf.get(from..)?
        .iter()
        .position(|&b| !class[b as usize])
        .map(|i| from + i)
}

/// Returns the index of the first byte at or after `from` that is inside `class`.
pub(crate) fn find_class(buf: &[u8], from: usize, class: &ByteClass) -> Option<usize> {
    buf.get(from..)?
        .iter()
        .position(|&b| class[b as usize])
        .map(|i| from + i)
}
