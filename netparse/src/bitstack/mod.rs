// SPDX-License-Identifier: Apache-2.0

use core::cmp::PartialEq;
use core::ops::{BitAnd, BitOr, Shl, Shr};

use crate::parse_error::ParseError;

/// Trait for bit stacks.
///
/// NOTE: BitStack implementations do NOT implement depth tracking.
/// [`BoundedBitStack`] adds that on top.
pub trait BitStack {
    /// Returns a default-initialized bit stack.
    fn default() -> Self;
    /// Pushes a bit (true for 1, false for 0) onto the stack.
    fn push(&mut self, bit: bool);
    /// Pops the top bit off the stack.
    fn pop(&mut self) -> bool;
    /// Returns the top bit without removing it.
    fn top(&self) -> bool;
    /// Number of bits the storage can hold.
    fn bits() -> usize;
}

/// Automatic implementation for builtin unsigned integers ( u8, u32, u64 etc ).
impl<T> BitStack for T
where
    T: Shl<u8, Output = T>
        + Shr<u8, Output = T>
        + BitAnd<T, Output = T>
        + BitOr<Output = T>
        + PartialEq
        + Clone,
    T: From<u8>,
{
    fn default() -> Self {
        T::from(0)
    }
    fn push(&mut self, bit: bool) {
        *self = (self.clone() << 1u8) | T::from(bit as u8);
    }

    fn pop(&mut self) -> bool {
        let bit = (self.clone() & T::from(1)) != T::from(0);
        *self = self.clone() >> 1u8;
        bit
    }

    fn top(&self) -> bool {
        (self.clone() & T::from(1)) != T::from(0)
    }

    fn bits() -> usize {
        core::mem::size_of::<T>() * 8
    }
}

/// One bit per nesting level with an explicit capacity.
///
/// Pushing past `CAP` levels fails with [`ParseError::Stack`] instead of
/// silently dropping the oldest bit. `CAP` must not exceed `B::bits()`.
#[derive(Debug, Clone)]
pub struct BoundedBitStack<B: BitStack, const CAP: usize> {
    bits: B,
    depth: usize,
}

impl<B: BitStack, const CAP: usize> BoundedBitStack<B, CAP> {
    pub fn new() -> Self {
        debug_assert!(CAP <= B::bits());
        Self {
            bits: B::default(),
            depth: 0,
        }
    }

    pub fn push(&mut self, bit: bool) -> Result<(), ParseError> {
        if self.depth >= CAP {
            return Err(ParseError::Stack);
        }
        self.bits.push(bit);
        self.depth += 1;
        Ok(())
    }

    /// Pops the top level if it holds `bit`.
    ///
    /// Returns false and leaves the stack untouched when empty or mismatched.
    pub fn pop_if(&mut self, bit: bool) -> bool {
        if self.top() != Some(bit) {
            return false;
        }
        self.bits.pop();
        self.depth -= 1;
        true
    }

    pub fn top(&self) -> Option<bool> {
        if self.depth == 0 {
            return None;
        }
        Some(self.bits.top())
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    pub fn clear(&mut self) {
        self.bits = B::default();
        self.depth = 0;
    }
}

impl<B: BitStack, const CAP: usize> Default for BoundedBitStack<B, CAP> {
    fn default() -> Self {
        Self::new()
    }
}
