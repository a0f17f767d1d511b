//! Two-plane bit vectors holding signal values in three-valued logic.
//!
//! A [`BitState`] stores a VALUE plane and a DEFINED plane of equal length,
//! packed 64 bits per word. A bit whose DEFINED flag is clear is undefined
//! ("X") and its VALUE bit carries no meaning. The simulator keeps one large
//! `BitState` for the whole circuit and addresses each node's slots as
//! sub-ranges of it.

use crate::logic::Logic;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bits per storage word.
pub const WORD_BITS: usize = 64;

/// Selects one of the two planes of a [`BitState`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Plane {
    /// The bit values.
    Value = 0,
    /// Whether each bit is defined.
    Defined = 1,
}

/// Returns a mask with the low `len` bits set.
pub fn low_mask(len: usize) -> u64 {
    if len >= WORD_BITS {
        u64::MAX
    } else {
        (1u64 << len) - 1
    }
}

/// Returns `true` if `offset..offset + len` fits inside a single storage word.
pub fn is_non_straddling(offset: usize, len: usize) -> bool {
    len <= WORD_BITS && (len == 0 || offset / WORD_BITS == (offset + len - 1) / WORD_BITS)
}

/// A vector of three-valued bits stored as VALUE and DEFINED planes.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BitState {
    size: usize,
    planes: [Vec<u64>; 2],
}

fn word_count(size: usize) -> usize {
    size.div_ceil(WORD_BITS)
}

impl BitState {
    /// Creates a state of `size` bits, all undefined.
    pub fn new(size: usize) -> Self {
        let words = word_count(size);
        Self {
            size,
            planes: [vec![0; words], vec![0; words]],
        }
    }

    /// Creates a state of `size` bits, all undefined.
    pub fn undefined(size: usize) -> Self {
        Self::new(size)
    }

    /// Creates a fully defined state holding the low `width` bits of `value`.
    ///
    /// Bits at index 64 and above are defined zeros.
    pub fn from_u64(value: u64, width: usize) -> Self {
        let mut s = Self::new(width);
        s.set_range(Plane::Defined, 0, width, true);
        let low = width.min(WORD_BITS);
        s.insert_non_straddling(Plane::Value, 0, low, value);
        s
    }

    /// Creates a single defined bit.
    pub fn from_bool(value: bool) -> Self {
        Self::from_u64(u64::from(value), 1)
    }

    /// Parses a string like `"10X1"`, most significant bit first.
    ///
    /// Returns `None` if the string contains characters other than `0`, `1`, `x` and `X`.
    pub fn from_binary_str(s: &str) -> Option<Self> {
        let mut state = Self::new(s.chars().count());
        for (i, c) in s.chars().rev().enumerate() {
            state.set_logic(i, Logic::from_char(c)?);
        }
        Some(state)
    }

    /// Returns the number of bits.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns `true` if the state holds no bits.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Changes the number of bits. New bits are undefined.
    pub fn resize(&mut self, size: usize) {
        let old = self.size;
        let words = word_count(size);
        for plane in &mut self.planes {
            plane.resize(words, 0);
        }
        self.size = size;
        if size > old {
            self.clear_range(Plane::Value, old, size - old);
            self.clear_range(Plane::Defined, old, size - old);
        } else if size % WORD_BITS != 0 {
            // Keep bits past the end zeroed so derived equality stays exact.
            let keep = low_mask(size % WORD_BITS);
            for plane in &mut self.planes {
                if let Some(last) = plane.last_mut() {
                    *last &= keep;
                }
            }
        }
    }

    /// Resets every bit to undefined.
    pub fn clear(&mut self) {
        for plane in &mut self.planes {
            plane.iter_mut().for_each(|w| *w = 0);
        }
    }

    fn check_range(&self, offset: usize, len: usize) {
        assert!(
            offset + len <= self.size,
            "range {offset}..{} out of bounds for size {}",
            offset + len,
            self.size
        );
    }

    /// Reads one bit of a plane.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.size()`.
    pub fn get(&self, plane: Plane, index: usize) -> bool {
        self.check_range(index, 1);
        (self.planes[plane as usize][index / WORD_BITS] >> (index % WORD_BITS)) & 1 != 0
    }

    /// Writes one bit of a plane.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.size()`.
    pub fn set(&mut self, plane: Plane, index: usize, bit: bool) {
        self.check_range(index, 1);
        let word = &mut self.planes[plane as usize][index / WORD_BITS];
        let mask = 1u64 << (index % WORD_BITS);
        if bit {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    /// Reads one bit as a [`Logic`] value.
    pub fn get_logic(&self, index: usize) -> Logic {
        Logic::from_planes(self.get(Plane::Value, index), self.get(Plane::Defined, index))
    }

    /// Writes one bit from a [`Logic`] value.
    pub fn set_logic(&mut self, index: usize, value: Logic) {
        self.set(Plane::Defined, index, value.is_defined());
        self.set(Plane::Value, index, value == Logic::One);
    }

    /// Sets `len` bits of a plane starting at `offset` to `bit`.
    pub fn set_range(&mut self, plane: Plane, offset: usize, len: usize, bit: bool) {
        self.check_range(offset, len);
        let data = &mut self.planes[plane as usize];
        let mut pos = offset;
        let end = offset + len;
        while pos < end {
            let shift = pos % WORD_BITS;
            let chunk = (WORD_BITS - shift).min(end - pos);
            let mask = low_mask(chunk) << shift;
            let word = &mut data[pos / WORD_BITS];
            if bit {
                *word |= mask;
            } else {
                *word &= !mask;
            }
            pos += chunk;
        }
    }

    /// Clears `len` bits of a plane starting at `offset`.
    pub fn clear_range(&mut self, plane: Plane, offset: usize, len: usize) {
        self.set_range(plane, offset, len, false);
    }

    /// Reads up to 64 bits that lie within a single storage word.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the range crosses a word boundary.
    pub fn extract_non_straddling(&self, plane: Plane, offset: usize, len: usize) -> u64 {
        debug_assert!(is_non_straddling(offset, len), "straddling range {offset}+{len}");
        if len == 0 {
            return 0;
        }
        self.check_range(offset, len);
        (self.planes[plane as usize][offset / WORD_BITS] >> (offset % WORD_BITS)) & low_mask(len)
    }

    /// Writes up to 64 bits that lie within a single storage word.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the range crosses a word boundary.
    pub fn insert_non_straddling(&mut self, plane: Plane, offset: usize, len: usize, value: u64) {
        debug_assert!(is_non_straddling(offset, len), "straddling range {offset}+{len}");
        if len == 0 {
            return;
        }
        self.check_range(offset, len);
        let shift = offset % WORD_BITS;
        let mask = low_mask(len) << shift;
        let word = &mut self.planes[plane as usize][offset / WORD_BITS];
        *word = (*word & !mask) | ((value << shift) & mask);
    }

    /// Reads up to 64 bits at any alignment.
    pub fn extract(&self, plane: Plane, offset: usize, len: usize) -> u64 {
        assert!(len <= WORD_BITS, "extract of {len} bits exceeds one word");
        if len == 0 {
            return 0;
        }
        self.check_range(offset, len);
        let data = &self.planes[plane as usize];
        let word = offset / WORD_BITS;
        let shift = offset % WORD_BITS;
        let mut value = data[word] >> shift;
        if shift + len > WORD_BITS {
            value |= data[word + 1] << (WORD_BITS - shift);
        }
        value & low_mask(len)
    }

    /// Writes up to 64 bits at any alignment.
    pub fn insert(&mut self, plane: Plane, offset: usize, len: usize, value: u64) {
        assert!(len <= WORD_BITS, "insert of {len} bits exceeds one word");
        if len == 0 {
            return;
        }
        self.check_range(offset, len);
        let data = &mut self.planes[plane as usize];
        let word = offset / WORD_BITS;
        let shift = offset % WORD_BITS;
        let mask = low_mask(len);
        let value = value & mask;
        data[word] = (data[word] & !(mask << shift)) | (value << shift);
        if shift + len > WORD_BITS {
            let low_bits = WORD_BITS - shift;
            data[word + 1] = (data[word + 1] & !(mask >> low_bits)) | (value >> low_bits);
        }
    }

    /// Copies `len` bits of both planes from `src` into `self`.
    pub fn copy_range(&mut self, dst_offset: usize, src: &BitState, src_offset: usize, len: usize) {
        let mut done = 0;
        while done < len {
            let chunk = (len - done).min(WORD_BITS);
            for plane in [Plane::Value, Plane::Defined] {
                let bits = src.extract(plane, src_offset + done, chunk);
                self.insert(plane, dst_offset + done, chunk, bits);
            }
            done += chunk;
        }
    }

    /// Copies `len` bits of both planes within `self`. The ranges must not overlap.
    pub fn copy_within(&mut self, dst_offset: usize, src_offset: usize, len: usize) {
        debug_assert!(
            dst_offset + len <= src_offset || src_offset + len <= dst_offset || dst_offset == src_offset,
            "overlapping copy"
        );
        let mut done = 0;
        while done < len {
            let chunk = (len - done).min(WORD_BITS);
            for plane in [Plane::Value, Plane::Defined] {
                let bits = self.extract(plane, src_offset + done, chunk);
                self.insert(plane, dst_offset + done, chunk, bits);
            }
            done += chunk;
        }
    }

    /// Returns a copy of `len` bits starting at `offset`.
    pub fn extract_state(&self, offset: usize, len: usize) -> BitState {
        let mut out = BitState::new(len);
        out.copy_range(0, self, offset, len);
        out
    }

    /// Overwrites the bits starting at `offset` with the whole of `src`.
    pub fn insert_state(&mut self, offset: usize, src: &BitState) {
        self.copy_range(offset, src, 0, src.size());
    }

    /// Returns `true` if every bit of the range is defined.
    pub fn all_defined(&self, offset: usize, len: usize) -> bool {
        let mut done = 0;
        while done < len {
            let chunk = (len - done).min(WORD_BITS);
            if self.extract(Plane::Defined, offset + done, chunk) != low_mask(chunk) {
                return false;
            }
            done += chunk;
        }
        true
    }

    /// Returns `true` if at least one bit of the range is defined.
    pub fn any_defined(&self, offset: usize, len: usize) -> bool {
        let mut done = 0;
        while done < len {
            let chunk = (len - done).min(WORD_BITS);
            if self.extract(Plane::Defined, offset + done, chunk) != 0 {
                return true;
            }
            done += chunk;
        }
        false
    }

    /// Compares two ranges bit by bit in three-valued logic.
    ///
    /// Undefined bits only match undefined bits; their value plane is ignored.
    pub fn equal_range(&self, offset: usize, other: &BitState, other_offset: usize, len: usize) -> bool {
        let mut done = 0;
        while done < len {
            let chunk = (len - done).min(WORD_BITS);
            let def_a = self.extract(Plane::Defined, offset + done, chunk);
            let def_b = other.extract(Plane::Defined, other_offset + done, chunk);
            if def_a != def_b {
                return false;
            }
            let val_a = self.extract(Plane::Value, offset + done, chunk);
            let val_b = other.extract(Plane::Value, other_offset + done, chunk);
            if (val_a ^ val_b) & def_a != 0 {
                return false;
            }
            done += chunk;
        }
        true
    }

    /// Converts the whole state to a `u64` if it is fully defined and at most 64 bits wide.
    pub fn to_u64(&self) -> Option<u64> {
        if self.size > WORD_BITS || !self.all_defined(0, self.size) {
            return None;
        }
        Some(self.extract(Plane::Value, 0, self.size))
    }
}

impl fmt::Display for BitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..self.size).rev() {
            write!(f, "{}", self.get_logic(i))?;
        }
        Ok(())
    }
}

impl fmt::Debug for BitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitState({self})")
    }
}
