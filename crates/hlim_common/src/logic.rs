//! Three-valued logic bits with truth-table-based operators.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};

/// A single bit in three-valued logic.
///
/// The states map onto the two planes of a [`BitState`](crate::BitState):
/// - `Zero`: defined, value 0
/// - `One`: defined, value 1
/// - `X`: not defined (value plane is ignored)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[repr(u8)]
pub enum Logic {
    /// Logic low (0).
    Zero = 0,
    /// Logic high (1).
    One = 1,
    /// Undefined.
    X = 2,
}

impl Logic {
    /// Converts a character to a [`Logic`] value.
    ///
    /// Accepts '0', '1' and 'x'/'X'.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Logic::Zero),
            '1' => Some(Logic::One),
            'x' | 'X' => Some(Logic::X),
            _ => None,
        }
    }

    /// Builds a bit from its value and defined planes.
    pub fn from_planes(value: bool, defined: bool) -> Self {
        match (defined, value) {
            (false, _) => Logic::X,
            (true, false) => Logic::Zero,
            (true, true) => Logic::One,
        }
    }

    /// Returns `true` unless the bit is `X`.
    pub fn is_defined(self) -> bool {
        self != Logic::X
    }
}

impl From<bool> for Logic {
    fn from(value: bool) -> Self {
        if value {
            Logic::One
        } else {
            Logic::Zero
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Logic::Zero => write!(f, "0"),
            Logic::One => write!(f, "1"),
            Logic::X => write!(f, "X"),
        }
    }
}

/// AND truth table, a defined 0 dominates:
/// ```text
///     0  1  X
/// 0 | 0  0  0
/// 1 | 0  1  X
/// X | 0  X  X
/// ```
impl BitAnd for Logic {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        use Logic::*;
        match (self, rhs) {
            (Zero, _) | (_, Zero) => Zero,
            (One, One) => One,
            _ => X,
        }
    }
}

/// OR truth table, a defined 1 dominates:
/// ```text
///     0  1  X
/// 0 | 0  1  X
/// 1 | 1  1  1
/// X | X  1  X
/// ```
impl BitOr for Logic {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        use Logic::*;
        match (self, rhs) {
            (One, _) | (_, One) => One,
            (Zero, Zero) => Zero,
            _ => X,
        }
    }
}

impl BitXor for Logic {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self {
        use Logic::*;
        match (self, rhs) {
            (Zero, Zero) | (One, One) => Zero,
            (Zero, One) | (One, Zero) => One,
            _ => X,
        }
    }
}

impl Not for Logic {
    type Output = Self;

    fn not(self) -> Self {
        use Logic::*;
        match self {
            Zero => One,
            One => Zero,
            X => X,
        }
    }
}
