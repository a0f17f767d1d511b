//! Logic, comparison, arithmetic and shift nodes.

use super::{NodeBehavior, NodeIo};
use crate::program::Slot;
use hlim_common::{BitState, Logic, Plane, WORD_BITS};
use hlim_ir::{ArithmeticOp, CompareOp, LogicOp, NodeKind, ShiftDirection, ShiftFill};
use std::cmp::Ordering;

fn read(state: &BitState, slot: Slot, at: usize, len: usize) -> (u64, u64) {
    (
        state.extract(Plane::Value, slot.offset + at, len),
        state.extract(Plane::Defined, slot.offset + at, len),
    )
}

/// Both operands, if connected and fully defined.
fn defined_operands(io: &NodeIo<'_>) -> Option<(Slot, Slot)> {
    if io.input_defined(0) && io.input_defined(1) {
        Some((io.input(0)?, io.input(1)?))
    } else {
        None
    }
}

/// Bitwise logic. AND, OR and their negations let a defined dominant bit
/// decide the result; XOR, EQ and NOT need every operand bit defined.
pub struct LogicEval;

impl NodeBehavior for LogicEval {
    fn evaluate(&self, io: &mut NodeIo<'_>) {
        let NodeKind::Logic(op) = *io.node.kind() else {
            return;
        };
        let out = io.output(0);
        let a = io.input(0);
        let b = if op == LogicOp::Not { a } else { io.input(1) };
        let (Some(a), Some(b)) = (a, b) else {
            io.set_undefined(out);
            return;
        };
        if matches!(op, LogicOp::Xor | LogicOp::Eq | LogicOp::Not)
            && !(io.state.all_defined(a.offset, a.width) && io.state.all_defined(b.offset, b.width))
        {
            io.set_undefined(out);
            return;
        }
        let mut done = 0;
        while done < out.width {
            let len = (out.width - done).min(WORD_BITS);
            let (va, da) = read(io.state, a, done, len);
            let (vb, db) = read(io.state, b, done, len);
            let and_defined = (da & db) | (da & !va) | (db & !vb);
            let or_defined = (da & db) | (da & va) | (db & vb);
            let (value, defined) = match op {
                LogicOp::And => (va & vb, and_defined),
                LogicOp::Nand => (!(va & vb), and_defined),
                LogicOp::Or => (va | vb, or_defined),
                LogicOp::Nor => (!(va | vb), or_defined),
                LogicOp::Xor => (va ^ vb, da & db),
                LogicOp::Eq => (!(va ^ vb), da & db),
                LogicOp::Not => (!va, da),
            };
            io.state.insert(Plane::Value, out.offset + done, len, value & defined);
            io.state.insert(Plane::Defined, out.offset + done, len, defined);
            done += len;
        }
    }
}

/// Unsigned comparison of equal-width operands, most significant word first.
fn compare_words(state: &BitState, a: Slot, b: Slot) -> Ordering {
    let words = a.width.div_ceil(WORD_BITS);
    for k in (0..words).rev() {
        let at = k * WORD_BITS;
        let len = (a.width - at).min(WORD_BITS);
        let x = state.extract(Plane::Value, a.offset + at, len);
        let y = state.extract(Plane::Value, b.offset + at, len);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Comparison. Any undefined operand bit makes the result undefined.
pub struct CompareEval;

impl NodeBehavior for CompareEval {
    fn evaluate(&self, io: &mut NodeIo<'_>) {
        let NodeKind::Compare(op) = *io.node.kind() else {
            return;
        };
        let out = io.output(0);
        let Some((a, b)) = defined_operands(io) else {
            io.set_undefined(out);
            return;
        };
        let ord = compare_words(io.state, a, b);
        let result = match op {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Neq => ord != Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Leq => ord != Ordering::Greater,
            CompareOp::Geq => ord != Ordering::Less,
        };
        io.write_u64(out, u64::from(result));
    }
}

/// Wrapping arithmetic. Undefined operands and division by zero yield X.
pub struct ArithmeticEval;

impl NodeBehavior for ArithmeticEval {
    fn evaluate(&self, io: &mut NodeIo<'_>) {
        let NodeKind::Arithmetic(op) = *io.node.kind() else {
            return;
        };
        let out = io.output(0);
        let Some((a, b)) = defined_operands(io) else {
            io.set_undefined(out);
            return;
        };
        match op {
            ArithmeticOp::Add | ArithmeticOp::Sub => {
                let mut carry = false;
                let mut done = 0;
                while done < out.width {
                    let len = (out.width - done).min(WORD_BITS);
                    let x = io.state.extract(Plane::Value, a.offset + done, len);
                    let y = io.state.extract(Plane::Value, b.offset + done, len);
                    let (value, c1, c2) = if op == ArithmeticOp::Add {
                        let (s, c1) = x.overflowing_add(y);
                        let (s, c2) = s.overflowing_add(u64::from(carry));
                        (s, c1, c2)
                    } else {
                        let (d, c1) = x.overflowing_sub(y);
                        let (d, c2) = d.overflowing_sub(u64::from(carry));
                        (d, c1, c2)
                    };
                    carry = c1 || c2;
                    io.state.insert(Plane::Value, out.offset + done, len, value);
                    done += len;
                }
                io.state.set_range(Plane::Defined, out.offset, out.width, true);
            }
            ArithmeticOp::Mul | ArithmeticOp::Div | ArithmeticOp::Rem => {
                let x = io.state.extract(Plane::Value, a.offset, a.width);
                let y = io.state.extract(Plane::Value, b.offset, b.width);
                let value = match op {
                    ArithmeticOp::Mul => Some(x.wrapping_mul(y)),
                    ArithmeticOp::Div => x.checked_div(y),
                    _ => x.checked_rem(y),
                };
                match value {
                    Some(v) => io.write_u64(out, v),
                    None => io.set_undefined(out),
                }
            }
        }
    }
}

/// Index of the operand bit that lands at output bit `i`, `None` for fill bits.
fn shift_source(i: usize, amount: u64, width: usize, direction: ShiftDirection, rotate: bool) -> Option<usize> {
    if rotate {
        let r = (amount % width as u64) as usize;
        return Some(match direction {
            ShiftDirection::Left => (i + width - r) % width,
            ShiftDirection::Right => (i + r) % width,
        });
    }
    match direction {
        ShiftDirection::Left => (i as u64).checked_sub(amount).map(|j| j as usize),
        ShiftDirection::Right => {
            let j = (i as u64).saturating_add(amount);
            (j < width as u64).then_some(j as usize)
        }
    }
}

/// Shift by a runtime amount. An undefined amount yields X.
pub struct ShiftEval;

impl NodeBehavior for ShiftEval {
    fn evaluate(&self, io: &mut NodeIo<'_>) {
        let NodeKind::Shift { direction, fill } = *io.node.kind() else {
            return;
        };
        let out = io.output(0);
        let (Some(operand), Some(amount)) = (io.input(0), io.input_u64(1)) else {
            io.set_undefined(out);
            return;
        };
        let width = out.width.min(operand.width);
        if width == 0 {
            return;
        }
        let src = io.state.extract_state(operand.offset, width);
        let filler = match (fill, direction) {
            (ShiftFill::Zero, _) | (ShiftFill::Rotate, _) => Logic::Zero,
            (ShiftFill::One, _) => Logic::One,
            (ShiftFill::Last, ShiftDirection::Left) => src.get_logic(0),
            (ShiftFill::Last, ShiftDirection::Right) => src.get_logic(width - 1),
        };
        let rotate = fill == ShiftFill::Rotate;
        for i in 0..width {
            let bit = shift_source(i, amount, width, direction, rotate)
                .map_or(filler, |j| src.get_logic(j));
            io.state.set_logic(out.offset + i, bit);
        }
    }
}
