//! Memories and their ports.
//!
//! A memory owns one internal slot holding all words back to back. Each
//! port addresses that slot directly; it is appended to the port's internal
//! slots by the program compiler.

use super::{NodeBehavior, NodeIo};
use crate::program::Slot;
use hlim_common::{Logic, Plane, WORD_BITS};
use hlim_ir::kind::mem_port::{
    ADDRESS, ENABLE, INT_ADDRESS, INT_DATA, INT_WRITE, RD_DATA, WR_DATA, WR_ENABLE,
};
use hlim_ir::NodeKind;

/// Internal slot of a port that aliases the memory storage.
const STORAGE: usize = 3;

/// Loads initial content or leaves every word undefined.
pub struct MemoryEval;

impl NodeBehavior for MemoryEval {
    fn power_on(&self, io: &mut NodeIo<'_>) {
        let NodeKind::Memory { init, .. } = io.node.kind() else {
            return;
        };
        let storage = io.internal(0);
        match init {
            Some(content) => {
                let len = content.size().min(storage.width);
                io.state.copy_range(storage.offset, content, 0, len);
            }
            None => io.state.clear_range(Plane::Defined, storage.offset, storage.width),
        }
    }
}

/// Combinational reads, writes applied on the active clock edge.
pub struct MemPortEval;

impl MemPortEval {
    fn storage(io: &NodeIo<'_>) -> Option<(Slot, usize, usize)> {
        let NodeKind::MemPort { word_width } = *io.node.kind() else {
            return None;
        };
        let storage = io.slots.internal.get(STORAGE).copied()?;
        if word_width == 0 {
            return None;
        }
        Some((storage, word_width, storage.width / word_width))
    }
}

impl NodeBehavior for MemPortEval {
    fn evaluate(&self, io: &mut NodeIo<'_>) {
        let out = io.output(RD_DATA);
        let Some((storage, word_width, depth)) = Self::storage(io) else {
            io.set_undefined(out);
            return;
        };

        let enable = io.input_logic(ENABLE, Logic::One);
        match (enable, io.input_u64(ADDRESS)) {
            (Logic::One, Some(addr)) if addr < depth as u64 => {
                let word = storage.offset + addr as usize * word_width;
                io.state.copy_within(out.offset, word, word_width);
            }
            _ => io.set_undefined(out),
        }

        let write = enable & io.input_logic(WR_ENABLE, Logic::Zero);
        let write_flag = io.internal(INT_WRITE);
        io.state.set_logic(write_flag.offset, write);

        let latched = io.internal(INT_ADDRESS);
        match io.input(ADDRESS) {
            Some(src) => {
                let len = src.width.min(WORD_BITS);
                io.state.copy_within(latched.offset, src.offset, len);
                if len < latched.width {
                    let rest = latched.width - len;
                    io.state.clear_range(Plane::Value, latched.offset + len, rest);
                    io.state.set_range(Plane::Defined, latched.offset + len, rest, true);
                }
            }
            None => io.set_undefined(latched),
        }

        let data = io.internal(INT_DATA);
        let src = io.input(WR_DATA);
        io.copy_or_undefined(data, src);
    }

    fn advance(&self, io: &mut NodeIo<'_>) {
        let Some((storage, word_width, depth)) = Self::storage(io) else {
            return;
        };
        match io.state.get_logic(io.internal(INT_WRITE).offset) {
            Logic::Zero => return,
            Logic::X => {
                io.set_undefined(storage);
                return;
            }
            Logic::One => {}
        }
        let latched = io.internal(INT_ADDRESS);
        if !io.state.all_defined(latched.offset, latched.width) {
            io.set_undefined(storage);
            return;
        }
        let addr = io.state.extract(Plane::Value, latched.offset, latched.width);
        if addr >= depth as u64 {
            return;
        }
        let data = io.internal(INT_DATA);
        let word = storage.offset + addr as usize * word_width;
        io.state.copy_within(word, data.offset, word_width);
    }
}
