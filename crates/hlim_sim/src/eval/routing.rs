//! Constants, multiplexers, rewiring and pass-through nodes.

use super::{NodeBehavior, NodeIo};
use hlim_common::Plane;
use hlim_ir::{NodeKind, RewireSource};

/// Writes its value once at power-on.
pub struct ConstantEval;

impl NodeBehavior for ConstantEval {
    fn power_on(&self, io: &mut NodeIo<'_>) {
        let NodeKind::Constant { value, .. } = io.node.kind() else {
            return;
        };
        let out = io.output(0);
        io.state.copy_range(out.offset, value, 0, value.size().min(out.width));
    }
}

/// Selects a data input by the value of input 0.
///
/// With an undefined selector the output keeps the bits on which every data
/// input agrees and is undefined elsewhere.
pub struct MuxEval;

impl NodeBehavior for MuxEval {
    fn evaluate(&self, io: &mut NodeIo<'_>) {
        let NodeKind::Multiplexer { data_inputs } = *io.node.kind() else {
            return;
        };
        let out = io.output(0);
        if io.input(0).is_none() {
            io.set_undefined(out);
            return;
        }
        if let Some(select) = io.input_u64(0) {
            match usize::try_from(select) {
                Ok(index) if index < data_inputs => {
                    let src = io.input(1 + index);
                    io.copy_or_undefined(out, src);
                }
                _ => io.set_undefined(out),
            }
            return;
        }
        let sources: Option<Vec<_>> = (1..=data_inputs).map(|p| io.input(p)).collect();
        let Some(sources) = sources else {
            io.set_undefined(out);
            return;
        };
        for bit in 0..out.width {
            let first = io.state.get_logic(sources[0].offset + bit);
            let agreed = sources[1..]
                .iter()
                .all(|s| io.state.get_logic(s.offset + bit) == first);
            let value = if agreed { first } else { hlim_common::Logic::X };
            io.state.set_logic(out.offset + bit, value);
        }
    }
}

/// Concatenates input slices and constant bits, least significant range first.
pub struct RewireEval;

impl NodeBehavior for RewireEval {
    fn evaluate(&self, io: &mut NodeIo<'_>) {
        let NodeKind::Rewire { ranges, .. } = io.node.kind() else {
            return;
        };
        let out = io.output(0);
        let mut pos = out.offset;
        for range in ranges {
            match range.source {
                RewireSource::Input { input, offset } => match io.input(input) {
                    Some(src) => io.state.copy_within(pos, src.offset + offset, range.width),
                    None => io.state.clear_range(Plane::Defined, pos, range.width),
                },
                RewireSource::ConstZero | RewireSource::ConstOne => {
                    let one = range.source == RewireSource::ConstOne;
                    io.state.set_range(Plane::Value, pos, range.width, one);
                    io.state.set_range(Plane::Defined, pos, range.width, true);
                }
            }
            pos += range.width;
        }
    }
}

/// Copies input 0 to output 0.
pub struct PassThroughEval;

impl NodeBehavior for PassThroughEval {
    fn evaluate(&self, io: &mut NodeIo<'_>) {
        let out = io.output(0);
        let src = io.input(0);
        io.copy_or_undefined(out, src);
    }
}
