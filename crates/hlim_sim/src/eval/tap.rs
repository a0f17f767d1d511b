//! Signal taps: assertions, warnings and debug messages.

use super::{NodeBehavior, NodeIo};
use hlim_common::Logic;
use hlim_ir::kind::signal_tap::{FIRST_VALUE, TRIGGER};
use hlim_ir::{MessagePart, NodeKind, TapLevel, TapTrigger};

/// Reports through the callbacks once per instant while triggered.
///
/// An undefined or unconnected trigger always fires.
pub struct SignalTapEval;

impl NodeBehavior for SignalTapEval {
    fn commit(&self, io: &mut NodeIo<'_>) {
        let NodeKind::SignalTap {
            level,
            trigger,
            message,
            ..
        } = io.node.kind()
        else {
            return;
        };
        let fire = match trigger {
            TapTrigger::Always => true,
            TapTrigger::WhenHigh | TapTrigger::WhenLow => {
                match io.input_logic(TRIGGER, Logic::X) {
                    Logic::X => true,
                    Logic::One => *trigger == TapTrigger::WhenHigh,
                    Logic::Zero => *trigger == TapTrigger::WhenLow,
                }
            }
        };
        if !fire {
            return;
        }
        let mut text = String::new();
        for part in message {
            match part {
                MessagePart::Text(s) => text.push_str(s),
                MessagePart::Value(n) => match io.input(FIRST_VALUE + n) {
                    Some(slot) => {
                        let value = io.state.extract_state(slot.offset, slot.width);
                        text.push_str(&value.to_string());
                    }
                    None => text.push_str("<unconnected>"),
                },
            }
        }
        let id = io.node.id();
        match level {
            TapLevel::Assert => io.callbacks.on_assert(id, &text),
            TapLevel::Warn => io.callbacks.on_warning(id, &text),
            TapLevel::Debug => io.callbacks.on_debug_message(id, &text),
        }
    }
}
