//! Clocked registers.
//!
//! Data and enable are latched during evaluation so that every register on a
//! clock captures the values from before the edge.

use super::{NodeBehavior, NodeIo};
use hlim_common::{Logic, Plane};
use hlim_ir::kind::register::{DATA, ENABLE, INT_DATA, INT_ENABLE, INT_IN_RESET, RESET_VALUE};
use hlim_ir::ResetKind;

/// Register with reset value, enable and the reset style of its clock.
pub struct RegisterEval;

impl RegisterEval {
    fn load_reset_value(io: &mut NodeIo<'_>) {
        let out = io.output(0);
        let src = io.input(RESET_VALUE);
        io.copy_or_undefined(out, src);
    }
}

impl NodeBehavior for RegisterEval {
    fn power_on(&self, io: &mut NodeIo<'_>) {
        let flag = io.internal(INT_IN_RESET);
        io.state.set(Plane::Value, flag.offset, false);
        io.state.set(Plane::Defined, flag.offset, true);
        if io.reset.initialize_regs {
            Self::load_reset_value(io);
        } else {
            let out = io.output(0);
            io.set_undefined(out);
        }
    }

    fn evaluate(&self, io: &mut NodeIo<'_>) {
        let data = io.internal(INT_DATA);
        let src = io.input(DATA);
        io.copy_or_undefined(data, src);
        let enable = io.internal(INT_ENABLE);
        let value = io.input_logic(ENABLE, Logic::One);
        io.state.set_logic(enable.offset, value);
    }

    fn advance(&self, io: &mut NodeIo<'_>) {
        let in_reset = io.state.get(Plane::Value, io.internal(INT_IN_RESET).offset);
        if in_reset {
            if io.reset.kind == ResetKind::Sync {
                Self::load_reset_value(io);
            }
            return;
        }
        let out = io.output(0);
        match io.state.get_logic(io.internal(INT_ENABLE).offset) {
            Logic::One => {
                let data = io.internal(INT_DATA);
                io.copy_or_undefined(out, Some(data));
            }
            Logic::Zero => {}
            Logic::X => io.set_undefined(out),
        }
    }

    fn reset_change(&self, io: &mut NodeIo<'_>, in_reset: bool) {
        let flag = io.internal(INT_IN_RESET);
        io.state.set(Plane::Value, flag.offset, in_reset);
        if in_reset && io.reset.kind == ResetKind::Async {
            Self::load_reset_value(io);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::eval::harness::Bench;
    use hlim_common::ClockRational;
    use hlim_ir::{Circuit, ClockConfig, ConnectionType, NodeId, NodePort, ResetKind, ResetPolicy};

    fn clock(c: &mut Circuit, reset: ResetPolicy) -> hlim_ir::ClockId {
        let mut cfg = ClockConfig::new("clk", ClockRational::from_integer(1_000_000));
        cfg.reset = reset;
        c.create_clock(cfg).unwrap()
    }

    /// A 4-bit register fed by a pin, with reset value 5 and an enable pin.
    fn build(reset: ResetPolicy) -> (Bench, NodeId, NodeId, NodeId) {
        let mut c = Circuit::new();
        let root = c.root_group();
        let clk = clock(&mut c, reset);
        let data = c.input_pin(root, "d", ConnectionType::bit_vector(4)).unwrap();
        let enable = c.input_pin(root, "en", ConnectionType::boolean()).unwrap();
        let five = c.constant_u64(root, 5, 4).unwrap();
        let reg = c
            .register(
                root,
                clk,
                Some(NodePort::first(data)),
                Some(five),
                Some(NodePort::first(enable)),
            )
            .unwrap();
        (Bench::new(c), reg, data, enable)
    }

    fn set(bench: &mut Bench, pin: NodeId, value: u64) {
        let slot = bench.program.output_slot(NodePort::first(pin)).unwrap();
        bench.state.insert(hlim_common::Plane::Value, slot.offset, slot.width, value);
        bench
            .state
            .set_range(hlim_common::Plane::Defined, slot.offset, slot.width, true);
        bench.evaluate();
    }

    #[test]
    fn power_on_loads_reset_value() {
        let (bench, reg, _, _) = build(ResetPolicy::default());
        assert_eq!(bench.value(NodePort::first(reg)).to_u64(), Some(5));
    }

    #[test]
    fn power_on_without_initialization_is_undefined() {
        let policy = ResetPolicy {
            initialize_regs: false,
            ..ResetPolicy::default()
        };
        let (bench, reg, _, _) = build(policy);
        assert_eq!(bench.text(NodePort::first(reg)), "XXXX");
    }

    #[test]
    fn enable_controls_capture() {
        let (mut bench, reg, data, enable) = build(ResetPolicy::default());
        set(&mut bench, data, 9);
        set(&mut bench, enable, 0);
        bench.advance(reg);
        assert_eq!(bench.value(NodePort::first(reg)).to_u64(), Some(5));
        set(&mut bench, enable, 1);
        bench.advance(reg);
        assert_eq!(bench.value(NodePort::first(reg)).to_u64(), Some(9));
    }

    #[test]
    fn undefined_enable_makes_output_undefined() {
        let (mut bench, reg, data, _) = build(ResetPolicy::default());
        set(&mut bench, data, 9);
        bench.advance(reg);
        assert_eq!(bench.text(NodePort::first(reg)), "XXXX");
    }

    #[test]
    fn sync_reset_loads_on_edge() {
        let (mut bench, reg, data, enable) = build(ResetPolicy::default());
        set(&mut bench, data, 12);
        set(&mut bench, enable, 1);
        bench.advance(reg);
        assert_eq!(bench.value(NodePort::first(reg)).to_u64(), Some(12));
        bench.reset_change(reg, true);
        assert_eq!(bench.value(NodePort::first(reg)).to_u64(), Some(12));
        bench.advance(reg);
        assert_eq!(bench.value(NodePort::first(reg)).to_u64(), Some(5));
        bench.reset_change(reg, false);
        bench.advance(reg);
        assert_eq!(bench.value(NodePort::first(reg)).to_u64(), Some(12));
    }

    #[test]
    fn async_reset_loads_immediately() {
        let policy = ResetPolicy {
            kind: ResetKind::Async,
            ..ResetPolicy::default()
        };
        let (mut bench, reg, data, enable) = build(policy);
        set(&mut bench, data, 3);
        set(&mut bench, enable, 1);
        bench.advance(reg);
        assert_eq!(bench.value(NodePort::first(reg)).to_u64(), Some(3));
        bench.reset_change(reg, true);
        assert_eq!(bench.value(NodePort::first(reg)).to_u64(), Some(5));
        bench.advance(reg);
        assert_eq!(bench.value(NodePort::first(reg)).to_u64(), Some(5));
    }

    #[test]
    fn unconnected_enable_means_enabled() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let clk = clock(&mut c, ResetPolicy::default());
        let zero = c.constant_u64(root, 0, 2).unwrap();
        let three = c.constant_u64(root, 3, 2).unwrap();
        let reg = c.register(root, clk, Some(three), Some(zero), None).unwrap();
        let mut bench = Bench::new(c);
        assert_eq!(bench.value(NodePort::first(reg)).to_u64(), Some(0));
        bench.advance(reg);
        assert_eq!(bench.value(NodePort::first(reg)).to_u64(), Some(3));
    }
}
