//! Typed constructors for common node shapes.
//!
//! Each helper creates a node, attaches its clock and connects the given
//! inputs. If any step fails the node is removed again before the error is
//! returned.

use crate::circuit::Circuit;
use crate::connection::{ConnectionType, Interpretation, NodePort};
use crate::error::IrError;
use crate::ids::{ClockId, GroupId, NodeId};
use crate::kind::{
    mem_port, register, signal_tap, ArithmeticOp, CompareOp, LogicOp, MessagePart, NodeKind,
    RewireRange, RewireSource, ShiftDirection, ShiftFill, TapLevel, TapTrigger,
};
use hlim_common::BitState;

impl Circuit {
    fn build(
        &mut self,
        group: GroupId,
        kind: NodeKind,
        clock: Option<ClockId>,
        inputs: &[(usize, NodePort)],
    ) -> Result<NodeId, IrError> {
        let id = self.create_node(group, kind)?;
        match self.wire(id, clock, inputs) {
            Ok(()) => Ok(id),
            Err(err) => {
                self.remove_node(id)?;
                Err(err)
            }
        }
    }

    fn wire(
        &mut self,
        id: NodeId,
        clock: Option<ClockId>,
        inputs: &[(usize, NodePort)],
    ) -> Result<(), IrError> {
        if let Some(clock) = clock {
            self.attach_clock(id, 0, clock)?;
        }
        for (port, driver) in inputs {
            self.connect_input(id, *port, *driver)?;
        }
        Ok(())
    }

    fn port_type(&self, port: NodePort) -> Result<ConnectionType, IrError> {
        let node = self.try_node(port.node)?;
        self.output_type(port).ok_or_else(|| IrError::InvalidOutputPort {
            node: node.label(),
            port: port.port,
            count: node.num_outputs(),
        })
    }

    /// A constant source.
    pub fn constant(
        &mut self,
        group: GroupId,
        value: BitState,
        interpretation: Interpretation,
    ) -> Result<NodePort, IrError> {
        let id = self.build(
            group,
            NodeKind::Constant {
                value,
                interpretation,
            },
            None,
            &[],
        )?;
        Ok(NodePort::first(id))
    }

    /// A fully defined unsigned constant.
    pub fn constant_u64(&mut self, group: GroupId, value: u64, width: usize) -> Result<NodePort, IrError> {
        self.constant(group, BitState::from_u64(value, width), Interpretation::BitVector)
    }

    /// A boolean constant.
    pub fn constant_bool(&mut self, group: GroupId, value: bool) -> Result<NodePort, IrError> {
        self.constant(group, BitState::from_bool(value), Interpretation::Boolean)
    }

    /// A named pass-through signal, optionally driven.
    pub fn signal(
        &mut self,
        group: GroupId,
        name: &str,
        input: Option<NodePort>,
    ) -> Result<NodePort, IrError> {
        let inputs: Vec<_> = input.map(|i| (0, i)).into_iter().collect();
        let id = self.build(group, NodeKind::Signal, None, &inputs)?;
        self.set_node_name(id, name)?;
        Ok(NodePort::first(id))
    }

    /// A binary logic operation. Use [`not`](Self::not) for inversion.
    pub fn logic(
        &mut self,
        group: GroupId,
        op: LogicOp,
        a: NodePort,
        b: NodePort,
    ) -> Result<NodePort, IrError> {
        if op == LogicOp::Not {
            return Err(IrError::InvalidNode {
                kind: NodeKind::Logic(op).type_name(),
                reason: "NOT takes a single operand".into(),
            });
        }
        let id = self.build(group, NodeKind::Logic(op), None, &[(0, a), (1, b)])?;
        Ok(NodePort::first(id))
    }

    /// Bitwise inversion.
    pub fn not(&mut self, group: GroupId, a: NodePort) -> Result<NodePort, IrError> {
        let id = self.build(group, NodeKind::Logic(LogicOp::Not), None, &[(0, a)])?;
        Ok(NodePort::first(id))
    }

    /// An unsigned comparison producing a boolean.
    pub fn compare(
        &mut self,
        group: GroupId,
        op: CompareOp,
        a: NodePort,
        b: NodePort,
    ) -> Result<NodePort, IrError> {
        let id = self.build(group, NodeKind::Compare(op), None, &[(0, a), (1, b)])?;
        Ok(NodePort::first(id))
    }

    /// Wrapping arithmetic on equal-width operands.
    pub fn arithmetic(
        &mut self,
        group: GroupId,
        op: ArithmeticOp,
        a: NodePort,
        b: NodePort,
    ) -> Result<NodePort, IrError> {
        let id = self.build(group, NodeKind::Arithmetic(op), None, &[(0, a), (1, b)])?;
        Ok(NodePort::first(id))
    }

    /// Selects `inputs[select]`.
    pub fn mux(
        &mut self,
        group: GroupId,
        select: NodePort,
        inputs: &[NodePort],
    ) -> Result<NodePort, IrError> {
        let mut wiring = vec![(0, select)];
        wiring.extend(inputs.iter().enumerate().map(|(i, p)| (i + 1, *p)));
        let id = self.build(
            group,
            NodeKind::Multiplexer {
                data_inputs: inputs.len(),
            },
            None,
            &wiring,
        )?;
        Ok(NodePort::first(id))
    }

    /// Bits `offset..offset + width` of `input`.
    pub fn slice(
        &mut self,
        group: GroupId,
        input: NodePort,
        offset: usize,
        width: usize,
    ) -> Result<NodePort, IrError> {
        let kind = NodeKind::Rewire {
            inputs: 1,
            ranges: vec![RewireRange {
                source: RewireSource::Input { input: 0, offset },
                width,
            }],
        };
        let id = self.build(group, kind, None, &[(0, input)])?;
        Ok(NodePort::first(id))
    }

    /// Concatenation of `parts`, the first part in the least significant bits.
    pub fn concat(&mut self, group: GroupId, parts: &[NodePort]) -> Result<NodePort, IrError> {
        let mut ranges = Vec::with_capacity(parts.len());
        let mut wiring = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            ranges.push(RewireRange {
                source: RewireSource::Input { input: i, offset: 0 },
                width: self.port_type(*part)?.width,
            });
            wiring.push((i, *part));
        }
        let kind = NodeKind::Rewire {
            inputs: parts.len(),
            ranges,
        };
        let id = self.build(group, kind, None, &wiring)?;
        Ok(NodePort::first(id))
    }

    /// Pads `input` with zeros up to `width` bits.
    pub fn zero_extend(&mut self, group: GroupId, input: NodePort, width: usize) -> Result<NodePort, IrError> {
        let have = self.port_type(input)?.width;
        let mut ranges = vec![RewireRange {
            source: RewireSource::Input { input: 0, offset: 0 },
            width: have.min(width),
        }];
        if width > have {
            ranges.push(RewireRange {
                source: RewireSource::ConstZero,
                width: width - have,
            });
        }
        let id = self.build(group, NodeKind::Rewire { inputs: 1, ranges }, None, &[(0, input)])?;
        Ok(NodePort::first(id))
    }

    /// Shifts `operand` by the unsigned value of `amount`.
    pub fn shift(
        &mut self,
        group: GroupId,
        direction: ShiftDirection,
        fill: ShiftFill,
        operand: NodePort,
        amount: NodePort,
    ) -> Result<NodePort, IrError> {
        let id = self.build(
            group,
            NodeKind::Shift { direction, fill },
            None,
            &[(0, operand), (1, amount)],
        )?;
        Ok(NodePort::first(id))
    }

    /// A register on `clock`. Any input may be left for later connection.
    pub fn register(
        &mut self,
        group: GroupId,
        clock: ClockId,
        data: Option<NodePort>,
        reset_value: Option<NodePort>,
        enable: Option<NodePort>,
    ) -> Result<NodeId, IrError> {
        let wiring: Vec<_> = [
            (register::RESET_VALUE, reset_value),
            (register::DATA, data),
            (register::ENABLE, enable),
        ]
        .into_iter()
        .filter_map(|(port, driver)| driver.map(|d| (port, d)))
        .collect();
        self.build(group, NodeKind::Register, Some(clock), &wiring)
    }

    /// An input pin driven by simulation tasks.
    pub fn input_pin(&mut self, group: GroupId, name: &str, ty: ConnectionType) -> Result<NodeId, IrError> {
        let id = self.build(group, NodeKind::InputPin { ty }, None, &[])?;
        self.set_node_name(id, name)?;
        Ok(id)
    }

    /// An output pin observing `input`.
    pub fn output_pin(&mut self, group: GroupId, name: &str, input: NodePort) -> Result<NodeId, IrError> {
        let id = self.build(group, NodeKind::OutputPin, None, &[(0, input)])?;
        self.set_node_name(id, name)?;
        Ok(id)
    }

    /// A memory of `depth` words. Content is undefined at power-on unless `init` is given.
    pub fn memory(
        &mut self,
        group: GroupId,
        depth: usize,
        word_width: usize,
        init: Option<BitState>,
    ) -> Result<NodeId, IrError> {
        self.build(
            group,
            NodeKind::Memory {
                depth,
                word_width,
                init,
            },
            None,
            &[],
        )
    }

    /// A port on `memory`.
    ///
    /// Only a port with a clock accepts the write enable and write data
    /// inputs. A port without one reads combinationally.
    ///
    /// Enable, write enable, address and write data are connected afterwards
    /// through [`connect_input`](Self::connect_input) with the
    /// [`mem_port`](crate::kind::mem_port) indices.
    pub fn memory_port(
        &mut self,
        group: GroupId,
        memory: NodeId,
        clock: Option<ClockId>,
    ) -> Result<NodeId, IrError> {
        let word_width = match self.try_node(memory)?.kind() {
            NodeKind::Memory { word_width, .. } => *word_width,
            other => {
                return Err(IrError::InvalidNode {
                    kind: "MemPort".into(),
                    reason: format!("{} is not a memory", other.type_name()),
                })
            }
        };
        self.build(
            group,
            NodeKind::MemPort { word_width },
            clock,
            &[(mem_port::MEMORY, NodePort::first(memory))],
        )
    }

    /// Marks `input` as an intentional clock-domain crossing.
    pub fn allow_clock_domain_crossing(
        &mut self,
        group: GroupId,
        input: NodePort,
    ) -> Result<NodePort, IrError> {
        let id = self.build(group, NodeKind::CdcMarker, None, &[(0, input)])?;
        Ok(NodePort::first(id))
    }

    /// A signal tap reporting `message` when `trigger` fires.
    pub fn signal_tap(
        &mut self,
        group: GroupId,
        level: TapLevel,
        trigger: TapTrigger,
        condition: Option<NodePort>,
        message: Vec<MessagePart>,
        values: &[NodePort],
    ) -> Result<NodeId, IrError> {
        let mut wiring: Vec<_> = condition.map(|c| (signal_tap::TRIGGER, c)).into_iter().collect();
        wiring.extend(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (signal_tap::FIRST_VALUE + i, *v)),
        );
        self.build(
            group,
            NodeKind::SignalTap {
                level,
                trigger,
                message,
                values: values.len(),
            },
            None,
            &wiring,
        )
    }

    /// An assertion that fails whenever `condition` is low or undefined.
    pub fn assert_that(
        &mut self,
        group: GroupId,
        condition: NodePort,
        text: &str,
    ) -> Result<NodeId, IrError> {
        self.signal_tap(
            group,
            TapLevel::Assert,
            TapTrigger::WhenLow,
            Some(condition),
            vec![MessagePart::Text(text.to_string())],
            &[],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockConfig;
    use crate::kind::OutputTiming;
    use hlim_common::ClockRational;

    #[test]
    fn failed_build_leaves_no_node() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let a = c.constant_u64(root, 1, 4).unwrap();
        let b = c.constant_u64(root, 1, 5).unwrap();
        let before = c.node_count();
        assert!(c.logic(root, LogicOp::Xor, a, b).is_err());
        assert_eq!(c.node_count(), before);
        assert!(c.directly_driven(a).is_empty());
    }

    #[test]
    fn mux_selector_width_limit() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let wide = c.constant(root, BitState::new(65), Interpretation::BitVector).unwrap();
        let d = c.constant_u64(root, 0, 8).unwrap();
        let err = c.mux(root, wide, &[d, d]).unwrap_err();
        assert!(matches!(err, IrError::UnsupportedWidth { width: 65, max: 64, .. }));
    }

    #[test]
    fn concat_and_slice_widths() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let a = c.constant_u64(root, 0b1010, 4).unwrap();
        let b = c.constant_bool(root, true).unwrap();
        let cat = c.concat(root, &[a, b]).unwrap();
        assert_eq!(c.output_type(cat), Some(ConnectionType::bit_vector(5)));
        let s = c.slice(root, cat, 1, 3).unwrap();
        assert_eq!(c.output_type(s), Some(ConnectionType::bit_vector(3)));
        assert!(c.slice(root, a, 2, 3).is_err());
        let ext = c.zero_extend(root, a, 12).unwrap();
        assert_eq!(c.output_type(ext), Some(ConnectionType::bit_vector(12)));
    }

    #[test]
    fn register_takes_reset_type_and_clock() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let clk = c
            .create_clock(ClockConfig::new("clk", ClockRational::from_integer(1_000_000)))
            .unwrap();
        let rst = c.constant_u64(root, 0, 6).unwrap();
        let en = c.constant_bool(root, true).unwrap();
        let reg = c.register(root, clk, None, Some(rst), Some(en)).unwrap();
        assert_eq!(c.node(reg).clock(), Some(clk));
        assert_eq!(c.node(reg).output_type(0), ConnectionType::bit_vector(6));
        assert_eq!(c.node(reg).kind().output_timing(0), OutputTiming::Latched);
        let wide_en = c.constant_u64(root, 1, 2).unwrap();
        assert!(c.register(root, clk, None, Some(rst), Some(wide_en)).is_err());
    }

    #[test]
    fn memory_port_wiring() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let mem = c.memory(root, 16, 8, None).unwrap();
        let port = c.memory_port(root, mem, None).unwrap();
        assert_eq!(c.node(port).output_type(0), ConnectionType::bit_vector(8));
        assert_eq!(c.directly_driven(NodePort::first(mem)).len(), 1);
        let addr = c.constant_u64(root, 3, 4).unwrap();
        c.connect_input(port, mem_port::ADDRESS, addr).unwrap();
        let bad_data = c.constant_u64(root, 3, 4).unwrap();
        assert!(c.connect_input(port, mem_port::WR_DATA, bad_data).is_err());
        // A value can never feed the memory slot, nor a memory feed a value slot.
        assert!(c.connect_input(port, mem_port::MEMORY, addr).is_err());
        let sig = c.create_node(root, NodeKind::Logic(LogicOp::Not)).unwrap();
        assert!(c.connect_input(sig, 0, NodePort::first(mem)).is_err());
        // Only memories qualify as the memory of a port.
        assert!(c.memory_port(root, addr.node, None).is_err());
    }

    #[test]
    fn unclocked_port_refuses_write_inputs() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let clk = c
            .create_clock(ClockConfig::new("clk", ClockRational::from_integer(1_000)))
            .unwrap();
        let mem = c.memory(root, 4, 8, None).unwrap();
        let read = c.memory_port(root, mem, None).unwrap();
        let we = c.constant_bool(root, true).unwrap();
        let data = c.constant_u64(root, 0x55, 8).unwrap();
        assert!(matches!(
            c.connect_input(read, mem_port::WR_ENABLE, we),
            Err(IrError::InvalidConnection { port: mem_port::WR_ENABLE, .. })
        ));
        assert!(matches!(
            c.connect_input(read, mem_port::WR_DATA, data),
            Err(IrError::InvalidConnection { port: mem_port::WR_DATA, .. })
        ));
        assert_eq!(c.node(read).driver(mem_port::WR_ENABLE), None);
        assert!(c.directly_driven(we).is_empty());

        let write = c.memory_port(root, mem, Some(clk)).unwrap();
        c.connect_input(write, mem_port::WR_ENABLE, we).unwrap();
        c.connect_input(write, mem_port::WR_DATA, data).unwrap();
    }

    #[test]
    fn signal_tap_message_must_reference_values() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let cond = c.constant_bool(root, true).unwrap();
        let err = c
            .signal_tap(
                root,
                TapLevel::Debug,
                TapTrigger::WhenHigh,
                Some(cond),
                vec![MessagePart::Value(0)],
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, IrError::InvalidNode { .. }));
        let tap = c.assert_that(root, cond, "must hold").unwrap();
        assert_eq!(c.node(tap).num_outputs(), 0);
    }

    #[test]
    fn logic_rejects_not() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let a = c.constant_bool(root, true).unwrap();
        assert!(c.logic(root, LogicOp::Not, a, a).is_err());
    }
}
