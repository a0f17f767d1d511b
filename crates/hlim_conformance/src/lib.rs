//! Reference circuits for end-to-end tests of the hlim IR, simulator and
//! analysis passes.
//!
//! Each builder returns the circuit together with the handles a testbench
//! needs: the clock, the input pins it drives and the output pins it reads.

#![warn(missing_docs)]

use hlim_common::ClockRational;
use hlim_ir::kind::{mem_port, register};
use hlim_ir::{
    ArithmeticOp, Circuit, ClockConfig, ClockId, CompareOp, ConnectionType, GroupId, GroupKind,
    IrError, LogicOp, NodeId, NodePort, ShiftDirection, ShiftFill,
};

/// A binary GCD state machine.
pub struct GcdCircuit {
    /// The circuit.
    pub circuit: Circuit,
    /// Its only clock.
    pub clock: ClockId,
    /// First operand, loaded while `start` is high.
    pub a_in: NodeId,
    /// Second operand, loaded while `start` is high.
    pub b_in: NodeId,
    /// Load strobe.
    pub start: NodeId,
    /// High once both working registers agree.
    pub done: NodeId,
    /// The GCD, valid while `done` is high.
    pub result: NodeId,
}

/// A synchronous FIFO on one memory with a write and an asynchronous read port.
pub struct FifoCircuit {
    /// The circuit.
    pub circuit: Circuit,
    /// Its only clock.
    pub clock: ClockId,
    /// Push request, ignored while full.
    pub push: NodeId,
    /// Pop request, ignored while empty.
    pub pop: NodeId,
    /// Word to push.
    pub din: NodeId,
    /// The oldest word, valid while not empty.
    pub dout: NodeId,
    /// High when no word is stored.
    pub empty: NodeId,
    /// High when `depth` words are stored.
    pub full: NodeId,
    /// Number of words the FIFO holds.
    pub depth: usize,
}

/// A 100 MHz clock with the default synchronous reset.
pub fn default_clock(circuit: &mut Circuit) -> Result<ClockId, IrError> {
    circuit.create_clock(ClockConfig::new("clk", ClockRational::from_integer(100_000_000)))
}

/// Euclid's algorithm, the reference for [`build_gcd`].
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

struct Builder<'c> {
    c: &'c mut Circuit,
    group: GroupId,
}

impl Builder<'_> {
    fn pin(&mut self, name: &str, width: usize) -> Result<(NodeId, NodePort), IrError> {
        let ty = if width == 1 {
            ConnectionType::boolean()
        } else {
            ConnectionType::bit_vector(width)
        };
        let id = self.c.input_pin(self.group, name, ty)?;
        Ok((id, NodePort::first(id)))
    }

    fn k(&mut self, value: u64, width: usize) -> Result<NodePort, IrError> {
        self.c.constant_u64(self.group, value, width)
    }

    fn cmp(&mut self, op: CompareOp, a: NodePort, b: NodePort) -> Result<NodePort, IrError> {
        self.c.compare(self.group, op, a, b)
    }

    fn arith(&mut self, op: ArithmeticOp, a: NodePort, b: NodePort) -> Result<NodePort, IrError> {
        self.c.arithmetic(self.group, op, a, b)
    }

    fn and(&mut self, a: NodePort, b: NodePort) -> Result<NodePort, IrError> {
        self.c.logic(self.group, LogicOp::And, a, b)
    }

    /// `if select { then } else { otherwise }`.
    fn select(&mut self, select: NodePort, then: NodePort, otherwise: NodePort) -> Result<NodePort, IrError> {
        self.c.mux(self.group, select, &[otherwise, then])
    }

    fn is_even(&mut self, value: NodePort) -> Result<NodePort, IrError> {
        let lsb = self.c.slice(self.group, value, 0, 1)?;
        let zero = self.k(0, 1)?;
        self.cmp(CompareOp::Eq, lsb, zero)
    }

    fn named(&mut self, name: &str, value: NodePort) -> Result<NodePort, IrError> {
        self.c.signal(self.group, name, Some(value))
    }

    fn reg(&mut self, clock: ClockId, name: &str, reset: NodePort) -> Result<NodeId, IrError> {
        let id = self.c.register(self.group, clock, None, Some(reset), None)?;
        self.c.set_node_name(id, name)?;
        Ok(id)
    }
}

/// Builds a binary GCD machine over `width`-bit operands.
///
/// While `start` is high the operands are loaded. Afterwards each cycle
/// halves even operands, counting common factors of two, or subtracts the
/// smaller odd operand from the larger one until both agree. The result is
/// the agreed value shifted back by the common factors.
pub fn build_gcd(width: usize) -> Result<GcdCircuit, IrError> {
    let mut circuit = Circuit::new();
    let clock = default_clock(&mut circuit)?;
    let root = circuit.root_group();
    let group = circuit.add_child_group(root, GroupKind::Entity, "gcd")?;
    let mut b = Builder {
        c: &mut circuit,
        group,
    };

    let (a_in, a_in_port) = b.pin("a_in", width)?;
    let (b_in, b_in_port) = b.pin("b_in", width)?;
    let (start, start_port) = b.pin("start", 1)?;

    let zero = b.k(0, width)?;
    let shift_zero = b.k(0, 4)?;
    let a_reg = b.reg(clock, "a", zero)?;
    let b_reg = b.reg(clock, "b", zero)?;
    let d_reg = b.reg(clock, "shift", shift_zero)?;
    let (a, bv, d) = (
        NodePort::first(a_reg),
        NodePort::first(b_reg),
        NodePort::first(d_reg),
    );

    let a_even = b.is_even(a)?;
    let b_even = b.is_even(bv)?;
    let both_even = b.and(a_even, b_even)?;
    let equal = b.cmp(CompareOp::Eq, a, bv)?;
    let equal = b.named("equal", equal)?;
    let a_greater = b.cmp(CompareOp::Gt, a, bv)?;

    let one_amount = b.k(1, 4)?;
    let a_half = b.c.shift(group, ShiftDirection::Right, ShiftFill::Zero, a, one_amount)?;
    let b_half = b.c.shift(group, ShiftDirection::Right, ShiftFill::Zero, bv, one_amount)?;
    let a_minus_b = b.arith(ArithmeticOp::Sub, a, bv)?;
    let b_minus_a = b.arith(ArithmeticOp::Sub, bv, a)?;
    let one_shift = b.k(1, 4)?;
    let d_plus = b.arith(ArithmeticOp::Add, d, one_shift)?;

    // Both odd: subtract the smaller operand from the larger one.
    let a_odd = b.select(a_greater, a_minus_b, a)?;
    let a_odd = b.select(b_even, a, a_odd)?;
    let a_step = b.select(a_even, a_half, a_odd)?;
    let b_odd = b.select(a_greater, bv, b_minus_a)?;
    let b_odd = b.select(a_even, bv, b_odd)?;
    let b_step = b.select(b_even, b_half, b_odd)?;
    let d_step = b.select(both_even, d_plus, d)?;

    let a_run = b.select(equal, a, a_step)?;
    let b_run = b.select(equal, bv, b_step)?;
    let d_run = b.select(equal, d, d_step)?;
    let a_next = b.select(start_port, a_in_port, a_run)?;
    let b_next = b.select(start_port, b_in_port, b_run)?;
    let d_next = b.select(start_port, shift_zero, d_run)?;
    b.c.connect_input(a_reg, register::DATA, a_next)?;
    b.c.connect_input(b_reg, register::DATA, b_next)?;
    b.c.connect_input(d_reg, register::DATA, d_next)?;

    let result = b.c.shift(group, ShiftDirection::Left, ShiftFill::Zero, a, d)?;
    let done = b.c.output_pin(group, "done", equal)?;
    let result = b.c.output_pin(group, "result", result)?;

    Ok(GcdCircuit {
        circuit,
        clock,
        a_in,
        b_in,
        start,
        done,
        result,
    })
}

/// Builds a FIFO of `depth` words of `width` bits. `depth` must be a power of two.
///
/// An assertion tap fires if the FIFO ever reports being empty and full at once.
pub fn build_fifo(depth: usize, width: usize) -> Result<FifoCircuit, IrError> {
    if !depth.is_power_of_two() || depth < 2 {
        return Err(IrError::InvalidNode {
            kind: "Memory".into(),
            reason: format!("FIFO depth {depth} is not a power of two"),
        });
    }
    let addr_bits = depth.trailing_zeros() as usize;
    let count_bits = addr_bits + 1;

    let mut circuit = Circuit::new();
    let clock = default_clock(&mut circuit)?;
    let root = circuit.root_group();
    let group = circuit.add_child_group(root, GroupKind::Entity, "fifo")?;
    let mut b = Builder {
        c: &mut circuit,
        group,
    };

    let (push, push_port) = b.pin("push", 1)?;
    let (pop, pop_port) = b.pin("pop", 1)?;
    let (din, din_port) = b.pin("din", width)?;

    let ptr_zero = b.k(0, addr_bits)?;
    let count_zero = b.k(0, count_bits)?;
    let wr_reg = b.reg(clock, "wr_ptr", ptr_zero)?;
    let rd_reg = b.reg(clock, "rd_ptr", ptr_zero)?;
    let count_reg = b.reg(clock, "count", count_zero)?;
    let (wr, rd, count) = (
        NodePort::first(wr_reg),
        NodePort::first(rd_reg),
        NodePort::first(count_reg),
    );

    let empty = b.cmp(CompareOp::Eq, count, count_zero)?;
    let depth_value = b.k(depth as u64, count_bits)?;
    let full = b.cmp(CompareOp::Eq, count, depth_value)?;
    let not_full = b.c.not(group, full)?;
    let not_empty = b.c.not(group, empty)?;
    let do_push = b.and(push_port, not_full)?;
    let do_push = b.named("do_push", do_push)?;
    let do_pop = b.and(pop_port, not_empty)?;
    let do_pop = b.named("do_pop", do_pop)?;

    let memory = b.c.memory(group, depth, width, None)?;
    b.c.set_node_name(memory, "storage")?;
    let write = b.c.memory_port(group, memory, Some(clock))?;
    b.c.connect_input(write, mem_port::WR_ENABLE, do_push)?;
    b.c.connect_input(write, mem_port::ADDRESS, wr)?;
    b.c.connect_input(write, mem_port::WR_DATA, din_port)?;
    let read = b.c.memory_port(group, memory, None)?;
    b.c.connect_input(read, mem_port::ADDRESS, rd)?;

    let ptr_one = b.k(1, addr_bits)?;
    let count_one = b.k(1, count_bits)?;
    let wr_inc = b.arith(ArithmeticOp::Add, wr, ptr_one)?;
    let rd_inc = b.arith(ArithmeticOp::Add, rd, ptr_one)?;
    let count_inc = b.arith(ArithmeticOp::Add, count, count_one)?;
    let count_dec = b.arith(ArithmeticOp::Sub, count, count_one)?;
    let wr_next = b.select(do_push, wr_inc, wr)?;
    let rd_next = b.select(do_pop, rd_inc, rd)?;
    let only_pop = b.select(do_pop, count_dec, count)?;
    let with_push = b.select(do_pop, count, count_inc)?;
    let count_next = b.select(do_push, with_push, only_pop)?;
    b.c.connect_input(wr_reg, register::DATA, wr_next)?;
    b.c.connect_input(rd_reg, register::DATA, rd_next)?;
    b.c.connect_input(count_reg, register::DATA, count_next)?;

    let both = b.and(empty, full)?;
    let consistent = b.c.not(group, both)?;
    b.c.assert_that(group, consistent, "FIFO is empty and full at once")?;

    let dout = b.c.output_pin(group, "dout", NodePort::first(read))?;
    let empty = b.c.output_pin(group, "empty", empty)?;
    let full = b.c.output_pin(group, "full", full)?;

    Ok(FifoCircuit {
        circuit,
        clock,
        push,
        pop,
        din,
        dout,
        empty,
        full,
        depth,
    })
}
