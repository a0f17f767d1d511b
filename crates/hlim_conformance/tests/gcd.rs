//! End-to-end tests of the binary GCD machine.

use hlim_conformance::{build_gcd, gcd, GcdCircuit};
use hlim_sim::{SimConfig, Simulator, StopReason};
use std::cell::RefCell;
use std::rc::Rc;

const A_OPERANDS: [u64; 7] = [1, 2, 3, 4, 5, 10, 42];
const B_OPERANDS: [u64; 8] = [1, 2, 3, 4, 5, 23, 56, 126];
const MAX_TICKS: u64 = 200;

fn quiet() -> SimConfig {
    SimConfig {
        console_output: false,
        ..SimConfig::default()
    }
}

#[test]
fn matches_reference_for_all_pairs() {
    let GcdCircuit {
        circuit,
        clock,
        a_in,
        b_in,
        start,
        done,
        result,
    } = build_gcd(8).unwrap();
    let mut sim = Simulator::new(circuit, quiet()).unwrap();
    let outcomes = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&outcomes);
    sim.spawn(move |ctx| async move {
        ctx.set_pin(start, 0)?;
        ctx.set_pin(a_in, 0)?;
        ctx.set_pin(b_in, 0)?;
        ctx.wait_clock(clock).await;
        for a in A_OPERANDS {
            for b in B_OPERANDS {
                ctx.set_pin(a_in, a)?;
                ctx.set_pin(b_in, b)?;
                ctx.set_pin(start, 1)?;
                ctx.wait_clock(clock).await;
                ctx.set_pin(start, 0)?;
                let mut ticks = 1;
                while ctx.get_pin_u64(done)? != Some(1) {
                    ctx.check(
                        ticks < MAX_TICKS,
                        format!("gcd({a}, {b}) not done after {MAX_TICKS} ticks"),
                    )?;
                    ctx.wait_clock(clock).await;
                    ticks += 1;
                }
                log.borrow_mut().push((a, b, ctx.get_pin_u64(result)?, ticks));
            }
        }
        Ok(())
    });

    let run = sim.run().unwrap();
    assert_eq!(run.reason, StopReason::TasksFinished);
    assert!(run.assertion_failures.is_empty());
    let outcomes = outcomes.borrow();
    assert_eq!(outcomes.len(), A_OPERANDS.len() * B_OPERANDS.len());
    for &(a, b, value, ticks) in outcomes.iter() {
        assert_eq!(value, Some(gcd(a, b)), "gcd({a}, {b})");
        assert!(ticks <= MAX_TICKS, "gcd({a}, {b}) took {ticks} ticks");
    }
}

#[test]
fn equal_operands_finish_right_after_loading() {
    let g = build_gcd(8).unwrap();
    let (clock, a_in, b_in, start, done, result) = (g.clock, g.a_in, g.b_in, g.start, g.done, g.result);
    let mut sim = Simulator::new(g.circuit, quiet()).unwrap();
    sim.spawn(move |ctx| async move {
        ctx.set_pin(a_in, 12)?;
        ctx.set_pin(b_in, 12)?;
        ctx.set_pin(start, 1)?;
        ctx.wait_clock(clock).await;
        ctx.set_pin(start, 0)?;
        ctx.check(ctx.get_pin_u64(done)? == Some(1), "done after load")?;
        ctx.check(ctx.get_pin_u64(result)? == Some(12), "gcd(12, 12) = 12")
    });
    sim.run().unwrap();
}

#[test]
fn undriven_operands_stay_undefined() {
    let g = build_gcd(8).unwrap();
    let (clock, start, done, result) = (g.clock, g.start, g.done, g.result);
    let mut sim = Simulator::new(g.circuit, quiet()).unwrap();
    sim.spawn(move |ctx| async move {
        // Before loading both working registers hold their reset value.
        ctx.check(ctx.get_pin_u64(done)? == Some(1), "reset state agrees")?;
        ctx.set_pin(start, 1)?;
        ctx.wait_clock(clock).await;
        ctx.check(ctx.get_pin(done)?.to_u64().is_none(), "done is X")?;
        ctx.check(ctx.get_pin(result)?.to_u64().is_none(), "result is X")
    });
    sim.run().unwrap();
}
