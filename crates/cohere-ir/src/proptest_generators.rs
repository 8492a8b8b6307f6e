//! Proptest strategies for small well-formed litmus-style programs.

use proptest::prelude::*;

use crate::program::*;

const LOCATIONS: [&str; 2] = ["x", "y"];

#[derive(Debug, Clone)]
enum Op {
    Load(usize),
    Store(usize, i64),
    Fence,
    SkipRestIfZero,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..LOCATIONS.len()).prop_map(Op::Load),
        3 => (0..LOCATIONS.len(), 1..=2i64).prop_map(|(l, v)| Op::Store(l, v)),
        1 => Just(Op::Fence),
        1 => Just(Op::SkipRestIfZero),
    ]
}

fn build_thread(tid: usize, ops: &[Op]) -> (Vec<Instruction>, Vec<String>) {
    let mut instructions = Vec::new();
    let mut regs: Vec<String> = Vec::new();
    let mut needs_end = false;
    for op in ops {
        match op {
            Op::Load(loc) => {
                let reg = format!("r{}", regs.len());
                instructions.push(Instruction::load(reg.clone(), LOCATIONS[*loc]));
                regs.push(reg);
            }
            Op::Store(loc, value) => {
                instructions.push(Instruction::store(
                    LOCATIONS[*loc],
                    ValueExpr::constant(*value),
                ));
            }
            Op::Fence => instructions.push(Instruction::fence("mfence")),
            Op::SkipRestIfZero => {
                if let Some(reg) = regs.last() {
                    instructions.push(Instruction::cond_jump(
                        Condition::eq(ValueExpr::reg(reg.clone()), ValueExpr::constant(0)),
                        format!("end{tid}"),
                    ));
                    needs_end = true;
                }
            }
        }
    }
    if needs_end {
        instructions.push(Instruction::label(format!("end{tid}")));
    }
    (instructions, regs)
}

/// Strategy for a program with 2-3 threads of 1-4 accesses over `x` and `y`.
///
/// The assertion compares one final register value against a constant, so
/// both PASS and FAIL verdicts occur.
pub fn arb_program() -> impl Strategy<Value = Program> {
    (
        proptest::collection::vec(proptest::collection::vec(arb_op(), 1..=4), 2..=3),
        any::<prop::sample::Index>(),
        0..=2i64,
        any::<bool>(),
    )
        .prop_map(|(threads, pick, expected, inverted)| {
            let mut program = Program::new("generated");
            for name in LOCATIONS {
                program = program.with_location(name, 0);
            }
            let mut finals = Vec::new();
            for (tid, ops) in threads.iter().enumerate() {
                let (instructions, regs) = build_thread(tid, ops);
                finals.extend(regs.into_iter().map(|r| (tid, r)));
                program = program.with_thread(instructions);
            }
            let condition = if finals.is_empty() {
                Condition::True
            } else {
                let (tid, reg) = finals[pick.index(finals.len())].clone();
                Condition::ne(ValueExpr::final_reg(tid, reg), ValueExpr::constant(expected))
            };
            program.with_assertion(condition, inverted)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_programs_compile(program in arb_program()) {
            let compiled = program.compile();
            prop_assert!(compiled.is_ok(), "{:?}", compiled.err());
        }

        #[test]
        fn every_event_has_a_branch_class(program in arb_program()) {
            let compiled = program.compile().map_err(|e| TestCaseError::fail(e.to_string()))?;
            let be = &compiled.branch_equivalence;
            for event in &compiled.events {
                let class = be.class(be.class_of(event.id));
                prop_assert!(class.events.contains(&event.id));
                prop_assert!(be.is_implied(event.id, event.id));
            }
        }
    }
}
