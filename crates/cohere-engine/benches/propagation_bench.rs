use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cohere_engine::{k_search, ExecutionModel, GraphSet, RefinementConfig, RefinementDriver, VerificationTask};
use cohere_ir::{models, CompiledProgram, Instruction, Program, ValueExpr};
use cohere_smt::backends::z3_backend::Z3Solver;

const SB: &str = include_str!("../../../demos/litmus/sb.json");
const ATOMIC_INC: &str = include_str!("../../../demos/litmus/atomic-inc.json");

/// `threads` writers to `x`, each followed by a read of `x`.
fn writers(threads: usize) -> CompiledProgram {
    let mut program = Program::new("writers").with_location("x", 0);
    for t in 0..threads {
        program = program.with_thread(vec![
            Instruction::store("x", ValueExpr::constant(t as i64 + 1)),
            Instruction::load("r", "x"),
        ]);
    }
    program.compile().unwrap()
}

// ---------------------------------------------------------------------------
// Graph construction and coherence search on a fixed execution
// ---------------------------------------------------------------------------

fn bench_build_graphs(c: &mut Criterion) {
    let program = writers(4);
    // every thread reads its own write: e(2t+1) writes, e(2t+2) reads
    let rf: Vec<(usize, usize)> = (0..4).map(|t| (2 * t + 1, 2 * t + 2)).collect();
    let model = ExecutionModel::new(&program, 1..=8, rf).unwrap();
    for name in ["sc", "tso", "rc11"] {
        let wmm = models::by_name(name).unwrap();
        c.bench_function(&format!("build_graphs_writers4_{name}"), |b| {
            b.iter(|| GraphSet::build(black_box(&wmm), black_box(&model), 1000).unwrap())
        });
    }
}

fn bench_k_search(c: &mut Criterion) {
    let program = writers(4);
    let rf: Vec<(usize, usize)> = (0..4).map(|t| (2 * t + 1, 2 * t + 2)).collect();
    let model = ExecutionModel::new(&program, 1..=8, rf).unwrap();
    let wmm = models::tso();
    for k in [1, 2] {
        c.bench_function(&format!("k_search_writers4_tso_k{k}"), |b| {
            b.iter(|| {
                let mut graphs = GraphSet::build(&wmm, &model, 1000).unwrap();
                k_search(black_box(&mut graphs), k).unwrap()
            })
        });
    }
}

// ---------------------------------------------------------------------------
// Full refinement runs
// ---------------------------------------------------------------------------

fn bench_refine(c: &mut Criterion) {
    for (label, source, model) in [("sb_tso", SB, "tso"), ("atomic_inc_sc", ATOMIC_INC, "sc")] {
        let program = Program::from_json(source).unwrap();
        let task =
            VerificationTask::new(&program, models::by_name(model).unwrap(), RefinementConfig::default())
                .unwrap();
        c.bench_function(&format!("refine_{label}"), |b| {
            b.iter(|| RefinementDriver::new(black_box(&task), Z3Solver::new()).run().unwrap())
        });
    }
}

criterion_group!(benches, bench_build_graphs, bench_k_search, bench_refine);
criterion_main!(benches);
