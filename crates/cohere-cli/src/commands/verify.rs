// Command handler for: Verify

use std::path::PathBuf;

use miette::IntoDiagnostic;
use tracing::info;

use cohere_engine::{RefinementConfig, RefinementDriver, VerificationReport, VerificationTask};
use cohere_ir::CompiledProgram;
use cohere_smt::backends::smtlib_printer::to_script;
use cohere_smt::backends::z3_backend::Z3Solver;

use super::helpers::{lookup_model, parse_approximation, parse_output_format, read_program};
use crate::OutputFormat;

pub(crate) struct VerifyArgs {
    pub(crate) file: PathBuf,
    pub(crate) model: String,
    pub(crate) k: usize,
    pub(crate) timeout: u64,
    pub(crate) max_iterations: usize,
    pub(crate) approx: String,
    pub(crate) format: String,
    pub(crate) print_clauses: bool,
    pub(crate) stats: bool,
    pub(crate) dump_smt: Option<PathBuf>,
}

pub(crate) fn run(args: VerifyArgs) -> miette::Result<()> {
    let format = parse_output_format(&args.format)?;
    let config = RefinementConfig {
        k: args.k,
        timeout_secs: args.timeout,
        max_iterations: args.max_iterations,
        initial_approximation: parse_approximation(&args.approx)?,
        ..RefinementConfig::default()
    };
    let wmm = lookup_model(&args.model)?;
    info!("Loading {}...", args.file.display());
    let program = read_program(&args.file)?;
    let task = VerificationTask::new(&program, wmm, config).map_err(|e| miette::miette!("{e}"))?;

    if let Some(path) = &args.dump_smt {
        write_smt_dump(&task, path)?;
        info!("SMT dump written to {}", path.display());
    }

    let report = RefinementDriver::new(&task, Z3Solver::with_timeout_secs(args.timeout))
        .run()
        .map_err(|e| miette::miette!("Verification failed: {e}"))?;

    match format {
        OutputFormat::Text => println!(
            "{}",
            render_text(&report, &task.program, args.print_clauses, args.stats)
        ),
        OutputFormat::Json => println!("{}", report.to_json_pretty().into_diagnostic()?),
    }
    Ok(())
}

/// The first query the solver sees: program, initial approximation and
/// the negated assertion.
fn write_smt_dump(task: &VerificationTask, path: &std::path::Path) -> miette::Result<()> {
    let program = task.encode_program();
    let core = task.encode_wmm_core(&program);
    let mut declarations = program.declarations.clone();
    declarations.extend(core.declarations);
    let mut assertions = program.assertions.clone();
    assertions.extend(core.assertions);
    assertions.push(task.encode_assertions());
    std::fs::write(path, to_script(&declarations, &assertions))
        .into_diagnostic()
        .map_err(|e| miette::miette!("Cannot write {}: {e}", path.display()))
}

pub(crate) fn render_text(
    report: &VerificationReport,
    program: &CompiledProgram,
    print_clauses: bool,
    print_stats: bool,
) -> String {
    let mut out = report.to_string();
    if print_clauses && !report.clauses.is_empty() {
        out.push_str("\nBlocking clauses:");
        for (i, clause) in report.clauses.iter().enumerate() {
            out.push_str(&format!("\n  {:>3}. not ({clause})", i + 1));
            if clause.literals().iter().any(|l| l.is_backward(program)) {
                out.push_str(": future read");
            }
        }
    }
    if print_stats {
        out.push_str(&format!("\n\n{}", report.summary));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohere_engine::{CoreLiteral, Reason, RefinementSummary, Verdict};
    use cohere_ir::{Instruction, Program, ValueExpr};

    /// e0 init x | e1 R x, e2 W x=1 | e3 W x=2
    fn read_then_write() -> CompiledProgram {
        Program::new("rw")
            .with_location("x", 0)
            .with_thread(vec![
                Instruction::load("r", "x"),
                Instruction::store("x", ValueExpr::constant(1)),
            ])
            .with_thread(vec![Instruction::store("x", ValueExpr::constant(2))])
            .compile()
            .unwrap_or_else(|e| panic!("compiles: {e}"))
    }

    fn report_with_clauses() -> VerificationReport {
        VerificationReport {
            program: "rw".into(),
            model: "sc".into(),
            verdict: Verdict::Pass,
            reason: None,
            inverted: false,
            witness: None,
            summary: RefinementSummary {
                iterations: 3,
                num_clauses: 2,
                num_future_read_clauses: 1,
                ..RefinementSummary::default()
            },
            iterations: Vec::new(),
            clauses: vec![
                Reason::new([CoreLiteral::ReadFrom { write: 3, read: 1 }]),
                Reason::new([CoreLiteral::ReadFrom { write: 2, read: 1 }]),
            ],
            config: RefinementConfig::default(),
        }
    }

    #[test]
    fn clauses_are_listed_on_request() {
        let program = read_then_write();
        let report = report_with_clauses();
        let quiet = render_text(&report, &program, false, false);
        assert!(!quiet.contains("Blocking clauses"));
        let verbose = render_text(&report, &program, true, false);
        assert!(verbose.starts_with("RESULT: PASS"));
        assert!(verbose.contains("1. not (rf(e3, e1))\n"));
        assert!(verbose.ends_with("2. not (rf(e2, e1)): future read"));
    }

    #[test]
    fn statistics_follow_the_report() {
        let program = read_then_write();
        let report = report_with_clauses();
        assert!(!render_text(&report, &program, false, false).contains("Iterations"));
        let text = render_text(&report, &program, false, true);
        assert!(text.contains("Iterations: 3"), "{text}");
        assert!(text.contains("Clauses: 2 (1 future read)"), "{text}");
    }
}
