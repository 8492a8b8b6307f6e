use std::fmt::Write as _;

use crate::terms::{SmtSort, SmtTerm};

/// Print an SmtTerm in SMT-LIB2 syntax.
pub fn to_smtlib(term: &SmtTerm) -> String {
    let mut out = String::new();
    write_term(&mut out, term);
    out
}

fn write_app(out: &mut String, op: &str, args: &[&SmtTerm]) {
    out.push('(');
    out.push_str(op);
    for arg in args {
        out.push(' ');
        write_term(out, arg);
    }
    out.push(')');
}

fn write_term(out: &mut String, term: &SmtTerm) {
    match term {
        SmtTerm::Var(name) => out.push_str(name),
        SmtTerm::IntLit(n) if *n < 0 => {
            let _ = write!(out, "(- {})", n.unsigned_abs());
        }
        SmtTerm::IntLit(n) => {
            let _ = write!(out, "{n}");
        }
        SmtTerm::BoolLit(b) => out.push_str(if *b { "true" } else { "false" }),
        SmtTerm::Add(l, r) => write_app(out, "+", &[l.as_ref(), r.as_ref()]),
        SmtTerm::Sub(l, r) => write_app(out, "-", &[l.as_ref(), r.as_ref()]),
        SmtTerm::Eq(l, r) => write_app(out, "=", &[l.as_ref(), r.as_ref()]),
        SmtTerm::Lt(l, r) => write_app(out, "<", &[l.as_ref(), r.as_ref()]),
        SmtTerm::Le(l, r) => write_app(out, "<=", &[l.as_ref(), r.as_ref()]),
        SmtTerm::And(terms) if terms.is_empty() => out.push_str("true"),
        SmtTerm::Or(terms) if terms.is_empty() => out.push_str("false"),
        SmtTerm::And(terms) => write_app(out, "and", &terms.iter().collect::<Vec<_>>()),
        SmtTerm::Or(terms) => write_app(out, "or", &terms.iter().collect::<Vec<_>>()),
        SmtTerm::Not(inner) => write_app(out, "not", &[inner.as_ref()]),
        SmtTerm::Implies(l, r) => write_app(out, "=>", &[l.as_ref(), r.as_ref()]),
        SmtTerm::Ite(c, t, e) => write_app(out, "ite", &[c.as_ref(), t.as_ref(), e.as_ref()]),
    }
}

/// A complete SMT-LIB2 script: declarations, assertions, `(check-sat)`.
pub fn to_script(declarations: &[(String, SmtSort)], assertions: &[SmtTerm]) -> String {
    let mut out = String::new();
    for (name, sort) in declarations {
        let _ = writeln!(out, "(declare-const {name} {sort})");
    }
    for term in assertions {
        let _ = writeln!(out, "(assert {})", to_smtlib(term));
    }
    out.push_str("(check-sat)\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_simple_term() {
        let term = SmtTerm::var("x").add(SmtTerm::int(1)).le(SmtTerm::int(-2));
        assert_eq!(to_smtlib(&term), "(<= (+ x 1) (- 2))");
    }

    #[test]
    fn print_clause() {
        let clause = SmtTerm::Or(vec![
            SmtTerm::var("exec_3").not(),
            SmtTerm::var("rf_1_3").not(),
        ]);
        assert_eq!(to_smtlib(&clause), "(or (not exec_3) (not rf_1_3))");
    }

    #[test]
    fn script_declares_before_asserting() {
        let script = to_script(
            &[("exec_0".to_string(), SmtSort::Bool)],
            &[SmtTerm::var("exec_0")],
        );
        assert_eq!(
            script,
            "(declare-const exec_0 Bool)\n(assert exec_0)\n(check-sat)\n"
        );
    }
}
