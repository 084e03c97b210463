//! SMT-LIB2 rendering of terms, sorts and whole queries.

use num::rational::BigRational;
use num::{One, Signed};

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Render `term` in SMT-LIB2 concrete syntax.
pub fn to_smtlib(term: &SmtTerm) -> String {
    let mut out = String::new();
    write_term(&mut out, term);
    out
}

fn write_term(out: &mut String, term: &SmtTerm) {
    match term {
        SmtTerm::Var(symbol) => out.push_str(symbol.as_str()),
        SmtTerm::IntLit(n) if *n < 0 => {
            out.push_str("(- ");
            out.push_str(&n.unsigned_abs().to_string());
            out.push(')');
        }
        SmtTerm::IntLit(n) => out.push_str(&n.to_string()),
        SmtTerm::RealLit(value) => write_real(out, value),
        SmtTerm::BoolLit(b) => out.push_str(if *b { "true" } else { "false" }),
        SmtTerm::Add(a, b) => write_app(out, "+", &[a, b]),
        SmtTerm::Sub(a, b) => write_app(out, "-", &[a, b]),
        SmtTerm::Mul(a, b) => write_app(out, "*", &[a, b]),
        SmtTerm::Neg(a) => write_app(out, "-", &[a]),
        SmtTerm::Eq(a, b) => write_app(out, "=", &[a, b]),
        SmtTerm::Lt(a, b) => write_app(out, "<", &[a, b]),
        SmtTerm::Le(a, b) => write_app(out, "<=", &[a, b]),
        SmtTerm::Gt(a, b) => write_app(out, ">", &[a, b]),
        SmtTerm::Ge(a, b) => write_app(out, ">=", &[a, b]),
        SmtTerm::And(terms) => write_nary(out, "and", "true", terms),
        SmtTerm::Or(terms) => write_nary(out, "or", "false", terms),
        SmtTerm::Not(a) => write_app(out, "not", &[a]),
        SmtTerm::Implies(a, b) => write_app(out, "=>", &[a, b]),
        SmtTerm::Ite(c, t, e) => write_app(out, "ite", &[c, t, e]),
    }
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

/// Nullary `and`/`or` are not legal SMT-LIB; print the unit instead, and a
/// single operand bare.
fn write_nary(out: &mut String, op: &str, unit: &str, terms: &[SmtTerm]) {
    match terms {
        [] => out.push_str(unit),
        [only] => write_term(out, only),
        _ => {
            let args: Vec<&SmtTerm> = terms.iter().collect();
            write_app(out, op, &args);
        }
    }
}

/// Real literals use decimal numerals so they stay well-sorted under strict
/// logics: `1.0`, `(- 1.0)`, `(/ 3.0 5.0)`.
fn write_real(out: &mut String, value: &BigRational) {
    let magnitude = value.abs();
    let body = if magnitude.denom().is_one() {
        format!("{}.0", magnitude.numer())
    } else {
        format!("(/ {}.0 {}.0)", magnitude.numer(), magnitude.denom())
    };
    if value.is_negative() {
        out.push_str("(- ");
        out.push_str(&body);
        out.push(')');
    } else {
        out.push_str(&body);
    }
}

pub fn sort_to_smtlib(sort: &SmtSort) -> &'static str {
    match sort {
        SmtSort::Bool => "Bool",
        SmtSort::Int => "Int",
        SmtSort::Real => "Real",
    }
}

/// A standalone script: logic, declarations, assertions, `check-sat`.
pub fn query_to_smt2_script(declarations: &[(String, SmtSort)], assertions: &[SmtTerm]) -> String {
    let mut script = String::from("(set-logic ALL)\n");
    for (name, sort) in declarations {
        script.push_str("(declare-const ");
        script.push_str(name);
        script.push(' ');
        script.push_str(sort_to_smtlib(sort));
        script.push_str(")\n");
    }
    for assertion in assertions {
        script.push_str("(assert ");
        write_term(&mut script, assertion);
        script.push_str(")\n");
    }
    script.push_str("(check-sat)\n(exit)\n");
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use kstep_ir::rational::{integer, ratio};

    #[test]
    fn flow_update_prints_prefix_form() {
        let next = SmtTerm::var("zA_0").add(SmtTerm::var("vA_0").mul(SmtTerm::real(ratio(1, 4))));
        assert_eq!(
            to_smtlib(&SmtTerm::var("zA_1").eq(next)),
            "(= zA_1 (+ zA_0 (* vA_0 (/ 1.0 4.0))))"
        );
    }

    #[test]
    fn negative_literals_use_unary_minus() {
        let term = SmtTerm::and(vec![
            SmtTerm::var("sB_2").eq(SmtTerm::int(-1)),
            SmtTerm::var("rp_1").ge(SmtTerm::int(0)),
        ]);
        assert_eq!(to_smtlib(&term), "(and (= sB_2 (- 1)) (>= rp_1 0))");
    }

    #[test]
    fn degenerate_connectives_collapse() {
        assert_eq!(to_smtlib(&SmtTerm::and(Vec::new())), "true");
        assert_eq!(to_smtlib(&SmtTerm::or(Vec::new())), "false");
        assert_eq!(
            to_smtlib(&SmtTerm::or(vec![SmtTerm::var("waitA_3")])),
            "waitA_3"
        );
    }

    #[test]
    fn real_literals_print_as_decimals() {
        assert_eq!(to_smtlib(&SmtTerm::real(integer(100))), "100.0");
        assert_eq!(to_smtlib(&SmtTerm::real(ratio(3, 5))), "(/ 3.0 5.0)");
        assert_eq!(to_smtlib(&SmtTerm::real(ratio(-1, 10))), "(- (/ 1.0 10.0))");
        assert_eq!(to_smtlib(&SmtTerm::var("vA_0").neg()), "(- vA_0)");
    }

    #[test]
    fn ite_prints_three_operands() {
        let term = SmtTerm::ite(
            SmtTerm::var("waitB_0"),
            SmtTerm::int(4),
            SmtTerm::var("sB_0"),
        );
        assert_eq!(to_smtlib(&term), "(ite waitB_0 4 sB_0)");
    }

    #[test]
    fn script_declares_before_asserting() {
        let script = query_to_smt2_script(
            &[("zA_0".to_string(), SmtSort::Real)],
            &[SmtTerm::var("zA_0").ge(SmtTerm::real(integer(0)))],
        );
        assert_eq!(
            script,
            "(set-logic ALL)\n(declare-const zA_0 Real)\n(assert (>= zA_0 0.0))\n(check-sat)\n(exit)\n"
        );
    }
}
