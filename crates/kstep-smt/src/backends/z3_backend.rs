use std::collections::HashMap;

use num::rational::BigRational;
use num::ToPrimitive;
use thiserror::Error;
use z3::ast::{Bool, Int, Real};
use z3::SatResult as Z3SatResult;

use crate::backends::smtlib_parser::parse_model_value;
use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("z3: {0}")]
    Internal(String),
    #[error("symbol `{0}` was never declared")]
    UnknownVariable(String),
    #[error("symbol `{0}` is already declared with another sort")]
    SortMismatch(String),
    #[error("ill-sorted `{op}`: {detail}")]
    IllSorted { op: &'static str, detail: String },
}

/// A Z3 expression tagged with its sort.
#[derive(Clone)]
enum Z3Term {
    Int(Int),
    Real(Real),
    Bool(Bool),
}

impl Z3Term {
    fn sort_name(&self) -> &'static str {
        match self {
            Z3Term::Int(_) => "Int",
            Z3Term::Real(_) => "Real",
            Z3Term::Bool(_) => "Bool",
        }
    }

    fn sort(&self) -> SmtSort {
        match self {
            Z3Term::Int(_) => SmtSort::Int,
            Z3Term::Real(_) => SmtSort::Real,
            Z3Term::Bool(_) => SmtSort::Bool,
        }
    }

    fn constant(name: &str, sort: &SmtSort) -> Self {
        match sort {
            SmtSort::Int => Z3Term::Int(Int::new_const(name)),
            SmtSort::Real => Z3Term::Real(Real::new_const(name)),
            SmtSort::Bool => Z3Term::Bool(Bool::new_const(name)),
        }
    }

    fn into_bool(self, op: &'static str) -> Result<Bool, Z3Error> {
        match self {
            Z3Term::Bool(b) => Ok(b),
            other => Err(Z3Error::IllSorted {
                op,
                detail: format!("expected Bool, found {}", other.sort_name()),
            }),
        }
    }
}

fn mismatch(op: &'static str, lhs: &Z3Term, rhs: &Z3Term) -> Z3Error {
    Z3Error::IllSorted {
        op,
        detail: format!("{} vs {}", lhs.sort_name(), rhs.sort_name()),
    }
}

/// In-process Z3 context. Declared symbols live in one table so a name is
/// bound to exactly one sort until `reset`.
pub struct Z3Solver {
    solver: z3::Solver,
    symbols: HashMap<String, Z3Term>,
    params: Option<z3::Params>,
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Z3Solver {
    pub fn new() -> Self {
        Self {
            solver: z3::Solver::new(),
            symbols: HashMap::new(),
            params: None,
        }
    }

    /// Per-check limit; `0` leaves checks unbounded.
    pub fn with_timeout_secs(timeout_secs: u64) -> Self {
        let mut this = Self::new();
        if timeout_secs > 0 {
            let millis = u32::try_from(timeout_secs.saturating_mul(1000)).unwrap_or(u32::MAX);
            let mut params = z3::Params::new();
            params.set_u32("timeout", millis);
            this.solver.set_params(&params);
            this.params = Some(params);
        }
        this
    }

    fn lower(&self, term: &SmtTerm) -> Result<Z3Term, Z3Error> {
        Ok(match term {
            SmtTerm::Var(symbol) => self
                .symbols
                .get(symbol.as_str())
                .cloned()
                .ok_or_else(|| Z3Error::UnknownVariable(symbol.to_string()))?,
            SmtTerm::IntLit(n) => Z3Term::Int(Int::from_i64(*n)),
            SmtTerm::RealLit(q) => Z3Term::Real(real_literal(q)?),
            SmtTerm::BoolLit(b) => Z3Term::Bool(Bool::from_bool(*b)),
            SmtTerm::Add(a, b) => self.arith("+", a, b, |x, y| x + y, |x, y| x + y)?,
            SmtTerm::Sub(a, b) => self.arith("-", a, b, |x, y| x - y, |x, y| x - y)?,
            SmtTerm::Mul(a, b) => self.arith("*", a, b, |x, y| x * y, |x, y| x * y)?,
            SmtTerm::Neg(inner) => match self.lower(inner)? {
                Z3Term::Int(x) => Z3Term::Int(&Int::from_i64(0) - &x),
                Z3Term::Real(x) => Z3Term::Real(&Real::from_int(&Int::from_i64(0)) - &x),
                Z3Term::Bool(_) => {
                    return Err(Z3Error::IllSorted {
                        op: "-",
                        detail: "cannot negate Bool".into(),
                    })
                }
            },
            SmtTerm::Eq(a, b) => match (self.lower(a)?, self.lower(b)?) {
                (Z3Term::Int(x), Z3Term::Int(y)) => Z3Term::Bool(x.eq(&y)),
                (Z3Term::Real(x), Z3Term::Real(y)) => Z3Term::Bool(x.eq(&y)),
                (Z3Term::Bool(x), Z3Term::Bool(y)) => Z3Term::Bool(x.eq(&y)),
                (x, y) => return Err(mismatch("=", &x, &y)),
            },
            SmtTerm::Lt(a, b) => self.compare("<", a, b, |x, y| x.lt(y), |x, y| x.lt(y))?,
            SmtTerm::Le(a, b) => self.compare("<=", a, b, |x, y| x.le(y), |x, y| x.le(y))?,
            SmtTerm::Gt(a, b) => self.compare(">", a, b, |x, y| x.gt(y), |x, y| x.gt(y))?,
            SmtTerm::Ge(a, b) => self.compare(">=", a, b, |x, y| x.ge(y), |x, y| x.ge(y))?,
            SmtTerm::And(parts) => {
                let parts = self.lower_bools("and", parts)?;
                Z3Term::Bool(Bool::and(&parts.iter().collect::<Vec<_>>()))
            }
            SmtTerm::Or(parts) => {
                let parts = self.lower_bools("or", parts)?;
                Z3Term::Bool(Bool::or(&parts.iter().collect::<Vec<_>>()))
            }
            SmtTerm::Not(inner) => Z3Term::Bool(self.lower(inner)?.into_bool("not")?.not()),
            SmtTerm::Implies(a, b) => {
                let premise = self.lower(a)?.into_bool("=>")?;
                let conclusion = self.lower(b)?.into_bool("=>")?;
                Z3Term::Bool(premise.implies(&conclusion))
            }
            SmtTerm::Ite(cond, then, els) => {
                let guard = self.lower(cond)?.into_bool("ite")?;
                match (self.lower(then)?, self.lower(els)?) {
                    (Z3Term::Int(x), Z3Term::Int(y)) => Z3Term::Int(guard.ite(&x, &y)),
                    (Z3Term::Real(x), Z3Term::Real(y)) => Z3Term::Real(guard.ite(&x, &y)),
                    (Z3Term::Bool(x), Z3Term::Bool(y)) => Z3Term::Bool(guard.ite(&x, &y)),
                    (x, y) => return Err(mismatch("ite", &x, &y)),
                }
            }
        })
    }

    fn lower_bools(&self, op: &'static str, parts: &[SmtTerm]) -> Result<Vec<Bool>, Z3Error> {
        parts
            .iter()
            .map(|part| self.lower(part)?.into_bool(op))
            .collect()
    }

    fn arith(
        &self,
        op: &'static str,
        a: &SmtTerm,
        b: &SmtTerm,
        on_int: fn(&Int, &Int) -> Int,
        on_real: fn(&Real, &Real) -> Real,
    ) -> Result<Z3Term, Z3Error> {
        match (self.lower(a)?, self.lower(b)?) {
            (Z3Term::Int(x), Z3Term::Int(y)) => Ok(Z3Term::Int(on_int(&x, &y))),
            (Z3Term::Real(x), Z3Term::Real(y)) => Ok(Z3Term::Real(on_real(&x, &y))),
            (x, y) => Err(mismatch(op, &x, &y)),
        }
    }

    fn compare(
        &self,
        op: &'static str,
        a: &SmtTerm,
        b: &SmtTerm,
        on_int: fn(&Int, &Int) -> Bool,
        on_real: fn(&Real, &Real) -> Bool,
    ) -> Result<Z3Term, Z3Error> {
        match (self.lower(a)?, self.lower(b)?) {
            (Z3Term::Int(x), Z3Term::Int(y)) => Ok(Z3Term::Bool(on_int(&x, &y))),
            (Z3Term::Real(x), Z3Term::Real(y)) => Ok(Z3Term::Bool(on_real(&x, &y))),
            (x, y) => Err(mismatch(op, &x, &y)),
        }
    }

    fn read_back(model: &z3::Model, value: &Z3Term) -> Result<Option<ModelValue>, Z3Error> {
        Ok(match value {
            Z3Term::Int(x) => model
                .eval::<Int>(x, true)
                .and_then(|v| v.as_i64())
                .map(ModelValue::Int),
            Z3Term::Bool(x) => model
                .eval::<Bool>(x, true)
                .and_then(|v| v.as_bool())
                .map(ModelValue::Bool),
            Z3Term::Real(x) => match model.eval::<Real>(x, true) {
                Some(v) => Some(
                    parse_model_value(&v.to_string(), &SmtSort::Real).map_err(Z3Error::Internal)?,
                ),
                None => None,
            },
        })
    }

    fn unknown(&self) -> SatResult {
        SatResult::Unknown(
            self.solver
                .get_reason_unknown()
                .unwrap_or_else(|| "no reason given".into()),
        )
    }
}

/// Z3 numerals are built from machine integers, so both parts must fit `i64`.
fn real_literal(q: &BigRational) -> Result<Real, Z3Error> {
    let (Some(numer), Some(denom)) = (q.numer().to_i64(), q.denom().to_i64()) else {
        return Err(Z3Error::Internal(format!("rational {q} does not fit in i64")));
    };
    let numer = Real::from_int(&Int::from_i64(numer));
    Ok(match denom {
        1 => numer,
        d => &numer / &Real::from_int(&Int::from_i64(d)),
    })
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Z3Error> {
        match self.symbols.get(name) {
            Some(existing) if existing.sort() != *sort => {
                Err(Z3Error::SortMismatch(name.to_string()))
            }
            Some(_) => Ok(()),
            None => {
                self.symbols
                    .insert(name.to_string(), Z3Term::constant(name, sort));
                Ok(())
            }
        }
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        let formula = self.lower(term)?.into_bool("assert")?;
        self.solver.assert(&formula);
        Ok(())
    }

    fn push(&mut self) -> Result<(), Z3Error> {
        self.solver.push();
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Z3Error> {
        self.solver.pop(1);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        Ok(match self.solver.check() {
            Z3SatResult::Sat => SatResult::Sat,
            Z3SatResult::Unsat => SatResult::Unsat,
            Z3SatResult::Unknown => self.unknown(),
        })
    }

    fn check_sat_with_model(
        &mut self,
        symbols: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Z3Error> {
        let result = self.check_sat()?;
        if !result.is_sat() {
            return Ok((result, None));
        }
        let z3_model = self
            .solver
            .get_model()
            .ok_or_else(|| Z3Error::Internal("sat answer came without a model".into()))?;
        let mut model = Model::default();
        for &(name, sort) in symbols {
            let Some(declared) = self.symbols.get(name) else {
                continue;
            };
            if declared.sort() != *sort {
                return Err(Z3Error::SortMismatch(name.to_string()));
            }
            if let Some(value) = Self::read_back(&z3_model, declared)? {
                model.values.insert(name.to_string(), value);
            }
        }
        Ok((result, Some(model)))
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.solver.reset();
        // reset drops solver parameters
        if let Some(params) = &self.params {
            self.solver.set_params(params);
        }
        self.symbols.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kstep_ir::rational::{integer, ratio};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn solver_with(decls: &[(&str, SmtSort)]) -> Result<Z3Solver, Z3Error> {
        let mut solver = Z3Solver::new();
        for (name, sort) in decls {
            solver.declare_var(name, sort)?;
        }
        Ok(solver)
    }

    #[test]
    fn sector_occupancy_is_satisfiable() -> TestResult {
        let mut solver = solver_with(&[("sA_0", SmtSort::Int), ("sB_0", SmtSort::Int)])?;
        solver.assert(&SmtTerm::and([
            SmtTerm::var("sA_0").in_range(SmtTerm::int(0), SmtTerm::int(4)),
            SmtTerm::var("sB_0").in_range(SmtTerm::int(0), SmtTerm::int(4)),
            SmtTerm::var("sA_0").add(SmtTerm::var("sB_0")).eq(SmtTerm::int(5)),
        ]))?;
        assert!(solver.check_sat()?.is_sat());
        Ok(())
    }

    #[test]
    fn empty_range_is_unsat() -> TestResult {
        let mut solver = solver_with(&[("r_0", SmtSort::Int)])?;
        solver.assert(&SmtTerm::var("r_0").in_range(SmtTerm::int(3), SmtTerm::int(3)))?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        Ok(())
    }

    #[test]
    fn int_model_reads_negative_values() -> TestResult {
        let mut solver = solver_with(&[("rp_1", SmtSort::Int)])?;
        solver.assert(&SmtTerm::var("rp_1").eq(SmtTerm::int(-42)))?;
        let (result, model) = solver.check_sat_with_model(&[("rp_1", &SmtSort::Int)])?;
        assert!(result.is_sat());
        let model = model.ok_or("sat without model")?;
        assert_eq!(model.get_int("rp_1"), Some(-42));
        Ok(())
    }

    #[test]
    fn real_model_values_are_exact() -> TestResult {
        let mut solver = solver_with(&[("zA_1", SmtSort::Real), ("zB_1", SmtSort::Real)])?;
        // zA_1 = 3/5 - 1/4 * 2, zB_1 = -zA_1
        let expr = SmtTerm::real(ratio(3, 5))
            .sub(SmtTerm::real(ratio(1, 4)).mul(SmtTerm::real(integer(2))));
        solver.assert(&SmtTerm::var("zA_1").eq(expr))?;
        solver.assert(&SmtTerm::var("zB_1").eq(SmtTerm::var("zA_1").neg()))?;

        let wanted = [("zA_1", &SmtSort::Real), ("zB_1", &SmtSort::Real)];
        let (_, model) = solver.check_sat_with_model(&wanted)?;
        let model = model.ok_or("sat without model")?;
        assert_eq!(model.get_real("zA_1"), Some(&ratio(1, 10)));
        assert_eq!(model.get_real("zB_1"), Some(&ratio(-1, 10)));
        Ok(())
    }

    #[test]
    fn ill_sorted_terms_are_rejected() -> TestResult {
        let mut solver = solver_with(&[("sA_0", SmtSort::Int), ("zA_0", SmtSort::Real)])?;
        let err = solver
            .assert(&SmtTerm::var("sA_0").add(SmtTerm::var("zA_0")).ge(SmtTerm::int(0)))
            .expect_err("Int + Real must not lower");
        assert!(
            matches!(err, Z3Error::IllSorted { op: "+", .. }),
            "unexpected error: {err}"
        );
        let err = solver.assert(&SmtTerm::var("sA_0")).expect_err("Int is not a formula");
        assert_eq!(err.to_string(), "ill-sorted `assert`: expected Bool, found Int");
        Ok(())
    }

    #[test]
    fn undeclared_symbols_are_reported() {
        let mut solver = Z3Solver::new();
        let err = solver
            .assert(&SmtTerm::var("waitA_0"))
            .expect_err("nothing declared");
        assert!(matches!(err, Z3Error::UnknownVariable(ref s) if s == "waitA_0"));
    }

    #[test]
    fn symbol_keeps_its_first_sort() -> TestResult {
        let mut solver = solver_with(&[("cA_0", SmtSort::Int)])?;
        solver.declare_var("cA_0", &SmtSort::Int)?;
        assert!(matches!(
            solver.declare_var("cA_0", &SmtSort::Bool),
            Err(Z3Error::SortMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn reset_forgets_symbols_but_keeps_timeout() -> TestResult {
        let mut solver = Z3Solver::with_timeout_secs(2);
        assert!(solver.params.is_some());
        solver.declare_var("r_0", &SmtSort::Int)?;
        solver.assert(&SmtTerm::var("r_0").eq(SmtTerm::int(1)))?;
        assert!(solver.check_sat()?.is_sat());

        solver.reset()?;
        assert!(solver.assert(&SmtTerm::var("r_0").eq(SmtTerm::int(2))).is_err());
        solver.declare_var("r_0", &SmtSort::Bool)?;
        solver.assert(&SmtTerm::var("r_0"))?;
        assert!(solver.check_sat()?.is_sat());
        assert!(solver.params.is_some());
        assert!(Z3Solver::with_timeout_secs(0).params.is_none());
        Ok(())
    }

    #[test]
    fn pop_discards_scoped_assertions() -> TestResult {
        let mut solver = solver_with(&[("waitA_0", SmtSort::Bool)])?;
        solver.assert(&SmtTerm::var("waitA_0"))?;
        solver.push()?;
        solver.assert(&SmtTerm::var("waitA_0").not())?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        solver.pop()?;
        assert!(solver.check_sat()?.is_sat());
        Ok(())
    }

    #[test]
    fn nested_ite_selects_real_branch() -> TestResult {
        let mut solver = solver_with(&[
            ("p", SmtSort::Bool),
            ("q", SmtSort::Bool),
            ("vA_0", SmtSort::Real),
        ])?;
        // vA_0 = ite(p, ite(q, 1/2, 2), 3)
        let speed = SmtTerm::ite(
            SmtTerm::var("p"),
            SmtTerm::ite(
                SmtTerm::var("q"),
                SmtTerm::real(ratio(1, 2)),
                SmtTerm::real(integer(2)),
            ),
            SmtTerm::real(integer(3)),
        );
        solver.assert_all(&[
            SmtTerm::var("vA_0").eq(speed),
            SmtTerm::var("p"),
            SmtTerm::var("q"),
        ])?;
        let (_, model) = solver.check_sat_with_model(&[("vA_0", &SmtSort::Real)])?;
        let model = model.ok_or("sat without model")?;
        assert_eq!(model.get_real("vA_0"), Some(&ratio(1, 2)));
        Ok(())
    }

    #[test]
    fn model_only_holds_requested_symbols() -> TestResult {
        let mut solver = solver_with(&[("r_0", SmtSort::Int), ("rp_0", SmtSort::Int)])?;
        solver.assert(&SmtTerm::var("r_0").lt(SmtTerm::var("rp_0")))?;
        let (_, model) =
            solver.check_sat_with_model(&[("r_0", &SmtSort::Int), ("missing", &SmtSort::Int)])?;
        let model = model.ok_or("sat without model")?;
        assert_eq!(model.len(), 1);
        assert!(model.get("rp_0").is_none());
        Ok(())
    }
}
