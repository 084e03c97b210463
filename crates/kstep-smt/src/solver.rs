use std::collections::HashMap;
use std::fmt;

use num::rational::BigRational;

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Answer to one `check-sat`.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    /// The solver gave up; the payload is its reason (`timeout`, `incomplete`, ...).
    Unknown(String),
}

impl SatResult {
    pub fn is_sat(&self) -> bool {
        matches!(self, SatResult::Sat)
    }
}

impl fmt::Display for SatResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SatResult::Sat => f.write_str("sat"),
            SatResult::Unsat => f.write_str("unsat"),
            SatResult::Unknown(reason) => write!(f, "unknown ({reason})"),
        }
    }
}

/// Exact value of one declared symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelValue {
    Int(i64),
    Bool(bool),
    Real(BigRational),
}

impl ModelValue {
    pub fn sort(&self) -> SmtSort {
        match self {
            ModelValue::Int(_) => SmtSort::Int,
            ModelValue::Bool(_) => SmtSort::Bool,
            ModelValue::Real(_) => SmtSort::Real,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ModelValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ModelValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<&BigRational> {
        match self {
            ModelValue::Real(r) => Some(r),
            _ => None,
        }
    }
}

/// Assignment returned with a `sat` answer, keyed by rendered symbol
/// (`sA_3`, `r_0`). Only the symbols the caller asked for are present.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub values: HashMap<String, ModelValue>,
}

impl Model {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&ModelValue> {
        self.values.get(symbol)
    }

    pub fn get_int(&self, symbol: &str) -> Option<i64> {
        self.get(symbol).and_then(ModelValue::as_int)
    }

    pub fn get_bool(&self, symbol: &str) -> Option<bool> {
        self.get(symbol).and_then(ModelValue::as_bool)
    }

    pub fn get_real(&self, symbol: &str) -> Option<&BigRational> {
        self.get(symbol).and_then(ModelValue::as_real)
    }
}

impl FromIterator<(String, ModelValue)> for Model {
    fn from_iter<I: IntoIterator<Item = (String, ModelValue)>>(iter: I) -> Self {
        Model {
            values: iter.into_iter().collect(),
        }
    }
}

/// A decision procedure for quantifier-free linear arithmetic over
/// `Bool`/`Int`/`Real` symbols.
///
/// The drivers only need incremental scopes, a satisfiability answer and a
/// model for selected symbols. `reset` must drop every declaration and
/// assertion but keep backend configuration such as timeouts.
pub trait SmtSolver {
    type Error: std::error::Error + 'static;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Self::Error>;

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    fn push(&mut self) -> Result<(), Self::Error>;

    /// Discard everything asserted since the matching `push`.
    fn pop(&mut self) -> Result<(), Self::Error>;

    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// `check_sat`, then on `sat` read back the values of `symbols`.
    fn check_sat_with_model(
        &mut self,
        symbols: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Self::Error>;

    fn reset(&mut self) -> Result<(), Self::Error>;

    fn declare_all(&mut self, declarations: &[(String, SmtSort)]) -> Result<(), Self::Error> {
        for (name, sort) in declarations {
            self.declare_var(name, sort)?;
        }
        Ok(())
    }

    fn assert_all(&mut self, terms: &[SmtTerm]) -> Result<(), Self::Error> {
        for term in terms {
            self.assert(term)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kstep_ir::rational::ratio;
    use std::collections::VecDeque;
    use std::io;

    /// Answers checks from a script and records what it was told.
    #[derive(Default)]
    struct ScriptedSolver {
        answers: VecDeque<SatResult>,
        declared: Vec<(String, SmtSort)>,
        asserted: usize,
        resets: usize,
    }

    impl SmtSolver for ScriptedSolver {
        type Error = io::Error;

        fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), io::Error> {
            self.declared.push((name.to_string(), *sort));
            Ok(())
        }

        fn assert(&mut self, _term: &SmtTerm) -> Result<(), io::Error> {
            self.asserted += 1;
            Ok(())
        }

        fn push(&mut self) -> Result<(), io::Error> {
            Ok(())
        }

        fn pop(&mut self) -> Result<(), io::Error> {
            Ok(())
        }

        fn check_sat(&mut self) -> Result<SatResult, io::Error> {
            self.answers
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "script exhausted"))
        }

        fn check_sat_with_model(
            &mut self,
            _symbols: &[(&str, &SmtSort)],
        ) -> Result<(SatResult, Option<Model>), io::Error> {
            let result = self.check_sat()?;
            let model = result.is_sat().then(Model::default);
            Ok((result, model))
        }

        fn reset(&mut self) -> Result<(), io::Error> {
            self.declared.clear();
            self.asserted = 0;
            self.resets += 1;
            Ok(())
        }
    }

    #[test]
    fn typed_getters_reject_other_sorts() {
        let model: Model = [
            ("sA_0".to_string(), ModelValue::Int(11)),
            ("waitA_0".to_string(), ModelValue::Bool(false)),
            ("vA_0".to_string(), ModelValue::Real(ratio(3, 5))),
        ]
        .into_iter()
        .collect();

        assert_eq!(model.len(), 3);
        assert_eq!(model.get_int("sA_0"), Some(11));
        assert_eq!(model.get_bool("waitA_0"), Some(false));
        assert_eq!(model.get_real("vA_0"), Some(&ratio(3, 5)));
        assert_eq!(model.get_int("vA_0"), None);
        assert_eq!(model.get_real("sA_0"), None);
        assert_eq!(model.get_bool("sB_0"), None);
        assert_eq!(model.get("vA_0").map(ModelValue::sort), Some(SmtSort::Real));
    }

    #[test]
    fn bulk_helpers_forward_to_single_calls() {
        let mut solver = ScriptedSolver::default();
        solver
            .declare_all(&[("r_0".into(), SmtSort::Int), ("rp_0".into(), SmtSort::Int)])
            .unwrap();
        solver
            .assert_all(&[SmtTerm::var("r_0").gt(SmtTerm::int(0)), SmtTerm::bool(true)])
            .unwrap();
        assert_eq!(solver.declared.len(), 2);
        assert_eq!(solver.asserted, 2);

        solver.reset().unwrap();
        assert!(solver.declared.is_empty());
        assert_eq!(solver.resets, 1);
    }

    #[test]
    fn model_accompanies_sat_only() {
        let mut solver = ScriptedSolver {
            answers: VecDeque::from([SatResult::Unknown("timeout".into()), SatResult::Sat]),
            ..ScriptedSolver::default()
        };
        let (first, model) = solver.check_sat_with_model(&[]).unwrap();
        assert_eq!(first.to_string(), "unknown (timeout)");
        assert!(model.is_none());
        let (second, model) = solver.check_sat_with_model(&[]).unwrap();
        assert!(second.is_sat());
        assert!(model.is_some_and(|m| m.is_empty()));
        assert!(solver.check_sat().is_err());
    }
}
