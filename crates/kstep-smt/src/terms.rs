use std::fmt;
use std::sync::Arc;

use num::rational::BigRational;

/// Interned variable name.
///
/// Time-indexed symbols are only ever produced by
/// [`VarArena`](crate::encoder::variables::VarArena); cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn new(name: impl AsRef<str>) -> Self {
        Symbol(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quantifier-free term over `Bool`, `Int` and `Real` symbols.
///
/// Terms are plain trees; sharing happens only through [`Symbol`]. The
/// SMT-LIB rendering (also used as the dedup key of asserted terms) is
/// available through `Display`.
#[derive(Debug, Clone, PartialEq)]
pub enum SmtTerm {
    Var(Symbol),
    IntLit(i64),
    RealLit(BigRational),
    BoolLit(bool),

    Add(Box<SmtTerm>, Box<SmtTerm>),
    Sub(Box<SmtTerm>, Box<SmtTerm>),
    Mul(Box<SmtTerm>, Box<SmtTerm>),
    Neg(Box<SmtTerm>),

    Eq(Box<SmtTerm>, Box<SmtTerm>),
    Lt(Box<SmtTerm>, Box<SmtTerm>),
    Le(Box<SmtTerm>, Box<SmtTerm>),
    Gt(Box<SmtTerm>, Box<SmtTerm>),
    Ge(Box<SmtTerm>, Box<SmtTerm>),

    /// Empty conjunction is `true`.
    And(Vec<SmtTerm>),
    /// Empty disjunction is `false`.
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),

    Ite(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),
}

fn pair(lhs: SmtTerm, rhs: SmtTerm) -> (Box<SmtTerm>, Box<SmtTerm>) {
    (Box::new(lhs), Box::new(rhs))
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl AsRef<str>) -> Self {
        SmtTerm::Var(Symbol::new(name))
    }

    pub fn int(n: i64) -> Self {
        SmtTerm::IntLit(n)
    }

    pub fn real(value: BigRational) -> Self {
        SmtTerm::RealLit(value)
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn add(self, rhs: SmtTerm) -> Self {
        let (a, b) = pair(self, rhs);
        SmtTerm::Add(a, b)
    }

    pub fn sub(self, rhs: SmtTerm) -> Self {
        let (a, b) = pair(self, rhs);
        SmtTerm::Sub(a, b)
    }

    pub fn mul(self, rhs: SmtTerm) -> Self {
        let (a, b) = pair(self, rhs);
        SmtTerm::Mul(a, b)
    }

    pub fn neg(self) -> Self {
        SmtTerm::Neg(Box::new(self))
    }

    pub fn eq(self, rhs: SmtTerm) -> Self {
        let (a, b) = pair(self, rhs);
        SmtTerm::Eq(a, b)
    }

    pub fn neq(self, rhs: SmtTerm) -> Self {
        self.eq(rhs).not()
    }

    pub fn lt(self, rhs: SmtTerm) -> Self {
        let (a, b) = pair(self, rhs);
        SmtTerm::Lt(a, b)
    }

    pub fn le(self, rhs: SmtTerm) -> Self {
        let (a, b) = pair(self, rhs);
        SmtTerm::Le(a, b)
    }

    pub fn gt(self, rhs: SmtTerm) -> Self {
        let (a, b) = pair(self, rhs);
        SmtTerm::Gt(a, b)
    }

    pub fn ge(self, rhs: SmtTerm) -> Self {
        let (a, b) = pair(self, rhs);
        SmtTerm::Ge(a, b)
    }

    pub fn and(terms: impl IntoIterator<Item = SmtTerm>) -> Self {
        SmtTerm::And(terms.into_iter().collect())
    }

    pub fn or(terms: impl IntoIterator<Item = SmtTerm>) -> Self {
        SmtTerm::Or(terms.into_iter().collect())
    }

    pub fn not(self) -> Self {
        SmtTerm::Not(Box::new(self))
    }

    pub fn implies(self, rhs: SmtTerm) -> Self {
        let (a, b) = pair(self, rhs);
        SmtTerm::Implies(a, b)
    }

    pub fn ite(cond: SmtTerm, then: SmtTerm, els: SmtTerm) -> Self {
        SmtTerm::Ite(Box::new(cond), Box::new(then), Box::new(els))
    }

    /// `lo <= self < hi`; the Euclid system encodes bounded inputs this way.
    pub fn in_range(self, lo: SmtTerm, hi: SmtTerm) -> Self {
        SmtTerm::and([lo.le(self.clone()), self.lt(hi)])
    }

    /// Visit every variable occurrence, left to right.
    pub fn for_each_symbol(&self, f: &mut impl FnMut(&Symbol)) {
        match self {
            SmtTerm::Var(s) => f(s),
            SmtTerm::IntLit(_) | SmtTerm::RealLit(_) | SmtTerm::BoolLit(_) => {}
            SmtTerm::Neg(t) | SmtTerm::Not(t) => t.for_each_symbol(f),
            SmtTerm::Add(a, b)
            | SmtTerm::Sub(a, b)
            | SmtTerm::Mul(a, b)
            | SmtTerm::Eq(a, b)
            | SmtTerm::Lt(a, b)
            | SmtTerm::Le(a, b)
            | SmtTerm::Gt(a, b)
            | SmtTerm::Ge(a, b)
            | SmtTerm::Implies(a, b) => {
                a.for_each_symbol(f);
                b.for_each_symbol(f);
            }
            SmtTerm::And(ts) | SmtTerm::Or(ts) => ts.iter().for_each(|t| t.for_each_symbol(f)),
            SmtTerm::Ite(c, t, e) => {
                c.for_each_symbol(f);
                t.for_each_symbol(f);
                e.for_each_symbol(f);
            }
        }
    }
}

impl fmt::Display for SmtTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::backends::smtlib_printer::to_smtlib(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_visited_in_order() {
        let term = SmtTerm::ite(
            SmtTerm::var("rp_0").eq(SmtTerm::int(0)),
            SmtTerm::var("r_0"),
            SmtTerm::var("r_0").sub(SmtTerm::var("q_0").mul(SmtTerm::var("rp_0"))),
        );
        let mut seen = Vec::new();
        term.for_each_symbol(&mut |s| seen.push(s.as_str().to_string()));
        assert_eq!(seen, ["rp_0", "r_0", "r_0", "q_0", "rp_0"]);
    }

    #[test]
    fn range_constraint_is_half_open() {
        let term = SmtTerm::var("a").in_range(SmtTerm::int(1), SmtTerm::int(65536));
        assert_eq!(term.to_string(), "(and (<= 1 a) (< a 65536))");
    }

    #[test]
    fn symbols_compare_by_name() {
        assert_eq!(Symbol::new("sA_1"), Symbol::new(String::from("sA_1")));
        assert!(Symbol::new("sA_1") < Symbol::new("sB_0"));
    }
}
