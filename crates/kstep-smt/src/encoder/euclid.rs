//! The extended Euclid algorithm as a transition system.
//!
//! State: the inputs `a` and `b`, the remainder pair `r`/`rp` and the Bézout
//! coefficient pairs `s`/`sp` and `t`/`tp`. The quotient `q` is free and only
//! pinned down by the division constraints of the step leaving the state.
//! Fixed-width inputs are modelled as integers bounded by `2^w`.

use kstep_ir::EuclidScenario;

use super::safety::SafetyKind;
use super::system::TransitionSystem;
use super::variables::{FieldId, FieldKind, StateSchema, StateVector};
use super::EncodeError;
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Clone, Copy)]
struct EuclidFields {
    a: FieldId,
    b: FieldId,
    r: FieldId,
    rp: FieldId,
    s: FieldId,
    sp: FieldId,
    t: FieldId,
    tp: FieldId,
    q: FieldId,
}

impl EuclidFields {
    /// Everything the step carries over when the algorithm has halted.
    fn state(&self) -> [FieldId; 8] {
        [
            self.a, self.b, self.r, self.rp, self.s, self.sp, self.t, self.tp,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct EuclidSystem {
    name: String,
    input_bound: i64,
    signed_bound: i64,
    schema: StateSchema,
    fields: EuclidFields,
}

impl EuclidSystem {
    pub fn new(scenario: &EuclidScenario) -> Result<Self, EncodeError> {
        let mut schema = StateSchema::new();
        let mut state = |name: &str| schema.push(name, SmtSort::Int, FieldKind::State);
        let a = state("a")?;
        let b = state("b")?;
        let r = state("r")?;
        let rp = state("rp")?;
        let s = state("s")?;
        let sp = state("sp")?;
        let t = state("t")?;
        let tp = state("tp")?;
        let q = schema.push("q", SmtSort::Int, FieldKind::Auxiliary)?;
        Ok(Self {
            name: scenario.name.clone(),
            input_bound: scenario.input_bound(),
            signed_bound: scenario.signed_bound(),
            schema,
            fields: EuclidFields {
                a,
                b,
                r,
                rp,
                s,
                sp,
                t,
                tp,
                q,
            },
        })
    }

    fn input_range(&self, term: SmtTerm) -> SmtTerm {
        term.in_range(SmtTerm::int(1), SmtTerm::int(self.input_bound))
    }

    /// `w`-bit unsigned word.
    fn unsigned_range(&self, term: SmtTerm) -> SmtTerm {
        term.in_range(SmtTerm::int(0), SmtTerm::int(self.input_bound))
    }

    /// `w`-bit two's complement word.
    fn signed_range(&self, term: SmtTerm) -> SmtTerm {
        term.in_range(
            SmtTerm::int(-self.signed_bound),
            SmtTerm::int(self.signed_bound),
        )
    }

    fn no_overflow(&self, cur: &StateVector) -> SmtTerm {
        let f = &self.fields;
        let remainders = [f.r, f.rp]
            .into_iter()
            .map(|id| self.unsigned_range(cur.term(id)));
        let coefficients = [f.s, f.sp, f.t, f.tp]
            .into_iter()
            .map(|id| self.signed_range(cur.term(id)));
        SmtTerm::and(remainders.chain(coefficients))
    }

    /// `a*s + b*t = r` for both the current and the previous pair.
    fn bezout(&self, cur: &StateVector) -> SmtTerm {
        let f = &self.fields;
        let combination = |x: FieldId, y: FieldId| {
            cur.term(f.a)
                .mul(cur.term(x))
                .add(cur.term(f.b).mul(cur.term(y)))
        };
        SmtTerm::and([
            combination(f.s, f.t).eq(cur.term(f.r)),
            combination(f.sp, f.tp).eq(cur.term(f.rp)),
        ])
    }

    fn remainder_violation(&self, prev: Option<&StateVector>, cur: &StateVector) -> SmtTerm {
        let rp = self.fields.rp;
        let negative = cur.term(rp).lt(SmtTerm::int(0));
        let Some(prev) = prev else {
            return negative;
        };
        let not_decreasing = SmtTerm::and([
            prev.term(rp).neq(SmtTerm::int(0)),
            cur.term(rp).ge(prev.term(rp)),
        ]);
        SmtTerm::or([negative, not_decreasing])
    }
}

impl TransitionSystem for EuclidSystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &StateSchema {
        &self.schema
    }

    fn initial(&self, state: &StateVector) -> SmtTerm {
        let f = &self.fields;
        SmtTerm::and([
            self.input_range(state.term(f.a)),
            self.input_range(state.term(f.b)),
            state.term(f.r).eq(state.term(f.a)),
            state.term(f.rp).eq(state.term(f.b)),
            state.term(f.s).eq(SmtTerm::int(1)),
            state.term(f.sp).eq(SmtTerm::int(0)),
            state.term(f.t).eq(SmtTerm::int(0)),
            state.term(f.tp).eq(SmtTerm::int(1)),
        ])
    }

    fn transition(&self, cur: &StateVector, next: &StateVector) -> SmtTerm {
        let f = &self.fields;
        let q = cur.term(f.q);
        // x' = xp, xp' = x - q*xp
        let shift = |x: FieldId, xp: FieldId| {
            [
                next.term(x).eq(cur.term(xp)),
                next.term(xp).eq(cur.term(x).sub(q.clone().mul(cur.term(xp)))),
            ]
        };
        let rp = cur.term(f.rp);
        let running = rp.clone().neq(SmtTerm::int(0));

        let mut step = vec![
            next.term(f.a).eq(cur.term(f.a)),
            next.term(f.b).eq(cur.term(f.b)),
        ];
        step.extend(shift(f.r, f.rp));
        step.push(next.term(f.rp).ge(SmtTerm::int(0)));
        step.push(next.term(f.rp).lt(rp));
        step.extend(shift(f.s, f.sp));
        step.extend(shift(f.t, f.tp));

        let halted = f
            .state()
            .into_iter()
            .map(|id| next.term(id).eq(cur.term(id)));
        SmtTerm::and([
            running.clone().implies(SmtTerm::and(step)),
            running.not().implies(SmtTerm::and(halted)),
        ])
    }

    fn violation(
        &self,
        kind: SafetyKind,
        prev: Option<&StateVector>,
        cur: &StateVector,
    ) -> Result<SmtTerm, EncodeError> {
        match kind {
            SafetyKind::RemainderDecreasing => Ok(self.remainder_violation(prev, cur)),
            SafetyKind::NoOverflow => Ok(self.no_overflow(cur).not()),
            SafetyKind::Bezout => Ok(self.bezout(cur).not()),
            SafetyKind::Sufficient | SafetyKind::Strong => Err(EncodeError::UnsupportedPredicate {
                predicate: kind.name().into(),
                system: self.name.clone(),
            }),
        }
    }
}
