use std::fmt;

use indexmap::IndexMap;
use num::rational::BigRational;
use serde::{Serialize, Serializer};

use kstep_ir::rational::format_rational;
use kstep_smt::encoder::{FieldKind, TransitionSystem, Unroller};
use kstep_smt::solver::{Model, ModelValue, SatResult, SmtSolver};
use kstep_smt::terms::SmtTerm;

use crate::pipeline::PipelineError;

/// A resolved value of one state field.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceValue {
    Int(i64),
    Bool(bool),
    Real(BigRational),
}

impl TraceValue {
    /// Resource ids and wait flags; clocks and velocities are not discrete.
    pub fn is_discrete(&self) -> bool {
        !matches!(self, TraceValue::Real(_))
    }

    fn as_term(&self) -> SmtTerm {
        match self {
            TraceValue::Int(v) => SmtTerm::int(*v),
            TraceValue::Bool(b) => SmtTerm::bool(*b),
            TraceValue::Real(r) => SmtTerm::real(r.clone()),
        }
    }
}

impl From<&ModelValue> for TraceValue {
    fn from(value: &ModelValue) -> Self {
        match value {
            ModelValue::Int(v) => TraceValue::Int(*v),
            ModelValue::Bool(b) => TraceValue::Bool(*b),
            ModelValue::Real(r) => TraceValue::Real(r.clone()),
        }
    }
}

impl fmt::Display for TraceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceValue::Int(v) => write!(f, "{v}"),
            TraceValue::Bool(b) => write!(f, "{b}"),
            TraceValue::Real(r) => f.write_str(&format_rational(r)),
        }
    }
}

/// Reals are written as exact `"n/d"` strings.
impl Serialize for TraceValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TraceValue::Int(v) => serializer.serialize_i64(*v),
            TraceValue::Bool(b) => serializer.serialize_bool(*b),
            TraceValue::Real(r) => serializer.serialize_str(&format_rational(r)),
        }
    }
}

/// One resolved state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStep {
    pub index: usize,
    pub values: IndexMap<String, TraceValue>,
}

impl TraceStep {
    fn discrete(&self, auxiliary: &[String]) -> Vec<&TraceValue> {
        self.values
            .iter()
            .filter(|(name, value)| value.is_discrete() && !auxiliary.contains(*name))
            .map(|(_, value)| value)
            .collect()
    }
}

/// Field names of one agent, for projecting steps to agent rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceAgent {
    pub name: String,
    pub sector: String,
    pub wait: String,
}

/// Discrete position of one agent at one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentCell {
    pub agent: String,
    pub sector: i64,
    pub wait: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentRow {
    pub index: usize,
    pub agents: Vec<AgentCell>,
}

/// Ordered sequence of resolved states extracted from a model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub system: String,
    pub steps: Vec<TraceStep>,
    /// Index of the state that violates the property, if any.
    pub violation_index: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<TraceAgent>,
    /// Fields that are choice variables rather than state; ignored when
    /// deduplicating.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub auxiliary: Vec<String>,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&TraceStep> {
        self.steps.iter().find(|s| s.index == index)
    }

    /// Merge runs of consecutive steps whose discrete state tuple is
    /// unchanged, keeping the first step of each run and the violating step.
    pub fn deduplicated(&self) -> Trace {
        let mut steps: Vec<TraceStep> = Vec::new();
        for step in &self.steps {
            let is_violation = self.violation_index == Some(step.index);
            let changed = steps
                .last()
                .map_or(true, |last| {
                    last.discrete(&self.auxiliary) != step.discrete(&self.auxiliary)
                });
            if changed || is_violation {
                steps.push(step.clone());
            }
        }
        Trace {
            system: self.system.clone(),
            steps,
            violation_index: self.violation_index,
            agents: self.agents.clone(),
            auxiliary: self.auxiliary.clone(),
        }
    }

    /// Project each step to per-agent `(resource id, wait)` cells. Steps
    /// lacking an agent field are skipped.
    pub fn agent_rows(&self) -> Vec<AgentRow> {
        self.steps
            .iter()
            .filter_map(|step| {
                let agents = self
                    .agents
                    .iter()
                    .map(|a| {
                        let sector = match step.values.get(&a.sector)? {
                            TraceValue::Int(v) => *v,
                            _ => return None,
                        };
                        let wait = match step.values.get(&a.wait)? {
                            TraceValue::Bool(b) => *b,
                            _ => return None,
                        };
                        Some(AgentCell {
                            agent: a.name.clone(),
                            sector,
                            wait,
                        })
                    })
                    .collect::<Option<Vec<_>>>()?;
                Some(AgentRow {
                    index: step.index,
                    agents,
                })
            })
            .collect()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.violation_index {
            Some(i) => writeln!(f, "Counterexample trace ({}, violation at step {i}):", self.system)?,
            None => writeln!(f, "Trace ({}):", self.system)?,
        }
        if self.agents.is_empty() {
            for step in &self.steps {
                let values: Vec<String> = step
                    .values
                    .iter()
                    .map(|(name, value)| format!("{name} = {value}"))
                    .collect();
                writeln!(f, "  step {:>3}: {}", step.index, values.join(", "))?;
            }
            return Ok(());
        }
        write!(f, "  step")?;
        for agent in &self.agents {
            write!(f, " | {:<10}", agent.name)?;
        }
        writeln!(f)?;
        for row in self.agent_rows() {
            write!(f, "  {:>4}", row.index)?;
            for cell in &row.agents {
                let text = if cell.wait {
                    format!("{} wait", cell.sector)
                } else {
                    cell.sector.to_string()
                };
                write!(f, " | {text:<10}")?;
            }
            if self.violation_index == Some(row.index) {
                write!(f, "  <- violation")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Resolve every field of states `0..=last` from `model`.
///
/// A declared symbol without a model value means the relation leaves it
/// unconstrained in a way the solver did not complete; this is fatal.
pub fn extract_trace<T: TransitionSystem + ?Sized>(
    system: &T,
    model: &Model,
    last: usize,
    violation_index: Option<usize>,
) -> Result<Trace, PipelineError> {
    let mut unroller = Unroller::new(system.schema().clone());
    unroller
        .extend_to(last)
        .map_err(|e| PipelineError::Encode(e.to_string()))?;

    let mut steps = Vec::with_capacity(last + 1);
    for state in unroller.states() {
        let mut values = IndexMap::new();
        for (base, var) in state.iter() {
            let value = model.get(var.symbol.as_str()).ok_or_else(|| {
                PipelineError::ModelInconsistency(format!(
                    "solver reported sat but `{}` has no value",
                    var.symbol
                ))
            })?;
            values.insert(base.as_str().to_string(), TraceValue::from(value));
        }
        steps.push(TraceStep {
            index: state.index(),
            values,
        });
    }

    let schema = system.schema();
    let agents = system
        .agents()
        .into_iter()
        .map(|a| TraceAgent {
            name: a.name,
            sector: schema.field(a.sector).name.as_str().to_string(),
            wait: schema.field(a.wait).name.as_str().to_string(),
        })
        .collect();
    let auxiliary = schema
        .fields()
        .iter()
        .filter(|f| f.kind == FieldKind::Auxiliary)
        .map(|f| f.name.as_str().to_string())
        .collect();

    Ok(Trace {
        system: system.name().to_string(),
        steps,
        violation_index,
        agents,
        auxiliary,
    })
}

/// Re-check that `trace` is a genuine run of `system`: every value is pinned,
/// the initial predicate holds at step 0 and the transition relation holds
/// between consecutive steps. Returns `true` when the solver confirms it.
///
/// The trace must be complete (not [`Trace::deduplicated`]).
pub fn replay_trace<S, T>(solver: &mut S, system: &T, trace: &Trace) -> Result<bool, PipelineError>
where
    S: SmtSolver + ?Sized,
    T: TransitionSystem + ?Sized,
{
    let Some(last) = trace.steps.len().checked_sub(1) else {
        return Ok(false);
    };
    let mut unroller = Unroller::new(system.schema().clone());
    unroller
        .extend_to(last)
        .map_err(|e| PipelineError::Encode(e.to_string()))?;
    let states = unroller.states();

    let solver_err = |e: S::Error| PipelineError::Solver(e.to_string());
    solver.reset().map_err(solver_err)?;
    for (name, sort) in unroller.declarations() {
        solver.declare_var(&name, &sort).map_err(solver_err)?;
    }
    solver.assert(&system.initial(&states[0])).map_err(solver_err)?;
    for pair in states.windows(2) {
        solver
            .assert(&system.transition(&pair[0], &pair[1]))
            .map_err(solver_err)?;
    }
    for (state, step) in states.iter().zip(&trace.steps) {
        for (name, value) in &step.values {
            let var = state.get(name).ok_or_else(|| {
                PipelineError::Validation(format!("trace field `{name}` is not in the schema"))
            })?;
            let pin = SmtTerm::Var(var.symbol.clone()).eq(value.as_term());
            solver.assert(&pin).map_err(solver_err)?;
        }
    }
    match solver.check_sat().map_err(solver_err)? {
        SatResult::Sat => Ok(true),
        SatResult::Unsat => Ok(false),
        SatResult::Unknown(reason) => Err(PipelineError::Solver(format!(
            "trace replay returned unknown: {reason}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kstep_ir::rational::ratio;
    use kstep_ir::{EuclidScenario, MaritimeScenario};
    use kstep_smt::encoder::euclid::EuclidSystem;
    use kstep_smt::encoder::maritime::MaritimeSystem;

    fn step(index: usize, s_a: i64, wait_a: bool, v_a: BigRational) -> TraceStep {
        let mut values = IndexMap::new();
        values.insert("sA".to_string(), TraceValue::Int(s_a));
        values.insert("vA".to_string(), TraceValue::Real(v_a));
        values.insert("waitA".to_string(), TraceValue::Bool(wait_a));
        TraceStep { index, values }
    }

    fn trace(steps: Vec<TraceStep>, violation_index: Option<usize>) -> Trace {
        Trace {
            system: "t".into(),
            steps,
            violation_index,
            agents: vec![TraceAgent {
                name: "A".into(),
                sector: "sA".into(),
                wait: "waitA".into(),
            }],
            auxiliary: Vec::new(),
        }
    }

    #[test]
    fn dedup_keeps_transition_points_only() {
        let t = trace(
            vec![
                step(0, 11, false, ratio(3, 5)),
                step(1, 11, false, ratio(7, 10)),
                step(2, 11, false, ratio(4, 5)),
                step(3, 7, false, ratio(4, 5)),
                step(4, 7, true, ratio(3, 5)),
                step(5, 7, true, ratio(1, 2)),
            ],
            None,
        );
        let indices: Vec<usize> = t.deduplicated().steps.iter().map(|s| s.index).collect();
        assert_eq!(indices, [0, 3, 4]);
    }

    #[test]
    fn dedup_retains_violating_step() {
        let t = trace(
            vec![
                step(0, 1, false, ratio(1, 1)),
                step(1, 1, false, ratio(1, 1)),
            ],
            Some(1),
        );
        assert_eq!(t.deduplicated().len(), 2);
    }

    fn euclid_step(index: usize, r: i64, rp: i64, q: i64) -> TraceStep {
        let mut values = IndexMap::new();
        values.insert("r".to_string(), TraceValue::Int(r));
        values.insert("rp".to_string(), TraceValue::Int(rp));
        values.insert("q".to_string(), TraceValue::Int(q));
        TraceStep { index, values }
    }

    #[test]
    fn dedup_ignores_auxiliary_fields() {
        let t = Trace {
            system: "euclid".into(),
            steps: vec![
                euclid_step(0, 6, 4, 1),
                euclid_step(1, 4, 2, 2),
                euclid_step(2, 2, 0, 7),
                euclid_step(3, 2, 0, -3),
                euclid_step(4, 2, 0, 0),
            ],
            violation_index: None,
            agents: Vec::new(),
            auxiliary: vec!["q".into()],
        };
        let indices: Vec<usize> = t.deduplicated().steps.iter().map(|s| s.index).collect();
        assert_eq!(indices, [0, 1, 2]);

        let plain = Trace {
            auxiliary: Vec::new(),
            ..t
        };
        assert_eq!(plain.deduplicated().len(), 5);
    }

    #[test]
    fn extracted_euclid_trace_marks_the_quotient_auxiliary() {
        let system = EuclidSystem::new(&EuclidScenario::canonical()).unwrap();
        let mut unroller = Unroller::new(system.schema().clone());
        unroller.extend_to(0).unwrap();
        let mut model = Model::default();
        for (name, _) in unroller.declarations() {
            model.values.insert(name, ModelValue::Int(1));
        }
        let trace = extract_trace(&system, &model, 0, None).unwrap();
        assert_eq!(trace.auxiliary, ["q"]);
        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json["auxiliary"][0], "q");
    }

    #[test]
    fn agent_rows_project_sector_and_wait() {
        let t = trace(vec![step(0, 11, false, ratio(3, 5)), step(1, 0, true, ratio(1, 2))], None);
        let rows = t.agent_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[1].agents,
            vec![AgentCell {
                agent: "A".into(),
                sector: 0,
                wait: true
            }]
        );
    }

    #[test]
    fn reals_serialize_as_exact_strings() {
        let json = serde_json::to_value(step(0, 11, false, ratio(3, 5))).unwrap();
        assert_eq!(json["values"]["vA"], "3/5");
        assert_eq!(json["values"]["sA"], 11);
        assert_eq!(json["values"]["waitA"], false);
    }

    #[test]
    fn display_marks_wait_and_violation() {
        let t = trace(vec![step(0, 11, false, ratio(3, 5)), step(1, 0, true, ratio(1, 2))], Some(1));
        let text = t.to_string();
        assert!(text.contains("violation at step 1"));
        assert!(text.contains("0 wait"));
        assert!(text.contains("<- violation"));
    }

    #[test]
    fn missing_model_value_is_a_model_inconsistency() {
        let system = EuclidSystem::new(&EuclidScenario::canonical()).unwrap();
        let mut unroller = Unroller::new(system.schema().clone());
        unroller.extend_to(0).unwrap();
        let mut model = Model::default();
        for (name, _) in unroller.declarations() {
            if name != "q_0" {
                model.values.insert(name, ModelValue::Int(3));
            }
        }
        let err = extract_trace(&system, &model, 0, None).unwrap_err();
        match err {
            PipelineError::ModelInconsistency(msg) => assert!(msg.contains("q_0")),
            other => panic!("expected ModelInconsistency, got {other:?}"),
        }
    }

    #[test]
    fn extracted_trace_names_agent_fields() {
        let system = MaritimeSystem::new(&MaritimeScenario::canonical()).unwrap();
        let mut model = Model::default();
        let mut unroller = Unroller::new(system.schema().clone());
        unroller.extend_to(0).unwrap();
        for (name, sort) in unroller.declarations() {
            let value = match sort {
                kstep_smt::sorts::SmtSort::Int => ModelValue::Int(11),
                kstep_smt::sorts::SmtSort::Bool => ModelValue::Bool(false),
                kstep_smt::sorts::SmtSort::Real => ModelValue::Real(ratio(0, 1)),
            };
            model.values.insert(name, value);
        }
        let trace = extract_trace(&system, &model, 0, Some(0)).unwrap();
        assert_eq!(trace.agents.len(), 2);
        assert_eq!(trace.agents[1].sector, "sB");
        assert_eq!(trace.agents[1].wait, "waitB");
        assert_eq!(trace.steps[0].values.len(), 10);
    }
}
