//! Per-agent transition model: guarded cases over one agent's state fields.

use num::rational::BigRational;
use num::Zero;

use kstep_ir::{AgentSpec, PhysicsConfig, ResourceId, SectorParams};

use super::variables::{FieldId, FieldKind, StateSchema, StateVector};
use super::EncodeError;
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Schema fields owned by one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentFields {
    pub sector: FieldId,
    pub displacement: FieldId,
    pub velocity: FieldId,
    pub clock: FieldId,
    pub wait: FieldId,
}

/// Mutually exclusive behaviours of one agent in one step, except that
/// distinct `Enter` cases from the same source are a genuine choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentCase {
    Terminal,
    Flow,
    Enter { from: ResourceId, to: ResourceId },
    Wait { from: ResourceId },
}

#[derive(Debug, Clone)]
pub struct AgentModel {
    pub index: usize,
    pub name: String,
    pub fields: AgentFields,
    spec: AgentSpec,
    domain: Vec<ResourceId>,
    params: Vec<(ResourceId, SectorParams)>,
}

impl AgentModel {
    /// Register the agent's fields (`sN`, `zN`, `vN`, `cN`, `waitN`).
    pub fn new(index: usize, spec: &AgentSpec, schema: &mut StateSchema) -> Result<Self, EncodeError> {
        let name = &spec.name;
        let fields = AgentFields {
            sector: schema.push(&format!("s{name}"), SmtSort::Int, FieldKind::State)?,
            displacement: schema.push(&format!("z{name}"), SmtSort::Real, FieldKind::State)?,
            velocity: schema.push(&format!("v{name}"), SmtSort::Real, FieldKind::State)?,
            clock: schema.push(&format!("c{name}"), SmtSort::Real, FieldKind::State)?,
            wait: schema.push(&format!("wait{name}"), SmtSort::Bool, FieldKind::State)?,
        };
        let domain = spec.domain();
        let mut params = Vec::new();
        for resource in &domain {
            if spec.is_terminal(*resource) {
                continue;
            }
            let p = spec.params_for(*resource).ok_or_else(|| EncodeError::MissingParams {
                agent: name.clone(),
                resource: resource.value(),
            })?;
            params.push((*resource, p.clone()));
        }
        Ok(Self {
            index,
            name: name.clone(),
            fields,
            spec: spec.clone(),
            domain,
            params,
        })
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    pub fn domain(&self) -> &[ResourceId] {
        &self.domain
    }

    pub fn terminals(&self) -> &[ResourceId] {
        &self.spec.terminals
    }

    pub fn is_terminal(&self, resource: ResourceId) -> bool {
        self.spec.is_terminal(resource)
    }

    fn in_set(sector: &SmtTerm, set: &[ResourceId]) -> SmtTerm {
        match set {
            [] => SmtTerm::bool(false),
            [only] => sector.clone().eq(SmtTerm::int(only.value())),
            many => SmtTerm::or(
                many.iter()
                    .map(|r| sector.clone().eq(SmtTerm::int(r.value()))),
            ),
        }
    }

    pub fn at_terminal(&self, state: &StateVector) -> SmtTerm {
        Self::in_set(&state.term(self.fields.sector), self.terminals())
    }

    /// All cases of this agent; the Terminal case exists only when the agent
    /// has a terminal resource.
    pub fn cases(&self) -> Vec<AgentCase> {
        let mut cases = Vec::new();
        if !self.terminals().is_empty() {
            cases.push(AgentCase::Terminal);
        }
        cases.push(AgentCase::Flow);
        for &from in self.domain.iter().filter(|r| !self.is_terminal(**r)) {
            for &to in self.spec.adjacency.successors(from) {
                cases.push(AgentCase::Enter { from, to });
            }
            cases.push(AgentCase::Wait { from });
        }
        cases
    }

    /// Guard of `case` at `cur`. `can_enter` yields the admission predicate
    /// for a target resource.
    pub fn guard(
        &self,
        case: AgentCase,
        physics: &PhysicsConfig,
        cur: &StateVector,
        can_enter: &dyn Fn(ResourceId) -> SmtTerm,
    ) -> SmtTerm {
        let s = cur.term(self.fields.sector);
        let z = cur.term(self.fields.displacement);
        let boundary = SmtTerm::real(physics.boundary.clone());
        let moving = self.at_terminal(cur).not();
        match case {
            AgentCase::Terminal => self.at_terminal(cur),
            AgentCase::Flow => SmtTerm::and(vec![moving, z.lt(boundary)]),
            AgentCase::Enter { from, to } => SmtTerm::and(vec![
                moving,
                z.ge(boundary),
                s.eq(SmtTerm::int(from.value())),
                can_enter(to),
            ]),
            AgentCase::Wait { from } => {
                let admitted: Vec<SmtTerm> = self
                    .spec
                    .adjacency
                    .successors(from)
                    .iter()
                    .map(|t| can_enter(*t))
                    .collect();
                SmtTerm::and(vec![
                    moving,
                    z.ge(boundary),
                    s.eq(SmtTerm::int(from.value())),
                    SmtTerm::or(admitted).not(),
                ])
            }
        }
    }

    /// Effect of `case` relating `cur` to `next`.
    pub fn effect(
        &self,
        case: AgentCase,
        physics: &PhysicsConfig,
        cur: &StateVector,
        next: &StateVector,
    ) -> SmtTerm {
        let f = self.fields;
        let keep = |field: FieldId| next.term(field).eq(cur.term(field));
        let dt = SmtTerm::real(physics.dt.clone());
        let zero = || SmtTerm::real(BigRational::zero());
        let tick = next
            .term(f.clock)
            .eq(cur.term(f.clock).add(dt.clone()));
        let v = cur.term(f.velocity);
        let drag = SmtTerm::real(physics.sigma.clone()).mul(v.clone());

        match case {
            AgentCase::Terminal => SmtTerm::and(vec![
                keep(f.sector),
                keep(f.clock),
                keep(f.displacement),
                next.term(f.velocity).eq(zero()),
                next.term(f.wait).not(),
            ]),
            AgentCase::Flow => {
                let accel = self.forcing(cur).sub(drag);
                let v_next = v.clone().add(accel.mul(dt.clone()));
                SmtTerm::and(vec![
                    keep(f.sector),
                    tick,
                    next.term(f.displacement)
                        .eq(cur.term(f.displacement).add(v.mul(dt))),
                    next.term(f.velocity).eq(clamp_non_negative(v_next)),
                    next.term(f.wait).not(),
                ])
            }
            AgentCase::Enter { to, .. } => SmtTerm::and(vec![
                next.term(f.sector).eq(SmtTerm::int(to.value())),
                tick,
                next.term(f.displacement).eq(zero()),
                keep(f.velocity),
                next.term(f.wait).not(),
            ]),
            AgentCase::Wait { .. } => {
                let v_next = v.sub(drag.mul(dt));
                SmtTerm::and(vec![
                    keep(f.sector),
                    tick,
                    keep(f.displacement),
                    next.term(f.velocity).eq(clamp_non_negative(v_next)),
                    next.term(f.wait),
                ])
            }
        }
    }

    /// `gamma(s)` below the sector's velocity ceiling, `epsilon(s)` above it.
    fn forcing(&self, cur: &StateVector) -> SmtTerm {
        let s = cur.term(self.fields.sector);
        let v = cur.term(self.fields.velocity);
        self.params
            .iter()
            .rev()
            .fold(SmtTerm::real(BigRational::zero()), |acc, (resource, p)| {
                let in_sector = s.clone().eq(SmtTerm::int(resource.value()));
                let below = v.clone().le(SmtTerm::real(p.ceiling.clone()));
                let force = SmtTerm::ite(
                    below,
                    SmtTerm::real(p.gamma.clone()),
                    SmtTerm::real(p.epsilon.clone()),
                );
                SmtTerm::ite(in_sector, force, acc)
            })
    }

    /// The agent's step relation: the disjunction of its guarded cases.
    pub fn relation(
        &self,
        physics: &PhysicsConfig,
        cur: &StateVector,
        next: &StateVector,
        can_enter: &dyn Fn(ResourceId) -> SmtTerm,
    ) -> SmtTerm {
        SmtTerm::or(
            self.cases()
                .into_iter()
                .map(|case| {
                    SmtTerm::and(vec![
                        self.guard(case, physics, cur, can_enter),
                        self.effect(case, physics, cur, next),
                    ])
                }),
        )
    }

    pub fn initial(&self, state: &StateVector) -> SmtTerm {
        let f = self.fields;
        SmtTerm::and(vec![
            state.term(f.sector).eq(SmtTerm::int(self.spec.start.value())),
            state
                .term(f.displacement)
                .eq(SmtTerm::real(self.spec.initial_displacement.clone())),
            state
                .term(f.velocity)
                .eq(SmtTerm::real(self.spec.initial_velocity.clone())),
            state.term(f.clock).eq(SmtTerm::real(BigRational::zero())),
            state.term(f.wait).not(),
        ])
    }

    pub fn invariants(&self, state: &StateVector) -> Vec<SmtTerm> {
        let f = self.fields;
        let zero = || SmtTerm::real(BigRational::zero());
        vec![
            Self::in_set(&state.term(f.sector), &self.domain),
            state.term(f.displacement).ge(zero()),
            state.term(f.velocity).ge(zero()),
            state.term(f.clock).ge(zero()),
        ]
    }
}

fn clamp_non_negative(value: SmtTerm) -> SmtTerm {
    let zero = SmtTerm::real(BigRational::zero());
    SmtTerm::ite(value.clone().ge(zero.clone()), value, zero)
}
