//! Time-indexed state variables.
//!
//! A [`StateSchema`] lists the fields of one state. The [`Unroller`] copies the
//! schema once per time index, interning every `(field, index)` pair in a
//! [`VarArena`] so that the same pair always yields the same symbol
//! (`{base}_{index}`) and distinct pairs never alias.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::EncodeError;
use crate::sorts::SmtSort;
use crate::terms::{SmtTerm, Symbol};

/// Field name of a state vector.
///
/// Restricted to `[A-Za-z][A-Za-z0-9]*`: without `_`, the rendered symbol
/// `{base}_{index}` cannot collide across different pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BaseName(Arc<str>);

impl BaseName {
    pub fn new(name: &str) -> Result<Self, EncodeError> {
        let mut chars = name.chars();
        let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric());
        if !valid {
            return Err(EncodeError::InvalidBaseName(name.to_string()));
        }
        Ok(BaseName(Arc::from(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle into a [`VarArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub base: BaseName,
    pub index: usize,
    pub sort: SmtSort,
    pub symbol: Symbol,
}

/// Interning table for `(base, index)` pairs.
#[derive(Debug, Default, Clone)]
pub struct VarArena {
    vars: Vec<Variable>,
    lookup: HashMap<(BaseName, usize), VarId>,
}

impl VarArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle for `(base, index)`, creating it on first use.
    pub fn intern(&mut self, base: &BaseName, index: usize, sort: SmtSort) -> Result<VarId, EncodeError> {
        if let Some(&id) = self.lookup.get(&(base.clone(), index)) {
            let existing = self.vars[id.index()].sort;
            if existing != sort {
                return Err(EncodeError::SortConflict {
                    name: format!("{base}_{index}"),
                    existing,
                    requested: sort,
                });
            }
            return Ok(id);
        }
        let id = VarId(self.vars.len() as u32);
        self.vars.push(Variable {
            base: base.clone(),
            index,
            sort,
            symbol: Symbol::new(format!("{base}_{index}")),
        });
        self.lookup.insert((base.clone(), index), id);
        Ok(id)
    }

    pub fn lookup(&self, base: &BaseName, index: usize) -> Option<VarId> {
        self.lookup.get(&(base.clone(), index)).copied()
    }

    pub fn get(&self, id: VarId) -> &Variable {
        &self.vars[id.index()]
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Part of the observable state; compared when deduplicating traces.
    State,
    /// Free per-step choice (e.g. a quotient); never part of the discrete tuple.
    Auxiliary,
}

/// Position of a field in its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(usize);

impl FieldId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: BaseName,
    pub sort: SmtSort,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    fields: Vec<Field>,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, sort: SmtSort, kind: FieldKind) -> Result<FieldId, EncodeError> {
        let name = BaseName::new(name)?;
        if self.fields.iter().any(|f| f.name == name) {
            return Err(EncodeError::DuplicateField(name.to_string()));
        }
        self.fields.push(Field { name, sort, kind });
        Ok(FieldId(self.fields.len() - 1))
    }

    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.0]
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn find(&self, name: &str) -> Option<FieldId> {
        self.fields
            .iter()
            .position(|f| f.name.as_str() == name)
            .map(FieldId)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateVar {
    pub id: VarId,
    pub symbol: Symbol,
    pub sort: SmtSort,
}

/// One copy of the schema at a fixed time index.
#[derive(Debug, Clone)]
pub struct StateVector {
    index: usize,
    vars: IndexMap<BaseName, StateVar>,
}

impl StateVector {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn var(&self, field: FieldId) -> &StateVar {
        &self.vars[field.0]
    }

    pub fn term(&self, field: FieldId) -> SmtTerm {
        SmtTerm::Var(self.vars[field.0].symbol.clone())
    }

    pub fn get(&self, name: &str) -> Option<&StateVar> {
        self.vars
            .iter()
            .find(|(base, _)| base.as_str() == name)
            .map(|(_, var)| var)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BaseName, &StateVar)> {
        self.vars.iter()
    }
}

/// Replicates a schema across time indices `0..=k`.
#[derive(Debug, Clone)]
pub struct Unroller {
    schema: StateSchema,
    arena: VarArena,
    states: Vec<StateVector>,
}

impl Unroller {
    pub fn new(schema: StateSchema) -> Self {
        Self {
            schema,
            arena: VarArena::new(),
            states: Vec::new(),
        }
    }

    /// Validate a user-supplied bound.
    pub fn check_bound(k: i64) -> Result<usize, EncodeError> {
        usize::try_from(k).map_err(|_| EncodeError::NegativeBound(k))
    }

    /// Produce states `0..=k`.
    pub fn instantiate(&mut self, k: i64) -> Result<&[StateVector], EncodeError> {
        let k = Self::check_bound(k)?;
        self.extend_to(k)?;
        Ok(&self.states[..=k])
    }

    /// Add states up to and including index `k`; existing states are kept.
    pub fn extend_to(&mut self, k: usize) -> Result<(), EncodeError> {
        while self.states.len() <= k {
            let index = self.states.len();
            let mut vars = IndexMap::with_capacity(self.schema.len());
            for field in self.schema.fields() {
                let id = self.arena.intern(&field.name, index, field.sort)?;
                let symbol = self.arena.get(id).symbol.clone();
                vars.insert(
                    field.name.clone(),
                    StateVar {
                        id,
                        symbol,
                        sort: field.sort,
                    },
                );
            }
            self.states.push(StateVector { index, vars });
        }
        Ok(())
    }

    pub fn state(&self, index: usize) -> Option<&StateVector> {
        self.states.get(index)
    }

    pub fn states(&self) -> &[StateVector] {
        &self.states
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn arena(&self) -> &VarArena {
        &self.arena
    }

    /// Declarations for every instantiated variable, in index order.
    pub fn declarations(&self) -> Vec<(String, SmtSort)> {
        self.states
            .iter()
            .flat_map(|state| {
                state
                    .iter()
                    .map(|(_, var)| (var.symbol.to_string(), var.sort))
            })
            .collect()
    }
}
