/// World state — a typed slot per declared variable, mutated per turn.
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::schema::choice::StateEffect;
use crate::schema::value::{Value, VarKind, VariableDecl};

/// Name of the primary bounded variable every schema must declare.
pub const TENSION: &str = "tension";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("type mismatch on '{variable}': expected {expected}, found {found}")]
    TypeMismatch {
        variable: String,
        expected: VarKind,
        found: VarKind,
    },
    #[error("variable '{0}' declared more than once")]
    DuplicateVariable(String),
    #[error("invalid bounds on '{0}': bounds require a float with min <= default <= max")]
    InvalidBounds(String),
    #[error("schema must declare a bounded float named 'tension'")]
    MissingTension,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// The set of declared variables, indexed by name once at construction.
#[derive(Debug, Clone)]
pub struct StateSchema {
    decls: Vec<VariableDecl>,
    index: FxHashMap<String, usize>,
    tension_slot: usize,
}

impl StateSchema {
    pub fn new(decls: Vec<VariableDecl>) -> Result<StateSchema, StateError> {
        let mut index = FxHashMap::default();
        for (slot, decl) in decls.iter().enumerate() {
            if index.insert(decl.name.clone(), slot).is_some() {
                return Err(StateError::DuplicateVariable(decl.name.clone()));
            }
            if let Some((min, max)) = decl.bounds {
                let valid = match decl.default {
                    Value::Float(x) => min <= max && x >= min && x <= max,
                    _ => false,
                };
                if !valid {
                    return Err(StateError::InvalidBounds(decl.name.clone()));
                }
            }
        }

        let tension_slot = match index.get(TENSION) {
            Some(&slot) if decls[slot].kind() == VarKind::Float && decls[slot].bounds.is_some() => {
                slot
            }
            _ => return Err(StateError::MissingTension),
        };

        Ok(StateSchema {
            decls,
            index,
            tension_slot,
        })
    }

    /// Load a schema from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<StateSchema, StateError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a schema from a RON list of variable declarations.
    pub fn parse_ron(input: &str) -> Result<StateSchema, StateError> {
        let decls: Vec<VariableDecl> = ron::from_str(input)?;
        Self::new(decls)
    }

    pub fn decl(&self, name: &str) -> Option<&VariableDecl> {
        self.index.get(name).map(|&slot| &self.decls[slot])
    }

    pub fn kind_of(&self, name: &str) -> Option<VarKind> {
        self.decl(name).map(|d| d.kind())
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableDecl> {
        self.decls.iter()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn tension_bounds(&self) -> (f64, f64) {
        self.decls[self.tension_slot].bounds.unwrap_or((0.0, 100.0))
    }

    fn slot(&self, name: &str) -> Result<usize, StateError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| StateError::UnknownVariable(name.to_string()))
    }
}

/// Mutable world state of one playthrough.
///
/// Values live in a flat vector addressed through the schema's index, so
/// every lookup is a hash plus a bounds-checked read.
#[derive(Debug, Clone)]
pub struct StateStore {
    schema: Arc<StateSchema>,
    values: Vec<Value>,
}

impl StateStore {
    /// Create a store at the schema baseline with the given starting tension.
    pub fn new(schema: Arc<StateSchema>, initial_tension: f64) -> StateStore {
        let mut store = StateStore {
            values: Vec::with_capacity(schema.len()),
            schema,
        };
        store.reset(initial_tension);
        store
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Result<Value, StateError> {
        let slot = self.schema.slot(name)?;
        Ok(self.values[slot])
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> Result<(), StateError> {
        let slot = self.typed_slot(name, VarKind::Bool)?;
        self.values[slot] = Value::Bool(value);
        Ok(())
    }

    /// Add to an integer variable, returning the new value.
    pub fn add_int(&mut self, name: &str, delta: i64) -> Result<i64, StateError> {
        let slot = self.typed_slot(name, VarKind::Int)?;
        let Value::Int(current) = self.values[slot] else {
            return Err(StateError::TypeMismatch {
                variable: name.to_string(),
                expected: VarKind::Int,
                found: self.values[slot].kind(),
            });
        };
        let next = current.saturating_add(delta);
        self.values[slot] = Value::Int(next);
        Ok(next)
    }

    /// Add to a float variable, clamping to its declared bounds if any.
    pub fn add_float(&mut self, name: &str, delta: f64) -> Result<f64, StateError> {
        let slot = self.typed_slot(name, VarKind::Float)?;
        let current = self.values[slot].as_number();
        let mut next = current + delta;
        if let Some((min, max)) = self.decl_at(slot).bounds {
            next = next.clamp(min, max);
        }
        self.values[slot] = Value::Float(next);
        Ok(next)
    }

    /// Numeric view for predicates: bools as 1.0 / 0.0, numbers pass through.
    pub fn as_number(&self, name: &str) -> Result<f64, StateError> {
        self.get(name).map(|v| v.as_number())
    }

    /// Whether a flag-like variable is set (any non-zero numeric view).
    pub fn is_set(&self, name: &str) -> Result<bool, StateError> {
        self.as_number(name).map(|x| x != 0.0)
    }

    /// Apply one authored effect, checking its kind against the slot.
    pub fn apply(&mut self, effect: &StateEffect) -> Result<(), StateError> {
        match effect {
            StateEffect::SetBool { variable, value } => self.set_bool(variable, *value),
            StateEffect::AddInt { variable, delta } => self.add_int(variable, *delta).map(|_| ()),
            StateEffect::AddFloat { variable, delta } => {
                self.add_float(variable, *delta).map(|_| ())
            }
        }
    }

    pub fn tension(&self) -> f64 {
        self.values[self.schema.tension_slot].as_number()
    }

    pub fn max_tension(&self) -> f64 {
        self.schema.tension_bounds().1
    }

    /// Tension as a fraction of its upper bound.
    pub fn tension_ratio(&self) -> f64 {
        let max = self.max_tension();
        if max > 0.0 {
            self.tension() / max
        } else {
            0.0
        }
    }

    pub fn is_tension_maxed(&self) -> bool {
        self.tension() >= self.max_tension()
    }

    /// Return every variable to its declared baseline, then set tension.
    pub fn reset(&mut self, initial_tension: f64) {
        self.values.clear();
        self.values.extend(self.schema.iter().map(|d| d.default));
        let (min, max) = self.schema.tension_bounds();
        self.values[self.schema.tension_slot] = Value::Float(initial_tension.clamp(min, max));
    }

    /// Every variable by name, in a stable order.
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.schema
            .iter()
            .zip(self.values.iter())
            .map(|(decl, value)| (decl.name.clone(), *value))
            .collect()
    }

    /// Replace state from a name → value map. All entries are validated
    /// before any slot is written; variables absent from the map keep
    /// their baseline, with tension seeded as `reset` seeds it.
    pub fn restore(
        &mut self,
        values: &BTreeMap<String, Value>,
        initial_tension: f64,
    ) -> Result<(), StateError> {
        let mut staged: Vec<Value> = self.schema.iter().map(|d| d.default).collect();
        let (min, max) = self.schema.tension_bounds();
        staged[self.schema.tension_slot] = Value::Float(initial_tension.clamp(min, max));
        for (name, value) in values {
            let slot = self.schema.slot(name)?;
            let expected = self.decl_at(slot).kind();
            if value.kind() != expected {
                return Err(StateError::TypeMismatch {
                    variable: name.clone(),
                    expected,
                    found: value.kind(),
                });
            }
            let value = match (*value, self.decl_at(slot).bounds) {
                (Value::Float(x), Some((min, max))) => Value::Float(x.clamp(min, max)),
                (v, _) => v,
            };
            staged[slot] = value;
        }
        self.values = staged;
        Ok(())
    }

    /// Hashable image of the current values, used to detect repeated states.
    pub fn fingerprint(&self) -> Vec<u64> {
        self.values
            .iter()
            .map(|v| match v {
                Value::Bool(b) => *b as u64,
                Value::Int(i) => *i as u64,
                Value::Float(x) => x.to_bits(),
            })
            .collect()
    }

    fn decl_at(&self, slot: usize) -> &VariableDecl {
        &self.schema.decls[slot]
    }

    fn typed_slot(&self, name: &str, requested: VarKind) -> Result<usize, StateError> {
        let slot = self.schema.slot(name)?;
        let declared = self.decl_at(slot).kind();
        if declared != requested {
            return Err(StateError::TypeMismatch {
                variable: name.to_string(),
                expected: declared,
                found: requested,
            });
        }
        Ok(slot)
    }
}
