//! Named variable storage for a sandbox.
//!
//! Each variable holds a value together with the type it was declared
//! with, which may be wider than the value's runtime type (a null value
//! in particular only has its declared type). Names are case-sensitive.

use rustc_hash::FxHashMap;

use crate::types::{TypeId, TypeTable};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct StoredVariable {
    pub value: Value,
    pub ty: TypeId,
}

#[derive(Debug, Default)]
pub struct VariableStore {
    vars: FxHashMap<String, StoredVariable>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a variable, replacing any previous binding of the name.
    pub fn set(&mut self, name: &str, value: Value, ty: TypeId) {
        self.vars
            .insert(name.to_string(), StoredVariable { value, ty });
    }

    pub fn get(&self, name: &str) -> Option<&StoredVariable> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.vars.remove(name).is_some()
    }

    /// Copy a binding under a new name. Instances and lists are shared,
    /// not duplicated, matching ordinary reference semantics. An absent
    /// source still binds the destination, as an explicit empty slot.
    pub fn copy(&mut self, from: &str, to: &str) -> bool {
        let stored = self.vars.get(from).cloned().unwrap_or(StoredVariable {
            value: Value::Null,
            ty: crate::types::UNIT,
        });
        self.vars.insert(to.to_string(), stored);
        true
    }

    /// One-line description: `name (Type) [IsNull:bool]`.
    pub fn info(&self, table: &TypeTable, name: &str) -> Option<String> {
        self.vars.get(name).map(|stored| {
            format!(
                "{} ({}) [IsNull:{}]",
                name,
                table.name_of(stored.ty),
                stored.value.is_null()
            )
        })
    }

    /// Bound names, sorted for stable listing.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
