//! Sandboxes and the sandbox manager.
//!
//! A sandbox owns its own type table, module registry, and variable
//! store; nothing is shared between sandboxes, so destroying one drops
//! every type and value it ever produced.
//!
//! The public sandbox surface is fail-soft: operations return sentinel
//! values (`false`, `None`, an empty byte vector, an empty string)
//! instead of propagating errors. The underlying error is retained and
//! readable through [`Sandbox::last_error`] until the next operation.
//! The `try_` methods expose the same operations with `Result` for
//! callers that want the error directly.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::EngineError;
use crate::invoke;
use crate::modules::ModuleRegistry;
use crate::resolve::resolve;
use crate::types::TypeTable;
use crate::value::Value;
use crate::variables::VariableStore;
use crate::wire;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SandboxId(u64);

impl std::fmt::Display for SandboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sandbox-{}", self.0)
    }
}

pub struct Sandbox {
    id: SandboxId,
    types: TypeTable,
    modules: ModuleRegistry,
    variables: VariableStore,
    last_error: Option<EngineError>,
}

impl Sandbox {
    pub fn new() -> Self {
        Sandbox {
            id: SandboxId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            types: TypeTable::new(),
            modules: ModuleRegistry::new(),
            variables: VariableStore::new(),
            last_error: None,
        }
    }

    pub fn id(&self) -> SandboxId {
        self.id
    }

    /// The error behind the most recent sentinel result, if any.
    pub fn last_error(&self) -> Option<&EngineError> {
        self.last_error.as_ref()
    }

    // --- fail-soft surface ---

    pub fn load_module(&mut self, name: &str, bytes: &[u8]) -> bool {
        let result = self.modules.load(&mut self.types, name, bytes).map(|_| ());
        self.settle_flag(result)
    }

    /// Construct a receiver, invoke a method on it, and return the
    /// serialized result. Empty bytes on any failure.
    #[allow(clippy::too_many_arguments)]
    pub fn execute_method(
        &mut self,
        type_desc: &str,
        sources: &[&str],
        ctor_descs: &[String],
        ctor_payloads: &[Vec<u8>],
        method: &str,
        param_descs: &[String],
        payloads: &[Vec<u8>],
    ) -> Vec<u8> {
        let result = self.try_execute_method(
            type_desc,
            sources,
            ctor_descs,
            ctor_payloads,
            method,
            param_descs,
            payloads,
        );
        match self.settle(result) {
            Some(bytes) => bytes,
            None => Vec::new(),
        }
    }

    /// Same as [`execute_method`] but the result lands in a variable
    /// instead of crossing the boundary.
    #[allow(clippy::too_many_arguments)]
    pub fn execute_method_into(
        &mut self,
        result_var: &str,
        type_desc: &str,
        sources: &[&str],
        ctor_descs: &[String],
        ctor_payloads: &[Vec<u8>],
        method: &str,
        param_descs: &[String],
        payloads: &[Vec<u8>],
    ) -> bool {
        let result = self.try_execute_method_into(
            result_var,
            type_desc,
            sources,
            ctor_descs,
            ctor_payloads,
            method,
            param_descs,
            payloads,
        );
        self.settle_flag(result)
    }

    /// Construct an instance and bind it to a variable.
    pub fn construct_into(
        &mut self,
        var: &str,
        type_desc: &str,
        sources: &[&str],
        ctor_descs: &[String],
        ctor_payloads: &[Vec<u8>],
    ) -> bool {
        let result =
            self.try_construct_into(var, type_desc, sources, ctor_descs, ctor_payloads);
        self.settle_flag(result)
    }

    /// Invoke a method on a stored variable, binding the result to
    /// another variable.
    pub fn execute_on_variable(
        &mut self,
        var: &str,
        method: &str,
        param_descs: &[String],
        payloads: &[Vec<u8>],
        result_var: &str,
    ) -> bool {
        let result =
            self.try_execute_on_variable(var, method, param_descs, payloads, result_var);
        self.settle_flag(result)
    }

    /// Bind a variable from a payload. The declared type is the value's
    /// runtime type; a null or undecodable payload binds a typed null
    /// slot from the descriptor.
    pub fn set_variable(
        &mut self,
        name: &str,
        type_desc: &str,
        sources: &[&str],
        payload: &[u8],
    ) -> bool {
        let result = self.try_set_variable(name, type_desc, sources, payload);
        self.settle_flag(result)
    }

    /// Serialize a variable under its declared type.
    pub fn get_variable(&mut self, name: &str) -> Option<Vec<u8>> {
        let result = self.try_get_variable(name);
        self.settle(result)
    }

    /// `name (Type) [IsNull:bool]`, or empty when unbound. An empty
    /// name lists every bound variable, one line each.
    pub fn variable_info(&mut self, name: &str) -> String {
        if name.is_empty() {
            self.last_error = None;
            return self
                .variables
                .names()
                .iter()
                .filter_map(|n| self.variables.info(&self.types, n))
                .collect::<Vec<_>>()
                .join("\n");
        }
        match self.variables.info(&self.types, name) {
            Some(info) => {
                self.last_error = None;
                info
            }
            None => {
                self.last_error =
                    Some(EngineError::VariableNotFound(name.to_string()));
                String::new()
            }
        }
    }

    pub fn remove_variable(&mut self, name: &str) -> bool {
        let removed = self.variables.remove(name);
        self.last_error = if removed {
            None
        } else {
            Some(EngineError::VariableNotFound(name.to_string()))
        };
        removed
    }

    /// Copying an absent source binds the destination as an explicit
    /// empty slot, so this always succeeds.
    pub fn copy_variable(&mut self, from: &str, to: &str) -> bool {
        self.last_error = None;
        self.variables.copy(from, to)
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.names().into_iter().map(String::from).collect()
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.registered_name.clone()).collect()
    }

    /// Diagnostics listing: `(registered name, identity)` per loaded
    /// module, prefixed by the built-in pseudo-module.
    pub fn loaded_modules(&self) -> Vec<(String, String)> {
        let mut listing = vec![("<builtin>".to_string(), "core".to_string())];
        listing.extend(
            self.modules
                .iter()
                .map(|m| (m.registered_name.clone(), m.identity.clone())),
        );
        listing
    }

    // --- Result-based core ---

    #[allow(clippy::too_many_arguments)]
    pub fn try_execute_method(
        &mut self,
        type_desc: &str,
        sources: &[&str],
        ctor_descs: &[String],
        ctor_payloads: &[Vec<u8>],
        method: &str,
        param_descs: &[String],
        payloads: &[Vec<u8>],
    ) -> Result<Vec<u8>, EngineError> {
        let (result, ret_ty) = self.run_on_fresh_receiver(
            type_desc,
            sources,
            ctor_descs,
            ctor_payloads,
            method,
            param_descs,
            payloads,
        )?;
        wire::encode(&self.types, &result, ret_ty)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn try_execute_method_into(
        &mut self,
        result_var: &str,
        type_desc: &str,
        sources: &[&str],
        ctor_descs: &[String],
        ctor_payloads: &[Vec<u8>],
        method: &str,
        param_descs: &[String],
        payloads: &[Vec<u8>],
    ) -> Result<(), EngineError> {
        let (result, ret_ty) = self.run_on_fresh_receiver(
            type_desc,
            sources,
            ctor_descs,
            ctor_payloads,
            method,
            param_descs,
            payloads,
        )?;
        self.variables.set(result_var, result, ret_ty);
        Ok(())
    }

    pub fn try_construct_into(
        &mut self,
        var: &str,
        type_desc: &str,
        sources: &[&str],
        ctor_descs: &[String],
        ctor_payloads: &[Vec<u8>],
    ) -> Result<(), EngineError> {
        let ty = resolve(&mut self.types, &self.modules, type_desc, sources)?;
        let (ctor_tys, ctor_args) = invoke::zip_parameters(
            &mut self.types,
            &self.modules,
            &self.variables,
            ctor_descs,
            ctor_payloads,
        )?;
        let instance =
            invoke::construct(&mut self.types, &self.modules, ty, &ctor_tys, &ctor_args)?;
        self.variables.set(var, instance, ty);
        Ok(())
    }

    pub fn try_execute_on_variable(
        &mut self,
        var: &str,
        method: &str,
        param_descs: &[String],
        payloads: &[Vec<u8>],
        result_var: &str,
    ) -> Result<(), EngineError> {
        let stored = self
            .variables
            .get(var)
            .ok_or_else(|| EngineError::VariableNotFound(var.to_string()))?;
        if stored.value.is_null() {
            return Err(EngineError::Invocation(format!(
                "variable `{}` holds null",
                var
            )));
        }
        let receiver = stored.value.clone();
        let receiver_ty = stored.ty;

        let (arg_tys, args) = invoke::zip_parameters(
            &mut self.types,
            &self.modules,
            &self.variables,
            param_descs,
            payloads,
        )?;
        let (result, ret_ty) = invoke::invoke(
            &mut self.types,
            &self.modules,
            receiver_ty,
            Some(&receiver),
            method,
            &arg_tys,
            &args,
        )?;
        self.variables.set(result_var, result, ret_ty);
        Ok(())
    }

    pub fn try_set_variable(
        &mut self,
        name: &str,
        type_desc: &str,
        sources: &[&str],
        payload: &[u8],
    ) -> Result<(), EngineError> {
        // A payload that decodes to null, or fails to decode at all,
        // binds a typed null slot; the descriptor must resolve then.
        let (value, ty) =
            match wire::decode(&mut self.types, &self.modules, payload) {
                Ok((value, decoded_ty)) if !value.is_null() => (value, decoded_ty),
                _ => (
                    Value::Null,
                    resolve(&mut self.types, &self.modules, type_desc, sources)?,
                ),
            };
        self.variables.set(name, value, ty);
        Ok(())
    }

    pub fn try_get_variable(&mut self, name: &str) -> Result<Vec<u8>, EngineError> {
        let stored = self
            .variables
            .get(name)
            .ok_or_else(|| EngineError::VariableNotFound(name.to_string()))?;
        let (value, ty) = (stored.value.clone(), stored.ty);
        wire::encode(&self.types, &value, ty)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_on_fresh_receiver(
        &mut self,
        type_desc: &str,
        sources: &[&str],
        ctor_descs: &[String],
        ctor_payloads: &[Vec<u8>],
        method: &str,
        param_descs: &[String],
        payloads: &[Vec<u8>],
    ) -> Result<(Value, crate::types::TypeId), EngineError> {
        let ty = resolve(&mut self.types, &self.modules, type_desc, sources)?;
        let (arg_tys, args) = invoke::zip_parameters(
            &mut self.types,
            &self.modules,
            &self.variables,
            param_descs,
            payloads,
        )?;
        // A receiver exists only for instance members; a static call
        // never touches the constructor arrays.
        let target = invoke::find_method(&mut self.types, &self.modules, ty, method, &arg_tys)?;
        let receiver = if target.is_static {
            None
        } else {
            let (ctor_tys, ctor_args) = invoke::zip_parameters(
                &mut self.types,
                &self.modules,
                &self.variables,
                ctor_descs,
                ctor_payloads,
            )?;
            Some(invoke::construct(&mut self.types, &self.modules, ty, &ctor_tys, &ctor_args)?)
        };
        invoke::invoke(
            &mut self.types,
            &self.modules,
            ty,
            receiver.as_ref(),
            method,
            &arg_tys,
            &args,
        )
    }

    fn settle<T>(&mut self, result: Result<T, EngineError>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            }
            Err(e) => {
                self.last_error = Some(e);
                None
            }
        }
    }

    fn settle_flag<T>(&mut self, result: Result<T, EngineError>) -> bool {
        self.settle(result).is_some()
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns every live sandbox and tracks which one is active. Starts with
/// one active sandbox; the active sandbox can be switched but never
/// destroyed, so there is always exactly one.
pub struct SandboxManager {
    sandboxes: Vec<Sandbox>,
    active: usize,
}

impl SandboxManager {
    pub fn new() -> Self {
        SandboxManager { sandboxes: vec![Sandbox::new()], active: 0 }
    }

    pub fn active(&self) -> &Sandbox {
        &self.sandboxes[self.active]
    }

    pub fn active_mut(&mut self) -> &mut Sandbox {
        &mut self.sandboxes[self.active]
    }

    pub fn create(&mut self) -> SandboxId {
        let sandbox = Sandbox::new();
        let id = sandbox.id();
        self.sandboxes.push(sandbox);
        id
    }

    pub fn switch_to(&mut self, id: SandboxId) -> bool {
        match self.sandboxes.iter().position(|s| s.id() == id) {
            Some(index) => {
                self.active = index;
                true
            }
            None => false,
        }
    }

    /// Drop a sandbox and everything in it. The active sandbox is
    /// refused; switch away first.
    pub fn destroy(&mut self, id: SandboxId) -> bool {
        match self.sandboxes.iter().position(|s| s.id() == id) {
            Some(index) if index != self.active => {
                self.sandboxes.remove(index);
                if index < self.active {
                    self.active -= 1;
                }
                true
            }
            _ => false,
        }
    }

    /// Every live sandbox paired with whether it is the active one.
    pub fn list(&self) -> Vec<(SandboxId, bool)> {
        self.sandboxes
            .iter()
            .enumerate()
            .map(|(index, sandbox)| (sandbox.id(), index == self.active))
            .collect()
    }
}

impl Default for SandboxManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_starts_with_one_active() {
        let manager = SandboxManager::new();
        assert_eq!(manager.list(), vec![(manager.active().id(), true)]);
    }

    #[test]
    fn test_switch_and_destroy() {
        let mut manager = SandboxManager::new();
        let first = manager.active().id();
        let second = manager.create();

        // Active sandbox cannot be destroyed.
        assert!(!manager.destroy(first));

        assert!(manager.switch_to(second));
        assert_eq!(manager.active().id(), second);
        assert_eq!(
            manager.list(),
            vec![(first, false), (second, true)]
        );
        assert!(manager.destroy(first));
        assert_eq!(manager.list(), vec![(second, true)]);

        // Unknown ids are refused.
        assert!(!manager.switch_to(first));
        assert!(!manager.destroy(first));
    }

    #[test]
    fn test_sentinel_surface_records_error() {
        let mut sandbox = Sandbox::new();
        assert!(sandbox.get_variable("ghost").is_none());
        assert!(sandbox.last_error().is_some());
        assert_eq!(sandbox.variable_info("ghost"), "");

        assert!(!sandbox.load_module("m", b"not an image"));
        assert!(matches!(
            sandbox.last_error(),
            Some(EngineError::ModuleLoad(_))
        ));
    }
}
