//! Engine error types.
//!
//! Every public `Sandbox` operation converts these into its documented
//! sentinel value (`false`, `None`, or an empty buffer); nothing here
//! crosses the public boundary as a panic or unwinding error. A fault in
//! loaded module code must never tear down the controlling process.

/// Errors produced while resolving, binding, invoking, or crossing the
/// serialization boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed descriptor: bad bracket nesting or arity/argument mismatch
    #[error("descriptor syntax error: {0}")]
    DescriptorSyntax(String),

    /// Name not found in any tried source, including after generic construction
    #[error("unresolved type: {0}")]
    Resolution(String),

    /// Parameter array mismatch or a variable reference that does not exist
    #[error("parameter binding error: {0}")]
    Binding(String),

    /// No constructor or method with an exact parameter-type match
    #[error("no matching member: {0}")]
    MemberLookup(String),

    /// The invoked member failed during execution, or receiver construction failed
    #[error("invocation failed: {0}")]
    Invocation(String),

    /// Payload could not be produced or reconstructed
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Lookup by name missed in the variable store
    #[error("variable not found: {0}")]
    VariableNotFound(String),

    /// Module image bytes could not be decoded
    #[error("module load failed: {0}")]
    ModuleLoad(String),
}

impl EngineError {
    /// Short kind tag, used by diagnostics output.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::DescriptorSyntax(_) => "descriptor-syntax",
            EngineError::Resolution(_) => "resolution",
            EngineError::Binding(_) => "binding",
            EngineError::MemberLookup(_) => "member-lookup",
            EngineError::Invocation(_) => "invocation",
            EngineError::Serialization(_) => "serialization",
            EngineError::VariableNotFound(_) => "variable-not-found",
            EngineError::ModuleLoad(_) => "module-load",
        }
    }
}
