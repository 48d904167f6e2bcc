//! The type resolution chain.
//!
//! A descriptor resolves in three steps:
//!
//! 1. Canonical index lookup in the type table. Skipped when the caller
//!    restricts the search to named source modules.
//! 2. Per-module scan, in load order or over the named sources. A
//!    descriptor with an origin qualifier only matches the module whose
//!    identity or registered name equals the qualifier.
//! 3. Generic construction: resolve the open type and each argument
//!    recursively, then instantiate. The argument count must equal the
//!    declared arity.
//!
//! Closed generics register themselves under their canonical descriptor,
//! so a repeated resolution of the same closed type hits step 1.

use crate::descriptor::{self, ParsedTypeRef};
use crate::error::EngineError;
use crate::modules::{Module, ModuleRegistry};
use crate::types::{TypeId, TypeTable};

pub fn resolve(
    table: &mut TypeTable,
    modules: &ModuleRegistry,
    descriptor: &str,
    sources: &[&str],
) -> Result<TypeId, EngineError> {
    let parsed = descriptor::parse(descriptor)?;

    if parsed.args_src.is_some() && parsed.arity.is_none() {
        return Err(EngineError::DescriptorSyntax(format!(
            "`{}` has an argument list but no arity marker",
            descriptor.trim()
        )));
    }

    if sources.is_empty() {
        if let Some(id) = table.lookup(descriptor) {
            return Ok(id);
        }
    }

    let open = find_named(table, modules, &parsed, descriptor, sources)?;

    if !parsed.is_generic() {
        return Ok(open);
    }

    let arg_descs = descriptor::split_args(parsed.args_src.as_deref().unwrap_or(""))?;
    let declared = parsed.arity.unwrap_or(0);
    if arg_descs.len() != declared {
        return Err(EngineError::DescriptorSyntax(format!(
            "`{}` declares arity {} but lists {} arguments",
            descriptor.trim(),
            declared,
            arg_descs.len()
        )));
    }

    let mut args = Vec::with_capacity(arg_descs.len());
    for arg in &arg_descs {
        args.push(resolve(table, modules, arg, sources)?);
    }
    table.instantiate(open, &args)
}

/// Resolve the name-and-origin part of a descriptor to a type handle.
/// For a generic-construction candidate this is the open type.
fn find_named(
    table: &TypeTable,
    modules: &ModuleRegistry,
    parsed: &ParsedTypeRef,
    original: &str,
    sources: &[&str],
) -> Result<TypeId, EngineError> {
    let bare = parsed
        .open_name()
        .unwrap_or_else(|| parsed.name.clone());

    let scan: Vec<&Module> = if sources.is_empty() {
        modules.iter().collect()
    } else {
        sources
            .iter()
            .map(|name| {
                modules.get(name).ok_or_else(|| {
                    EngineError::Resolution(format!("unknown source module `{}`", name))
                })
            })
            .collect::<Result<_, _>>()?
    };

    for module in scan {
        if let Some(origin) = &parsed.origin {
            if !module.accepts_origin(origin) {
                continue;
            }
        }
        if let Some(id) = module.find(&bare) {
            return Ok(id);
        }
    }

    // Builtins (and previously closed generics' open bases) live in the
    // canonical index, not in any module.
    if sources.is_empty() {
        let qualified = match &parsed.origin {
            Some(origin) => format!("{}, {}", bare, origin),
            None => bare.clone(),
        };
        if let Some(id) = table.lookup(&qualified) {
            return Ok(id);
        }
    }

    Err(EngineError::Resolution(format!(
        "type `{}` not found",
        original.trim()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ModuleBuilder;
    use crate::types::{self, TypeShape};

    fn loaded() -> (TypeTable, ModuleRegistry) {
        let mut table = TypeTable::new();
        let mut registry = ModuleRegistry::new();
        let widgets = ModuleBuilder::new("widgets")
            .class("Greeter")
            .field("Prefix", "Str")
            .finish()
            .generic_class("Pair`2", &["A", "B"])
            .field("First", "A")
            .field("Second", "B")
            .finish()
            .build();
        let tools = ModuleBuilder::new("tools")
            .class("Hammer")
            .finish()
            .build();
        registry.load_image(&mut table, "widgets", widgets).unwrap();
        registry.load_image(&mut table, "tools", tools).unwrap();
        (table, registry)
    }

    #[test]
    fn test_builtin_resolves_globally() {
        let (mut table, registry) = loaded();
        assert_eq!(resolve(&mut table, &registry, "Int", &[]).unwrap(), types::INT);
        assert_eq!(resolve(&mut table, &registry, "str", &[]).unwrap(), types::STR);
    }

    #[test]
    fn test_bare_name_scans_modules_in_order() {
        let (mut table, registry) = loaded();
        let id = resolve(&mut table, &registry, "Hammer", &[]).unwrap();
        assert_eq!(table.descriptor_of(id), "Hammer, tools");
    }

    #[test]
    fn test_origin_gates_module_scan() {
        let (mut table, registry) = loaded();
        let id = resolve(&mut table, &registry, "Greeter, widgets", &[]).unwrap();
        assert_eq!(table.name_of(id), "Greeter");
        assert!(resolve(&mut table, &registry, "Greeter, tools", &[]).is_err());
    }

    #[test]
    fn test_sources_restrict_search() {
        let (mut table, registry) = loaded();
        assert!(resolve(&mut table, &registry, "Hammer", &["widgets"]).is_err());
        assert!(resolve(&mut table, &registry, "Hammer", &["tools"]).is_ok());
        assert!(resolve(&mut table, &registry, "Hammer", &["nosuch"]).is_err());
        // Builtin fallback is part of the unrestricted chain only.
        assert!(resolve(&mut table, &registry, "Int", &["widgets"]).is_err());
    }

    #[test]
    fn test_generic_construction() {
        let (mut table, registry) = loaded();
        let id = resolve(&mut table, &registry, "List`1[Int]", &[]).unwrap();
        assert_eq!(table.name_of(id), "List`1[Int]");
        assert_eq!(table.list_element(id), Some(types::INT));

        // Second resolution of the same closed descriptor is a direct hit.
        let again = resolve(&mut table, &registry, "list`1[int]", &[]).unwrap();
        assert_eq!(id, again);
    }

    #[test]
    fn test_generic_with_module_arguments() {
        let (mut table, registry) = loaded();
        let id = resolve(
            &mut table,
            &registry,
            "Pair`2[[Greeter, widgets],Int], widgets",
            &[],
        )
        .unwrap();
        match &table.def(id).shape {
            TypeShape::Closed { args, class, .. } => {
                assert_eq!(table.descriptor_of(args[0]), "Greeter, widgets");
                assert_eq!(args[1], types::INT);
                assert_eq!(class.fields[0].ty, "Greeter, widgets");
                assert_eq!(class.fields[1].ty, "Int");
            }
            other => panic!("expected closed generic, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_generic_arguments() {
        let (mut table, registry) = loaded();
        let id = resolve(&mut table, &registry, "List`1[List`1[Str]]", &[]).unwrap();
        let inner = table.list_element(id).unwrap();
        assert_eq!(table.list_element(inner), Some(types::STR));
    }

    #[test]
    fn test_arity_mismatch_is_syntax_error() {
        let (mut table, registry) = loaded();
        assert!(matches!(
            resolve(&mut table, &registry, "Pair`2[Int], widgets", &[]),
            Err(EngineError::DescriptorSyntax(_))
        ));
        assert!(matches!(
            resolve(&mut table, &registry, "List`1[Int,Str]", &[]),
            Err(EngineError::DescriptorSyntax(_))
        ));
    }

    #[test]
    fn test_args_without_marker_rejected() {
        let (mut table, registry) = loaded();
        assert!(matches!(
            resolve(&mut table, &registry, "List[Int]", &[]),
            Err(EngineError::DescriptorSyntax(_))
        ));
    }

    #[test]
    fn test_unknown_type_is_resolution_error() {
        let (mut table, registry) = loaded();
        assert!(matches!(
            resolve(&mut table, &registry, "Ghost", &[]),
            Err(EngineError::Resolution(_))
        ));
    }
}
