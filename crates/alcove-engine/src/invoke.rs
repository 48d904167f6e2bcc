//! Member matching and invocation.
//!
//! Overload selection is exact and ordered: a candidate matches when its
//! declared parameter types, resolved through the chain, equal the
//! argument types position by position. The first match in declaration
//! order wins. A candidate whose signature fails to resolve is skipped
//! rather than failing the whole lookup, so one broken overload cannot
//! shadow its siblings.
//!
//! Argument types come from the caller's parameter descriptors, not from
//! the argument values, which is what lets a null argument select a
//! typed parameter.

use crate::descriptor;
use crate::error::EngineError;
use crate::interp;
use crate::modules::ModuleRegistry;
use crate::natives;
use crate::resolve::resolve;
use crate::types::{Body, MethodDef, TypeId, TypeTable};
use crate::value::Value;
use crate::variables::VariableStore;
use crate::wire;

/// Pair parameter descriptors with serialized arguments, producing the
/// declared types and decoded values for matching and invocation.
///
/// A descriptor of the form `Local.Variable.<name>` binds the named
/// stored variable instead of decoding the payload at that position.
pub fn zip_parameters(
    table: &mut TypeTable,
    modules: &ModuleRegistry,
    variables: &VariableStore,
    param_descs: &[String],
    payloads: &[Vec<u8>],
) -> Result<(Vec<TypeId>, Vec<Value>), EngineError> {
    if param_descs.len() != payloads.len() {
        return Err(EngineError::Binding(format!(
            "{} parameter descriptors for {} arguments",
            param_descs.len(),
            payloads.len()
        )));
    }

    let mut types = Vec::with_capacity(param_descs.len());
    let mut values = Vec::with_capacity(param_descs.len());
    for (desc, bytes) in param_descs.iter().zip(payloads) {
        if let Some(name) = descriptor::local_variable_name(desc) {
            let stored = variables.get(name).ok_or_else(|| {
                EngineError::Binding(format!("variable `{}` is not bound", name))
            })?;
            types.push(stored.ty);
            values.push(stored.value.clone());
        } else {
            let ty = resolve(table, modules, desc, &[])?;
            let (value, _) = wire::decode(table, modules, bytes)?;
            types.push(ty);
            values.push(value);
        }
    }
    Ok((types, values))
}

/// Find a method by name and exact argument types. Names compare
/// case-insensitively, like everything else in the resolution surface.
pub fn find_method(
    table: &mut TypeTable,
    modules: &ModuleRegistry,
    ty: TypeId,
    name: &str,
    arg_types: &[TypeId],
) -> Result<MethodDef, EngineError> {
    let candidates: Vec<MethodDef> = table
        .methods_of(ty)
        .iter()
        .filter(|m| m.name.eq_ignore_ascii_case(name))
        .cloned()
        .collect();
    if candidates.is_empty() {
        return Err(EngineError::MemberLookup(format!(
            "type `{}` has no method `{}`",
            table.name_of(ty),
            name
        )));
    }
    for method in candidates {
        if signature_matches(table, modules, &method.params, arg_types) {
            return Ok(method);
        }
    }
    Err(EngineError::MemberLookup(format!(
        "no overload of `{}.{}` takes the given {} argument(s)",
        table.name_of(ty),
        name,
        arg_types.len()
    )))
}

/// Construct an instance of a resolved type.
///
/// A type declaring no constructors has an implicit zero-argument one;
/// field initializers apply in both cases, before any constructor body
/// runs.
pub fn construct(
    table: &mut TypeTable,
    modules: &ModuleRegistry,
    ty: TypeId,
    arg_types: &[TypeId],
    args: &[Value],
) -> Result<Value, EngineError> {
    if table.list_element(ty).is_some() {
        if !arg_types.is_empty() {
            return Err(EngineError::MemberLookup(format!(
                "`{}` has no constructor taking {} argument(s)",
                table.name_of(ty),
                arg_types.len()
            )));
        }
        return Ok(Value::empty_list(ty));
    }

    if !table.is_instantiable(ty) {
        return Err(EngineError::Invocation(format!(
            "type `{}` cannot be constructed",
            table.name_of(ty)
        )));
    }

    let ctors = table.ctors_of(ty).to_vec();
    let chosen = if ctors.is_empty() {
        if !arg_types.is_empty() {
            return Err(EngineError::MemberLookup(format!(
                "`{}` has no constructor taking {} argument(s)",
                table.name_of(ty),
                arg_types.len()
            )));
        }
        None
    } else {
        Some(
            ctors
                .into_iter()
                .find(|c| signature_matches(table, modules, &c.params, arg_types))
                .ok_or_else(|| {
                    EngineError::MemberLookup(format!(
                        "no constructor of `{}` takes the given {} argument(s)",
                        table.name_of(ty),
                        arg_types.len()
                    ))
                })?,
        )
    };

    let fields = table.fields_of(ty).to_vec();
    let instance = Value::blank_instance(ty, fields.len());
    if let Value::Instance(inst) = &instance {
        let mut inst = inst.borrow_mut();
        for (slot, field) in fields.iter().enumerate() {
            if let Some(init) = &field.init {
                inst.fields[slot] = init.to_value();
            }
        }
    }

    if let Some(ctor) = chosen {
        match &ctor.body {
            Body::Ops(ops) => {
                interp::run(table, ops, Some(&instance), args)?;
            }
            Body::Native(id) => {
                natives::dispatch(*id, Some(&instance), args)?;
            }
        }
    }
    Ok(instance)
}

/// Invoke a method on a type, returning the result and the resolved
/// declared return type (which is what the result is encoded under).
pub fn invoke(
    table: &mut TypeTable,
    modules: &ModuleRegistry,
    ty: TypeId,
    target: Option<&Value>,
    name: &str,
    arg_types: &[TypeId],
    args: &[Value],
) -> Result<(Value, TypeId), EngineError> {
    let method = find_method(table, modules, ty, name, arg_types)?;

    let receiver = if method.is_static {
        None
    } else {
        match target {
            Some(v) => Some(v),
            None => {
                return Err(EngineError::Invocation(format!(
                    "instance method `{}.{}` needs a receiver",
                    table.name_of(ty),
                    method.name
                )))
            }
        }
    };

    let result = match &method.body {
        Body::Ops(ops) => interp::run(table, ops, receiver, args)?,
        Body::Native(id) => natives::dispatch(*id, receiver, args)?,
    };
    let ret_ty = resolve(table, modules, &method.ret, &[])?;
    Ok((result, ret_ty))
}

fn signature_matches(
    table: &mut TypeTable,
    modules: &ModuleRegistry,
    declared: &[String],
    args: &[TypeId],
) -> bool {
    if declared.len() != args.len() {
        return false;
    }
    declared.iter().zip(args).all(|(desc, &arg)| {
        matches!(resolve(table, modules, desc, &[]), Ok(ty) if ty == arg)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ModuleBuilder;
    use crate::interp::{Literal, Op};
    use crate::types;

    fn loaded() -> (TypeTable, ModuleRegistry) {
        let mut table = TypeTable::new();
        let mut registry = ModuleRegistry::new();
        let image = ModuleBuilder::new("widgets")
            .class("Greeter")
            .field_init("Prefix", "Str", Literal::Str("Hello, ".into()))
            .ctor(
                &["Str"],
                vec![Op::LoadParam(0), Op::StoreField("Prefix".into())],
            )
            .method(
                "Greet",
                &["Str"],
                "Str",
                vec![
                    Op::LoadField("Prefix".into()),
                    Op::LoadParam(0),
                    Op::Concat,
                    Op::Ret,
                ],
            )
            .method(
                "Greet",
                &["Int"],
                "Str",
                vec![Op::Const(Literal::Str("by number".into())), Op::Ret],
            )
            .static_method(
                "Motto",
                &[],
                "Str",
                vec![Op::Const(Literal::Str("greetings".into())), Op::Ret],
            )
            .finish()
            .build();
        registry.load_image(&mut table, "widgets", image).unwrap();
        (table, registry)
    }

    fn greeter(table: &TypeTable) -> TypeId {
        table.lookup("Greeter, widgets").unwrap()
    }

    #[test]
    fn test_construct_with_ctor() {
        let (mut table, registry) = loaded();
        let ty = greeter(&table);
        let v = construct(
            &mut table,
            &registry,
            ty,
            &[types::STR],
            &[Value::Str("Hi, ".into())],
        )
        .unwrap();
        match &v {
            Value::Instance(i) => {
                assert_eq!(i.borrow().fields[0], Value::Str("Hi, ".into()))
            }
            other => panic!("expected instance, got {}", other),
        }
    }

    #[test]
    fn test_field_init_applies_without_ctor_args() {
        let (mut table, registry) = loaded();
        let ty = greeter(&table);
        // No zero-arg ctor is declared, so this is a lookup failure, but
        // a matching ctor still sees initialized fields first.
        assert!(construct(&mut table, &registry, ty, &[], &[]).is_err());
    }

    #[test]
    fn test_invoke_selects_overload_by_declared_types() {
        let (mut table, registry) = loaded();
        let ty = greeter(&table);
        let this = construct(
            &mut table,
            &registry,
            ty,
            &[types::STR],
            &[Value::Str("Hey, ".into())],
        )
        .unwrap();

        let (out, ret) = invoke(
            &mut table,
            &registry,
            ty,
            Some(&this),
            "Greet",
            &[types::STR],
            &[Value::Str("World".into())],
        )
        .unwrap();
        assert_eq!(out, Value::Str("Hey, World".into()));
        assert_eq!(ret, types::STR);

        let (out, _) = invoke(
            &mut table,
            &registry,
            ty,
            Some(&this),
            "greet",
            &[types::INT],
            &[Value::Int(7)],
        )
        .unwrap();
        assert_eq!(out, Value::Str("by number".into()));
    }

    #[test]
    fn test_static_invoke_without_receiver() {
        let (mut table, registry) = loaded();
        let ty = greeter(&table);
        let (out, _) =
            invoke(&mut table, &registry, ty, None, "Motto", &[], &[]).unwrap();
        assert_eq!(out, Value::Str("greetings".into()));
    }

    #[test]
    fn test_instance_method_needs_receiver() {
        let (mut table, registry) = loaded();
        let ty = greeter(&table);
        assert!(matches!(
            invoke(&mut table, &registry, ty, None, "Greet", &[types::STR], &[Value::Null]),
            Err(EngineError::Invocation(_))
        ));
    }

    #[test]
    fn test_missing_member_and_overload() {
        let (mut table, registry) = loaded();
        let ty = greeter(&table);
        assert!(matches!(
            find_method(&mut table, &registry, ty, "Vanish", &[]),
            Err(EngineError::MemberLookup(_))
        ));
        assert!(matches!(
            find_method(&mut table, &registry, ty, "Greet", &[types::BOOL]),
            Err(EngineError::MemberLookup(_))
        ));
    }

    #[test]
    fn test_construct_builtin_list() {
        let (mut table, registry) = loaded();
        let ty = resolve(&mut table, &registry, "List`1[Int]", &[]).unwrap();
        let v = construct(&mut table, &registry, ty, &[], &[]).unwrap();
        assert!(matches!(v, Value::List(_)));
        let (len, _) =
            invoke(&mut table, &registry, ty, Some(&v), "Len", &[], &[]).unwrap();
        assert_eq!(len, Value::Int(0));
    }

    #[test]
    fn test_zip_parameters_decodes_and_binds() {
        let (mut table, registry) = loaded();
        let mut vars = VariableStore::new();
        vars.set("who", Value::Str("World".into()), types::STR);

        let payload = wire::encode(&table, &Value::Int(9), types::INT).unwrap();
        let descs = vec!["Int".to_string(), "Local.Variable.who".to_string()];
        // Whatever rides in the payload slot of a variable binding is ignored.
        let payloads = vec![payload, b"not a payload".to_vec()];

        let (tys, vals) =
            zip_parameters(&mut table, &registry, &vars, &descs, &payloads).unwrap();
        assert_eq!(tys, vec![types::INT, types::STR]);
        assert_eq!(vals, vec![Value::Int(9), Value::Str("World".into())]);
    }

    #[test]
    fn test_zip_parameters_count_mismatch() {
        let (mut table, registry) = loaded();
        let vars = VariableStore::new();
        let descs = vec!["Int".to_string()];
        assert!(matches!(
            zip_parameters(&mut table, &registry, &vars, &descs, &[]),
            Err(EngineError::Binding(_))
        ));
    }

    #[test]
    fn test_zip_parameters_unbound_variable() {
        let (mut table, registry) = loaded();
        let vars = VariableStore::new();
        let descs = vec!["Local.Variable.ghost".to_string()];
        let payloads = vec![Vec::new()];
        assert!(matches!(
            zip_parameters(&mut table, &registry, &vars, &descs, &payloads),
            Err(EngineError::Binding(_))
        ));
    }
}
