//! The per-sandbox type table.
//!
//! A `TypeId` is the opaque handle the rest of the engine calls a
//! resolved type. Handles are only produced by this table — either at
//! registration (builtins, module loading) or by generic instantiation —
//! never forged from a string directly.
//!
//! Member signatures (field types, parameter types, return types) are
//! stored as descriptor strings and resolved lazily through the
//! resolution chain at lookup time. That keeps module images
//! self-contained: a signature can name a type from another module that
//! is loaded later.

use rustc_hash::FxHashMap;

use crate::descriptor;
use crate::error::EngineError;
use crate::interp::{Literal, Op};
use crate::natives;
use crate::value::Value;

/// Opaque handle to a resolved type in one sandbox's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    pub fn raw(self) -> u32 {
        self.0
    }

    pub(crate) const fn from_raw(raw: u32) -> Self {
        TypeId(raw)
    }
}

/// Built-in primitive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prim {
    Int,
    Float,
    Bool,
    Str,
    Unit,
}

/// A member body: interpreted ops from a module image, or a native
/// built-in keyed by id.
#[derive(Debug, Clone)]
pub enum Body {
    Ops(Vec<Op>),
    Native(u16),
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    /// Field type descriptor, resolved lazily.
    pub ty: String,
    /// Initial value applied before any constructor runs.
    pub init: Option<Literal>,
}

#[derive(Debug, Clone)]
pub struct CtorDef {
    pub params: Vec<String>,
    pub body: Body,
}

#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: String,
    pub is_static: bool,
    pub params: Vec<String>,
    pub ret: String,
    pub body: Body,
}

#[derive(Debug, Clone, Default)]
pub struct ClassDef {
    pub fields: Vec<FieldDef>,
    pub ctors: Vec<CtorDef>,
    pub methods: Vec<MethodDef>,
}

/// An open generic class: a template whose signatures may name the
/// declared type parameters.
#[derive(Debug, Clone)]
pub struct GenericDef {
    pub type_params: Vec<String>,
    pub template: ClassDef,
}

#[derive(Debug)]
pub enum TypeShape {
    Primitive { prim: Prim, methods: Vec<MethodDef> },
    Class(ClassDef),
    Generic(GenericDef),
    /// A closed (parameterized) generic, produced by `instantiate`.
    Closed {
        base: TypeId,
        args: Vec<TypeId>,
        class: ClassDef,
    },
}

#[derive(Debug)]
pub struct TypeDef {
    /// Display name: `Int`, `Greeter`, `Pair`2`, `Pair`2[[Inner, m1],Int]`.
    pub name: String,
    /// Module identity for module-contributed types; `None` for builtins.
    pub origin: Option<String>,
    pub shape: TypeShape,
}

/// All types one sandbox knows about, with a case-insensitive canonical
/// index (the "default global resolver" of the resolution chain).
pub struct TypeTable {
    defs: Vec<TypeDef>,
    index: FxHashMap<String, TypeId>,
}

pub const INT: TypeId = TypeId(0);
pub const FLOAT: TypeId = TypeId(1);
pub const BOOL: TypeId = TypeId(2);
pub const STR: TypeId = TypeId(3);
pub const UNIT: TypeId = TypeId(4);
/// The open builtin generic `List`1`.
pub const LIST: TypeId = TypeId(5);

impl TypeTable {
    pub fn new() -> Self {
        let mut table = TypeTable { defs: Vec::new(), index: FxHashMap::default() };

        table.register(TypeDef {
            name: "Int".into(),
            origin: None,
            shape: TypeShape::Primitive { prim: Prim::Int, methods: Vec::new() },
        });
        table.register(TypeDef {
            name: "Float".into(),
            origin: None,
            shape: TypeShape::Primitive { prim: Prim::Float, methods: Vec::new() },
        });
        table.register(TypeDef {
            name: "Bool".into(),
            origin: None,
            shape: TypeShape::Primitive { prim: Prim::Bool, methods: Vec::new() },
        });
        table.register(TypeDef {
            name: "Str".into(),
            origin: None,
            shape: TypeShape::Primitive { prim: Prim::Str, methods: str_methods() },
        });
        table.register(TypeDef {
            name: "Unit".into(),
            origin: None,
            shape: TypeShape::Primitive { prim: Prim::Unit, methods: Vec::new() },
        });
        table.register(TypeDef {
            name: "List`1".into(),
            origin: None,
            shape: TypeShape::Generic(list_generic()),
        });

        debug_assert_eq!(table.lookup("List`1"), Some(LIST));
        table
    }

    /// Register a definition and index it under its canonical descriptor.
    pub fn register(&mut self, def: TypeDef) -> TypeId {
        let id = TypeId(self.defs.len() as u32);
        self.defs.push(def);
        let key = normalize(&self.descriptor_of(id));
        self.index.insert(key, id);
        id
    }

    pub fn def(&self, id: TypeId) -> &TypeDef {
        &self.defs[id.0 as usize]
    }

    /// Direct canonical lookup — step 1 of the resolution chain.
    pub fn lookup(&self, descriptor: &str) -> Option<TypeId> {
        self.index.get(&normalize(descriptor)).copied()
    }

    /// Canonical descriptor for a handle; always re-resolvable through
    /// the resolution chain, which is what the wire format relies on.
    pub fn descriptor_of(&self, id: TypeId) -> String {
        let def = self.def(id);
        match &def.origin {
            Some(origin) => format!("{}, {}", def.name, origin),
            None => def.name.clone(),
        }
    }

    pub fn name_of(&self, id: TypeId) -> &str {
        &self.def(id).name
    }

    /// Members, regardless of shape. Open generics expose none.
    pub fn methods_of(&self, id: TypeId) -> &[MethodDef] {
        match &self.def(id).shape {
            TypeShape::Primitive { methods, .. } => methods,
            TypeShape::Class(c) => &c.methods,
            TypeShape::Closed { class, .. } => &class.methods,
            TypeShape::Generic(_) => &[],
        }
    }

    pub fn ctors_of(&self, id: TypeId) -> &[CtorDef] {
        match &self.def(id).shape {
            TypeShape::Class(c) => &c.ctors,
            TypeShape::Closed { class, .. } => &class.ctors,
            _ => &[],
        }
    }

    pub fn fields_of(&self, id: TypeId) -> &[FieldDef] {
        match &self.def(id).shape {
            TypeShape::Class(c) => &c.fields,
            TypeShape::Closed { class, .. } => &class.fields,
            _ => &[],
        }
    }

    /// Instance types are constructible; primitives and open generics
    /// are not.
    pub fn is_instantiable(&self, id: TypeId) -> bool {
        matches!(
            self.def(id).shape,
            TypeShape::Class(_) | TypeShape::Closed { .. }
        )
    }

    /// If `id` is a closed `List`1[T]`, return the element type.
    pub fn list_element(&self, id: TypeId) -> Option<TypeId> {
        match &self.def(id).shape {
            TypeShape::Closed { base, args, .. } if *base == LIST => Some(args[0]),
            _ => None,
        }
    }

    /// Runtime type of a value. A null value reports `Unit`.
    pub fn runtime_type(&self, value: &Value) -> TypeId {
        match value {
            Value::Null => UNIT,
            Value::Bool(_) => BOOL,
            Value::Int(_) => INT,
            Value::Float(_) => FLOAT,
            Value::Str(_) => STR,
            Value::List(l) => l.borrow().ty,
            Value::Instance(i) => i.borrow().ty,
        }
    }

    /// Bind an open generic to concrete argument types, producing (or
    /// reusing) the closed type. Fails when `open` is not a generic or
    /// the argument count violates the declared arity.
    pub fn instantiate(&mut self, open: TypeId, args: &[TypeId]) -> Result<TypeId, EngineError> {
        let (type_params, template, base_name, origin) = match &self.def(open).shape {
            TypeShape::Generic(g) => (
                g.type_params.clone(),
                g.template.clone(),
                self.def(open).name.clone(),
                self.def(open).origin.clone(),
            ),
            _ => {
                return Err(EngineError::Resolution(format!(
                    "`{}` is not an open generic type",
                    self.name_of(open)
                )))
            }
        };

        if args.len() != type_params.len() {
            return Err(EngineError::DescriptorSyntax(format!(
                "`{}` expects {} type arguments, got {}",
                base_name,
                type_params.len(),
                args.len()
            )));
        }

        let closed_name = self.closed_name(&base_name, args);
        let key = normalize(&match &origin {
            Some(o) => format!("{}, {}", closed_name, o),
            None => closed_name.clone(),
        });
        if let Some(&existing) = self.index.get(&key) {
            return Ok(existing);
        }

        let mut subst: FxHashMap<String, String> = FxHashMap::default();
        for (param, &arg) in type_params.iter().zip(args) {
            subst.insert(param.to_ascii_lowercase(), self.descriptor_of(arg));
        }
        let class = substitute_class(&template, &subst)?;

        Ok(self.register(TypeDef {
            name: closed_name,
            origin,
            shape: TypeShape::Closed { base: open, args: args.to_vec(), class },
        }))
    }

    /// `Base`k` + bracketed canonical argument descriptors. An argument
    /// whose descriptor carries an origin (contains a comma) gets its
    /// own bracket pair so the result stays parseable.
    fn closed_name(&self, base_name: &str, args: &[TypeId]) -> String {
        let rendered: Vec<String> = args
            .iter()
            .map(|&a| {
                let d = self.descriptor_of(a);
                if d.contains(',') {
                    format!("[{}]", d)
                } else {
                    d
                }
            })
            .collect();
        format!("{}[{}]", base_name, rendered.join(","))
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Case-insensitive, whitespace-insensitive index key. Names and origins
/// are `\w`-class tokens, so stripping whitespace cannot merge tokens.
fn normalize(descriptor: &str) -> String {
    descriptor
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Rewrite every descriptor in a class template through a type-parameter
/// substitution map.
fn substitute_class(
    template: &ClassDef,
    subst: &FxHashMap<String, String>,
) -> Result<ClassDef, EngineError> {
    let mut class = template.clone();
    for field in &mut class.fields {
        field.ty = substitute_descriptor(&field.ty, subst)?;
    }
    for ctor in &mut class.ctors {
        for p in &mut ctor.params {
            *p = substitute_descriptor(p, subst)?;
        }
    }
    for method in &mut class.methods {
        for p in &mut method.params {
            *p = substitute_descriptor(p, subst)?;
        }
        method.ret = substitute_descriptor(&method.ret, subst)?;
    }
    Ok(class)
}

/// Replace type-parameter names inside a descriptor, recursing into
/// generic argument lists. A parameter substitutes only where it stands
/// as a whole un-qualified name.
fn substitute_descriptor(
    desc: &str,
    subst: &FxHashMap<String, String>,
) -> Result<String, EngineError> {
    let parsed = descriptor::parse(desc)?;
    if parsed.is_generic() {
        let args = descriptor::split_args(parsed.args_src.as_deref().unwrap_or(""))?;
        let rewritten: Vec<String> = args
            .iter()
            .map(|a| {
                substitute_descriptor(a, subst).map(|d| {
                    if d.contains(',') {
                        format!("[{}]", d)
                    } else {
                        d
                    }
                })
            })
            .collect::<Result<_, _>>()?;
        let mut out = format!(
            "{}`{}[{}]",
            parsed.name,
            parsed.arity.unwrap_or(0),
            rewritten.join(",")
        );
        if let Some(origin) = &parsed.origin {
            out.push_str(", ");
            out.push_str(origin);
        }
        return Ok(out);
    }
    if parsed.origin.is_none() && parsed.arity.is_none() {
        if let Some(replacement) = subst.get(&parsed.name.to_ascii_lowercase()) {
            return Ok(replacement.clone());
        }
    }
    Ok(desc.trim().to_string())
}

fn str_methods() -> Vec<MethodDef> {
    vec![
        MethodDef {
            name: "Len".into(),
            is_static: false,
            params: vec![],
            ret: "Int".into(),
            body: Body::Native(natives::STR_LEN),
        },
        MethodDef {
            name: "ToUpper".into(),
            is_static: false,
            params: vec![],
            ret: "Str".into(),
            body: Body::Native(natives::STR_TO_UPPER),
        },
        MethodDef {
            name: "Contains".into(),
            is_static: false,
            params: vec!["Str".into()],
            ret: "Bool".into(),
            body: Body::Native(natives::STR_CONTAINS),
        },
    ]
}

fn list_generic() -> GenericDef {
    GenericDef {
        type_params: vec!["T".into()],
        template: ClassDef {
            fields: vec![],
            ctors: vec![],
            methods: vec![
                MethodDef {
                    name: "Len".into(),
                    is_static: false,
                    params: vec![],
                    ret: "Int".into(),
                    body: Body::Native(natives::LIST_LEN),
                },
                MethodDef {
                    name: "Push".into(),
                    is_static: false,
                    params: vec!["T".into()],
                    ret: "Unit".into(),
                    body: Body::Native(natives::LIST_PUSH),
                },
                MethodDef {
                    name: "Get".into(),
                    is_static: false,
                    params: vec!["Int".into()],
                    ret: "T".into(),
                    body: Body::Native(natives::LIST_GET),
                },
            ],
        },
    }
}
