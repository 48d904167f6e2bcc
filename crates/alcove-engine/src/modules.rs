//! The module registry.
//!
//! Modules are loaded from image bytes and registered under a
//! caller-chosen name. The image's own `name` field is the module's
//! identity; the two usually agree but do not have to, and origin
//! matching during resolution accepts either.

use rustc_hash::FxHashMap;

use crate::error::EngineError;
use crate::image::{ModuleImage, TypeImage};
use crate::types::{Body, ClassDef, CtorDef, FieldDef, GenericDef, MethodDef, TypeDef, TypeShape, TypeId, TypeTable};

#[derive(Debug)]
pub struct Module {
    /// The name the image declared for itself.
    pub identity: String,
    /// The name the caller registered the module under.
    pub registered_name: String,
    /// Bare display name (lowercased) to contributed type.
    names: FxHashMap<String, TypeId>,
    order: Vec<TypeId>,
}

impl Module {
    /// Does an origin token refer to this module? Both names count.
    pub fn accepts_origin(&self, origin: &str) -> bool {
        self.identity.eq_ignore_ascii_case(origin)
            || self.registered_name.eq_ignore_ascii_case(origin)
    }

    /// Look up a contributed type by bare display name (`Greeter`,
    /// `Pair`2`), case-insensitively.
    pub fn find(&self, bare_name: &str) -> Option<TypeId> {
        self.names.get(&bare_name.to_ascii_lowercase()).copied()
    }

    pub fn types(&self) -> &[TypeId] {
        &self.order
    }
}

/// Loaded modules, in load order.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: Vec<Module>,
    by_name: FxHashMap<String, usize>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an image and contribute its types to the table. Registering
    /// an already-used name replaces the mapping; the previous module's
    /// types stay in the table but its bare names stop resolving.
    pub fn load(
        &mut self,
        table: &mut TypeTable,
        registered_name: &str,
        bytes: &[u8],
    ) -> Result<&Module, EngineError> {
        let image = ModuleImage::from_bytes(bytes)?;
        self.load_image(table, registered_name, image)
    }

    pub fn load_image(
        &mut self,
        table: &mut TypeTable,
        registered_name: &str,
        image: ModuleImage,
    ) -> Result<&Module, EngineError> {
        let key = registered_name.to_ascii_lowercase();
        if key.is_empty() {
            return Err(EngineError::ModuleLoad("empty module name".into()));
        }

        let mut module = Module {
            identity: image.name.clone(),
            registered_name: registered_name.to_string(),
            names: FxHashMap::default(),
            order: Vec::new(),
        };

        for ty in &image.types {
            let display_name = display_name(ty)?;
            let name_key = display_name.to_ascii_lowercase();
            if module.names.contains_key(&name_key) {
                return Err(EngineError::ModuleLoad(format!(
                    "module `{}` declares `{}` twice",
                    image.name, display_name
                )));
            }
            let def = convert_type(ty, display_name, &image.name)?;
            let id = table.register(def);
            module.names.insert(name_key, id);
            module.order.push(id);
        }

        match self.by_name.get(&key) {
            Some(&index) => {
                self.modules[index] = module;
                Ok(&self.modules[index])
            }
            None => {
                self.by_name.insert(key, self.modules.len());
                self.modules.push(module);
                Ok(self.modules.last().unwrap())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Module> {
        self.by_name
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.modules[i])
    }

    /// Modules in load order, which is the per-module resolution scan
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Canonical display name for a type image. Generic types carry the
/// arity marker; a marker that contradicts the declared parameter list
/// is a load error.
fn display_name(ty: &TypeImage) -> Result<String, EngineError> {
    let (base, marker) = match ty.name.split_once('`') {
        Some((base, digits)) => {
            let declared: usize = digits.parse().map_err(|_| {
                EngineError::ModuleLoad(format!("bad arity marker in `{}`", ty.name))
            })?;
            (base, Some(declared))
        }
        None => (ty.name.as_str(), None),
    };
    if base.is_empty() {
        return Err(EngineError::ModuleLoad("type image has no name".into()));
    }
    if let Some(declared) = marker {
        if declared != ty.type_params.len() {
            return Err(EngineError::ModuleLoad(format!(
                "`{}` declares {} type parameters",
                ty.name,
                ty.type_params.len()
            )));
        }
    }
    if ty.type_params.is_empty() {
        Ok(base.to_string())
    } else {
        Ok(format!("{}`{}", base, ty.type_params.len()))
    }
}

fn convert_type(
    ty: &TypeImage,
    display_name: String,
    identity: &str,
) -> Result<TypeDef, EngineError> {
    let class = ClassDef {
        fields: ty
            .fields
            .iter()
            .map(|f| FieldDef { name: f.name.clone(), ty: f.ty.clone(), init: f.init.clone() })
            .collect(),
        ctors: ty
            .ctors
            .iter()
            .map(|c| CtorDef { params: c.params.clone(), body: Body::Ops(c.ops.clone()) })
            .collect(),
        methods: ty
            .methods
            .iter()
            .map(|m| MethodDef {
                name: m.name.clone(),
                is_static: m.is_static,
                params: m.params.clone(),
                ret: m.ret.clone(),
                body: Body::Ops(m.ops.clone()),
            })
            .collect(),
    };

    let shape = if ty.type_params.is_empty() {
        TypeShape::Class(class)
    } else {
        TypeShape::Generic(GenericDef { type_params: ty.type_params.clone(), template: class })
    };

    Ok(TypeDef { name: display_name, origin: Some(identity.to_string()), shape })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ModuleBuilder;
    use crate::interp::Op;

    fn widgets_image() -> ModuleImage {
        ModuleBuilder::new("widgets")
            .class("Greeter")
            .field("Prefix", "Str")
            .method("Greet", &["Str"], "Str", vec![Op::LoadParam(0), Op::Ret])
            .finish()
            .generic_class("Pair`2", &["A", "B"])
            .field("First", "A")
            .field("Second", "B")
            .finish()
            .build()
    }

    #[test]
    fn test_load_and_find() {
        let mut table = TypeTable::new();
        let mut registry = ModuleRegistry::new();
        let bytes = widgets_image().to_bytes().unwrap();
        registry.load(&mut table, "widgets", &bytes).unwrap();

        let module = registry.get("WIDGETS").unwrap();
        let greeter = module.find("greeter").unwrap();
        assert_eq!(table.name_of(greeter), "Greeter");
        assert_eq!(table.descriptor_of(greeter), "Greeter, widgets");
        assert!(module.find("pair`2").is_some());
        assert!(module.find("missing").is_none());

        // Module types land in the global canonical index too.
        assert_eq!(table.lookup("Greeter, widgets"), Some(greeter));
    }

    #[test]
    fn test_registered_name_differs_from_identity() {
        let mut table = TypeTable::new();
        let mut registry = ModuleRegistry::new();
        registry
            .load_image(&mut table, "alias", widgets_image())
            .unwrap();

        let module = registry.get("alias").unwrap();
        assert_eq!(module.identity, "widgets");
        assert!(module.accepts_origin("widgets"));
        assert!(module.accepts_origin("Alias"));
        assert!(!module.accepts_origin("other"));
    }

    #[test]
    fn test_reload_replaces_mapping() {
        let mut table = TypeTable::new();
        let mut registry = ModuleRegistry::new();
        registry
            .load_image(&mut table, "widgets", widgets_image())
            .unwrap();
        let old_greeter = registry.get("widgets").unwrap().find("greeter").unwrap();

        let replacement = ModuleBuilder::new("widgets")
            .class("Greeter")
            .field("Tone", "Int")
            .finish()
            .build();
        registry
            .load_image(&mut table, "Widgets", replacement)
            .unwrap();

        assert_eq!(registry.len(), 1);
        let new_greeter = registry.get("widgets").unwrap().find("greeter").unwrap();
        assert_ne!(old_greeter, new_greeter);
        assert_eq!(table.fields_of(new_greeter)[0].name, "Tone");
    }

    #[test]
    fn test_arity_marker_mismatch_fails() {
        let mut table = TypeTable::new();
        let mut registry = ModuleRegistry::new();
        let image = ModuleBuilder::new("m")
            .generic_class("Box`2", &["T"])
            .finish()
            .build();
        assert!(registry.load_image(&mut table, "m", image).is_err());
    }
}
