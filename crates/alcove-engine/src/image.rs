//! Module images: the serialized form a module travels in.
//!
//! An image is a JSON document naming the module and listing its types.
//! Member bodies are op sequences for the interpreter; native bodies are
//! reserved for builtins and never appear in images.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::interp::{Literal, Op};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleImage {
    pub name: String,
    pub types: Vec<TypeImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeImage {
    pub name: String,
    /// Non-empty for open generics; the declared names are substitutable
    /// inside this type's signatures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ctors: Vec<CtorImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldImage {
    pub name: String,
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<Literal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtorImage {
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub ops: Vec<Op>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodImage {
    pub name: String,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub params: Vec<String>,
    pub ret: String,
    #[serde(default)]
    pub ops: Vec<Op>,
}

impl ModuleImage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, EngineError> {
        serde_json::to_vec(self)
            .map_err(|e| EngineError::Serialization(format!("module image encode: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        let image: ModuleImage = serde_json::from_slice(bytes)
            .map_err(|e| EngineError::ModuleLoad(format!("module image decode: {}", e)))?;
        if image.name.trim().is_empty() {
            return Err(EngineError::ModuleLoad("module image has no name".into()));
        }
        Ok(image)
    }
}

/// Fluent construction of module images, mostly for tests and demos.
pub struct ModuleBuilder {
    image: ModuleImage,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        ModuleBuilder {
            image: ModuleImage { name: name.into(), types: Vec::new() },
        }
    }

    pub fn class(self, name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            module: self,
            ty: TypeImage {
                name: name.into(),
                type_params: Vec::new(),
                fields: Vec::new(),
                ctors: Vec::new(),
                methods: Vec::new(),
            },
        }
    }

    pub fn generic_class(
        self,
        name: impl Into<String>,
        type_params: &[&str],
    ) -> ClassBuilder {
        let mut builder = self.class(name);
        builder.ty.type_params = type_params.iter().map(|p| p.to_string()).collect();
        builder
    }

    pub fn build(self) -> ModuleImage {
        self.image
    }
}

pub struct ClassBuilder {
    module: ModuleBuilder,
    ty: TypeImage,
}

impl ClassBuilder {
    pub fn field(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.ty.fields.push(FieldImage { name: name.into(), ty: ty.into(), init: None });
        self
    }

    pub fn field_init(
        mut self,
        name: impl Into<String>,
        ty: impl Into<String>,
        init: Literal,
    ) -> Self {
        self.ty.fields.push(FieldImage {
            name: name.into(),
            ty: ty.into(),
            init: Some(init),
        });
        self
    }

    pub fn ctor(mut self, params: &[&str], ops: Vec<Op>) -> Self {
        self.ty.ctors.push(CtorImage {
            params: params.iter().map(|p| p.to_string()).collect(),
            ops,
        });
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        params: &[&str],
        ret: impl Into<String>,
        ops: Vec<Op>,
    ) -> Self {
        self.ty.methods.push(MethodImage {
            name: name.into(),
            is_static: false,
            params: params.iter().map(|p| p.to_string()).collect(),
            ret: ret.into(),
            ops,
        });
        self
    }

    pub fn static_method(
        mut self,
        name: impl Into<String>,
        params: &[&str],
        ret: impl Into<String>,
        ops: Vec<Op>,
    ) -> Self {
        self.ty.methods.push(MethodImage {
            name: name.into(),
            is_static: true,
            params: params.iter().map(|p| p.to_string()).collect(),
            ret: ret.into(),
            ops,
        });
        self
    }

    pub fn finish(mut self) -> ModuleBuilder {
        self.module.image.types.push(self.ty);
        self.module
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_shape() {
        let image = ModuleBuilder::new("widgets")
            .class("Greeter")
            .field("Prefix", "Str")
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
            .finish()
            .build();

        assert_eq!(image.name, "widgets");
        assert_eq!(image.types.len(), 1);
        let greeter = &image.types[0];
        assert_eq!(greeter.name, "Greeter");
        assert_eq!(greeter.ctors[0].params, vec!["Str".to_string()]);
        assert_eq!(greeter.methods[0].ret, "Str");
    }

    #[test]
    fn test_image_bytes_round_trip() {
        let image = ModuleBuilder::new("geom")
            .generic_class("Pair`2", &["A", "B"])
            .field("First", "A")
            .field("Second", "B")
            .finish()
            .build();

        let bytes = image.to_bytes().unwrap();
        let back = ModuleImage::from_bytes(&bytes).unwrap();
        assert_eq!(back.name, "geom");
        assert_eq!(back.types[0].type_params, vec!["A", "B"]);
        assert_eq!(back.types[0].fields.len(), 2);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(ModuleImage::from_bytes(b"not json").is_err());
        assert!(ModuleImage::from_bytes(br#"{"name":"","types":[]}"#).is_err());
    }
}
