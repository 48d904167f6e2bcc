//! The serialization boundary.
//!
//! Values cross the sandbox edge as self-describing JSON payloads: a
//! type descriptor plus a structural value. Decoding runs the descriptor
//! through the full resolution chain, so a payload can name a module
//! type that only exists inside the receiving sandbox. Nested fields and
//! list elements are checked against the resolved definitions, not
//! trusted from the payload.
//!
//! A `Null` wire value decodes as null under any declared type.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::modules::ModuleRegistry;
use crate::resolve;
use crate::types::{Prim, TypeId, TypeShape, TypeTable};
use crate::value::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    /// Canonical type descriptor, re-resolved on decode.
    pub ty: String,
    pub value: WireValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<WireValue>),
    Instance(Vec<WireValue>),
}

/// Encode a value under its declared type.
///
/// Object graphs are encoded structurally; a cyclic graph is not
/// representable and must not reach this boundary.
pub fn encode(table: &TypeTable, value: &Value, declared: TypeId) -> Result<Vec<u8>, EngineError> {
    let payload = Payload {
        ty: table.descriptor_of(declared),
        value: lower(value),
    };
    serde_json::to_vec(&payload)
        .map_err(|e| EngineError::Serialization(format!("payload encode: {}", e)))
}

/// Decode a payload, resolving its descriptor through the chain.
pub fn decode(
    table: &mut TypeTable,
    modules: &ModuleRegistry,
    bytes: &[u8],
) -> Result<(Value, TypeId), EngineError> {
    let payload: Payload = serde_json::from_slice(bytes)
        .map_err(|e| EngineError::Serialization(format!("payload decode: {}", e)))?;
    let ty = resolve::resolve(table, modules, &payload.ty, &[])?;
    let value = raise(table, modules, &payload.value, ty)?;
    Ok((value, ty))
}

fn lower(value: &Value) -> WireValue {
    match value {
        Value::Null => WireValue::Null,
        Value::Bool(b) => WireValue::Bool(*b),
        Value::Int(i) => WireValue::Int(*i),
        Value::Float(f) => WireValue::Float(*f),
        Value::Str(s) => WireValue::Str(s.clone()),
        Value::List(l) => WireValue::List(l.borrow().items.iter().map(lower).collect()),
        Value::Instance(i) => {
            WireValue::Instance(i.borrow().fields.iter().map(lower).collect())
        }
    }
}

/// Rebuild a value against a resolved type. Shape mismatches are
/// serialization errors; the one coercion allowed is an integer payload
/// under a `Float` type.
fn raise(
    table: &mut TypeTable,
    modules: &ModuleRegistry,
    wire: &WireValue,
    ty: TypeId,
) -> Result<Value, EngineError> {
    if matches!(wire, WireValue::Null) {
        return Ok(Value::Null);
    }

    match &table.def(ty).shape {
        TypeShape::Primitive { prim, .. } => match (prim, wire) {
            (Prim::Bool, WireValue::Bool(b)) => Ok(Value::Bool(*b)),
            (Prim::Int, WireValue::Int(i)) => Ok(Value::Int(*i)),
            (Prim::Float, WireValue::Float(f)) => Ok(Value::Float(*f)),
            (Prim::Float, WireValue::Int(i)) => Ok(Value::Float(*i as f64)),
            (Prim::Str, WireValue::Str(s)) => Ok(Value::Str(s.clone())),
            _ => Err(mismatch(table, ty, wire)),
        },
        TypeShape::Class(_) | TypeShape::Closed { .. } => {
            if let Some(elem) = table.list_element(ty) {
                let items = match wire {
                    WireValue::List(items) => items,
                    _ => return Err(mismatch(table, ty, wire)),
                };
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(raise(table, modules, item, elem)?);
                }
                let list = Value::empty_list(ty);
                if let Value::List(l) = &list {
                    l.borrow_mut().items = out;
                }
                return Ok(list);
            }

            let fields = match wire {
                WireValue::Instance(fields) => fields,
                _ => return Err(mismatch(table, ty, wire)),
            };
            let defs: Vec<String> =
                table.fields_of(ty).iter().map(|f| f.ty.clone()).collect();
            if fields.len() != defs.len() {
                return Err(EngineError::Serialization(format!(
                    "payload for `{}` carries {} fields, type has {}",
                    table.name_of(ty),
                    fields.len(),
                    defs.len()
                )));
            }
            let mut out = Vec::with_capacity(defs.len());
            for (wire_field, field_ty) in fields.iter().zip(&defs) {
                let fty = resolve::resolve(table, modules, field_ty, &[])?;
                out.push(raise(table, modules, wire_field, fty)?);
            }
            let instance = Value::blank_instance(ty, out.len());
            if let Value::Instance(i) = &instance {
                i.borrow_mut().fields = out;
            }
            Ok(instance)
        }
        TypeShape::Generic(_) => Err(EngineError::Serialization(format!(
            "payload names open generic `{}`",
            table.name_of(ty)
        ))),
    }
}

fn mismatch(table: &TypeTable, ty: TypeId, wire: &WireValue) -> EngineError {
    EngineError::Serialization(format!(
        "payload value {:?} does not fit type `{}`",
        wire,
        table.name_of(ty)
    ))
}
