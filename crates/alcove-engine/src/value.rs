//! Runtime values.
//!
//! A `Value` is what flows through the invocation engine: parameters,
//! receivers, fields, and results. Heap shapes (lists, class instances)
//! are shared via `Rc<RefCell<..>>` — sandboxes are single-caller
//! contexts, so `Rc` is the ownership vehicle and copying a variable
//! aliases the underlying object.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::types::TypeId;

/// A runtime value inside one sandbox.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Rc<RefCell<ListData>>),
    Instance(Rc<RefCell<Instance>>),
}

/// Backing storage for a `List`1[T]` value.
#[derive(Debug)]
pub struct ListData {
    /// The closed list type (`List`1[T]`), not the element type.
    pub ty: TypeId,
    pub items: Vec<Value>,
}

/// A class instance. Field order matches the class definition.
#[derive(Debug)]
pub struct Instance {
    pub ty: TypeId,
    pub fields: Vec<Value>,
}

impl Value {
    /// Create an empty list of the given closed list type.
    pub fn empty_list(ty: TypeId) -> Self {
        Value::List(Rc::new(RefCell::new(ListData { ty, items: Vec::new() })))
    }

    /// Create an instance with all fields null.
    pub fn blank_instance(ty: TypeId, field_count: usize) -> Self {
        Value::Instance(Rc::new(RefCell::new(Instance {
            ty,
            fields: vec![Value::Null; field_count],
        })))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Structural equality: lists and instances compare by contents, not by
/// pointer identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.ty == b.ty && a.items == b.items
            }
            (Value::Instance(a), Value::Instance(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.ty == b.ty && a.fields == b.fields
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::List(l) => {
                let l = l.borrow();
                write!(f, "[")?;
                for (i, item) in l.items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Instance(inst) => {
                let inst = inst.borrow();
                write!(f, "[instance #{}]", inst.ty.raw())
            }
        }
    }
}
