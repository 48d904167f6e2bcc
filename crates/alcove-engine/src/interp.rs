//! A small stack interpreter for method bodies carried in module images.
//!
//! Bodies are flat op sequences with absolute jump targets. A body that
//! falls off the end without hitting `Ret` yields `Null`, which is how
//! `Unit`-returning methods are normally written.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::value::Value;
use crate::types::TypeTable;

/// A constant embedded in an op sequence or a field initializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::Str(s) => Value::Str(s.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    Const(Literal),
    /// Push the n-th call argument.
    LoadParam(u8),
    LoadThis,
    /// Push a field of `this` by name.
    LoadField(String),
    /// Pop a value into a field of `this` by name.
    StoreField(String),
    Pop,
    Dup,
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    /// Pop two strings, push their concatenation.
    Concat,
    /// Pop any value, push its display rendering.
    ToStr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Not,
    Jump(u16),
    JumpIfFalse(u16),
    /// Pop and return the top of stack.
    Ret,
    RetNull,
}

/// Run a body. `receiver` is `None` for static methods.
pub fn run(
    table: &TypeTable,
    ops: &[Op],
    receiver: Option<&Value>,
    args: &[Value],
) -> Result<Value, EngineError> {
    let mut stack: Vec<Value> = Vec::new();
    let mut pc = 0usize;

    while pc < ops.len() {
        let op = &ops[pc];
        pc += 1;
        match op {
            Op::Const(lit) => stack.push(lit.to_value()),
            Op::LoadParam(n) => {
                let v = args.get(*n as usize).ok_or_else(|| {
                    EngineError::Invocation(format!("body reads missing argument {}", n))
                })?;
                stack.push(v.clone());
            }
            Op::LoadThis => {
                let this = receiver.ok_or_else(|| {
                    EngineError::Invocation("static body has no receiver".into())
                })?;
                stack.push(this.clone());
            }
            Op::LoadField(name) => {
                let this = receiver.ok_or_else(|| {
                    EngineError::Invocation("static body has no receiver".into())
                })?;
                stack.push(read_field(table, this, name)?);
            }
            Op::StoreField(name) => {
                let this = receiver.ok_or_else(|| {
                    EngineError::Invocation("static body has no receiver".into())
                })?;
                let v = pop(&mut stack)?;
                write_field(table, this, name, v)?;
            }
            Op::Pop => {
                pop(&mut stack)?;
            }
            Op::Dup => {
                let top = pop(&mut stack)?;
                stack.push(top.clone());
                stack.push(top);
            }
            Op::Add => binary_numeric(&mut stack, "Add", i64::checked_add, |a, b| a + b)?,
            Op::Sub => binary_numeric(&mut stack, "Sub", i64::checked_sub, |a, b| a - b)?,
            Op::Mul => binary_numeric(&mut stack, "Mul", i64::checked_mul, |a, b| a * b)?,
            Op::Div => {
                let (a, b) = pop2(&mut stack)?;
                let result = match (&a, &b) {
                    (Value::Int(_), Value::Int(0)) => {
                        return Err(EngineError::Invocation("integer division by zero".into()))
                    }
                    (Value::Int(x), Value::Int(y)) => {
                        Value::Int(x.checked_div(*y).ok_or_else(|| overflow("Div"))?)
                    }
                    _ => Value::Float(as_float(&a, "Div")? / as_float(&b, "Div")?),
                };
                stack.push(result);
            }
            Op::Neg => {
                let v = pop(&mut stack)?;
                let result = match v {
                    Value::Int(i) => Value::Int(i.checked_neg().ok_or_else(|| overflow("Neg"))?),
                    Value::Float(f) => Value::Float(-f),
                    other => {
                        return Err(EngineError::Invocation(format!(
                            "Neg needs a number, got {}",
                            other
                        )))
                    }
                };
                stack.push(result);
            }
            Op::Concat => {
                let (a, b) = pop2(&mut stack)?;
                match (a, b) {
                    (Value::Str(x), Value::Str(y)) => stack.push(Value::Str(x + &y)),
                    (a, b) => {
                        return Err(EngineError::Invocation(format!(
                            "Concat needs two strings, got {} and {}",
                            a, b
                        )))
                    }
                }
            }
            Op::ToStr => {
                let v = pop(&mut stack)?;
                stack.push(Value::Str(v.to_string()));
            }
            Op::Eq => {
                let (a, b) = pop2(&mut stack)?;
                stack.push(Value::Bool(a == b));
            }
            Op::Ne => {
                let (a, b) = pop2(&mut stack)?;
                stack.push(Value::Bool(a != b));
            }
            Op::Lt => comparison(&mut stack, "Lt", |o| o == std::cmp::Ordering::Less)?,
            Op::Le => comparison(&mut stack, "Le", |o| o != std::cmp::Ordering::Greater)?,
            Op::Gt => comparison(&mut stack, "Gt", |o| o == std::cmp::Ordering::Greater)?,
            Op::Ge => comparison(&mut stack, "Ge", |o| o != std::cmp::Ordering::Less)?,
            Op::Not => {
                let v = pop(&mut stack)?;
                match v {
                    Value::Bool(b) => stack.push(Value::Bool(!b)),
                    other => {
                        return Err(EngineError::Invocation(format!(
                            "Not needs a bool, got {}",
                            other
                        )))
                    }
                }
            }
            Op::Jump(target) => pc = *target as usize,
            Op::JumpIfFalse(target) => {
                let v = pop(&mut stack)?;
                match v {
                    Value::Bool(true) => {}
                    Value::Bool(false) => pc = *target as usize,
                    other => {
                        return Err(EngineError::Invocation(format!(
                            "JumpIfFalse needs a bool, got {}",
                            other
                        )))
                    }
                }
            }
            Op::Ret => return pop(&mut stack),
            Op::RetNull => return Ok(Value::Null),
        }
    }

    Ok(Value::Null)
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, EngineError> {
    stack
        .pop()
        .ok_or_else(|| EngineError::Invocation("body popped an empty stack".into()))
}

fn pop2(stack: &mut Vec<Value>) -> Result<(Value, Value), EngineError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    Ok((a, b))
}

fn as_float(v: &Value, op: &str) -> Result<f64, EngineError> {
    match v {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        other => Err(EngineError::Invocation(format!(
            "{} needs a number, got {}",
            op, other
        ))),
    }
}

fn binary_numeric(
    stack: &mut Vec<Value>,
    op: &str,
    ints: impl Fn(i64, i64) -> Option<i64>,
    floats: impl Fn(f64, f64) -> f64,
) -> Result<(), EngineError> {
    let (a, b) = pop2(stack)?;
    let result = match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => {
            Value::Int(ints(*x, *y).ok_or_else(|| overflow(op))?)
        }
        _ => Value::Float(floats(as_float(&a, op)?, as_float(&b, op)?)),
    };
    stack.push(result);
    Ok(())
}

fn overflow(op: &str) -> EngineError {
    EngineError::Invocation(format!("integer overflow in {}", op))
}

fn comparison(
    stack: &mut Vec<Value>,
    op: &str,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<(), EngineError> {
    let (a, b) = pop2(stack)?;
    let ordering = match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        _ => {
            let (x, y) = (as_float(&a, op)?, as_float(&b, op)?);
            x.partial_cmp(&y).ok_or_else(|| {
                EngineError::Invocation(format!("{} on non-ordered floats", op))
            })?
        }
    };
    stack.push(Value::Bool(accept(ordering)));
    Ok(())
}

fn read_field(table: &TypeTable, this: &Value, name: &str) -> Result<Value, EngineError> {
    match this {
        Value::Instance(inst) => {
            let inst = inst.borrow();
            let slot = field_slot(table, inst.ty, name)?;
            Ok(inst.fields[slot].clone())
        }
        other => Err(EngineError::Invocation(format!(
            "field `{}` read on non-instance {}",
            name, other
        ))),
    }
}

fn write_field(
    table: &TypeTable,
    this: &Value,
    name: &str,
    value: Value,
) -> Result<(), EngineError> {
    match this {
        Value::Instance(inst) => {
            let mut inst = inst.borrow_mut();
            let slot = field_slot(table, inst.ty, name)?;
            inst.fields[slot] = value;
            Ok(())
        }
        other => Err(EngineError::Invocation(format!(
            "field `{}` write on non-instance {}",
            name, other
        ))),
    }
}

fn field_slot(
    table: &TypeTable,
    ty: crate::types::TypeId,
    name: &str,
) -> Result<usize, EngineError> {
    table
        .fields_of(ty)
        .iter()
        .position(|f| f.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            EngineError::MemberLookup(format!(
                "type `{}` has no field `{}`",
                table.name_of(ty),
                name
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{self, ClassDef, FieldDef, TypeDef, TypeShape};

    fn table_with_point() -> (TypeTable, crate::types::TypeId) {
        let mut table = TypeTable::new();
        let id = table.register(TypeDef {
            name: "Point".into(),
            origin: Some("geom".into()),
            shape: TypeShape::Class(ClassDef {
                fields: vec![
                    FieldDef { name: "X".into(), ty: "Int".into(), init: None },
                    FieldDef { name: "Y".into(), ty: "Int".into(), init: None },
                ],
                ctors: vec![],
                methods: vec![],
            }),
        });
        (table, id)
    }

    #[test]
    fn test_arithmetic_and_ret() {
        let table = TypeTable::new();
        let ops = vec![
            Op::Const(Literal::Int(6)),
            Op::Const(Literal::Int(7)),
            Op::Mul,
            Op::Ret,
        ];
        assert_eq!(run(&table, &ops, None, &[]).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_params_and_concat() {
        let table = TypeTable::new();
        let ops = vec![
            Op::Const(Literal::Str("Hello, ".into())),
            Op::LoadParam(0),
            Op::Concat,
            Op::Ret,
        ];
        let out = run(&table, &ops, None, &[Value::Str("World".into())]).unwrap();
        assert_eq!(out, Value::Str("Hello, World".into()));
    }

    #[test]
    fn test_branching() {
        let table = TypeTable::new();
        // if param0 < 10 { ret "small" } else { ret "big" }
        let ops = vec![
            Op::LoadParam(0),
            Op::Const(Literal::Int(10)),
            Op::Lt,
            Op::JumpIfFalse(6),
            Op::Const(Literal::Str("small".into())),
            Op::Ret,
            Op::Const(Literal::Str("big".into())),
            Op::Ret,
        ];
        assert_eq!(
            run(&table, &ops, None, &[Value::Int(3)]).unwrap(),
            Value::Str("small".into())
        );
        assert_eq!(
            run(&table, &ops, None, &[Value::Int(30)]).unwrap(),
            Value::Str("big".into())
        );
    }

    #[test]
    fn test_field_round_trip() {
        let (table, point) = table_with_point();
        let this = Value::blank_instance(point, 2);
        let store = vec![Op::Const(Literal::Int(11)), Op::StoreField("x".into())];
        run(&table, &store, Some(&this), &[]).unwrap();
        let load = vec![Op::LoadField("X".into()), Op::Ret];
        assert_eq!(run(&table, &load, Some(&this), &[]).unwrap(), Value::Int(11));
    }

    #[test]
    fn test_unknown_field_is_member_error() {
        let (table, point) = table_with_point();
        let this = Value::blank_instance(point, 2);
        let ops = vec![Op::LoadField("Z".into()), Op::Ret];
        assert!(matches!(
            run(&table, &ops, Some(&this), &[]),
            Err(EngineError::MemberLookup(_))
        ));
    }

    #[test]
    fn test_integer_overflow_is_an_invocation_error() {
        let table = TypeTable::new();
        let cases = vec![
            vec![
                Op::Const(Literal::Int(i64::MAX)),
                Op::Const(Literal::Int(1)),
                Op::Add,
                Op::Ret,
            ],
            vec![
                Op::Const(Literal::Int(i64::MIN)),
                Op::Const(Literal::Int(-1)),
                Op::Div,
                Op::Ret,
            ],
            vec![Op::Const(Literal::Int(i64::MIN)), Op::Neg, Op::Ret],
        ];
        for ops in cases {
            assert!(matches!(
                run(&table, &ops, None, &[]),
                Err(EngineError::Invocation(_))
            ));
        }
    }

    #[test]
    fn test_division_by_zero() {
        let table = TypeTable::new();
        let ops = vec![
            Op::Const(Literal::Int(1)),
            Op::Const(Literal::Int(0)),
            Op::Div,
            Op::Ret,
        ];
        assert!(run(&table, &ops, None, &[]).is_err());
    }

    #[test]
    fn test_fall_off_end_yields_null() {
        let table = TypeTable::new();
        let ops = vec![Op::Const(Literal::Int(1)), Op::Pop];
        assert_eq!(run(&table, &ops, None, &[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_static_body_has_no_this() {
        let table = TypeTable::new();
        let ops = vec![Op::LoadThis, Op::Ret];
        assert!(run(&table, &ops, None, &[]).is_err());
    }
}
