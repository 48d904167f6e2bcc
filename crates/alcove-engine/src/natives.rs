//! Native method bodies for the builtin types, dispatched by id.

use crate::error::EngineError;
use crate::value::Value;

pub const LIST_LEN: u16 = 0x0001;
pub const LIST_PUSH: u16 = 0x0002;
pub const LIST_GET: u16 = 0x0003;

pub const STR_LEN: u16 = 0x0010;
pub const STR_TO_UPPER: u16 = 0x0011;
pub const STR_CONTAINS: u16 = 0x0012;

/// Run a native body. `receiver` is `None` for static calls (no builtin
/// currently is static, so a missing receiver is an invocation error).
pub fn dispatch(
    id: u16,
    receiver: Option<&Value>,
    args: &[Value],
) -> Result<Value, EngineError> {
    match id {
        LIST_LEN => {
            let list = expect_list(receiver)?;
            Ok(Value::Int(list.borrow().items.len() as i64))
        }
        LIST_PUSH => {
            let list = expect_list(receiver)?;
            let item = arg(args, 0)?.clone();
            list.borrow_mut().items.push(item);
            Ok(Value::Null)
        }
        LIST_GET => {
            let list = expect_list(receiver)?;
            let index = match arg(args, 0)? {
                Value::Int(i) => *i,
                other => {
                    return Err(EngineError::Invocation(format!(
                        "List.Get index must be Int, got {}",
                        other
                    )))
                }
            };
            let list = list.borrow();
            usize::try_from(index)
                .ok()
                .and_then(|i| list.items.get(i).cloned())
                .ok_or_else(|| {
                    EngineError::Invocation(format!(
                        "List.Get index {} out of range (len {})",
                        index,
                        list.items.len()
                    ))
                })
        }
        STR_LEN => {
            let s = expect_str(receiver)?;
            Ok(Value::Int(s.chars().count() as i64))
        }
        STR_TO_UPPER => {
            let s = expect_str(receiver)?;
            Ok(Value::Str(s.to_uppercase()))
        }
        STR_CONTAINS => {
            let s = expect_str(receiver)?;
            match arg(args, 0)? {
                Value::Str(needle) => Ok(Value::Bool(s.contains(needle.as_str()))),
                other => Err(EngineError::Invocation(format!(
                    "Str.Contains argument must be Str, got {}",
                    other
                ))),
            }
        }
        _ => Err(EngineError::Invocation(format!(
            "unknown native body id {:#06x}",
            id
        ))),
    }
}

fn arg<'a>(args: &'a [Value], index: usize) -> Result<&'a Value, EngineError> {
    args.get(index).ok_or_else(|| {
        EngineError::Invocation(format!("native body missing argument {}", index))
    })
}

fn expect_list(
    receiver: Option<&Value>,
) -> Result<&std::rc::Rc<std::cell::RefCell<crate::value::ListData>>, EngineError> {
    match receiver {
        Some(Value::List(l)) => Ok(l),
        other => Err(EngineError::Invocation(format!(
            "native list body expects a list receiver, got {}",
            other.map(|v| v.to_string()).unwrap_or_else(|| "nothing".into())
        ))),
    }
}

fn expect_str(receiver: Option<&Value>) -> Result<&str, EngineError> {
    match receiver {
        Some(Value::Str(s)) => Ok(s),
        other => Err(EngineError::Invocation(format!(
            "native string body expects a string receiver, got {}",
            other.map(|v| v.to_string()).unwrap_or_else(|| "nothing".into())
        ))),
    }
}
