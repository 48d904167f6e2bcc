//! Console command grammar.
//!
//! One line is one command. Invocation forms:
//!
//! ```text
//! load widgets ./widgets.json
//! $g = new [Greeter, widgets]("Hello, ")
//! $r = $g.Greet("World")
//! [Greeter, widgets]::Motto()
//! $n = 5
//! info $g
//! ```
//!
//! Arguments are literals (`5`, `1.5`, `"text"`, `true`, `$null`),
//! variable references (`$var`), or explicitly typed literals
//! (`[Float] 2`).

use anyhow::{anyhow, bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// `$var = rest` assignment prefix.
static ASSIGN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$(?P<var>\w+)\s*=\s*(?P<rest>.+)$").expect("assign regex"));

/// Method invocation on a variable or a bracketed type descriptor.
static CALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<recv>\$\w+|\[.+\])(?P<sep>\.|::)(?P<method>\w+)\s*\((?P<args>.*)\)\s*$")
        .expect("call regex")
});

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Exit,
    Debug(bool),
    Load { name: String, path: String },
    ListModules,
    ListVariables,
    ListSandboxes,
    NewSandbox,
    Interact(String),
    RemoveSandbox(String),
    Info(String),
    Remove(String),
    Copy { from: String, to: String },
    Assign { var: String, expr: Expr },
    Eval(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Arg),
    New { ty: String, args: Vec<Arg> },
    CallVar { var: String, method: String, args: Vec<Arg> },
    CallType { ty: String, method: String, args: Vec<Arg> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Var(String),
    Typed { ty: String, value: Box<Arg> },
}

pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["help"] => return Ok(Some(Command::Help)),
        ["exit"] | ["quit"] => return Ok(Some(Command::Exit)),
        ["debug", "on"] => return Ok(Some(Command::Debug(true))),
        ["debug", "off"] => return Ok(Some(Command::Debug(false))),
        ["list-modules"] => return Ok(Some(Command::ListModules)),
        ["list-variables"] => return Ok(Some(Command::ListVariables)),
        ["list-sandboxes"] => return Ok(Some(Command::ListSandboxes)),
        ["new-sandbox"] => return Ok(Some(Command::NewSandbox)),
        ["interact", id] => return Ok(Some(Command::Interact(id.to_string()))),
        ["remove-sandbox", id] => {
            return Ok(Some(Command::RemoveSandbox(id.to_string())))
        }
        ["load", name, path] => {
            return Ok(Some(Command::Load {
                name: name.to_string(),
                path: path.to_string(),
            }))
        }
        ["info", var] => return Ok(Some(Command::Info(variable_name(var)?))),
        ["remove", var] => return Ok(Some(Command::Remove(variable_name(var)?))),
        ["copy", from, to] => {
            return Ok(Some(Command::Copy {
                from: variable_name(from)?,
                to: variable_name(to)?,
            }))
        }
        _ => {}
    }

    if let Some(caps) = ASSIGN_RE.captures(line) {
        let var = caps["var"].to_string();
        let expr = parse_expr(caps["rest"].trim())?;
        return Ok(Some(Command::Assign { var, expr }));
    }

    Ok(Some(Command::Eval(parse_expr(line)?)))
}

fn variable_name(token: &str) -> Result<String> {
    token
        .strip_prefix('$')
        .filter(|n| !n.is_empty())
        .map(String::from)
        .ok_or_else(|| anyhow!("expected a $variable, got `{}`", token))
}

fn parse_expr(text: &str) -> Result<Expr> {
    if let Some(rest) = text.strip_prefix("new ") {
        let rest = rest.trim_start();
        if !rest.starts_with('[') {
            bail!("`new` needs a bracketed type descriptor");
        }
        let close = matching_bracket(rest)?;
        let ty = rest[1..close].trim().to_string();
        let after = rest[close + 1..].trim();
        let args = call_args(after)?;
        return Ok(Expr::New { ty, args });
    }

    if let Some(caps) = CALL_RE.captures(text) {
        let args = split_args(&caps["args"])?
            .iter()
            .map(|a| parse_arg(a))
            .collect::<Result<Vec<_>>>()?;
        let method = caps["method"].to_string();
        let recv = &caps["recv"];
        return match (&caps["sep"], recv.strip_prefix('$')) {
            (".", Some(var)) => Ok(Expr::CallVar { var: var.to_string(), method, args }),
            ("::", None) => Ok(Expr::CallType {
                ty: recv[1..recv.len() - 1].trim().to_string(),
                method,
                args,
            }),
            _ => bail!("use `$var.Method(..)` or `[Type]::Method(..)`"),
        };
    }

    Ok(Expr::Literal(parse_arg(text)?))
}

/// Parenthesized argument list after a `new [Type]` prefix.
fn call_args(text: &str) -> Result<Vec<Arg>> {
    let inner = text
        .strip_prefix('(')
        .and_then(|t| t.trim_end().strip_suffix(')'))
        .ok_or_else(|| anyhow!("expected `(arguments)`, got `{}`", text))?;
    split_args(inner)?.iter().map(|a| parse_arg(a)).collect()
}

fn parse_arg(token: &str) -> Result<Arg> {
    let token = token.trim();
    match token {
        "" => bail!("empty argument"),
        "$null" => return Ok(Arg::Null),
        "true" => return Ok(Arg::Bool(true)),
        "false" => return Ok(Arg::Bool(false)),
        _ => {}
    }

    if let Some(name) = token.strip_prefix('$') {
        if name.chars().all(|c| c.is_alphanumeric() || c == '_') && !name.is_empty() {
            return Ok(Arg::Var(name.to_string()));
        }
        bail!("bad variable reference `{}`", token);
    }

    if token.starts_with('[') {
        let close = matching_bracket(token)?;
        let ty = token[1..close].trim().to_string();
        let value = parse_arg(token[close + 1..].trim())?;
        return Ok(Arg::Typed { ty, value: Box::new(value) });
    }

    if token.starts_with('"') {
        if token.len() < 2 || !token.ends_with('"') {
            bail!("unterminated string literal");
        }
        return Ok(Arg::Str(token[1..token.len() - 1].replace("\\\"", "\"")));
    }

    if let Ok(i) = token.parse::<i64>() {
        return Ok(Arg::Int(i));
    }
    if let Ok(f) = token.parse::<f64>() {
        return Ok(Arg::Float(f));
    }

    bail!("cannot read argument `{}`", token)
}

/// Split a comma-separated argument list, respecting string quotes and
/// bracket nesting inside type descriptors.
fn split_args(text: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if in_string => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '"' => {
                in_string = !in_string;
                current.push(c);
            }
            '[' if !in_string => {
                depth += 1;
                current.push(c);
            }
            ']' if !in_string => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| anyhow!("unbalanced brackets in `{}`", text))?;
                current.push(c);
            }
            ',' if !in_string && depth == 0 => {
                args.push(std::mem::take(&mut current));
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if in_string {
        bail!("unterminated string in `{}`", text);
    }
    if depth != 0 {
        bail!("unbalanced brackets in `{}`", text);
    }
    if !current.trim().is_empty() {
        args.push(current);
    }
    Ok(args.into_iter().map(|a| a.trim().to_string()).filter(|a| !a.is_empty()).collect())
}

fn matching_bracket(text: &str) -> Result<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    bail!("unbalanced brackets in `{}`", text)
}
