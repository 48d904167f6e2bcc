//! Console session: executes parsed commands against a sandbox manager.

use anyhow::{bail, Result};
use alcove_engine::wire::{Payload, WireValue};
use alcove_engine::{SandboxId, SandboxManager};

use crate::output::StyledOutput;
use crate::parse::{Arg, Command, Expr};

const HELP: &str = "\
commands:
  load <name> <path>              load a module image into the sandbox
  list-modules | list-variables   show sandbox contents
  new-sandbox | list-sandboxes    sandbox lifecycle
  interact <id> | remove-sandbox <id>
  info $v | remove $v | copy $a $b
  debug on|off                    show error kinds on failure
  help | exit

expressions:
  $g = new [Greeter, widgets](\"Hello, \")
  $r = $g.Greet(\"World\")
  [Greeter, widgets]::Motto()
  $n = 5        $s = \"text\"      $x = $null

arguments: 5, 1.5, \"text\", true, $null, $var, [Float] 2";

pub enum Flow {
    Continue,
    Exit,
}

pub struct Session {
    manager: SandboxManager,
    out: StyledOutput,
    debug: bool,
}

impl Session {
    pub fn new(out: StyledOutput) -> Self {
        Session { manager: SandboxManager::new(), out, debug: false }
    }

    pub fn prompt(&self) -> String {
        format!("{}> ", self.manager.active().id())
    }

    pub fn execute(&mut self, command: Command) -> Flow {
        match self.run(command) {
            Ok(flow) => flow,
            Err(e) => {
                self.out.error(&e.to_string());
                Flow::Continue
            }
        }
    }

    fn run(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Help => self.out.plain(HELP),
            Command::Exit => return Ok(Flow::Exit),
            Command::Debug(on) => {
                self.debug = on;
                self.out.info(if on { "debug output on" } else { "debug output off" });
            }
            Command::Load { name, path } => {
                let bytes = std::fs::read(&path)?;
                if self.manager.active_mut().load_module(&name, &bytes) {
                    self.out.success(&format!("loaded module `{}`", name));
                } else {
                    self.report_failure(&format!("could not load `{}`", name));
                }
            }
            Command::ListModules => {
                for (name, identity) in self.manager.active().loaded_modules() {
                    self.out.plain(&format!("{} ({})", name, identity));
                }
            }
            Command::ListVariables => {
                let listing = self.manager.active_mut().variable_info("");
                if listing.is_empty() {
                    self.out.info("no variables bound");
                } else {
                    for line in listing.lines() {
                        self.out.plain(line);
                    }
                }
            }
            Command::ListSandboxes => {
                for (id, active) in self.manager.list() {
                    let marker = if active { " (active)" } else { "" };
                    self.out.plain(&format!("{}{}", id, marker));
                }
            }
            Command::NewSandbox => {
                let id = self.manager.create();
                self.out.success(&format!("created {}", id));
            }
            Command::Interact(token) => {
                let id = self.find_sandbox(&token)?;
                self.manager.switch_to(id);
                self.out.success(&format!("now interacting with {}", id));
            }
            Command::RemoveSandbox(token) => {
                let id = self.find_sandbox(&token)?;
                if self.manager.destroy(id) {
                    self.out.success(&format!("destroyed {}", id));
                } else {
                    self.out.warn("cannot destroy the active sandbox; switch away first");
                }
            }
            Command::Info(name) => {
                let info = self.manager.active_mut().variable_info(&name);
                if info.is_empty() {
                    self.report_failure(&format!("no variable `{}`", name));
                } else {
                    self.out.plain(&info);
                }
            }
            Command::Remove(name) => {
                if self.manager.active_mut().remove_variable(&name) {
                    self.out.success(&format!("removed `{}`", name));
                } else {
                    self.report_failure(&format!("no variable `{}`", name));
                }
            }
            Command::Copy { from, to } => {
                if self.manager.active_mut().copy_variable(&from, &to) {
                    self.out.success(&format!("copied `{}` to `{}`", from, to));
                } else {
                    self.report_failure(&format!("no variable `{}`", from));
                }
            }
            Command::Assign { var, expr } => self.assign(&var, expr)?,
            Command::Eval(expr) => self.eval(expr)?,
        }
        Ok(Flow::Continue)
    }

    fn assign(&mut self, var: &str, expr: Expr) -> Result<()> {
        let ok = match expr {
            Expr::Literal(arg) => {
                let (ty, payload) = literal_payload(&arg)?;
                self.manager.active_mut().set_variable(var, &ty, &[], &payload)
            }
            Expr::New { ty, args } => {
                let (descs, payloads) = lower_args(&args)?;
                self.manager
                    .active_mut()
                    .construct_into(var, &ty, &[], &descs, &payloads)
            }
            Expr::CallVar { var: recv, method, args } => {
                let (descs, payloads) = lower_args(&args)?;
                self.manager
                    .active_mut()
                    .execute_on_variable(&recv, &method, &descs, &payloads, var)
            }
            Expr::CallType { ty, method, args } => {
                let (descs, payloads) = lower_args(&args)?;
                self.manager.active_mut().execute_method_into(
                    var,
                    &ty,
                    &[],
                    &[],
                    &[],
                    &method,
                    &descs,
                    &payloads,
                )
            }
        };
        if ok {
            let info = self.manager.active_mut().variable_info(var);
            self.out.success(&info);
        } else {
            self.report_failure(&format!("`${}` was not assigned", var));
        }
        Ok(())
    }

    fn eval(&mut self, expr: Expr) -> Result<()> {
        match expr {
            Expr::Literal(arg) => {
                let (_, payload) = literal_payload(&arg)?;
                self.print_payload(&payload);
            }
            Expr::CallType { ty, method, args } => {
                let (descs, payloads) = lower_args(&args)?;
                let bytes = self.manager.active_mut().execute_method(
                    &ty,
                    &[],
                    &[],
                    &[],
                    &method,
                    &descs,
                    &payloads,
                );
                if bytes.is_empty() && self.manager.active().last_error().is_some() {
                    self.report_failure(&format!("`{}::{}` failed", ty, method));
                } else {
                    self.print_payload(&bytes);
                }
            }
            Expr::CallVar { var, method, args } => {
                let (descs, payloads) = lower_args(&args)?;
                // Unassigned results land in the scratch variable `_`.
                if self
                    .manager
                    .active_mut()
                    .execute_on_variable(&var, &method, &descs, &payloads, "_")
                {
                    if let Some(bytes) = self.manager.active_mut().get_variable("_") {
                        self.print_payload(&bytes);
                    }
                } else {
                    self.report_failure(&format!("`${}.{}` failed", var, method));
                }
            }
            Expr::New { .. } => {
                bail!("`new` needs a variable to assign to: `$v = new [Type](..)`")
            }
        }
        Ok(())
    }

    fn print_payload(&mut self, bytes: &[u8]) {
        match serde_json::from_slice::<Payload>(bytes) {
            Ok(payload) => {
                self.out
                    .plain(&format!("({}) {}", payload.ty, render(&payload.value)))
            }
            Err(_) => self.out.warn("result payload could not be decoded"),
        }
    }

    fn report_failure(&mut self, what: &str) {
        let detail = match self.manager.active().last_error() {
            Some(e) if self.debug => format!("{}: {} [{}]", what, e, e.kind()),
            Some(e) => format!("{}: {}", what, e),
            None => what.to_string(),
        };
        self.out.error(&detail);
    }

    fn find_sandbox(&self, token: &str) -> Result<SandboxId> {
        let digits = token.strip_prefix("sandbox-").unwrap_or(token);
        if digits.parse::<u64>().is_err() {
            bail!("`{}` is not a sandbox id", token);
        }
        let wanted = format!("sandbox-{}", digits);
        self.manager
            .list()
            .into_iter()
            .map(|(id, _)| id)
            .find(|id| id.to_string() == wanted)
            .ok_or_else(|| anyhow::anyhow!("no sandbox `{}`", wanted))
    }
}

/// Serialize literal arguments; variable references become binder
/// descriptors with an empty payload slot.
fn lower_args(args: &[Arg]) -> Result<(Vec<String>, Vec<Vec<u8>>)> {
    let mut descs = Vec::with_capacity(args.len());
    let mut payloads = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Arg::Var(name) => {
                descs.push(format!("Local.Variable.{}", name));
                payloads.push(Vec::new());
            }
            other => {
                let (ty, payload) = literal_payload(other)?;
                descs.push(ty);
                payloads.push(payload);
            }
        }
    }
    Ok((descs, payloads))
}

fn literal_payload(arg: &Arg) -> Result<(String, Vec<u8>)> {
    let (ty, value) = literal_wire(arg)?;
    let payload = serde_json::to_vec(&Payload { ty: ty.clone(), value })?;
    Ok((ty, payload))
}

fn literal_wire(arg: &Arg) -> Result<(String, WireValue)> {
    Ok(match arg {
        Arg::Null => ("Unit".to_string(), WireValue::Null),
        Arg::Bool(b) => ("Bool".to_string(), WireValue::Bool(*b)),
        Arg::Int(i) => ("Int".to_string(), WireValue::Int(*i)),
        Arg::Float(f) => ("Float".to_string(), WireValue::Float(*f)),
        Arg::Str(s) => ("Str".to_string(), WireValue::Str(s.clone())),
        Arg::Typed { ty, value } => {
            let (_, wire) = literal_wire(value)?;
            (ty.clone(), wire)
        }
        Arg::Var(_) => bail!("variable references cannot carry an explicit type"),
    })
}

fn render(value: &WireValue) -> String {
    match value {
        WireValue::Null => "null".to_string(),
        WireValue::Bool(b) => b.to_string(),
        WireValue::Int(i) => i.to_string(),
        WireValue::Float(f) => f.to_string(),
        WireValue::Str(s) => format!("{:?}", s),
        WireValue::List(items) => {
            let inner: Vec<String> = items.iter().map(render).collect();
            format!("[{}]", inner.join(", "))
        }
        WireValue::Instance(fields) => {
            let inner: Vec<String> = fields.iter().map(render).collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}
