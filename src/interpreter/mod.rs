//! Tree-walking evaluator.
//!
//! `execute`/`evaluate` are mutually recursive over `Stmt`/`Expr`. Control
//! flow (`return`/`break`/`continue`/`stop`) is threaded as an `Option<Signal>`
//! return value rather than modeled as an exception, so a plain `?` can never
//! accidentally swallow it the way `original_source/gopa_lang/interpreter.py`'s
//! blanket `except RuntimeError` would if it caught a wider exception class.

use std::io::{BufRead, Write};
use std::rc::Rc;

use indexmap::IndexMap;
use rand::seq::SliceRandom;

use crate::ast::{AskType, BinaryOperator, Expr, MatchCase, MutationOp, Stmt, UnaryOperator};
use crate::builtins;
use crate::error::GopaError;
use crate::package_manager::PackageManager;
use crate::permissions::Permissions;
use crate::runtime::Scope;
use crate::scheduler::Scheduler;
use crate::value::{Function, Value};

mod python_bridge;

/// A non-error control-flow outcome produced by `execute`. `Return` unwinds
/// to the nearest function call; `Break`/`Continue` to the nearest loop;
/// `Stop` all the way out to the top-level driver.
#[derive(Debug, Clone)]
pub enum Signal {
    Return(Value),
    Break,
    Continue,
    Stop,
}

pub struct Interpreter<'a> {
    permissions: Permissions,
    scope: Scope,
    scheduler: Scheduler,
    packages: PackageManager,
    debug: bool,
    out: &'a mut dyn Write,
    err_out: &'a mut dyn Write,
    input: &'a mut dyn BufRead,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        permissions: Permissions,
        scheduler: Scheduler,
        out: &'a mut dyn Write,
        err_out: &'a mut dyn Write,
        input: &'a mut dyn BufRead,
        debug: bool,
    ) -> Result<Self, GopaError> {
        Ok(Interpreter {
            permissions,
            scope: Scope::new(),
            scheduler,
            packages: PackageManager::new()?,
            debug,
            out,
            err_out,
            input,
        })
    }

    /// Runs a whole program. Each top-level statement is isolated: a runtime
    /// error aborts only that statement (it's printed and execution moves on
    /// to the next one) unless `debug` is set, in which case it propagates and
    /// ends the program. A `Stop` signal at any nesting depth ends the run.
    pub fn run(&mut self, program: &[Stmt]) -> Result<(), GopaError> {
        for stmt in program {
            match self.execute(stmt) {
                Ok(Some(Signal::Stop)) => return Ok(()),
                Ok(_) => {}
                Err(err) if self.debug => return Err(err),
                Err(err) => {
                    let _ = writeln!(self.err_out, "{err}");
                }
            }
            self.pump_scheduler(0.0);
        }
        Ok(())
    }

    /// Advances the scheduler by `dt` and runs whatever tasks came due,
    /// logging (not propagating) a failing task body. Public so the `--forever`
    /// wall-clock driver can call it on its own tick.
    pub fn pump_scheduler(&mut self, dt: f64) {
        let due = self.scheduler.step(dt);
        for body in due {
            if let Err(err) = self.execute_block(&body) {
                log::warn!("scheduled task failed: {err}");
            }
        }
    }

    /// Reads a line from the interpreter's input stream. Exposed so a REPL
    /// driver can read the next line of source on the same stream `ask`
    /// statements consume from, without taking a second borrow of it.
    pub fn read_line(&mut self, buf: &mut String) -> std::io::Result<usize> {
        self.input.read_line(buf)
    }

    // ---- statements ----

    fn execute_block(&mut self, stmts: &[Stmt]) -> Result<Option<Signal>, GopaError> {
        for stmt in stmts {
            if let Some(signal) = self.execute(stmt)? {
                return Ok(Some(signal));
            }
        }
        Ok(None)
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Option<Signal>, GopaError> {
        match stmt {
            Stmt::Expr(expr) => {
                self.evaluate(expr)?;
                Ok(None)
            }
            Stmt::Say(parts) => {
                let mut line = String::new();
                for part in parts {
                    line.push_str(&self.evaluate(part)?.display_string());
                }
                let _ = writeln!(self.out, "{line}");
                Ok(None)
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                let _ = write!(self.out, "{}", value.display_string());
                let _ = self.out.flush();
                Ok(None)
            }
            Stmt::ClearScreen => {
                let _ = write!(self.out, "\x1B[2J\x1B[1;1H");
                Ok(None)
            }
            Stmt::ShowTable { headers, rows } => {
                let headers = self.evaluate(headers)?;
                let rows = self.evaluate(rows)?;
                let table = builtins::call("print_table", &[headers, rows])?;
                let _ = writeln!(self.out, "{}", table.display_string());
                Ok(None)
            }
            Stmt::Ask {
                prompt,
                var_name,
                ask_type,
            } => {
                self.execute_ask(prompt.as_ref(), var_name, *ask_type)?;
                Ok(None)
            }
            Stmt::If {
                condition,
                then_block,
                else_block,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_block(then_block)
                } else if let Some(else_block) = else_block {
                    self.execute_block(else_block)
                } else {
                    Ok(None)
                }
            }
            Stmt::RepeatForever(body) => loop {
                match self.execute_block(body)? {
                    Some(Signal::Break) => return Ok(None),
                    Some(Signal::Continue) | None => {}
                    signal => return Ok(signal),
                }
            },
            Stmt::RepeatTimes { count, body } => {
                let n = self.evaluate(count)?.as_number()?;
                let n = if n < 0.0 { 0 } else { n as u64 };
                for _ in 0..n {
                    match self.execute_block(body)? {
                        Some(Signal::Break) => return Ok(None),
                        Some(Signal::Continue) | None => {}
                        signal => return Ok(signal),
                    }
                }
                Ok(None)
            }
            Stmt::RepeatUntil { condition, body } => {
                while !self.evaluate(condition)?.is_truthy() {
                    match self.execute_block(body)? {
                        Some(Signal::Break) => return Ok(None),
                        Some(Signal::Continue) | None => {}
                        signal => return Ok(signal),
                    }
                }
                Ok(None)
            }
            Stmt::DoUntil { body, condition } => loop {
                match self.execute_block(body)? {
                    Some(Signal::Break) => return Ok(None),
                    Some(Signal::Continue) | None => {}
                    signal @ Some(_) => return Ok(signal),
                }
                if self.evaluate(condition)?.is_truthy() {
                    return Ok(None);
                }
            },
            Stmt::Break => Ok(Some(Signal::Break)),
            Stmt::Continue => Ok(Some(Signal::Continue)),
            Stmt::Stop => Ok(Some(Signal::Stop)),

            Stmt::FunctionDef { name, params, body } => {
                self.execute_function_def(name, params, body);
                Ok(None)
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nothing,
                };
                Ok(Some(Signal::Return(value)))
            }

            Stmt::Match { expr, cases } => self.execute_match(expr, cases),

            Stmt::Assignment { target, value } => {
                let value = self.evaluate(value)?;
                self.assign_target(target, value)?;
                Ok(None)
            }
            Stmt::Mutation { target, op, value } => {
                self.execute_mutation(target, *op, value.as_ref())?;
                Ok(None)
            }

            Stmt::ListAdd { list, value } => {
                let list = self.expect_list(list)?;
                let value = self.evaluate(value)?;
                list.borrow_mut().push(value);
                Ok(None)
            }
            Stmt::ListRemove { list, value, index } => {
                self.execute_list_remove(list, value.as_ref(), index.as_ref())?;
                Ok(None)
            }
            Stmt::ListSort(expr) => {
                self.execute_list_sort(expr)?;
                Ok(None)
            }
            Stmt::ListReverse(expr) => {
                let list = self.expect_list(expr)?;
                list.borrow_mut().reverse();
                Ok(None)
            }
            Stmt::ListShuffle(expr) => {
                let list = self.expect_list(expr)?;
                list.borrow_mut().shuffle(&mut rand::thread_rng());
                Ok(None)
            }

            Stmt::WriteFile { content, filename } => {
                self.permissions.check_files()?;
                let content = self.evaluate(content)?.display_string();
                let filename = self.evaluate(filename)?.display_string();
                std::fs::write(&filename, content).map_err(|e| GopaError::File {
                    message: format!("failed to write {filename}: {e}"),
                })?;
                Ok(None)
            }

            Stmt::DrawCircle { x, y, size, color } => {
                self.permissions.check_graphics()?;
                let (x, y, size, color) = (
                    self.evaluate(x)?,
                    self.evaluate(y)?,
                    self.evaluate(size)?,
                    self.evaluate(color)?,
                );
                let _ = writeln!(
                    self.out,
                    "[canvas] circle x={} y={} size={} color={}",
                    x.display_string(),
                    y.display_string(),
                    size.display_string(),
                    color.display_string()
                );
                Ok(None)
            }
            Stmt::DrawRectangle { x1, y1, x2, y2, color } => {
                self.permissions.check_graphics()?;
                let (x1, y1, x2, y2, color) = (
                    self.evaluate(x1)?,
                    self.evaluate(y1)?,
                    self.evaluate(x2)?,
                    self.evaluate(y2)?,
                    self.evaluate(color)?,
                );
                let _ = writeln!(
                    self.out,
                    "[canvas] rectangle from {},{} to {},{} color={}",
                    x1.display_string(),
                    y1.display_string(),
                    x2.display_string(),
                    y2.display_string(),
                    color.display_string()
                );
                Ok(None)
            }
            Stmt::DrawLine { x1, y1, x2, y2, color } => {
                self.permissions.check_graphics()?;
                let (x1, y1, x2, y2, color) = (
                    self.evaluate(x1)?,
                    self.evaluate(y1)?,
                    self.evaluate(x2)?,
                    self.evaluate(y2)?,
                    self.evaluate(color)?,
                );
                let _ = writeln!(
                    self.out,
                    "[canvas] line from {},{} to {},{} color={}",
                    x1.display_string(),
                    y1.display_string(),
                    x2.display_string(),
                    y2.display_string(),
                    color.display_string()
                );
                Ok(None)
            }
            Stmt::DrawText { text, x, y, size, color } => {
                self.permissions.check_graphics()?;
                let (text, x, y, size, color) = (
                    self.evaluate(text)?,
                    self.evaluate(x)?,
                    self.evaluate(y)?,
                    self.evaluate(size)?,
                    self.evaluate(color)?,
                );
                let _ = writeln!(
                    self.out,
                    "[canvas] text '{}' at {},{} size={} color={}",
                    text.display_string(),
                    x.display_string(),
                    y.display_string(),
                    size.display_string(),
                    color.display_string()
                );
                Ok(None)
            }
            Stmt::WhenMouseClicks { canvas, .. } => {
                self.permissions.check_graphics()?;
                let _ = self.evaluate(canvas)?;
                let _ = writeln!(self.out, "[event] registered mouse click handler");
                Ok(None)
            }

            Stmt::Wait(seconds) => {
                self.permissions.check_timers()?;
                let seconds = self.evaluate(seconds)?.as_number()?;
                self.scheduler.wait(seconds);
                Ok(None)
            }
            Stmt::After { seconds, body } => {
                self.permissions.check_timers()?;
                let seconds = self.evaluate(seconds)?.as_number()?;
                self.scheduler.after(seconds, body.clone());
                Ok(None)
            }
            Stmt::Every { seconds, body } => {
                self.permissions.check_timers()?;
                let seconds = self.evaluate(seconds)?.as_number()?;
                self.scheduler.every(seconds, body.clone());
                Ok(None)
            }
            Stmt::Job { name, seconds, body } => {
                self.permissions.check_timers()?;
                let seconds = self.evaluate(seconds)?.as_number()?;
                self.scheduler.job(name.clone(), seconds, body.clone());
                Ok(None)
            }
            Stmt::StopJob(name) => {
                self.permissions.check_timers()?;
                self.scheduler.stop_job(name);
                Ok(None)
            }
            Stmt::Cron { schedule, body } => {
                self.permissions.check_cron()?;
                self.scheduler.cron(schedule, body.clone())?;
                Ok(None)
            }

            Stmt::Use(name) => {
                let stmts = self.packages.use_package(&self.permissions, name)?;
                self.execute_block(&stmts)
            }
            Stmt::Install(name) => {
                self.packages.install(&self.permissions, name)?;
                Ok(None)
            }
            Stmt::UsePython { module, alias } => {
                self.permissions.check_python_ffi()?;
                python_bridge::check_allowed(module)?;
                self.scope
                    .set(alias.clone(), Value::Str(format!("<python module '{module}'>")));
                Ok(None)
            }

            Stmt::Server { port, handlers } => {
                self.permissions.check_server()?;
                let port = self.evaluate(port)?;
                let _ = writeln!(self.out, "[server] registered on port {}", port.display_string());
                for handler in handlers {
                    let _ = writeln!(
                        self.out,
                        "[server] registered {} {}",
                        handler.method, handler.path
                    );
                }
                Ok(None)
            }
        }
    }

    fn execute_ask(
        &mut self,
        prompt: Option<&Expr>,
        var_name: &str,
        ask_type: AskType,
    ) -> Result<(), GopaError> {
        if let Some(prompt) = prompt {
            let prompt = self.evaluate(prompt)?;
            let _ = write!(self.out, "{}", prompt.display_string());
            let _ = self.out.flush();
        }
        let mut line = String::new();
        let value = match self.input.read_line(&mut line) {
            Ok(0) => Value::Str(String::new()),
            Ok(_) => {
                let response = line.trim_end_matches(['\n', '\r']).to_string();
                match ask_type {
                    AskType::Number => Value::Number(response.trim().parse().unwrap_or(0.0)),
                    AskType::Text => Value::Str(response),
                }
            }
            Err(_) => Value::Str(String::new()),
        };
        self.scope.set(var_name.to_string(), value);
        Ok(())
    }

    fn execute_function_def(&mut self, name: &str, params: &[String], body: &[Stmt]) {
        let closure = Scope::from_snapshot(
            self.scope.snapshot_variables(),
            self.scope.functions_snapshot(),
        );
        let func = Rc::new(Function {
            name: name.to_string(),
            params: params.to_vec(),
            body: body.to_vec(),
            closure: closure.clone(),
        });
        // Defining the function inside its own closure (rather than only in
        // the enclosing scope) is what lets it call itself recursively.
        closure.define_function(func.clone());
        self.scope.define_function(func);
    }

    fn execute_match(&mut self, expr: &Expr, cases: &[MatchCase]) -> Result<Option<Signal>, GopaError> {
        let value = self.evaluate(expr)?;
        for case in cases {
            let start = self.evaluate(&case.start)?;
            let matched = match &case.end {
                Some(end_expr) => {
                    let end = self.evaluate(end_expr)?;
                    match (&value, &start, &end) {
                        (Value::Number(v), Value::Number(a), Value::Number(b)) => v >= a && v <= b,
                        _ => value.equals(&start),
                    }
                }
                None => value.equals(&start),
            };
            if matched {
                return self.execute_block(&case.body);
            }
        }
        Ok(None)
    }

    fn execute_mutation(
        &mut self,
        target: &Expr,
        op: MutationOp,
        value: Option<&Expr>,
    ) -> Result<(), GopaError> {
        let current = self.eval_target(target)?;
        let new_value = match value {
            Some(value) => {
                let delta = self.evaluate(value)?.as_number()?;
                let current = current.as_number()?;
                let result = match op {
                    MutationOp::Increase => current + delta,
                    MutationOp::Decrease => current - delta,
                };
                Value::Number(result)
            }
            None => {
                return Err(GopaError::type_error(
                    "mutation without a 'by' amount is not supported",
                ));
            }
        };
        self.assign_target(target, new_value)
    }

    fn execute_list_remove(
        &mut self,
        list_expr: &Expr,
        value: Option<&Expr>,
        index: Option<&Expr>,
    ) -> Result<(), GopaError> {
        let list = self.expect_list(list_expr)?;
        if let Some(index) = index {
            let i = self.evaluate(index)?.as_number()? as i64;
            let mut items = list.borrow_mut();
            if i >= 0 && (i as usize) < items.len() {
                items.remove(i as usize);
            }
        } else if let Some(value) = value {
            let target = self.evaluate(value)?;
            let mut items = list.borrow_mut();
            if let Some(pos) = items.iter().position(|item| item.equals(&target)) {
                items.remove(pos);
            }
        }
        Ok(())
    }

    fn execute_list_sort(&mut self, list_expr: &Expr) -> Result<(), GopaError> {
        let list = self.expect_list(list_expr)?;
        let mut items = list.borrow_mut();
        let mut error = None;
        items.sort_by(|a, b| match a.partial_cmp(b) {
            Ok(ordering) => ordering,
            Err(e) => {
                if error.is_none() {
                    error = Some(e);
                }
                std::cmp::Ordering::Equal
            }
        });
        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn expect_list(&mut self, expr: &Expr) -> Result<crate::value::ListRef, GopaError> {
        match self.evaluate(expr)? {
            Value::List(l) => Ok(l),
            other => Err(GopaError::type_error(format!(
                "expected a list, got {}",
                other.type_name()
            ))),
        }
    }

    // ---- targets (assignable expressions) ----

    fn eval_target(&mut self, target: &Expr) -> Result<Value, GopaError> {
        match target {
            Expr::Identifier(name) => Ok(self.scope.get(name).unwrap_or(Value::Nothing)),
            other => self.evaluate(other),
        }
    }

    fn assign_target(&mut self, target: &Expr, value: Value) -> Result<(), GopaError> {
        match target {
            Expr::Identifier(name) => {
                self.scope.set(name.clone(), value);
                Ok(())
            }
            Expr::PropertyAccess { object, property } => match self.evaluate(object)? {
                Value::Dictionary(map) | Value::Object(map) => {
                    map.borrow_mut().insert(property.clone(), value);
                    Ok(())
                }
                other => Err(GopaError::type_error(format!(
                    "cannot set a property on {}",
                    other.type_name()
                ))),
            },
            Expr::IndexAccess { object, index } => {
                let index = self.evaluate(index)?;
                match self.evaluate(object)? {
                    Value::List(list) => {
                        let i = index.as_number()? as i64;
                        let mut items = list.borrow_mut();
                        if i < 0 || i as usize >= items.len() {
                            return Err(GopaError::index(format!("index {i} out of range")));
                        }
                        items[i as usize] = value;
                        Ok(())
                    }
                    Value::Dictionary(map) | Value::Object(map) => {
                        map.borrow_mut().insert(value_as_key(&index), value);
                        Ok(())
                    }
                    other => Err(GopaError::type_error(format!(
                        "cannot index into {}",
                        other.type_name()
                    ))),
                }
            }
            other => Err(GopaError::parse(format!("{other:?} is not assignable"))),
        }
    }

    // ---- expressions ----

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, GopaError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Nothing => Ok(Value::Nothing),
            Expr::Pi => Ok(Value::Number(std::f64::consts::PI)),
            Expr::Identifier(name) => self
                .scope
                .get(name)
                .ok_or_else(|| GopaError::Undefined { name: name.clone() }),

            Expr::BinaryOp { left, op, right } => self.eval_binary(left, *op, right),
            Expr::UnaryOp { op, operand } => {
                let value = self.evaluate(operand)?;
                match op {
                    UnaryOperator::Not => Ok(Value::Boolean(!value.is_truthy())),
                    UnaryOperator::Negate => Ok(Value::Number(-value.as_number()?)),
                }
            }
            Expr::PropertyAccess { object, property } => match self.evaluate(object)? {
                Value::Dictionary(map) | Value::Object(map) => {
                    Ok(map.borrow().get(property).cloned().unwrap_or(Value::Nothing))
                }
                other => Err(GopaError::type_error(format!(
                    "cannot access property '{property}' on {}",
                    other.type_name()
                ))),
            },
            Expr::IndexAccess { object, index } => {
                let index = self.evaluate(index)?;
                match self.evaluate(object)? {
                    Value::List(list) => {
                        let list = list.borrow();
                        let i = index.as_number()? as i64;
                        if i >= 0 && (i as usize) < list.len() {
                            Ok(list[i as usize].clone())
                        } else {
                            Ok(Value::Nothing)
                        }
                    }
                    Value::Dictionary(map) | Value::Object(map) => Ok(map
                        .borrow()
                        .get(&value_as_key(&index))
                        .cloned()
                        .unwrap_or(Value::Nothing)),
                    Value::Str(s) => {
                        let i = index.as_number()? as i64;
                        let chars: Vec<char> = s.chars().collect();
                        if i >= 0 && (i as usize) < chars.len() {
                            Ok(Value::Str(chars[i as usize].to_string()))
                        } else {
                            Ok(Value::Nothing)
                        }
                    }
                    other => Err(GopaError::type_error(format!(
                        "cannot index into {}",
                        other.type_name()
                    ))),
                }
            }

            Expr::ListLiteral(items) => {
                let values = items
                    .iter()
                    .map(|item| self.evaluate(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::list(values))
            }
            Expr::DictionaryLiteral(pairs) => {
                let mut map = IndexMap::new();
                for (key, value) in pairs {
                    let key = value_as_key(&self.evaluate(key)?);
                    let value = self.evaluate(value)?;
                    map.insert(key, value);
                }
                Ok(Value::dictionary(map))
            }
            Expr::ObjectLiteral(props) => {
                let mut map = IndexMap::new();
                for (name, value) in props {
                    let value = self.evaluate(value)?;
                    map.insert(name.clone(), value);
                }
                Ok(Value::object(map))
            }

            Expr::FunctionCall { name, args } => self.evaluate_function_call(name, args),

            Expr::Find { value, in_expr } => self.evaluate_find(value, in_expr),
            Expr::Filter { list, condition } => self.evaluate_filter(list, condition),
            Expr::Map { list, transform } => self.evaluate_map(list, transform),

            Expr::StringSplit { string, delimiter } => {
                let string = self.evaluate(string)?.display_string();
                let delimiter = self.evaluate(delimiter)?.display_string();
                let parts: Vec<Value> = if delimiter.is_empty() {
                    string.chars().map(|c| Value::Str(c.to_string())).collect()
                } else {
                    string
                        .split(delimiter.as_str())
                        .map(|p| Value::Str(p.to_string()))
                        .collect()
                };
                Ok(Value::list(parts))
            }
            Expr::StringJoin { list, delimiter } => {
                let list = self.expect_list(list)?;
                let delimiter = self.evaluate(delimiter)?.display_string();
                let joined = list
                    .borrow()
                    .iter()
                    .map(Value::display_string)
                    .collect::<Vec<_>>()
                    .join(&delimiter);
                Ok(Value::Str(joined))
            }
            Expr::StringReplace { string, old, new } => {
                let string = self.evaluate(string)?.display_string();
                let old = self.evaluate(old)?.display_string();
                let new = self.evaluate(new)?.display_string();
                Ok(Value::Str(string.replace(&old, &new)))
            }
            Expr::StringFind { string, pattern } => {
                let string = self.evaluate(string)?.display_string();
                let pattern = self.evaluate(pattern)?.display_string();
                Ok(Value::Boolean(string.contains(&pattern)))
            }

            Expr::GetRequest { url, params } => self.evaluate_get_request(url, params.as_deref()),
            Expr::ReadFile { filename } => {
                self.permissions.check_files()?;
                let filename = self.evaluate(filename)?.display_string();
                let content = std::fs::read_to_string(&filename).map_err(|e| GopaError::File {
                    message: format!("failed to read {filename}: {e}"),
                })?;
                Ok(Value::Str(content))
            }

            Expr::CreateCanvas { width, height } => {
                self.permissions.check_graphics()?;
                let width = self.evaluate(width)?;
                let height = self.evaluate(height)?;
                let _ = writeln!(
                    self.out,
                    "[canvas] created {}x{}",
                    width.display_string(),
                    height.display_string()
                );
                let mut map = IndexMap::new();
                map.insert("width".to_string(), width);
                map.insert("height".to_string(), height);
                Ok(Value::object(map))
            }

            Expr::PythonCall { module_attr, args } => self.evaluate_python_call(module_attr, args),
        }
    }

    fn eval_binary(&mut self, left: &Expr, op: BinaryOperator, right: &Expr) -> Result<Value, GopaError> {
        if op == BinaryOperator::And {
            let left = self.evaluate(left)?;
            return if !left.is_truthy() { Ok(left) } else { self.evaluate(right) };
        }
        if op == BinaryOperator::Or {
            let left = self.evaluate(left)?;
            return if left.is_truthy() { Ok(left) } else { self.evaluate(right) };
        }

        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;
        match op {
            BinaryOperator::Plus => match (&left, &right) {
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
                (Value::Str(a), other) => Ok(Value::Str(format!("{a}{}", other.display_string()))),
                (other, Value::Str(b)) => Ok(Value::Str(format!("{}{b}", other.display_string()))),
                _ => Ok(Value::Number(left.as_number()? + right.as_number()?)),
            },
            BinaryOperator::Minus => Ok(Value::Number(left.as_number()? - right.as_number()?)),
            BinaryOperator::Times => Ok(Value::Number(left.as_number()? * right.as_number()?)),
            BinaryOperator::DividedBy => {
                let divisor = right.as_number()?;
                if divisor == 0.0 {
                    return Err(GopaError::DivisionByZero);
                }
                Ok(Value::Number(left.as_number()? / divisor))
            }
            BinaryOperator::Equals => Ok(Value::Boolean(left.equals(&right))),
            BinaryOperator::DoesNotEqual => Ok(Value::Boolean(!left.equals(&right))),
            BinaryOperator::IsGreaterThan => {
                Ok(Value::Boolean(left.partial_cmp(&right)? == std::cmp::Ordering::Greater))
            }
            BinaryOperator::IsLessThan => {
                Ok(Value::Boolean(left.partial_cmp(&right)? == std::cmp::Ordering::Less))
            }
            BinaryOperator::IsAtLeast => {
                Ok(Value::Boolean(left.partial_cmp(&right)? != std::cmp::Ordering::Less))
            }
            BinaryOperator::IsAtMost => {
                Ok(Value::Boolean(left.partial_cmp(&right)? != std::cmp::Ordering::Greater))
            }
            BinaryOperator::And | BinaryOperator::Or => unreachable!("handled above"),
        }
    }

    fn evaluate_function_call(&mut self, name: &str, args: &[Expr]) -> Result<Value, GopaError> {
        let values = args
            .iter()
            .map(|arg| self.evaluate(arg))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(func) = self.scope.get_function(name) {
            return self.call_user_function(&func, values);
        }
        if name == "post_request" {
            return self.evaluate_post_request(&values);
        }
        if builtins::is_builtin(name) {
            return builtins::call(name, &values);
        }
        Err(GopaError::Undefined { name: name.to_string() })
    }

    fn call_user_function(&mut self, func: &Rc<Function>, args: Vec<Value>) -> Result<Value, GopaError> {
        let call_scope = Scope::call_frame(&func.closure);
        for (i, param) in func.params.iter().enumerate() {
            call_scope.set(param.clone(), args.get(i).cloned().unwrap_or(Value::Nothing));
        }

        let caller_scope = std::mem::replace(&mut self.scope, call_scope);
        let result = self.execute_block(&func.body);
        self.scope = caller_scope;

        match result? {
            Some(Signal::Return(value)) => Ok(value),
            _ => Ok(Value::Nothing),
        }
    }

    fn evaluate_find(&mut self, value: &Expr, in_expr: &Expr) -> Result<Value, GopaError> {
        let needle = self.evaluate(value)?;
        match self.evaluate(in_expr)? {
            Value::List(list) => Ok(Value::Boolean(list.borrow().iter().any(|v| v.equals(&needle)))),
            Value::Str(haystack) => Ok(Value::Boolean(haystack.contains(&needle.display_string()))),
            Value::Dictionary(map) | Value::Object(map) => {
                let map = map.borrow();
                let key = value_as_key(&needle);
                Ok(Value::Boolean(map.contains_key(&key) || map.values().any(|v| v.equals(&needle))))
            }
            other => Err(GopaError::type_error(format!(
                "cannot search in {}",
                other.type_name()
            ))),
        }
    }

    /// Binds `item` for the duration of `f`, restoring (or removing, if it
    /// was never bound) the previous value afterward.
    fn with_item_binding<T>(
        &mut self,
        item: Value,
        f: impl FnOnce(&mut Self) -> Result<T, GopaError>,
    ) -> Result<T, GopaError> {
        let previous = self.scope.get("item");
        self.scope.set("item", item);
        let result = f(self);
        match previous {
            Some(value) => self.scope.set("item", value),
            None => self.scope.remove("item"),
        }
        result
    }

    fn evaluate_filter(&mut self, list: &Expr, condition: &Expr) -> Result<Value, GopaError> {
        let list = self.expect_list(list)?;
        let items = list.borrow().clone();
        let mut kept = Vec::new();
        for item in items {
            let matches = self.with_item_binding(item.clone(), |this| this.evaluate(condition))?;
            if matches.is_truthy() {
                kept.push(item);
            }
        }
        Ok(Value::list(kept))
    }

    fn evaluate_map(&mut self, list: &Expr, transform: &Expr) -> Result<Value, GopaError> {
        let list = self.expect_list(list)?;
        let items = list.borrow().clone();
        let mut mapped = Vec::with_capacity(items.len());
        for item in items {
            let transformed = self.with_item_binding(item, |this| this.evaluate(transform))?;
            mapped.push(transformed);
        }
        Ok(Value::list(mapped))
    }

    fn evaluate_get_request(&mut self, url: &Expr, params: Option<&Expr>) -> Result<Value, GopaError> {
        self.permissions.check_network()?;
        let mut url = self.evaluate(url)?.display_string();
        if let Some(params) = params {
            if let Value::Dictionary(map) | Value::Object(map) = self.evaluate(params)? {
                let query: Vec<String> = map
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{k}={}", v.display_string()))
                    .collect();
                if !query.is_empty() {
                    url.push(if url.contains('?') { '&' } else { '?' });
                    url.push_str(&query.join("&"));
                }
            }
        }
        let response = ureq::get(&url)
            .timeout(std::time::Duration::from_secs(10))
            .call()
            .map_err(|e| GopaError::Network { message: e.to_string() })?;
        let json: serde_json::Value = response
            .into_json()
            .map_err(|e| GopaError::Network { message: e.to_string() })?;
        Ok(json_to_value(&json))
    }

    fn evaluate_post_request(&mut self, args: &[Value]) -> Result<Value, GopaError> {
        self.permissions.check_network()?;
        let url = args
            .first()
            .ok_or_else(|| GopaError::type_error("post_request expects a url and a body"))?
            .display_string();
        let body = args.get(1).map(value_to_json).unwrap_or(serde_json::Value::Null);
        let response = ureq::post(&url)
            .timeout(std::time::Duration::from_secs(10))
            .send_json(body)
            .map_err(|e| GopaError::Network { message: e.to_string() })?;
        let json: serde_json::Value = response
            .into_json()
            .map_err(|e| GopaError::Network { message: e.to_string() })?;
        Ok(json_to_value(&json))
    }

    fn evaluate_python_call(&mut self, module_attr: &str, args: &[Expr]) -> Result<Value, GopaError> {
        self.permissions.check_python_ffi()?;
        let (module, attr) = module_attr.split_once('.').ok_or_else(|| GopaError::Python {
            message: format!("'{module_attr}' is not a module.function reference"),
        })?;
        python_bridge::check_allowed(module)?;
        let values = args
            .iter()
            .map(|arg| self.evaluate(arg))
            .collect::<Result<Vec<_>, _>>()?;
        python_bridge::call(module, attr, &values)
    }
}

fn value_as_key(value: &Value) -> String {
    value.display_string()
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Number(n) => serde_json::json!(n),
        Value::Str(s) => serde_json::json!(s),
        Value::Boolean(b) => serde_json::json!(b),
        Value::Nothing => serde_json::Value::Null,
        Value::List(items) => serde_json::Value::Array(items.borrow().iter().map(value_to_json).collect()),
        Value::Dictionary(map) | Value::Object(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map.borrow().iter() {
                obj.insert(k.clone(), value_to_json(v));
            }
            serde_json::Value::Object(obj)
        }
        Value::Function(func) => serde_json::json!(format!("<function {}>", func.name)),
    }
}

fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Nothing,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => Value::list(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => {
            let mut out = IndexMap::new();
            for (k, v) in map {
                out.insert(k.clone(), json_to_value(v));
            }
            Value::dictionary(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser;
    use std::io::Cursor;

    fn run_program(src: &str, permissions: Permissions) -> String {
        let tokens = Lexer::tokenize(src).unwrap();
        let program = parser::parse(tokens).unwrap();
        let mut out = Vec::new();
        let mut err_out = Vec::new();
        let mut input = Cursor::new(Vec::new());
        let mut interpreter = Interpreter::new(
            permissions,
            Scheduler::new(true),
            &mut out,
            &mut err_out,
            &mut input,
            false,
        )
        .unwrap();
        interpreter.run(&program).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn say_prints_concatenated_parts() {
        let output = run_program("say \"hello \" 1\n", Permissions::none());
        assert_eq!(output, "hello 1\n");
    }

    #[test]
    fn assignment_and_arithmetic() {
        let output = run_program("x is 2\nx is x plus 3\nsay x\n", Permissions::none());
        assert_eq!(output, "5\n");
    }

    #[test]
    fn repeat_times_runs_body_n_times() {
        let output = run_program(
            "count is 0\nrepeat 3 times\ncount is count plus 1\nend\nsay count\n",
            Permissions::none(),
        );
        assert_eq!(output, "3\n");
    }

    #[test]
    fn division_by_zero_is_caught_at_statement_boundary_not_debug() {
        let output = run_program("x is 1 divided by 0\nsay \"after\"\n", Permissions::none());
        assert_eq!(output, "after\n");
    }

    #[test]
    fn function_recursion_works_via_self_referential_closure() {
        let output = run_program(
            "define factorial with n\nif n is at most 1 then\nreturn 1\nend\nreturn n times factorial n minus 1\nend\nsay factorial 5\n",
            Permissions::none(),
        );
        assert_eq!(output, "120\n");
    }

    #[test]
    fn filter_preserves_outer_item_binding() {
        let output = run_program(
            "item is 99\nnums is [1, 2, 3, 4]\nevens is filter nums where item divided by 2 is 1\nsay item\n",
            Permissions::none(),
        );
        assert_eq!(output, "99\n");
    }

    #[test]
    fn network_without_permission_is_denied() {
        let tokens = Lexer::tokenize("x is get \"http://example.com\"\n").unwrap();
        let program = parser::parse(tokens).unwrap();
        let mut out = Vec::new();
        let mut err_out = Vec::new();
        let mut input = Cursor::new(Vec::new());
        let mut interpreter = Interpreter::new(
            Permissions::none(),
            Scheduler::new(true),
            &mut out,
            &mut err_out,
            &mut input,
            true,
        )
        .unwrap();
        assert!(interpreter.run(&program).is_err());
    }
}
