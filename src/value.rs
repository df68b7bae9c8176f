//! Runtime value representation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::Stmt;
use crate::error::GopaError;
use crate::runtime::Scope;

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type MapRef = Rc<RefCell<IndexMap<String, Value>>>;

/// A Gopa value. Lists, dictionaries, and objects are reference types: cloning
/// a `Value` that holds one of these shares the underlying storage, matching
/// Python's aliasing semantics for `list`/`dict`.
#[derive(Clone)]
pub enum Value {
    Number(f64),
    Str(String),
    Boolean(bool),
    Nothing,
    List(ListRef),
    Dictionary(MapRef),
    Object(MapRef),
    Function(Rc<Function>),
}

/// A user-defined function together with the lexical environment captured at
/// the point it was defined.
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub closure: Scope,
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dictionary(entries: IndexMap<String, Value>) -> Value {
        Value::Dictionary(Rc::new(RefCell::new(entries)))
    }

    pub fn object(entries: IndexMap<String, Value>) -> Value {
        Value::Object(Rc::new(RefCell::new(entries)))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Boolean(b) => *b,
            Value::Nothing => false,
            Value::List(l) => !l.borrow().is_empty(),
            Value::Dictionary(d) => !d.borrow().is_empty(),
            Value::Object(o) => !o.borrow().is_empty(),
            Value::Function(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Nothing => "nothing",
            Value::List(_) => "list",
            Value::Dictionary(_) => "dictionary",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    pub fn as_number(&self) -> Result<f64, GopaError> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(GopaError::type_error(format!(
                "expected a number, got {}",
                other.type_name()
            ))),
        }
    }

    /// Equality used by `equals`/`does not equal`, matching Python's `==`
    /// across mismatched types (always `false`, never an error).
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Nothing, Value::Nothing) => true,
            (Value::List(a), Value::List(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Dictionary(a), Value::Dictionary(b)) | (Value::Object(a), Value::Object(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map_or(false, |other_v| v.equals(other_v)))
            }
            _ => false,
        }
    }

    pub fn partial_cmp(&self, other: &Value) -> Result<std::cmp::Ordering, GopaError> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                a.partial_cmp(b).ok_or_else(|| GopaError::type_error("cannot compare NaN"))
            }
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            _ => Err(GopaError::type_error(format!(
                "cannot compare {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// `to_string`, used by `say`/`print`/string coercion. Mirrors
    /// `builtin_stdlib.py::builtin_to_string` (`Nothing` becomes `""`).
    pub fn display_string(&self) -> String {
        match self {
            Value::Nothing => String::new(),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Nothing => write!(f, "nothing"),
            Value::List(items) => {
                let items = items.borrow();
                write!(
                    f,
                    "[{}]",
                    items
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
            Value::Dictionary(map) | Value::Object(map) => {
                let map = map.borrow();
                write!(
                    f,
                    "{{{}}}",
                    map.iter()
                        .map(|(k, v)| format!("{}: {}", k, v))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
            Value::Function(func) => write!(f, "<function {}>", func.name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, Value)]) -> IndexMap<String, Value> {
        entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn dictionaries_are_equal_when_structurally_identical() {
        let a = Value::dictionary(map(&[("a", Value::Number(1.0)), ("b", Value::Str("x".into()))]));
        let b = Value::dictionary(map(&[("a", Value::Number(1.0)), ("b", Value::Str("x".into()))]));
        assert!(a.equals(&b));
    }

    #[test]
    fn dictionaries_differ_on_a_mismatched_value() {
        let a = Value::dictionary(map(&[("a", Value::Number(1.0))]));
        let b = Value::dictionary(map(&[("a", Value::Number(2.0))]));
        assert!(!a.equals(&b));
    }

    #[test]
    fn objects_with_nested_container_values_compare_element_wise() {
        let a = Value::object(map(&[("items", Value::list(vec![Value::Number(1.0)]))]));
        let b = Value::object(map(&[("items", Value::list(vec![Value::Number(1.0)]))]));
        assert!(a.equals(&b));
    }

    #[test]
    fn a_dictionary_never_equals_an_object_even_with_the_same_entries() {
        let a = Value::dictionary(map(&[("a", Value::Number(1.0))]));
        let b = Value::object(map(&[("a", Value::Number(1.0))]));
        assert!(!a.equals(&b));
    }
}
