//! Built-in functions available in every Gopa program without an explicit
//! `use`. Grounded in `original_source/gopa_lang/builtin_stdlib.py`.

use rand::Rng;

use crate::error::GopaError;
use crate::value::Value;

/// True if `name` names a builtin function, so the interpreter can dispatch
/// to it before consulting user-defined functions.
pub fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "random"
            | "random_number"
            | "random_int"
            | "floor"
            | "ceil"
            | "round"
            | "abs"
            | "sqrt"
            | "sin"
            | "cos"
            | "tan"
            | "pow"
            | "log"
            | "max"
            | "min"
            | "sum"
            | "len"
            | "range"
            | "type_of"
            | "to_string"
            | "to_number"
            | "print_table"
            | "slice"
    )
}

pub fn call(name: &str, args: &[Value]) -> Result<Value, GopaError> {
    match name {
        "random" | "random_number" => random_number(args),
        "random_int" => random_int(args),
        "floor" => unary_numeric(args, f64::floor),
        "ceil" => unary_numeric(args, f64::ceil),
        "round" => unary_numeric(args, |n| n.round()),
        "abs" => unary_numeric(args, f64::abs),
        "sqrt" => unary_numeric(args, f64::sqrt),
        "sin" => unary_numeric(args, f64::sin),
        "cos" => unary_numeric(args, f64::cos),
        "tan" => unary_numeric(args, f64::tan),
        "pow" => power(args),
        "log" => log(args),
        "max" => extremum(args, true),
        "min" => extremum(args, false),
        "sum" => sum(args),
        "len" => length(args),
        "range" => range(args),
        "type_of" => Ok(Value::Str(one_arg(args, "type_of")?.type_name().to_string())),
        "to_string" => Ok(Value::Str(one_arg(args, "to_string")?.display_string())),
        "to_number" => to_number(args),
        "print_table" => print_table(args),
        "slice" => slice(args),
        other => Err(GopaError::Undefined {
            name: other.to_string(),
        }),
    }
}

fn one_arg<'a>(args: &'a [Value], name: &str) -> Result<&'a Value, GopaError> {
    args.first()
        .ok_or_else(|| GopaError::type_error(format!("{name} expects exactly one argument")))
}

fn unary_numeric(args: &[Value], f: impl Fn(f64) -> f64) -> Result<Value, GopaError> {
    Ok(Value::Number(f(one_arg(args, "builtin")?.as_number()?)))
}

fn random_number(_args: &[Value]) -> Result<Value, GopaError> {
    Ok(Value::Number(rand::thread_rng().gen::<f64>()))
}

/// Inclusive on both ends, matching `random.randint` in the Python original.
fn random_int(args: &[Value]) -> Result<Value, GopaError> {
    let low = args
        .first()
        .ok_or_else(|| GopaError::type_error("random_int expects two arguments"))?
        .as_number()? as i64;
    let high = args
        .get(1)
        .ok_or_else(|| GopaError::type_error("random_int expects two arguments"))?
        .as_number()? as i64;
    Ok(Value::Number(
        rand::thread_rng().gen_range(low..=high) as f64,
    ))
}

fn power(args: &[Value]) -> Result<Value, GopaError> {
    let base = args
        .first()
        .ok_or_else(|| GopaError::type_error("power expects two arguments"))?
        .as_number()?;
    let exponent = args
        .get(1)
        .ok_or_else(|| GopaError::type_error("power expects two arguments"))?
        .as_number()?;
    Ok(Value::Number(base.powf(exponent)))
}

/// `log(value)` is natural log; `log(value, base)` uses the given base,
/// matching the two-arity Python `math.log` wrapper.
fn log(args: &[Value]) -> Result<Value, GopaError> {
    let value = one_arg(args, "log")?.as_number()?;
    match args.get(1) {
        Some(base) => Ok(Value::Number(value.log(base.as_number()?))),
        None => Ok(Value::Number(value.ln())),
    }
}

fn extremum(args: &[Value], want_max: bool) -> Result<Value, GopaError> {
    let list = list_arg(args, if want_max { "max" } else { "min" })?;
    let list = list.borrow();
    if list.is_empty() {
        return Ok(Value::Nothing);
    }
    let mut best = list[0].as_number()?;
    for item in list.iter().skip(1) {
        let n = item.as_number()?;
        if (want_max && n > best) || (!want_max && n < best) {
            best = n;
        }
    }
    Ok(Value::Number(best))
}

fn sum(args: &[Value]) -> Result<Value, GopaError> {
    let list = list_arg(args, "sum")?;
    let mut total = 0.0;
    for item in list.borrow().iter() {
        total += item.as_number()?;
    }
    Ok(Value::Number(total))
}

/// Errors on anything without a natural length, matching
/// `builtin_stdlib.py::builtin_len`'s explicit `TypeError` for scalars.
fn length(args: &[Value]) -> Result<Value, GopaError> {
    let value = one_arg(args, "length")?;
    let len = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(l) => l.borrow().len(),
        Value::Dictionary(m) | Value::Object(m) => m.borrow().len(),
        other => {
            return Err(GopaError::type_error(format!(
                "{} has no length",
                other.type_name()
            )))
        }
    };
    Ok(Value::Number(len as f64))
}

/// Exclusive of the end bound, matching Python's `range(start, end)`.
fn range(args: &[Value]) -> Result<Value, GopaError> {
    let (start, end) = match args.len() {
        1 => (0.0, args[0].as_number()?),
        _ => (args[0].as_number()?, args[1].as_number()?),
    };
    let mut items = Vec::new();
    let mut n = start;
    while n < end {
        items.push(Value::Number(n));
        n += 1.0;
    }
    Ok(Value::list(items))
}

fn to_number(args: &[Value]) -> Result<Value, GopaError> {
    match one_arg(args, "to_number")? {
        Value::Number(n) => Ok(Value::Number(*n)),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| GopaError::type_error(format!("cannot convert '{s}' to a number"))),
        Value::Boolean(b) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
        other => Err(GopaError::type_error(format!(
            "cannot convert {} to a number",
            other.type_name()
        ))),
    }
}

fn list_arg<'a>(args: &'a [Value], name: &str) -> Result<crate::value::ListRef, GopaError> {
    match one_arg(args, name)? {
        Value::List(l) => Ok(l.clone()),
        other => Err(GopaError::type_error(format!(
            "{name} expects a list, got {}",
            other.type_name()
        ))),
    }
}

fn list_arg2(args: &[Value], name: &str, index: usize) -> Result<crate::value::ListRef, GopaError> {
    match args.get(index) {
        Some(Value::List(l)) => Ok(l.clone()),
        Some(other) => Err(GopaError::type_error(format!(
            "{name} expects a list, got {}",
            other.type_name()
        ))),
        None => Err(GopaError::type_error(format!(
            "{name} expects two arguments"
        ))),
    }
}

/// Formats `headers`/`rows` into a table string, column widths taken from
/// whichever of a header or its column's cells is widest, with a `-`-rule
/// the width of the header line underneath it. Returns the string rather
/// than printing it (the caller, e.g. `show table`, decides where it goes),
/// mirroring `builtin_stdlib.py::builtin_print_table` exactly, including its
/// empty-rows short circuit.
fn print_table(args: &[Value]) -> Result<Value, GopaError> {
    let headers = list_arg2(args, "print_table", 0)?;
    let rows = list_arg2(args, "print_table", 1)?;

    let headers: Vec<String> = headers.borrow().iter().map(|h| h.display_string()).collect();
    let rows = rows.borrow();
    if rows.is_empty() {
        return Ok(Value::Str(String::new()));
    }

    let mut grid: Vec<Vec<String>> = Vec::new();
    for row in rows.iter() {
        let Value::List(cells) = row else {
            return Err(GopaError::type_error("print_table expects a list of rows"));
        };
        grid.push(cells.borrow().iter().map(|c| c.display_string()).collect());
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &grid {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_line = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:<width$}", h, width = widths[i]))
        .collect::<Vec<_>>()
        .join(" | ");
    let mut lines = vec![header_line.clone(), "-".repeat(header_line.len())];

    for row in &grid {
        let row_line = (0..headers.len())
            .map(|i| {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                format!("{:<width$}", cell, width = widths[i])
            })
            .collect::<Vec<_>>()
            .join(" | ");
        lines.push(row_line);
    }

    Ok(Value::Str(lines.join("\n")))
}

/// Python-style slice with negative-index wraparound and silent clamping,
/// matching `interpreter.py::evaluate_string_slice`.
fn slice(args: &[Value]) -> Result<Value, GopaError> {
    let s = match args.first() {
        Some(Value::Str(s)) => s.clone(),
        Some(other) => other.display_string(),
        None => return Err(GopaError::type_error("slice expects three arguments")),
    };
    let start = args
        .get(1)
        .ok_or_else(|| GopaError::type_error("slice expects three arguments"))?
        .as_number()? as i64;
    let end = args
        .get(2)
        .ok_or_else(|| GopaError::type_error("slice expects three arguments"))?
        .as_number()? as i64;

    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;
    let norm = |i: i64| -> i64 {
        if i < 0 {
            (len + i).max(0)
        } else {
            i.min(len)
        }
    };
    let start = norm(start);
    let end = norm(end);
    if start >= end {
        return Ok(Value::Str(String::new()));
    }
    Ok(Value::Str(chars[start as usize..end as usize].iter().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_exclusive_of_end() {
        let result = call("range", &[Value::Number(0.0), Value::Number(3.0)]).unwrap();
        if let Value::List(items) = result {
            assert_eq!(items.borrow().len(), 3);
        } else {
            panic!("expected a list");
        }
    }

    #[test]
    fn max_of_empty_list_is_nothing() {
        let result = call("max", &[Value::list(vec![])]).unwrap();
        assert!(matches!(result, Value::Nothing));
    }

    #[test]
    fn length_rejects_scalars() {
        assert!(call("len", &[Value::Number(3.0)]).is_err());
    }

    #[test]
    fn print_table_pads_columns_to_widest_cell() {
        let headers = Value::list(vec![Value::Str("name".into()), Value::Str("age".into())]);
        let rows = Value::list(vec![Value::list(vec![
            Value::Str("Alexandra".into()),
            Value::Number(30.0),
        ])]);
        let result = call("print_table", &[headers, rows]).unwrap();
        let Value::Str(text) = result else {
            panic!("expected a string")
        };
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "name      | age");
        assert_eq!(lines.next().unwrap().len(), "name      | age".len());
        assert_eq!(lines.next().unwrap(), "Alexandra | 30");
    }

    #[test]
    fn slice_supports_negative_indices() {
        let result = call(
            "slice",
            &[
                Value::Str("hello".into()),
                Value::Number(-3.0),
                Value::Number(-1.0),
            ],
        )
        .unwrap();
        let Value::Str(s) = result else {
            panic!("expected a string")
        };
        assert_eq!(s, "ll");
    }
}
