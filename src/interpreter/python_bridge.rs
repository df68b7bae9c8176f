//! Native stand-in for `call python` expressions.
//!
//! There is no embedded Python runtime here. `original_source/gopa_lang`'s
//! `python_bridge.py` shells out to a real interpreter for a small allowlisted
//! set of standard-library modules; this reimplements that same allowlist
//! natively against crates already in the dependency graph, so a Gopa program
//! that only touches `math`/`random`/`datetime`/`re` behaves identically
//! without ever spawning a `python` process.

use chrono::Utc;

use crate::error::GopaError;
use crate::value::Value;

const ALLOWED_MODULES: [&str; 4] = ["math", "random", "datetime", "re"];

pub fn check_allowed(module: &str) -> Result<(), GopaError> {
    if ALLOWED_MODULES.contains(&module) {
        Ok(())
    } else {
        Err(GopaError::Python {
            message: format!("python module '{module}' is not allowed"),
        })
    }
}

pub fn call(module: &str, attr: &str, args: &[Value]) -> Result<Value, GopaError> {
    match module {
        "math" => math_call(attr, args),
        "random" => random_call(attr, args),
        "datetime" => datetime_call(attr, args),
        "re" => re_call(attr, args),
        _ => check_allowed(module).map(|_| Value::Nothing),
    }
}

fn arg(args: &[Value], i: usize) -> Result<f64, GopaError> {
    args.get(i)
        .ok_or_else(|| GopaError::Python {
            message: format!("missing argument {i}"),
        })?
        .as_number()
}

fn math_call(attr: &str, args: &[Value]) -> Result<Value, GopaError> {
    let result = match attr {
        "sqrt" => arg(args, 0)?.sqrt(),
        "floor" => arg(args, 0)?.floor(),
        "ceil" => arg(args, 0)?.ceil(),
        "pow" => arg(args, 0)?.powf(arg(args, 1)?),
        "log" => arg(args, 0)?.ln(),
        "sin" => arg(args, 0)?.sin(),
        "cos" => arg(args, 0)?.cos(),
        "tan" => arg(args, 0)?.tan(),
        other => {
            return Err(GopaError::Python {
                message: format!("math.{other} is not supported"),
            })
        }
    };
    Ok(Value::Number(result))
}

fn random_call(attr: &str, args: &[Value]) -> Result<Value, GopaError> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    match attr {
        "random" => Ok(Value::Number(rng.gen::<f64>())),
        "randint" => {
            let low = arg(args, 0)? as i64;
            let high = arg(args, 1)? as i64;
            Ok(Value::Number(rng.gen_range(low..=high) as f64))
        }
        "uniform" => {
            let low = arg(args, 0)?;
            let high = arg(args, 1)?;
            Ok(Value::Number(rng.gen_range(low..=high)))
        }
        other => Err(GopaError::Python {
            message: format!("random.{other} is not supported"),
        }),
    }
}

fn datetime_call(attr: &str, _args: &[Value]) -> Result<Value, GopaError> {
    match attr {
        "now" => Ok(Value::Str(Utc::now().to_rfc3339())),
        other => Err(GopaError::Python {
            message: format!("datetime.{other} is not supported"),
        }),
    }
}

fn re_call(attr: &str, args: &[Value]) -> Result<Value, GopaError> {
    let pattern = args
        .first()
        .ok_or_else(|| GopaError::Python {
            message: "missing pattern argument".to_string(),
        })?
        .display_string();
    let text = args
        .get(1)
        .ok_or_else(|| GopaError::Python {
            message: "missing text argument".to_string(),
        })?
        .display_string();
    let regex = regex::Regex::new(&pattern).map_err(|e| GopaError::Python {
        message: format!("invalid pattern '{pattern}': {e}"),
    })?;

    match attr {
        "match" => Ok(Value::Boolean(
            regex.find(&text).map(|m| m.start() == 0).unwrap_or(false),
        )),
        "search" => Ok(Value::Boolean(regex.is_match(&text))),
        "findall" => Ok(Value::list(
            regex
                .find_iter(&text)
                .map(|m| Value::Str(m.as_str().to_string()))
                .collect(),
        )),
        other => Err(GopaError::Python {
            message: format!("re.{other} is not supported"),
        }),
    }
}
