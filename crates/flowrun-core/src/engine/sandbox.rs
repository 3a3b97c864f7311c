//! JEXL sandbox shared by script nodes and prompt placeholders.
//!
//! Wraps `jexl_eval::Evaluator` with the standard transforms pre-registered.
//! The only values in scope are the ones passed in the context object, so a
//! snippet cannot reach I/O, the filesystem, the network or the clock.
//!
//! The evaluator is built per evaluation and never held across an await.

use anyhow::{anyhow, bail};
use jexl_eval::Evaluator;
use jexl_eval::error::EvaluationError;
use serde_json::{Map, Value, json};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Why a sandbox evaluation failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SandboxError {
    /// The expression text could not be parsed.
    #[error("{0}")]
    Parse(String),

    /// The expression parsed but failed while evaluating.
    #[error("{0}")]
    Eval(String),
}

/// Evaluate `expression` against `context`, which must be a JSON object.
pub fn eval(expression: &str, context: &Value) -> Result<Value, SandboxError> {
    evaluator()
        .eval_in_context(expression, context)
        .map_err(|err| match err {
            EvaluationError::ParseError { .. } => SandboxError::Parse(err.to_string()),
            other => SandboxError::Eval(other.to_string()),
        })
}

/// A fresh evaluator with every standard transform registered.
pub(crate) fn evaluator() -> Evaluator<'static> {
    Evaluator::new()
        // String transforms
        .with_transform("lower", |args: &[Value]| Ok(json!(str_arg(args, 0).to_lowercase())))
        .with_transform("upper", |args: &[Value]| Ok(json!(str_arg(args, 0).to_uppercase())))
        .with_transform("trim", |args: &[Value]| Ok(json!(str_arg(args, 0).trim())))
        .with_transform("split", |args: &[Value]| {
            let delimiter = args.get(1).and_then(Value::as_str).unwrap_or(",");
            let parts: Vec<&str> = str_arg(args, 0).split(delimiter).collect();
            Ok(json!(parts))
        })
        .with_transform("join", |args: &[Value]| {
            let separator = args.get(1).and_then(Value::as_str).unwrap_or(",");
            let items = match args.first() {
                Some(Value::Array(items)) => items.iter().map(render).collect::<Vec<_>>(),
                Some(other) => vec![render(other)],
                None => Vec::new(),
            };
            Ok(json!(items.join(separator)))
        })
        .with_transform("contains", contains)
        .with_transform("startsWith", |args: &[Value]| {
            Ok(json!(str_arg(args, 0).starts_with(str_arg(args, 1))))
        })
        .with_transform("endsWith", |args: &[Value]| {
            Ok(json!(str_arg(args, 0).ends_with(str_arg(args, 1))))
        })
        .with_transform("length", |args: &[Value]| {
            let len = match args.first() {
                Some(Value::String(s)) => s.chars().count(),
                Some(Value::Array(a)) => a.len(),
                Some(Value::Object(o)) => o.len(),
                _ => 0,
            };
            Ok(json!(len as f64))
        })
        // Boolean transforms
        .with_transform("not", |args: &[Value]| {
            Ok(json!(!truthy(args.first().unwrap_or(&Value::Null))))
        })
        // Object transforms
        .with_transform("keys", |args: &[Value]| match args.first() {
            Some(Value::Object(map)) => Ok(json!(map.keys().collect::<Vec<_>>())),
            _ => Ok(json!([])),
        })
        .with_transform("values", |args: &[Value]| match args.first() {
            Some(Value::Object(map)) => Ok(Value::Array(map.values().cloned().collect())),
            _ => Ok(json!([])),
        })
        .with_transform("merge", merge)
        .with_transform("set", set)
        .with_transform("omit", omit)
        // Conversions
        .with_transform("number", number)
        .with_transform("string", |args: &[Value]| {
            Ok(json!(render(args.first().unwrap_or(&Value::Null))))
        })
        .with_transform("fail", |args: &[Value]| -> anyhow::Result<Value> {
            match args.first() {
                Some(message) => Err(anyhow!(render(message))),
                None => Err(anyhow!("script failed")),
            }
        })
}

fn str_arg(args: &[Value], index: usize) -> &str {
    args.get(index).and_then(Value::as_str).unwrap_or("")
}

fn contains(args: &[Value]) -> anyhow::Result<Value> {
    let needle = args.get(1).unwrap_or(&Value::Null);
    let found = match args.first() {
        Some(Value::String(s)) => needle.as_str().is_some_and(|n| s.contains(n)),
        Some(Value::Array(items)) => items.iter().any(|item| loosely_equal(item, needle)),
        Some(Value::Object(map)) => needle.as_str().is_some_and(|k| map.contains_key(k)),
        _ => false,
    };
    Ok(json!(found))
}

/// Shallow merge of every object argument, later keys winning.
fn merge(args: &[Value]) -> anyhow::Result<Value> {
    let mut merged = Map::new();
    for (index, arg) in args.iter().enumerate() {
        match arg {
            Value::Object(map) => {
                merged.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Value::Null if index > 0 => {}
            other => bail!("merge expects objects, got {}", super::error::type_name(other)),
        }
    }
    Ok(Value::Object(merged))
}

fn set(args: &[Value]) -> anyhow::Result<Value> {
    let Some(Value::Object(map)) = args.first() else {
        bail!("set expects an object");
    };
    let Some(key) = args.get(1).and_then(Value::as_str) else {
        bail!("set expects a string key");
    };
    let mut map = map.clone();
    map.insert(key.to_string(), args.get(2).cloned().unwrap_or(Value::Null));
    Ok(Value::Object(map))
}

fn omit(args: &[Value]) -> anyhow::Result<Value> {
    let Some(Value::Object(map)) = args.first() else {
        bail!("omit expects an object");
    };
    let mut map = map.clone();
    for arg in &args[1..] {
        match arg {
            Value::String(key) => {
                map.remove(key);
            }
            Value::Array(keys) => {
                for key in keys.iter().filter_map(Value::as_str) {
                    map.remove(key);
                }
            }
            _ => {}
        }
    }
    Ok(Value::Object(map))
}

fn number(args: &[Value]) -> anyhow::Result<Value> {
    let n = match args.first().unwrap_or(&Value::Null) {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| anyhow!("cannot convert '{s}' to a number"))?,
        other => bail!("cannot convert {} to a number", super::error::type_name(other)),
    };
    Ok(json!(n))
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

/// JavaScript-like truthiness.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Render a value as text: strings raw, integral numbers without a
/// fraction, composites as compact JSON.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            (_, _, Some(f)) => f.to_string(),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Turn integral floats back into integers, recursively.
///
/// JEXL arithmetic is done in `f64`; without this `1 + 2` would surface as
/// `3.0` in node output.
pub fn normalize_numbers(value: Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => json!(f as i64),
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_numbers).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize_numbers(v)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Value {
        json!({
            "data": {
                "name": "  Ada Lovelace ",
                "age": 36,
                "tags": ["math", "poetry"],
                "csv": "a,b,c"
            }
        })
    }

    #[test]
    fn test_dot_access_and_comparison() {
        assert_eq!(eval("data.age >= 18", &ctx()).unwrap(), json!(true));
        assert_eq!(eval("data.tags[1]", &ctx()).unwrap(), json!("poetry"));
        assert_eq!(eval("data.missing", &ctx()).unwrap(), json!(null));
    }

    #[test]
    fn test_object_literal() {
        let value = eval("{ sum: data.age + 4, ok: true }", &ctx()).unwrap();
        assert_eq!(value, json!({ "sum": 40.0, "ok": true }));
    }

    #[test]
    fn test_string_transforms() {
        assert_eq!(eval("data.name|trim|lower", &ctx()).unwrap(), json!("ada lovelace"));
        assert_eq!(eval("data.name|trim|upper", &ctx()).unwrap(), json!("ADA LOVELACE"));
        assert_eq!(eval("data.csv|split(',')", &ctx()).unwrap(), json!(["a", "b", "c"]));
        assert_eq!(eval("data.tags|join('+')", &ctx()).unwrap(), json!("math+poetry"));
        assert_eq!(eval("data.csv|startsWith('a,')", &ctx()).unwrap(), json!(true));
        assert_eq!(eval("data.csv|endsWith('x')", &ctx()).unwrap(), json!(false));
        assert_eq!(eval("data.tags|length", &ctx()).unwrap(), json!(2.0));
    }

    #[test]
    fn test_contains_on_strings_arrays_and_objects() {
        assert_eq!(eval("data.name|contains('Love')", &ctx()).unwrap(), json!(true));
        assert_eq!(eval("data.tags|contains('math')", &ctx()).unwrap(), json!(true));
        assert_eq!(eval("data|contains('age')", &ctx()).unwrap(), json!(true));
        assert_eq!(eval("data|contains('height')", &ctx()).unwrap(), json!(false));
    }

    #[test]
    fn test_object_transforms() {
        let merged = eval("data|merge({fromScript: true})|omit('name', ['csv'])", &ctx()).unwrap();
        assert_eq!(
            merged,
            json!({ "age": 36, "tags": ["math", "poetry"], "fromScript": true })
        );

        let set = eval("data|set('age', 37)", &ctx()).unwrap();
        assert_eq!(set["age"], json!(37.0));
        assert_eq!(set["name"], json!("  Ada Lovelace "));

        let keys = eval("data|set('x', 1)|keys|length", &ctx()).unwrap();
        assert_eq!(keys, json!(5.0));
    }

    #[test]
    fn test_merge_rejects_non_object_subject() {
        let err = eval("data.age|merge({a: 1})", &ctx()).unwrap_err();
        assert!(matches!(err, SandboxError::Eval(_)));
    }

    #[test]
    fn test_conversions() {
        let ctx = json!({ "data": { "n": "14", "b": true } });
        assert_eq!(eval("data.n|number + 1", &ctx).unwrap(), json!(15.0));
        assert_eq!(eval("data.b|number", &ctx).unwrap(), json!(1.0));
        assert_eq!(eval("data.b|string", &ctx).unwrap(), json!("true"));
        assert!(eval("'abc'|number", &ctx).is_err());
    }

    #[test]
    fn test_fail_raises_eval_error_with_message() {
        let err = eval("'bad input'|fail", &ctx()).unwrap_err();
        match err {
            SandboxError::Eval(msg) => assert!(msg.contains("bad input")),
            other => panic!("expected eval error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_is_classified() {
        let err = eval("data.age >=", &ctx()).unwrap_err();
        assert!(matches!(err, SandboxError::Parse(_)));
    }

    #[test]
    fn test_not_and_truthiness() {
        assert_eq!(eval("(data.age)|not", &ctx()).unwrap(), json!(false));
        assert!(truthy(&json!("x")));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(null)));
    }

    #[test]
    fn test_render() {
        assert_eq!(render(&json!("raw")), "raw");
        assert_eq!(render(&json!(3.0)), "3");
        assert_eq!(render(&json!(2.5)), "2.5");
        assert_eq!(render(&json!(7)), "7");
        assert_eq!(render(&json!(null)), "null");
        assert_eq!(render(&json!(false)), "false");
        assert_eq!(render(&json!({ "a": [1, 2] })), r#"{"a":[1,2]}"#);
    }

    #[test]
    fn test_normalize_numbers() {
        let value = normalize_numbers(json!({ "a": 3.0, "b": [1.5, 2.0], "c": "x" }));
        assert_eq!(value, json!({ "a": 3, "b": [1.5, 2], "c": "x" }));
    }
}
