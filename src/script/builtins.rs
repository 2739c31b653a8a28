//! Intrinsics available to every script body, plus the methods dispatched on
//! arrays, strings and numbers.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::fault::{ErrorKind, Fault};
use super::interp::Interpreter;
use super::value::{Value, format_number, join_array};

pub(super) fn install(interp: &mut Interpreter) {
    interp.define_global("NaN", Value::Number(f64::NAN));
    interp.define_global("Infinity", Value::Number(f64::INFINITY));
    interp.define_global("Math", math());
    interp.define_global("JSON", json());
    interp.define_global("Object", object_namespace());
    interp.define_global(
        "Array",
        namespace([(
            "isArray",
            Value::native("isArray", |_, args| {
                Ok(Value::Bool(matches!(arg(&args, 0), Value::Array(_))))
            }),
        )]),
    );
    interp.define_global(
        "String",
        Value::native("String", |_, args| Ok(Value::string(arg(&args, 0).to_js_string()))),
    );
    interp.define_global(
        "Number",
        Value::native("Number", |_, args| {
            Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
        }),
    );
    interp.define_global(
        "Boolean",
        Value::native("Boolean", |_, args| Ok(Value::Bool(arg(&args, 0).is_truthy()))),
    );
    interp.define_global(
        "isNaN",
        Value::native("isNaN", |_, args| Ok(Value::Bool(arg(&args, 0).to_number().is_nan()))),
    );
    interp.define_global("parseInt", Value::native("parseInt", |_, args| Ok(parse_int(&args))));
    interp.define_global(
        "parseFloat",
        Value::native("parseFloat", |_, args| {
            Ok(Value::Number(parse_float_prefix(&arg(&args, 0).to_js_string())))
        }),
    );

    for kind in [ErrorKind::Error, ErrorKind::TypeError, ErrorKind::RangeError] {
        let name = kind.name();
        interp.define_global(
            name,
            Value::constructor(name, move |_, args| {
                let message = match args.first() {
                    Some(Value::Undefined) | None => String::new(),
                    Some(value) => value.to_js_string(),
                };
                Ok(Value::error_object(name, &message))
            }),
        );
    }
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Undefined)
}

fn namespace<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::object(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

fn math() -> Value {
    fn unary(name: &'static str, f: fn(f64) -> f64) -> (&'static str, Value) {
        (
            name,
            Value::native(name, move |_, args| Ok(Value::Number(f(arg(&args, 0).to_number())))),
        )
    }

    let mut props: BTreeMap<String, Value> = [
        unary("abs", f64::abs),
        unary("floor", f64::floor),
        unary("ceil", f64::ceil),
        // Halves round towards +Infinity, unlike f64::round.
        unary("round", |n| (n + 0.5).floor()),
        unary("trunc", f64::trunc),
        unary("sqrt", f64::sqrt),
        unary("sign", |n| if n == 0.0 || n.is_nan() { n } else { n.signum() }),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    props.insert(
        "pow".into(),
        Value::native("pow", |_, args| {
            Ok(Value::Number(arg(&args, 0).to_number().powf(arg(&args, 1).to_number())))
        }),
    );
    props.insert(
        "min".into(),
        Value::native("min", |_, args| {
            Ok(Value::Number(fold_numbers(&args, f64::INFINITY, f64::min)))
        }),
    );
    props.insert(
        "max".into(),
        Value::native("max", |_, args| {
            Ok(Value::Number(fold_numbers(&args, f64::NEG_INFINITY, f64::max)))
        }),
    );
    props.insert("PI".into(), Value::Number(std::f64::consts::PI));
    props.insert("E".into(), Value::Number(std::f64::consts::E));
    Value::object(props)
}

fn fold_numbers(args: &[Value], init: f64, f: fn(f64, f64) -> f64) -> f64 {
    let mut acc = init;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = f(acc, n);
    }
    acc
}

fn json() -> Value {
    namespace([
        (
            "stringify",
            Value::native("stringify", |_, args| {
                let value = arg(&args, 0);
                let indent = match arg(&args, 2) {
                    Value::Number(n) if n >= 1.0 => " ".repeat(n.min(10.0) as usize),
                    Value::Str(s) => s.chars().take(10).collect(),
                    _ => String::new(),
                };
                let Some(json) = value.to_json()? else {
                    return Ok(Value::Undefined);
                };
                let text = if indent.is_empty() {
                    serde_json::to_string(&json)
                } else {
                    to_string_indented(&json, &indent)
                };
                text.map(Value::string)
                    .map_err(|e| Fault::type_error(e.to_string()))
            }),
        ),
        (
            "parse",
            Value::native("parse", |_, args| {
                let text = arg(&args, 0).to_js_string();
                serde_json::from_str::<serde_json::Value>(&text)
                    .map(Value::from)
                    .map_err(|e| Fault::syntax_error(format!("JSON.parse: {}", e)))
            }),
        ),
    ])
}

fn to_string_indented(json: &serde_json::Value, indent: &str) -> serde_json::Result<String> {
    use serde::Serialize;

    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    json.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn object_namespace() -> Value {
    fn entries_of(value: &Value) -> Vec<(String, Value)> {
        match value {
            Value::Object(props) => props
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Value::Array(items) => items
                .borrow()
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    namespace([
        (
            "keys",
            Value::native("keys", |_, args| {
                Ok(Value::array(
                    entries_of(&arg(&args, 0))
                        .into_iter()
                        .map(|(k, _)| Value::string(k))
                        .collect(),
                ))
            }),
        ),
        (
            "values",
            Value::native("values", |_, args| {
                Ok(Value::array(
                    entries_of(&arg(&args, 0)).into_iter().map(|(_, v)| v).collect(),
                ))
            }),
        ),
        (
            "entries",
            Value::native("entries", |_, args| {
                Ok(Value::array(
                    entries_of(&arg(&args, 0))
                        .into_iter()
                        .map(|(k, v)| Value::array(vec![Value::string(k), v]))
                        .collect(),
                ))
            }),
        ),
    ])
}

fn parse_int(args: &[Value]) -> Value {
    let text = arg(args, 0).to_js_string();
    let mut s = text.trim_start();
    let negative = s.starts_with('-');
    if negative || s.starts_with('+') {
        s = &s[1..];
    }
    let mut radix = match arg(args, 1) {
        Value::Undefined => 10,
        r => r.to_number() as u32,
    };
    if (radix == 16 || (radix == 10 && arg(args, 1).is_nullish()))
        && (s.starts_with("0x") || s.starts_with("0X"))
    {
        s = &s[2..];
        radix = 16;
    }
    if !(2..=36).contains(&radix) {
        return Value::Number(f64::NAN);
    }
    let digits: String = s.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return Value::Number(f64::NAN);
    }
    let magnitude = digits
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
    Value::Number(if negative { -magnitude } else { magnitude })
}

/// Longest numeric prefix, as `parseFloat` reads it.
fn parse_float_prefix(text: &str) -> f64 {
    let s = text.trim_start();
    for prefix in ["Infinity", "+Infinity"] {
        if s.starts_with(prefix) {
            return f64::INFINITY;
        }
    }
    if s.starts_with("-Infinity") {
        return f64::NEG_INFINITY;
    }
    let mut best = f64::NAN;
    for (i, c) in s.char_indices() {
        if !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) {
            break;
        }
        if let Ok(n) = s[..i + c.len_utf8()].parse::<f64>() {
            best = n;
        }
    }
    best
}

// --- methods ---

fn index_arg(value: &Value, len: usize, default: usize) -> usize {
    match value {
        Value::Undefined => default,
        v => {
            let n = v.to_number();
            if n.is_nan() {
                0
            } else if n < 0.0 {
                (len as f64 + n).max(0.0) as usize
            } else {
                (n as usize).min(len)
            }
        }
    }
}

/// Calls `callback(item, index, array)` and returns its result.
fn invoke(
    interp: &mut Interpreter,
    callback: &Value,
    item: Value,
    index: usize,
    array: &Rc<RefCell<Vec<Value>>>,
) -> Result<Value, Fault> {
    interp.call(
        callback,
        vec![item, Value::Number(index as f64), Value::Array(Rc::clone(array))],
    )
}

fn require_callback(args: &[Value], method: &str) -> Result<Value, Fault> {
    match args.first() {
        Some(f @ Value::Function(_)) => Ok(f.clone()),
        Some(other) => Err(Fault::type_error(format!(
            "{} is not a function (in Array.prototype.{})",
            other.inspect(),
            method
        ))),
        None => Err(Fault::type_error(format!(
            "undefined is not a function (in Array.prototype.{})",
            method
        ))),
    }
}

/// `Some` when `name` is an array method. Callbacks run against a snapshot
/// so they may mutate the array freely.
pub(super) fn array_method(
    interp: &mut Interpreter,
    items: &Rc<RefCell<Vec<Value>>>,
    name: &str,
    args: &[Value],
) -> Result<Option<Value>, Fault> {
    let snapshot = || items.borrow().clone();
    let value = match name {
        "push" => {
            let mut items = items.borrow_mut();
            items.extend(args.iter().cloned());
            Value::Number(items.len() as f64)
        }
        "pop" => items.borrow_mut().pop().unwrap_or(Value::Undefined),
        "shift" => {
            let mut items = items.borrow_mut();
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        }
        "includes" => {
            let needle = arg(args, 0);
            Value::Bool(items.borrow().iter().any(|v| {
                v.strict_equals(&needle)
                    || matches!((v, &needle), (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan())
            }))
        }
        "indexOf" => {
            let needle = arg(args, 0);
            let position = items.borrow().iter().position(|v| v.strict_equals(&needle));
            Value::Number(position.map_or(-1.0, |i| i as f64))
        }
        "join" => {
            let separator = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                sep => sep.to_js_string(),
            };
            Value::string(join_array(items, &separator))
        }
        "slice" => {
            let items = items.borrow();
            let start = index_arg(&arg(args, 0), items.len(), 0);
            let end = index_arg(&arg(args, 1), items.len(), items.len());
            Value::array(items.get(start..end.max(start)).unwrap_or_default().to_vec())
        }
        "concat" => {
            let mut out = snapshot();
            for value in args {
                match value {
                    Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Value::array(out)
        }
        "reverse" => {
            items.borrow_mut().reverse();
            Value::Array(Rc::clone(items))
        }
        "map" => {
            let callback = require_callback(args, name)?;
            let mut out = Vec::new();
            for (i, item) in snapshot().into_iter().enumerate() {
                out.push(invoke(interp, &callback, item, i, items)?);
            }
            Value::array(out)
        }
        "filter" => {
            let callback = require_callback(args, name)?;
            let mut out = Vec::new();
            for (i, item) in snapshot().into_iter().enumerate() {
                if invoke(interp, &callback, item.clone(), i, items)?.is_truthy() {
                    out.push(item);
                }
            }
            Value::array(out)
        }
        "forEach" => {
            let callback = require_callback(args, name)?;
            for (i, item) in snapshot().into_iter().enumerate() {
                invoke(interp, &callback, item, i, items)?;
            }
            Value::Undefined
        }
        "some" | "every" => {
            let callback = require_callback(args, name)?;
            let want = name == "some";
            for (i, item) in snapshot().into_iter().enumerate() {
                if invoke(interp, &callback, item, i, items)?.is_truthy() == want {
                    return Ok(Some(Value::Bool(want)));
                }
            }
            Value::Bool(!want)
        }
        "find" | "findIndex" => {
            let callback = require_callback(args, name)?;
            for (i, item) in snapshot().into_iter().enumerate() {
                if invoke(interp, &callback, item.clone(), i, items)?.is_truthy() {
                    return Ok(Some(if name == "find" {
                        item
                    } else {
                        Value::Number(i as f64)
                    }));
                }
            }
            if name == "find" {
                Value::Undefined
            } else {
                Value::Number(-1.0)
            }
        }
        "reduce" => {
            let callback = require_callback(args, name)?;
            let mut iter = snapshot().into_iter().enumerate();
            let mut acc = match args.get(1) {
                Some(init) => init.clone(),
                None => match iter.next() {
                    Some((_, first)) => first,
                    None => {
                        return Err(Fault::type_error("Reduce of empty array with no initial value"));
                    }
                },
            };
            for (i, item) in iter {
                acc = interp.call(
                    &callback,
                    vec![acc, item, Value::Number(i as f64), Value::Array(Rc::clone(items))],
                )?;
            }
            acc
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

pub(super) fn string_method(s: &str, name: &str, args: &[Value]) -> Result<Option<Value>, Fault> {
    let text_arg = |i: usize| arg(args, i).to_js_string();
    let chars: Vec<char> = s.chars().collect();
    let value = match name {
        "includes" => Value::Bool(s.contains(&text_arg(0))),
        "startsWith" => Value::Bool(s.starts_with(&text_arg(0))),
        "endsWith" => Value::Bool(s.ends_with(&text_arg(0))),
        "indexOf" => {
            let position = s
                .find(&text_arg(0))
                .map(|byte| s[..byte].chars().count() as f64);
            Value::Number(position.unwrap_or(-1.0))
        }
        "slice" | "substring" => {
            let start = index_arg(&arg(args, 0), chars.len(), 0);
            let end = index_arg(&arg(args, 1), chars.len(), chars.len());
            Value::string(chars[start..end.max(start)].iter().collect::<String>())
        }
        "charAt" => {
            let i = arg(args, 0).to_number();
            let c = if i >= 0.0 { chars.get(i as usize) } else { None };
            Value::string(c.map(char::to_string).unwrap_or_default())
        }
        "toUpperCase" => Value::string(s.to_uppercase()),
        "toLowerCase" => Value::string(s.to_lowercase()),
        "trim" => Value::string(s.trim()),
        "split" => match arg(args, 0) {
            Value::Undefined => Value::array(vec![Value::string(s)]),
            sep => {
                let sep = sep.to_js_string();
                let parts: Vec<Value> = if sep.is_empty() {
                    chars.iter().map(|c| Value::string(c.to_string())).collect()
                } else {
                    s.split(sep.as_str()).map(Value::string).collect()
                };
                Value::array(parts)
            }
        },
        "replace" => Value::string(s.replacen(&text_arg(0), &text_arg(1), 1)),
        "replaceAll" => Value::string(s.replace(&text_arg(0), &text_arg(1))),
        "repeat" => {
            let count = arg(args, 0).to_number();
            if count < 0.0 || count.is_infinite() || count * s.len() as f64 > (1 << 24) as f64 {
                return Err(Fault::range_error(format!(
                    "Invalid count value: {}",
                    format_number(count)
                )));
            }
            Value::string(s.repeat(count as usize))
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

pub(super) fn number_method(n: f64, name: &str, args: &[Value]) -> Result<Option<Value>, Fault> {
    let value = match name {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0.0 } else { digits };
            if !(0.0..=100.0).contains(&digits) {
                return Err(Fault::range_error("toFixed() digits argument must be between 0 and 100"));
            }
            Value::string(format!("{:.*}", digits as usize, n))
        }
        "toString" => Value::string(format_number(n)),
        _ => return Ok(None),
    };
    Ok(Some(value))
}
