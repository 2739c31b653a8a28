use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::Rc;

use super::ast::FunctionDef;
use super::fault::Fault;
use super::interp::{Env, Interpreter};

pub type NativeFn = Rc<dyn Fn(&mut Interpreter, Vec<Value>) -> Result<Value, Fault>>;

/// A runtime value of the script language.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    /// Keys are kept sorted, so property order never affects equality or output.
    Object(Rc<RefCell<BTreeMap<String, Value>>>),
    Function(Rc<Callable>),
}

pub enum Callable {
    Closure {
        def: Rc<FunctionDef>,
        env: Env,
    },
    Native {
        name: String,
        /// Usable with `new` (the error constructors).
        constructor: bool,
        func: NativeFn,
    },
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::Closure { def, .. } => def.name.as_deref().unwrap_or(""),
            Callable::Native { name, .. } => name,
        }
    }
}

/// Nesting depth past which rendering switches to `[Array]` / `[Object]`.
const INSPECT_DEPTH: usize = 6;

/// Deepest structure `JSON.stringify` will serialize.
const MAX_JSON_DEPTH: usize = 512;

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(props: BTreeMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(props)))
    }

    pub fn native(
        name: impl Into<String>,
        func: impl Fn(&mut Interpreter, Vec<Value>) -> Result<Value, Fault> + 'static,
    ) -> Self {
        Value::Function(Rc::new(Callable::Native {
            name: name.into(),
            constructor: false,
            func: Rc::new(func),
        }))
    }

    pub fn constructor(
        name: impl Into<String>,
        func: impl Fn(&mut Interpreter, Vec<Value>) -> Result<Value, Fault> + 'static,
    ) -> Self {
        Value::Function(Rc::new(Callable::Native {
            name: name.into(),
            constructor: true,
            func: Rc::new(func),
        }))
    }

    /// An `Error`-shaped object: `{ name, message }`.
    pub fn error_object(name: &str, message: &str) -> Self {
        let mut props = BTreeMap::new();
        props.insert("name".to_string(), Value::string(name));
        props.insert("message".to_string(), Value::string(message));
        Value::object(props)
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) => "function",
        }
    }

    /// Falsy values: `false`, `0`, `-0`, `NaN`, `""`, `null`, `undefined`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => parse_number(s),
            Value::Array(_) | Value::Object(_) => parse_number(&self.to_js_string()),
            Value::Function(_) => f64::NAN,
        }
    }

    /// String conversion as performed by concatenation and template literals.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Array(items) => join_array(items, ","),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(f) => format!("function {}() {{ [code] }}", f.name()),
        }
    }

    /// Human-readable rendering used in assertion messages.
    pub fn inspect(&self) -> String {
        let mut out = String::new();
        self.inspect_into(&mut out, 0);
        out
    }

    fn inspect_into(&self, out: &mut String, depth: usize) {
        match self {
            Value::Str(s) => out.push_str(&serde_json::Value::String(s.to_string()).to_string()),
            Value::Array(items) => {
                if depth >= INSPECT_DEPTH {
                    out.push_str("[Array]");
                    return;
                }
                out.push('[');
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.inspect_into(out, depth + 1);
                }
                out.push(']');
            }
            Value::Object(props) => {
                if depth >= INSPECT_DEPTH {
                    out.push_str("[Object]");
                    return;
                }
                let props = props.borrow();
                if props.is_empty() {
                    out.push_str("{}");
                    return;
                }
                out.push_str("{ ");
                for (i, (key, value)) in props.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if is_plain_key(key) {
                        out.push_str(key);
                    } else {
                        out.push_str(&serde_json::Value::String(key.clone()).to_string());
                    }
                    out.push_str(": ");
                    value.inspect_into(out, depth + 1);
                }
                out.push_str(" }");
            }
            Value::Function(f) if f.name().is_empty() => out.push_str("[Function (anonymous)]"),
            Value::Function(f) => {
                out.push_str("[Function: ");
                out.push_str(f.name());
                out.push(']');
            }
            other => out.push_str(&other.to_js_string()),
        }
    }

    /// Message carried by a thrown value: `message` of an error-like object,
    /// otherwise the value's string form.
    pub fn error_message(&self) -> String {
        if let Value::Object(props) = self
            && let Some(Value::Str(message)) = props.borrow().get("message")
        {
            return message.to_string();
        }
        self.to_js_string()
    }

    /// `===`: same type and value, identity for composite values.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==` with the usual coercions between numbers, strings and booleans.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::Bool(_), _) | (_, Value::Bool(_)) => {
                Value::Number(self.to_number()).loose_equals(&Value::Number(other.to_number()))
            }
            (Value::Number(a), Value::Str(_)) => *a == other.to_number(),
            (Value::Str(_), Value::Number(b)) => self.to_number() == *b,
            (Value::Array(_) | Value::Object(_), Value::Number(_) | Value::Str(_)) => {
                Value::string(self.to_js_string()).loose_equals(other)
            }
            (Value::Number(_) | Value::Str(_), Value::Array(_) | Value::Object(_)) => {
                self.loose_equals(&Value::string(other.to_js_string()))
            }
            _ => self.strict_equals(other),
        }
    }

    /// Structural equality: arrays element-wise, objects by key set and values
    /// regardless of insertion order, `NaN` equal to itself. Properties holding
    /// `undefined` are treated as absent.
    pub fn deep_equals(&self, other: &Value) -> bool {
        deep_equals(self, other, &mut HashSet::new())
    }

    /// JSON form, `None` for values JSON cannot represent (`undefined`, functions).
    /// A value that contains itself is a `TypeError`.
    pub fn to_json(&self) -> Result<Option<serde_json::Value>, Fault> {
        self.to_json_guarded(&mut Vec::new())
    }

    fn to_json_guarded(
        &self,
        ancestors: &mut Vec<usize>,
    ) -> Result<Option<serde_json::Value>, Fault> {
        let ptr = match self {
            Value::Array(items) => Rc::as_ptr(items) as usize,
            Value::Object(props) => Rc::as_ptr(props) as usize,
            Value::Undefined | Value::Function(_) => return Ok(None),
            Value::Null => return Ok(Some(serde_json::Value::Null)),
            Value::Bool(b) => return Ok(Some(serde_json::Value::Bool(*b))),
            Value::Number(n) => return Ok(Some(json_number(*n))),
            Value::Str(s) => return Ok(Some(serde_json::Value::String(s.to_string()))),
        };
        if ancestors.contains(&ptr) {
            return Err(Fault::type_error("Converting circular structure to JSON"));
        }
        if ancestors.len() >= MAX_JSON_DEPTH {
            return Err(Fault::range_error("Maximum call stack size exceeded"));
        }

        ancestors.push(ptr);
        let json = match self {
            Value::Array(items) => {
                let mut out = Vec::new();
                for item in items.borrow().iter() {
                    out.push(item.to_json_guarded(ancestors)?.unwrap_or(serde_json::Value::Null));
                }
                serde_json::Value::Array(out)
            }
            Value::Object(props) => {
                let mut out = serde_json::Map::new();
                for (key, value) in props.borrow().iter() {
                    if let Some(json) = value.to_json_guarded(ancestors)? {
                        out.insert(key.clone(), json);
                    }
                }
                serde_json::Value::Object(out)
            }
            _ => serde_json::Value::Null,
        };
        ancestors.pop();
        Ok(Some(json))
    }
}

/// `Array.prototype.join`: nullish elements render as `""`, and so does an
/// array that is already being joined further up.
pub fn join_array(items: &Rc<RefCell<Vec<Value>>>, separator: &str) -> String {
    join_guarded(items, separator, &mut Vec::new())
}

fn join_guarded(
    items: &Rc<RefCell<Vec<Value>>>,
    separator: &str,
    joining: &mut Vec<*const RefCell<Vec<Value>>>,
) -> String {
    let ptr = Rc::as_ptr(items);
    if joining.contains(&ptr) {
        return String::new();
    }
    joining.push(ptr);
    let parts: Vec<String> = items
        .borrow()
        .iter()
        .map(|v| match v {
            Value::Undefined | Value::Null => String::new(),
            Value::Array(inner) => join_guarded(inner, ",", joining),
            other => other.to_js_string(),
        })
        .collect();
    joining.pop();
    parts.join(separator)
}

fn deep_equals(a: &Value, b: &Value, seen: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::Array(x), Value::Array(y)) => {
            if Rc::ptr_eq(x, y) || !seen.insert((Rc::as_ptr(x) as usize, Rc::as_ptr(y) as usize)) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| deep_equals(l, r, seen))
        }
        (Value::Object(x), Value::Object(y)) => {
            if Rc::ptr_eq(x, y) || !seen.insert((Rc::as_ptr(x) as usize, Rc::as_ptr(y) as usize)) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            let defined = |m: &BTreeMap<String, Value>| {
                m.iter()
                    .filter(|(_, v)| !matches!(v, Value::Undefined))
                    .map(|(k, _)| k.clone())
                    .collect::<Vec<_>>()
            };
            let keys = defined(&*x);
            keys == defined(&*y) && keys.iter().all(|k| deep_equals(&x[k], &y[k], seen))
        }
        _ => a.strict_equals(b),
    }
}

fn json_number(n: f64) -> serde_json::Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Number to string the way the script language prints numbers:
/// integers without a fractional part, `NaN`, `Infinity`, exponents for
/// very large and very small magnitudes.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if !(1e-6..1e21).contains(&abs) {
        let s = format!("{:e}", n);
        return match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => s,
        };
    }
    if n.fract() == 0.0 && abs < 9.007_199_254_740_992e15 {
        return format!("{}", n as i64);
    }
    format!("{}", n)
}

fn parse_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN);
    }
    match t {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust accepts spellings like "inf" and "nan" that the script language does not.
        _ if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => t.parse().unwrap_or(f64::NAN),
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! from_integer {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Number(n as f64)
            }
        })*
    };
}

from_integer!(i32, i64, u32, u64, usize);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        for falsy in [
            Value::Bool(false),
            Value::Number(0.0),
            Value::Number(-0.0),
            Value::Number(f64::NAN),
            Value::string(""),
            Value::Null,
            Value::Undefined,
        ] {
            assert!(!falsy.is_truthy(), "{} should be falsy", falsy);
        }
        for truthy in [
            Value::Bool(true),
            Value::Number(-1.0),
            Value::string("0"),
            Value::array(vec![]),
            Value::object(BTreeMap::new()),
        ] {
            assert!(truthy.is_truthy(), "{} should be truthy", truthy);
        }
    }

    #[test]
    fn strict_equality_uses_identity_for_composites() {
        let a = Value::from(vec![1, 2]);
        assert!(a.strict_equals(&a.clone()));
        assert!(!a.strict_equals(&Value::from(vec![1, 2])));
        assert!(!Value::from(1).strict_equals(&Value::from("1")));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
    }

    #[test]
    fn deep_equality_ignores_key_order() {
        let a = Value::from(json!({"a": 1, "b": [1, {"c": true}]}));
        let b = Value::from(json!({"b": [1, {"c": true}], "a": 1}));
        assert!(a.deep_equals(&b));
        assert!(!Value::from(vec![1, 2]).deep_equals(&Value::from(vec![2, 1])));
        assert!(Value::Number(f64::NAN).deep_equals(&Value::Number(f64::NAN)));
    }

    #[test]
    fn deep_equality_survives_cycles() {
        let a = Value::array(vec![]);
        if let Value::Array(items) = &a {
            items.borrow_mut().push(a.clone());
        }
        let b = Value::array(vec![]);
        if let Value::Array(items) = &b {
            items.borrow_mut().push(b.clone());
        }
        assert!(a.deep_equals(&b));
    }

    #[test]
    fn loose_equality_coerces() {
        assert!(Value::from(1).loose_equals(&Value::from("1")));
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.loose_equals(&Value::from(0)));
        assert!(Value::Bool(true).loose_equals(&Value::from(1)));
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn inspect_renders_readably() {
        let v = Value::from(json!({"b": "x", "a": [1, null], "c d": {}}));
        assert_eq!(v.inspect(), r#"{ a: [1, null], b: "x", "c d": {} }"#);
        assert_eq!(Value::from(vec![1, 2]).to_js_string(), "1,2");
    }

    #[test]
    fn string_to_number() {
        assert_eq!(Value::from(" 42 ").to_number(), 42.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert!(Value::from("nan").to_number().is_nan());
        assert!(Value::from("12px").to_number().is_nan());
    }

    #[test]
    fn cyclic_arrays_join_the_repeat_as_empty() {
        let a = Value::from(vec![1]);
        let Value::Array(items) = &a else { unreachable!() };
        items.borrow_mut().push(a.clone());
        items.borrow_mut().push(Value::from(2));

        assert_eq!(a.to_js_string(), "1,,2");
        assert_eq!(join_array(items, "-"), "1--2");
        assert!(a.loose_equals(&Value::from("1,,2")));
        assert_eq!(Fault::Thrown(a.clone()).to_string(), "1,,2");
        // Break the cycle so the test does not leak.
        items.borrow_mut().clear();
    }

    #[test]
    fn to_json_rejects_cycles_but_not_shared_values() {
        let shared = Value::from(vec![1]);
        let twice = Value::array(vec![shared.clone(), shared.clone()]);
        assert_eq!(twice.to_json().unwrap(), Some(json!([[1], [1]])));

        let o = Value::object(BTreeMap::new());
        let Value::Object(props) = &o else { unreachable!() };
        props.borrow_mut().insert("self".to_string(), o.clone());
        let err = o.to_json().unwrap_err();
        assert_eq!(err.to_string(), "Converting circular structure to JSON");
        props.borrow_mut().clear();
    }

    #[test]
    fn error_message_prefers_message_property() {
        assert_eq!(Value::error_object("Error", "boom").error_message(), "boom");
        assert_eq!(Value::from(42).error_message(), "42");
    }
}
