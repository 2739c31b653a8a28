use std::collections::BTreeMap;

use thiserror::Error;

use crate::script::{ErrorKind, Fault, Value};

/// Raised by a failed [`Expectation`]. Aborts the enclosing test body only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AssertionError {
    pub message: String,
}

impl AssertionError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The assertion factory handed to native test bodies.
pub type ExpectFn = fn(Value) -> Expectation;

/// Wraps an actual value; each check either passes or returns an [`AssertionError`].
#[derive(Debug, Clone)]
pub struct Expectation {
    actual: Value,
}

pub fn expect(actual: impl Into<Value>) -> Expectation {
    Expectation {
        actual: actual.into(),
    }
}

/// [`expect`] with the signature of [`ExpectFn`].
pub fn factory(actual: Value) -> Expectation {
    Expectation { actual }
}

impl Expectation {
    /// Strict equality: same type and value, identity for arrays and objects.
    pub fn to_be(&self, expected: impl Into<Value>) -> Result<(), AssertionError> {
        let expected = expected.into();
        if self.actual.strict_equals(&expected) {
            return Ok(());
        }
        Err(AssertionError::new(format!(
            "Expected {} toBe {}",
            self.actual.inspect(),
            expected.inspect()
        )))
    }

    /// Deep structural equality; object key order is irrelevant.
    pub fn to_equal(&self, expected: impl Into<Value>) -> Result<(), AssertionError> {
        let expected = expected.into();
        if self.actual.deep_equals(&expected) {
            return Ok(());
        }
        Err(AssertionError::new(format!(
            "Expected {} toEqual {}",
            self.actual.inspect(),
            expected.inspect()
        )))
    }

    pub fn to_be_truthy(&self) -> Result<(), AssertionError> {
        if self.actual.is_truthy() {
            return Ok(());
        }
        Err(AssertionError::new(format!(
            "Expected {} toBeTruthy",
            self.actual.inspect()
        )))
    }

    pub fn to_be_falsy(&self) -> Result<(), AssertionError> {
        if !self.actual.is_truthy() {
            return Ok(());
        }
        Err(AssertionError::new(format!(
            "Expected {} toBeFalsy",
            self.actual.inspect()
        )))
    }
}

impl From<AssertionError> for Fault {
    fn from(err: AssertionError) -> Self {
        Fault::new(ErrorKind::AssertionError, err.message)
    }
}

/// `expect` as a script global: `expect(actual)` returns an object carrying
/// `toBe`, `toEqual`, `toBeTruthy` and `toBeFalsy`.
pub fn script_binding() -> Value {
    Value::native("expect", |_, args| {
        let expectation = expect(args.into_iter().next().unwrap_or(Value::Undefined));

        let mut methods = BTreeMap::new();
        let e = expectation.clone();
        methods.insert(
            "toBe".to_string(),
            Value::native("toBe", move |_, args| {
                e.to_be(first(args))?;
                Ok(Value::Undefined)
            }),
        );
        let e = expectation.clone();
        methods.insert(
            "toEqual".to_string(),
            Value::native("toEqual", move |_, args| {
                e.to_equal(first(args))?;
                Ok(Value::Undefined)
            }),
        );
        let e = expectation.clone();
        methods.insert(
            "toBeTruthy".to_string(),
            Value::native("toBeTruthy", move |_, _| {
                e.to_be_truthy()?;
                Ok(Value::Undefined)
            }),
        );
        let e = expectation;
        methods.insert(
            "toBeFalsy".to_string(),
            Value::native("toBeFalsy", move |_, _| {
                e.to_be_falsy()?;
                Ok(Value::Undefined)
            }),
        );
        Ok(Value::object(methods))
    })
}

fn first(args: Vec<Value>) -> Value {
    args.into_iter().next().unwrap_or(Value::Undefined)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::script::Interpreter;

    #[test]
    fn to_be_compares_strictly() {
        assert!(expect(3).to_be(3).is_ok());
        assert_eq!(
            expect(3).to_be(4).unwrap_err().message,
            "Expected 3 toBe 4"
        );
        assert_eq!(
            expect("1").to_be(1).unwrap_err().message,
            r#"Expected "1" toBe 1"#
        );
    }

    #[test]
    fn to_be_on_fresh_composites_fails() {
        let err = expect(vec![1, 2]).to_be(vec![1, 2]).unwrap_err();
        assert_eq!(err.message, "Expected [1, 2] toBe [1, 2]");
    }

    #[test]
    fn to_equal_is_structural() {
        assert!(expect(vec![1, 2]).to_equal(vec![1, 2]).is_ok());
        assert!(
            expect(json!({"a": 1, "b": 2}))
                .to_equal(json!({"b": 2, "a": 1}))
                .is_ok()
        );
        assert_eq!(
            expect(vec![1]).to_equal(vec![2]).unwrap_err().message,
            "Expected [1] toEqual [2]"
        );
    }

    #[test]
    fn truthiness_checks() {
        assert!(expect(0).to_be_truthy().is_err());
        assert!(expect(0).to_be_falsy().is_ok());
        assert!(expect("").to_be_falsy().is_ok());
        assert!(expect(Value::Null).to_be_falsy().is_ok());
        assert!(expect(f64::NAN).to_be_falsy().is_ok());
        assert!(expect(vec![0]).to_be_truthy().is_ok());
        assert_eq!(
            expect(0).to_be_truthy().unwrap_err().message,
            "Expected 0 toBeTruthy"
        );
    }

    #[test]
    fn script_binding_raises_assertion_errors() {
        let mut interp = Interpreter::new();
        interp.define_global("expect", script_binding());
        assert!(interp.run("expect(1 + 1).toBe(2)").is_ok());

        let err = interp
            .run("expect({ a: [1] }).toEqual({ a: [2] })")
            .unwrap_err();
        assert_eq!(err.to_string(), "Expected { a: [1] } toEqual { a: [2] }");

        let caught = interp
            .eval("let n; try { expect(1).toBeFalsy() } catch (e) { n = e.name }\nn")
            .unwrap();
        assert_eq!(caught.to_js_string(), "AssertionError");
    }
}
