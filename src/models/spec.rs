use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::expect::ExpectFn;

/// A Rust closure used as a test body. It receives the assertion factory.
pub type NativeBody = Arc<dyn Fn(ExpectFn) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
pub enum TestBody {
    /// Source text run by the embedded evaluator.
    Script(String),
    Native(NativeBody),
    /// An input entry that could not be read; running it yields a failure
    /// carrying this reason.
    Malformed(String),
}

impl fmt::Debug for TestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestBody::Script(code) => f.debug_tuple("Script").field(code).finish(),
            TestBody::Native(_) => f.write_str("Native(..)"),
            TestBody::Malformed(reason) => f.debug_tuple("Malformed").field(reason).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestSpec {
    pub name: String,
    pub body: TestBody,
}

/// The `{ "name", "code" }` input entry.
#[derive(Debug, Serialize)]
pub struct WireSpec<'a> {
    pub name: &'a str,
    pub code: &'a str,
}

impl TestSpec {
    pub fn script(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: TestBody::Script(code.into()),
        }
    }

    pub fn native(
        name: impl Into<String>,
        body: impl Fn(ExpectFn) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            body: TestBody::Native(Arc::new(body)),
        }
    }

    pub fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: TestBody::Malformed(reason.into()),
        }
    }

    /// Input-file form, `None` for bodies that cannot leave the process.
    pub fn to_wire(&self) -> Option<WireSpec<'_>> {
        match &self.body {
            TestBody::Script(code) => Some(WireSpec {
                name: &self.name,
                code,
            }),
            TestBody::Native(_) | TestBody::Malformed(_) => None,
        }
    }

    /// Parse an input document: a JSON array of `{ "name", "code" }` objects.
    /// Entries that do not fit become malformed specs so the run can report
    /// them; only a document that is not an array is rejected.
    pub fn parse_list(text: &str) -> Result<Vec<TestSpec>, serde_json::Error> {
        let entries: Vec<serde_json::Value> = serde_json::from_str(text)?;
        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| Self::from_entry(i, entry))
            .collect())
    }

    fn from_entry(index: usize, entry: serde_json::Value) -> TestSpec {
        let placeholder = || format!("<unnamed test #{}>", index + 1);

        let serde_json::Value::Object(mut fields) = entry else {
            return Self::malformed(placeholder(), "test entry is not an object");
        };

        let name = match fields.remove("name") {
            Some(serde_json::Value::String(name)) if !name.trim().is_empty() => name,
            Some(serde_json::Value::String(_)) => {
                return Self::malformed(placeholder(), "test entry has an empty \"name\"");
            }
            Some(_) => {
                return Self::malformed(placeholder(), "test entry \"name\" must be a string");
            }
            None => return Self::malformed(placeholder(), "test entry is missing \"name\""),
        };

        match fields.remove("code") {
            Some(serde_json::Value::String(code)) => Self::script(name, code),
            Some(_) => Self::malformed(name, "test entry \"code\" must be a string"),
            None => Self::malformed(name, "test entry is missing \"code\""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_entries_in_order() {
        let specs =
            TestSpec::parse_list(r#"[{"name":"a","code":"x"},{"name":"b","code":"y"}]"#).unwrap();
        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert!(matches!(&specs[1].body, TestBody::Script(code) if code == "y"));
    }

    #[test]
    fn bad_entries_become_malformed_specs() {
        let specs = TestSpec::parse_list(
            r#"[{"code":"x"}, {"name":"", "code":"x"}, {"name":"c"}, 7, {"name":"d","code":1}]"#,
        )
        .unwrap();
        let reasons: Vec<_> = specs
            .iter()
            .map(|s| match &s.body {
                TestBody::Malformed(reason) => (s.name.as_str(), reason.as_str()),
                other => panic!("expected malformed, got {:?}", other),
            })
            .collect();
        assert_eq!(
            reasons,
            [
                ("<unnamed test #1>", "test entry is missing \"name\""),
                ("<unnamed test #2>", "test entry has an empty \"name\""),
                ("c", "test entry is missing \"code\""),
                ("<unnamed test #4>", "test entry is not an object"),
                ("d", "test entry \"code\" must be a string"),
            ]
        );
    }

    #[test]
    fn non_array_document_is_rejected() {
        assert!(TestSpec::parse_list(r#"{"name":"a","code":"x"}"#).is_err());
        assert!(TestSpec::parse_list("not json").is_err());
    }

    #[test]
    fn only_script_bodies_have_a_wire_form() {
        let script = TestSpec::script("a", "expect(1).toBe(1)");
        let wire = serde_json::to_string(&script.to_wire().unwrap()).unwrap();
        assert_eq!(wire, r#"{"name":"a","code":"expect(1).toBe(1)"}"#);
        assert!(TestSpec::native("n", |_| Ok(())).to_wire().is_none());
    }
}
