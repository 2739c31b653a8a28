use crate::expect::ExpectFn;
use crate::models::{Report, TestSpec};
use crate::runner::engine::{self, EngineOptions};

/// Ordered collection of tests registered from Rust code.
///
/// ```
/// use selftest::{Suite, EngineOptions, Value};
///
/// let mut suite = Suite::new();
/// suite.selftest("adds", "expect(1 + 2).toBe(3)");
/// suite.native("concatenates", |expect| {
///     expect(Value::from(["a", "b"].concat())).to_be("ab")?;
///     Ok(())
/// });
/// let report = suite.run(&EngineOptions::default());
/// assert_eq!(report.summary.passed, 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Suite {
    specs: Vec<TestSpec>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a test whose body is script source.
    pub fn selftest(&mut self, name: impl Into<String>, code: impl Into<String>) -> &mut Self {
        self.specs.push(TestSpec::script(name, code));
        self
    }

    /// Register a Rust closure as a test body.
    pub fn native(
        &mut self,
        name: impl Into<String>,
        body: impl Fn(ExpectFn) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        self.specs.push(TestSpec::native(name, body));
        self
    }

    pub fn extend(&mut self, specs: impl IntoIterator<Item = TestSpec>) -> &mut Self {
        self.specs.extend(specs);
        self
    }

    pub fn specs(&self) -> &[TestSpec] {
        &self.specs
    }

    pub fn into_specs(self) -> Vec<TestSpec> {
        self.specs
    }

    /// Run the registered tests in this process.
    pub fn run(&self, options: &EngineOptions) -> Report {
        engine::run(&self.specs, options)
    }
}
