use serde::{Deserialize, Serialize};

use crate::{
    comparator,
    execution::{AdapterRegistry, ExecutionAdapter, ExecutionOutcome, Invocation},
    language::Language,
    question::TestCase,
};

/// Shown as the actual output when an invocation produced nothing to judge.
pub const UNDEFINED_OUTPUT: &str = "undefined";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub passed: bool,
    pub description: String,
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
}

/// Runs test cases through the adapter registered for a language.
#[derive(Debug, Clone)]
pub struct TestHarness {
    registry: AdapterRegistry,
}

impl TestHarness {
    pub fn new(registry: AdapterRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Single invocation with raw output, for quick feedback.
    pub async fn execute(
        &self,
        code: &str,
        entry_point: &str,
        args: &str,
        language: Language,
    ) -> Vec<ExecutionOutcome> {
        match self.registry.get(language) {
            Ok(adapter) => adapter.execute(Invocation::new(code, entry_point, args)).await,
            Err(e) => vec![ExecutionOutcome::error(e.to_string())],
        }
    }

    pub async fn run_all(
        &self,
        testcases: &[TestCase],
        code: &str,
        entry_point: &str,
        language: Language,
    ) -> Vec<TestResult> {
        self.run_all_with(testcases, code, entry_point, language, |_, _| {})
            .await
    }

    /// Like [`run_all`](Self::run_all), reporting each result as soon as it is judged.
    ///
    /// Cases run strictly one after another: an interpreter's output sink is
    /// shared, so overlapping invocations would mix their captured lines.
    pub async fn run_all_with<F>(
        &self,
        testcases: &[TestCase],
        code: &str,
        entry_point: &str,
        language: Language,
        mut on_result: F,
    ) -> Vec<TestResult>
    where
        F: FnMut(usize, &TestResult) + Send,
    {
        let adapter = match self.registry.get(language) {
            Ok(adapter) => adapter.clone(),
            Err(e) => {
                let msg = e.to_string();
                return testcases
                    .iter()
                    .enumerate()
                    .map(|(i, t)| {
                        let res = Self::failed(t, msg.clone());
                        on_result(i, &res);
                        res
                    })
                    .collect();
            }
        };

        let mut results = Vec::with_capacity(testcases.len());
        for (i, t) in testcases.iter().enumerate() {
            let outcomes = adapter
                .execute(Invocation::new(code, entry_point, &t.input))
                .await;
            let res = Self::judge(adapter.as_ref(), t, &outcomes, language);
            log::debug!(
                "case #{} {}: actual={}",
                i + 1,
                if res.passed { "passed" } else { "failed" },
                res.actual_output
            );
            on_result(i, &res);
            results.push(res);
        }
        results
    }

    pub fn judge(
        adapter: &dyn ExecutionAdapter,
        testcase: &TestCase,
        outcomes: &[ExecutionOutcome],
        language: Language,
    ) -> TestResult {
        let actual = adapter
            .extract_actual(outcomes)
            .unwrap_or_else(|| UNDEFINED_OUTPUT.to_owned());
        let errored = outcomes.iter().any(ExecutionOutcome::is_error);
        let passed = !errored && comparator::matches(&actual, &testcase.expected_output, language);
        TestResult {
            passed,
            description: testcase.description.clone(),
            input: testcase.input.clone(),
            expected_output: testcase.expected_output.clone(),
            actual_output: actual,
        }
    }

    fn failed(testcase: &TestCase, actual: String) -> TestResult {
        TestResult {
            passed: false,
            description: testcase.description.clone(),
            input: testcase.input.clone(),
            expected_output: testcase.expected_output.clone(),
            actual_output: actual,
        }
    }
}

pub fn count_passed(results: &[TestResult]) -> usize {
    results.iter().filter(|r| r.passed).count()
}
