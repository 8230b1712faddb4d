use async_trait::async_trait;

use super::outcome::{ExecutionOutcome, OutcomeKind};
use crate::language::Language;

/// What to run: the candidate's source plus a call of its entry point.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub code: &'a str,
    pub entry_point: &'a str,
    /// Argument list text, substituted verbatim between the call parentheses.
    pub args: &'a str,
}

impl<'a> Invocation<'a> {
    pub fn new(code: &'a str, entry_point: &'a str, args: &'a str) -> Self {
        Self {
            code,
            entry_point,
            args,
        }
    }

    pub fn call_expr(&self) -> String {
        format!("{}({})", self.entry_point, self.args)
    }
}

/// Language binding that runs candidate code and captures its output.
#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    fn language(&self) -> Language;

    /// Runs `inv` and returns every captured line in order.
    /// Failures are reported as `error` lines, never as `Err`.
    async fn execute(&self, inv: Invocation<'_>) -> Vec<ExecutionOutcome>;

    /// Reduces captured output to the single value a test case is judged on.
    /// Returns `None` when the invocation produced nothing to judge.
    fn extract_actual(&self, outcomes: &[ExecutionOutcome]) -> Option<String> {
        if let Some(e) = outcomes.iter().rev().find(|o| o.is_error()) {
            return Some(e.content.clone());
        }
        outcomes
            .iter()
            .rev()
            .find(|o| o.kind == OutcomeKind::Result)
            .map(|o| o.content.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ExecutionAdapter for Echo {
        fn language(&self) -> Language {
            Language::JavaScript
        }

        async fn execute(&self, inv: Invocation<'_>) -> Vec<ExecutionOutcome> {
            vec![ExecutionOutcome::result(inv.args)]
        }
    }

    #[test]
    fn call_expr_substitutes_args_verbatim() {
        let inv = Invocation::new("", "flattenArray", "[[1,[2]], 3]");
        assert_eq!(inv.call_expr(), "flattenArray([[1,[2]], 3])");
    }

    #[test]
    fn default_extraction_prefers_error_then_last_result() {
        let a = Echo;
        let lines = vec![
            ExecutionOutcome::log("debug"),
            ExecutionOutcome::result("1"),
            ExecutionOutcome::result("2"),
        ];
        assert_eq!(a.extract_actual(&lines).as_deref(), Some("2"));

        let lines = vec![
            ExecutionOutcome::result("1"),
            ExecutionOutcome::error("TypeError: nope"),
        ];
        assert_eq!(a.extract_actual(&lines).as_deref(), Some("TypeError: nope"));

        assert_eq!(a.extract_actual(&[ExecutionOutcome::log("x")]), None);
    }
}
