//! Run / Test / Submit workflow for one question.
//!
//! ```text
//! Editing ──run──▶ Running ──▶ (back to where it started)
//! Editing ──test─▶ TestsPending ──▶ TestsExecuted ──submit──▶ ConfirmPending ──confirm──▶ Submitted
//! any non-final phase ──timer expiry──▶ Submitted
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Local;

use crate::{
    execution::ExecutionOutcome,
    harness::{TestHarness, TestResult},
    language::Language,
    question::Question,
    submission::{Finalization, SubmissionRecord, SubmissionSink},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Phase {
    #[strum(serialize = "editing")]
    Editing,
    #[strum(serialize = "running")]
    Running,
    #[strum(serialize = "running tests")]
    TestsPending,
    #[strum(serialize = "tests executed")]
    TestsExecuted,
    #[strum(serialize = "confirming submission")]
    ConfirmPending,
    #[strum(serialize = "submitted")]
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    Edit,
    #[strum(serialize = "switch language")]
    SwitchLanguage,
    Run,
    Test,
    Submit,
    Confirm,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    #[error("Cannot {action} while {phase}")]
    Unavailable { action: Action, phase: Phase },

    #[error("Question {0} has already been submitted")]
    Submitted(u32),

    #[error("Language '{0}' is not offered for this question")]
    LanguageNotOffered(Language),
}

/// What the console shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleView {
    RawOutput(Vec<ExecutionOutcome>),
    Breakdown(Vec<TestResult>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleMode {
    RawOutput,
    Breakdown,
}

#[derive(Debug)]
struct Workspace {
    phase: Phase,
    language: Language,
    code: String,
    tests_executed: bool,
    results: Vec<TestResult>,
    tested_code: Option<String>,
    last_output: Vec<ExecutionOutcome>,
    console: ConsoleMode,
    record: Option<SubmissionRecord>,
    /// Bumped whenever in-flight work must be discarded on arrival.
    generation: u64,
}

pub struct SubmissionController {
    question: Arc<Question>,
    harness: Arc<TestHarness>,
    sink: Arc<dyn SubmissionSink>,
    state: Mutex<Workspace>,
}

impl SubmissionController {
    pub fn new(
        question: Arc<Question>,
        harness: Arc<TestHarness>,
        sink: Arc<dyn SubmissionSink>,
    ) -> Self {
        let language = question.default_language;
        let code = question
            .starter_code(language)
            .unwrap_or_default()
            .to_owned();
        Self {
            question,
            harness,
            sink,
            state: Mutex::new(Workspace {
                phase: Phase::Editing,
                language,
                code,
                tests_executed: false,
                results: Vec::new(),
                tested_code: None,
                last_output: Vec::new(),
                console: ConsoleMode::RawOutput,
                record: None,
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Workspace> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure(&self, w: &Workspace, action: Action, allowed: &[Phase]) -> Result<(), ControllerError> {
        if w.phase == Phase::Submitted {
            return Err(ControllerError::Submitted(self.question.question_number));
        }
        if allowed.contains(&w.phase) {
            Ok(())
        } else {
            Err(ControllerError::Unavailable {
                action,
                phase: w.phase,
            })
        }
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn language(&self) -> Language {
        self.lock().language
    }

    pub fn code(&self) -> String {
        self.lock().code.clone()
    }

    pub fn tests_executed(&self) -> bool {
        self.lock().tests_executed
    }

    pub fn results(&self) -> Vec<TestResult> {
        self.lock().results.clone()
    }

    pub fn record(&self) -> Option<SubmissionRecord> {
        self.lock().record.clone()
    }

    pub fn can_submit(&self) -> bool {
        let w = self.lock();
        w.tests_executed && w.phase == Phase::TestsExecuted
    }

    /// Whether the code changed since the stored results were produced.
    /// Stale results are still submittable.
    pub fn results_stale(&self) -> bool {
        let w = self.lock();
        w.tests_executed && w.tested_code.as_deref() != Some(w.code.as_str())
    }

    pub fn console(&self) -> ConsoleView {
        let w = self.lock();
        match w.console {
            ConsoleMode::RawOutput => ConsoleView::RawOutput(w.last_output.clone()),
            ConsoleMode::Breakdown => ConsoleView::Breakdown(w.results.clone()),
        }
    }

    pub fn edit(&self, code: impl Into<String>) -> Result<(), ControllerError> {
        use Phase::*;
        let mut w = self.lock();
        self.ensure(&w, Action::Edit, &[Editing, Running, TestsPending, TestsExecuted])?;
        w.code = code.into();
        Ok(())
    }

    /// Resets the editor to the starter code of `language` and drops all
    /// Run/Test state, including any action still in flight.
    pub fn switch_language(&self, language: Language) -> Result<(), ControllerError> {
        use Phase::*;
        let starter = self
            .question
            .starter_code(language)
            .ok_or(ControllerError::LanguageNotOffered(language))?;

        let mut w = self.lock();
        self.ensure(
            &w,
            Action::SwitchLanguage,
            &[Editing, Running, TestsPending, TestsExecuted],
        )?;
        w.generation += 1;
        w.phase = Editing;
        w.language = language;
        w.code = starter.to_owned();
        w.tests_executed = false;
        w.results.clear();
        w.tested_code = None;
        w.last_output.clear();
        w.console = ConsoleMode::RawOutput;
        log::debug!("Switched to {}", language);
        Ok(())
    }

    /// Runs the entry point against the first test case's input only.
    ///
    /// Only one Run or Test is in flight at a time: calling this while either
    /// is outstanding fails with [`ControllerError::Unavailable`] instead of
    /// racing the pending call.
    pub async fn run(&self) -> Result<Vec<ExecutionOutcome>, ControllerError> {
        use Phase::*;
        let (code, language, generation, resume) = {
            let mut w = self.lock();
            self.ensure(&w, Action::Run, &[Editing, TestsExecuted])?;
            let resume = w.phase;
            w.phase = Running;
            (w.code.clone(), w.language, w.generation, resume)
        };

        let args = self
            .question
            .test_cases
            .first()
            .map(|t| t.input.as_str())
            .unwrap_or_default();
        let lines = self
            .harness
            .execute(&code, &self.question.entry_point, args, language)
            .await;

        let mut w = self.lock();
        if w.generation == generation && w.phase == Running {
            w.phase = resume;
            w.last_output = lines.clone();
            w.console = ConsoleMode::RawOutput;
        } else {
            log::debug!("Discarded run output (phase is now {})", w.phase);
        }
        Ok(lines)
    }

    /// Runs every test case. Results are rebuilt from scratch and become
    /// visible one by one, so a forced submission mid-run carries the
    /// cases finished so far.
    ///
    /// Fails with [`ControllerError::Unavailable`] while another Run or Test
    /// is still in flight.
    pub async fn test(&self) -> Result<Vec<TestResult>, ControllerError> {
        use Phase::*;
        let (code, language, generation) = {
            let mut w = self.lock();
            self.ensure(&w, Action::Test, &[Editing, TestsExecuted])?;
            w.phase = TestsPending;
            w.tests_executed = false;
            w.results.clear();
            w.tested_code = None;
            w.console = ConsoleMode::Breakdown;
            (w.code.clone(), w.language, w.generation)
        };

        let results = self
            .harness
            .run_all_with(
                &self.question.test_cases,
                &code,
                &self.question.entry_point,
                language,
                |_, res| {
                    let mut w = self.lock();
                    if w.generation == generation && w.phase == TestsPending {
                        w.results.push(res.clone());
                    }
                },
            )
            .await;

        let mut w = self.lock();
        if w.generation == generation && w.phase == TestsPending {
            w.results = results.clone();
            w.tested_code = Some(code);
            w.tests_executed = true;
            w.phase = TestsExecuted;
        } else {
            log::debug!("Discarded test results (phase is now {})", w.phase);
        }
        Ok(results)
    }

    /// Opens the confirmation step. Requires a completed Test.
    pub fn request_submit(&self) -> Result<(), ControllerError> {
        let mut w = self.lock();
        self.ensure(&w, Action::Submit, &[Phase::TestsExecuted])?;
        if !w.tests_executed {
            return Err(ControllerError::Unavailable {
                action: Action::Submit,
                phase: w.phase,
            });
        }
        w.phase = Phase::ConfirmPending;
        Ok(())
    }

    pub fn cancel_submit(&self) -> Result<(), ControllerError> {
        let mut w = self.lock();
        self.ensure(&w, Action::Cancel, &[Phase::ConfirmPending])?;
        w.phase = Phase::TestsExecuted;
        Ok(())
    }

    pub fn confirm_submit(&self) -> Result<SubmissionRecord, ControllerError> {
        let record = {
            let mut w = self.lock();
            self.ensure(&w, Action::Confirm, &[Phase::ConfirmPending])?;
            self.finalize(&mut w, Finalization::Confirmed)
        };
        self.deliver(&record);
        Ok(record)
    }

    /// Finalizes with whatever code and results exist right now, from any
    /// phase. Returns `None` if the question was already submitted.
    pub fn force_submit(&self) -> Option<SubmissionRecord> {
        let record = {
            let mut w = self.lock();
            if w.phase == Phase::Submitted {
                return None;
            }
            log::warn!(
                "Time is up: submitting question {} while {}",
                self.question.question_number,
                w.phase
            );
            self.finalize(&mut w, Finalization::Expired)
        };
        self.deliver(&record);
        Some(record)
    }

    /// Drops in-flight Run/Test work without finalizing anything.
    pub fn discard_in_flight(&self) {
        let mut w = self.lock();
        w.generation += 1;
        if matches!(w.phase, Phase::Running | Phase::TestsPending) {
            w.phase = if w.tests_executed {
                Phase::TestsExecuted
            } else {
                Phase::Editing
            };
        }
    }

    fn finalize(&self, w: &mut Workspace, finalization: Finalization) -> SubmissionRecord {
        let record = SubmissionRecord {
            question_number: self.question.question_number,
            code: w.code.clone(),
            results: w.results.clone(),
            finalized_at: Local::now(),
            finalization,
        };
        w.generation += 1;
        w.phase = Phase::Submitted;
        w.record = Some(record.clone());
        record
    }

    fn deliver(&self, record: &SubmissionRecord) {
        log::info!(
            "Submitting question {} ({}/{} passed, {})",
            record.question_number,
            record.num_passed(),
            record.results.len(),
            record.finalization
        );
        self.sink.deliver(record.clone());
    }
}

impl std::fmt::Debug for SubmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionController")
            .field("question", &self.question.question_number)
            .field("state", &*self.lock())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use maplit::btreemap;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        execution::{mock::MockAdapter, AdapterRegistry, ExecutionOutcome as O},
        question::TestCase,
    };

    const JS_STARTER: &str = "function flattenArray(arr) {\n}\n";
    const PY_STARTER: &str = "def flattenArray(arr):\n    pass\n";

    fn question() -> Arc<Question> {
        Arc::new(Question {
            question_number: 4,
            entry_point: "flattenArray".to_owned(),
            time_limit_seconds: 60,
            default_language: Language::JavaScript,
            starter_code: btreemap! {
                Language::JavaScript => JS_STARTER.to_owned(),
                Language::Python => PY_STARTER.to_owned(),
            },
            test_cases: vec![
                TestCase::new("[[1,[2,3]],4]", "[1,2,3,4]", "nested"),
                TestCase::new("[[]]", "[]", "empty"),
                TestCase::new("[5]", "[5]", "flat"),
            ],
        })
    }

    fn adapter() -> MockAdapter {
        MockAdapter::new(Language::JavaScript)
            .respond("[[1,[2,3]],4]", vec![O::log("called"), O::result("[1,2,3,4]")])
            .respond("[[]]", vec![O::result("[]")])
            .respond("[5]", vec![O::result("[5]")])
    }

    fn controller(
        adapter: MockAdapter,
    ) -> (
        Arc<SubmissionController>,
        mpsc::UnboundedReceiver<SubmissionRecord>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let harness = TestHarness::new(AdapterRegistry::new().register(Arc::new(adapter)));
        let c = SubmissionController::new(question(), Arc::new(harness), Arc::new(tx));
        (Arc::new(c), rx)
    }

    #[tokio::test]
    async fn starts_editing_default_starter_code() {
        let (c, _rx) = controller(adapter());
        assert_eq!(c.phase(), Phase::Editing);
        assert_eq!(c.language(), Language::JavaScript);
        assert_eq!(c.code(), JS_STARTER);
        assert!(!c.tests_executed());
        assert_eq!(c.console(), ConsoleView::RawOutput(vec![]));
    }

    #[tokio::test]
    async fn run_uses_first_case_and_keeps_tests_flag() {
        let (c, _rx) = controller(adapter());
        let lines = c.run().await.unwrap();
        assert_eq!(lines, vec![O::log("called"), O::result("[1,2,3,4]")]);
        assert_eq!(c.phase(), Phase::Editing);
        assert!(!c.tests_executed());
        assert_eq!(c.console(), ConsoleView::RawOutput(lines.clone()));

        c.test().await.unwrap();
        for _ in 0..3 {
            c.run().await.unwrap();
            assert!(c.tests_executed());
            assert_eq!(c.phase(), Phase::TestsExecuted);
        }
        assert_eq!(c.console(), ConsoleView::RawOutput(lines));
    }

    #[tokio::test]
    async fn test_switches_console_to_breakdown() {
        let (c, _rx) = controller(adapter());
        let results = c.test().await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.passed));
        assert_eq!(c.phase(), Phase::TestsExecuted);
        assert!(c.tests_executed());
        assert!(c.can_submit());
        assert_eq!(c.console(), ConsoleView::Breakdown(results.clone()));

        // Re-running overwrites.
        let again = c.test().await.unwrap();
        assert_eq!(again, results);
        assert_eq!(c.results(), results);
    }

    #[tokio::test]
    async fn submit_requires_tests() {
        let (c, _rx) = controller(adapter());
        assert!(!c.can_submit());
        assert_eq!(
            c.request_submit(),
            Err(ControllerError::Unavailable {
                action: Action::Submit,
                phase: Phase::Editing
            })
        );
        assert_eq!(
            c.confirm_submit().unwrap_err().to_string(),
            "Cannot confirm while editing"
        );
    }

    #[tokio::test]
    async fn confirmed_submission_is_delivered_once() {
        let (c, mut rx) = controller(adapter());
        c.test().await.unwrap();

        c.request_submit().unwrap();
        assert_eq!(c.phase(), Phase::ConfirmPending);
        assert!(c.edit("x").is_err());
        c.cancel_submit().unwrap();
        assert_eq!(c.phase(), Phase::TestsExecuted);

        c.request_submit().unwrap();
        let record = c.confirm_submit().unwrap();
        assert_eq!(record.finalization, Finalization::Confirmed);
        assert_eq!(record.code, JS_STARTER);
        assert_eq!(record.num_passed(), 3);
        assert_eq!(c.phase(), Phase::Submitted);
        assert_eq!(c.record(), Some(record.clone()));

        assert_eq!(c.edit("changed"), Err(ControllerError::Submitted(4)));
        assert_eq!(c.run().await, Err(ControllerError::Submitted(4)));
        assert!(c.force_submit().is_none());
        assert_eq!(c.code(), JS_STARTER);

        assert_eq!(rx.recv().await, Some(record));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn switching_language_resets_state() {
        let (c, _rx) = controller(adapter());
        c.edit("function flattenArray(a) { return a.flat(Infinity); }")
            .unwrap();
        c.test().await.unwrap();

        c.switch_language(Language::Python).unwrap();
        assert_eq!(c.language(), Language::Python);
        assert_eq!(c.code(), PY_STARTER);
        assert_eq!(c.phase(), Phase::Editing);
        assert!(!c.tests_executed());
        assert!(c.results().is_empty());
        assert_eq!(c.console(), ConsoleView::RawOutput(vec![]));
    }

    #[tokio::test]
    async fn language_must_be_offered() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut q = (*question()).clone();
        q.starter_code.remove(&Language::Python);
        let c = SubmissionController::new(
            Arc::new(q),
            Arc::new(TestHarness::new(AdapterRegistry::new())),
            Arc::new(tx),
        );
        assert_eq!(
            c.switch_language(Language::Python),
            Err(ControllerError::LanguageNotOffered(Language::Python))
        );
    }

    #[tokio::test]
    async fn editing_after_tests_leaves_results_stale() {
        let (c, mut rx) = controller(adapter());
        c.test().await.unwrap();
        assert!(!c.results_stale());

        c.edit("function flattenArray(arr) { return []; }").unwrap();
        assert!(c.results_stale());
        assert!(c.can_submit());

        c.request_submit().unwrap();
        let record = c.confirm_submit().unwrap();
        assert_eq!(record.code, "function flattenArray(arr) { return []; }");
        assert_eq!(record.num_passed(), 3);
        assert_eq!(rx.recv().await.unwrap(), record);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_interrupts_in_flight_test() {
        let (c, mut rx) = controller(adapter().delay(Duration::from_millis(100)));

        let running = {
            let c = c.clone();
            tokio::spawn(async move { c.test().await })
        };
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(c.phase(), Phase::TestsPending);
        assert_eq!(c.results().len(), 1);

        let record = c.force_submit().unwrap();
        assert_eq!(record.finalization, Finalization::Expired);
        assert_eq!(record.results.len(), 1);
        assert!(c.force_submit().is_none());

        // The harness still finishes, but its results no longer land anywhere.
        let finished = running.await.unwrap().unwrap();
        assert_eq!(finished.len(), 3);
        assert_eq!(c.phase(), Phase::Submitted);
        assert_eq!(c.results().len(), 1);

        assert_eq!(rx.recv().await, Some(record));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_actions_are_rejected() {
        let (c, _rx) = controller(adapter().delay(Duration::from_millis(100)));
        let running = {
            let c = c.clone();
            tokio::spawn(async move { c.test().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            c.run().await,
            Err(ControllerError::Unavailable {
                action: Action::Run,
                phase: Phase::TestsPending
            })
        );
        running.await.unwrap().unwrap();
        assert_eq!(c.phase(), Phase::TestsExecuted);
    }

    #[tokio::test(start_paused = true)]
    async fn language_switch_discards_in_flight_results() {
        let (c, _rx) = controller(adapter().delay(Duration::from_millis(100)));
        let running = {
            let c = c.clone();
            tokio::spawn(async move { c.test().await })
        };
        tokio::time::sleep(Duration::from_millis(150)).await;
        c.switch_language(Language::Python).unwrap();
        running.await.unwrap().unwrap();

        assert_eq!(c.phase(), Phase::Editing);
        assert!(c.results().is_empty());
        assert!(!c.tests_executed());
    }

    #[tokio::test]
    async fn forced_submission_without_tests_carries_no_results() {
        let (c, mut rx) = controller(adapter());
        c.edit("partial").unwrap();
        let record = c.force_submit().unwrap();
        assert_eq!(record.code, "partial");
        assert!(record.results.is_empty());
        assert_eq!(rx.recv().await, Some(record));
    }
}
