use std::sync::Arc;

use anyhow::{Context as _, Result};
use colored::Colorize;
use indicatif::MultiProgress;
use tokio::sync::mpsc;

use crate::config::{Config, ExecutionConfig};
use crate::controller::SubmissionController;
use crate::execution::{AdapterRegistry, ExecutionOutcome, PythonInterpreter};
use crate::harness::{TestHarness, TestResult};
use crate::interactive;
use crate::language::Language;
use crate::question::Question;
use crate::session::QuestionSession;
use crate::style;
use crate::submission::SubmissionRecord;

/// Adapters plus the interpreter processes backing them.
#[derive(Debug)]
pub struct Engine {
    pub harness: Arc<TestHarness>,
    interpreter: Arc<PythonInterpreter>,
}

impl Engine {
    /// Boots the interpreters `languages` need. A failed boot is only logged:
    /// invocations then report `SinkUnavailable` inline.
    pub async fn boot(cfg: &ExecutionConfig, languages: &[Language]) -> Self {
        let (registry, interpreter) = AdapterRegistry::from_config(cfg);
        if languages.contains(&Language::Python) {
            if let Err(e) = interpreter.boot().await {
                log::warn!("Python is unavailable: {}", e);
            }
        }
        Self {
            harness: Arc::new(TestHarness::new(registry)),
            interpreter,
        }
    }

    pub async fn shutdown(&self) {
        self.interpreter.shutdown().await;
    }
}

fn resolve_language(question: &Question, language: Option<Language>) -> Result<Language> {
    let language = language.unwrap_or(question.default_language);
    anyhow::ensure!(
        question.offers(language),
        "Question {} is not offered in {} (offered: {})",
        question.question_number,
        language,
        question
            .languages()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(language)
}

fn resolve_code(question: &Question, code: Option<String>, language: Language) -> String {
    code.or_else(|| question.starter_code(language).map(str::to_owned))
        .unwrap_or_default()
}

/// Runs the entry point once with the first test case's input and prints the raw output.
pub async fn do_run(
    question: &Question,
    code: Option<String>,
    language: Option<Language>,
    cfg: &Config,
) -> Result<Vec<ExecutionOutcome>> {
    let language = resolve_language(question, language)?;
    let code = resolve_code(question, code, language);
    let engine = Engine::boot(&cfg.execution, &[language]).await;

    let args = question
        .test_cases
        .first()
        .map(|t| t.input.as_str())
        .unwrap_or_default();
    log::info!("Running {}({}) [{}]", question.entry_point, args, language);

    let lines = engine
        .harness
        .execute(&code, &question.entry_point, args, language)
        .await;
    engine.shutdown().await;

    print!("{}", style::render_raw_output(&lines));
    Ok(lines)
}

/// Runs every test case with a spinner per case, then prints the breakdown.
pub async fn do_test(
    question: &Question,
    code: Option<String>,
    language: Option<Language>,
    cfg: &Config,
) -> Result<Vec<TestResult>> {
    let language = resolve_language(question, language)?;
    let code = resolve_code(question, code, language);
    anyhow::ensure!(
        !question.test_cases.is_empty(),
        "Question {} has no test cases",
        question.question_number
    );
    let engine = Engine::boot(&cfg.execution, &[language]).await;

    let container = MultiProgress::new();
    let bars: Vec<_> = (0..question.test_cases.len())
        .map(|i| interactive::add_spinner(&container, format!("Case #{} ...", i + 1)))
        .collect();

    let results = engine
        .harness
        .run_all_with(
            &question.test_cases,
            &code,
            &question.entry_point,
            language,
            |i, res| {
                bars[i].finish_with_message(
                    format!("Case #{} ... {}", i + 1, style::verdict_icon(res.passed))
                        .cyan()
                        .to_string(),
                );
            },
        )
        .await;
    engine.shutdown().await;
    println!();

    print!(
        "{}",
        style::render_breakdown(&results, cfg.session.show_passed_detail)
    );
    Ok(results)
}

/// Timed end-to-end workflow: Test, then Submit (confirmed, or forced by the timer).
pub async fn do_session(
    question: Question,
    code: Option<String>,
    language: Option<Language>,
    cfg: &Config,
) -> Result<SubmissionRecord> {
    let language = resolve_language(&question, language)?;
    let engine = Engine::boot(&cfg.execution, &[language]).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let controller = Arc::new(SubmissionController::new(
        Arc::new(question),
        engine.harness.clone(),
        Arc::new(tx),
    ));
    if language != controller.language() {
        controller.switch_language(language)?;
    }
    if let Some(code) = code {
        controller.edit(code)?;
    }

    let session = QuestionSession::start(controller.clone());
    println!(
        "{} Question {} ({}) - time left {}",
        "▶".cyan().bold(),
        session.question_number(),
        language,
        style::format_remaining(session.remaining_seconds()).bold()
    );

    let confirm = cfg.session.confirm_before_submit;
    let show_passed = cfg.session.show_passed_detail;
    let workflow = async {
        controller.test().await?;
        style::print_console(&controller.console(), show_passed);

        controller.request_submit()?;
        if confirm {
            if controller.results_stale() {
                log::warn!("The code changed after testing; submitting the old results");
            }
            let prompt = format!(
                "Submit now? ({} left)",
                style::format_remaining(session.remaining_seconds())
            );
            let yes = tokio::task::spawn_blocking(move || interactive::ask_confirm(&prompt))
                .await
                .context("Confirmation prompt panicked")?
                .context("Failed to read confirmation")?;
            if !yes {
                controller.cancel_submit()?;
                println!(
                    "Not submitted. The answer is submitted automatically when time runs out."
                );
                std::future::pending::<()>().await;
            }
        }
        controller.confirm_submit()?;
        anyhow::Ok(())
    };

    tokio::select! {
        res = workflow => res?,
        _ = session.expired() => {
            println!("\n{}", "Time is up: submitting what has been tested so far".bright_red().bold());
        }
    }

    let record = rx
        .recv()
        .await
        .context("The submission was never finalized")?;
    session.dismiss();
    engine.shutdown().await;

    println!(
        "{} Submitted question {} ({}/{} passed, {})",
        "✔".green().bold(),
        record.question_number,
        record.num_passed(),
        record.results.len(),
        record.finalization
    );
    Ok(record)
}
