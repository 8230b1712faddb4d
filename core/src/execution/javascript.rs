use std::{path::PathBuf, process::Stdio, time::Duration};

use async_trait::async_trait;
use tokio::process::Command;

use super::{
    adapter::{ExecutionAdapter, Invocation},
    outcome::{ExecutionError, ExecutionOutcome},
};
use crate::language::Language;

/// Evaluates the composite unit synchronously inside a fresh `node` process.
/// The console methods and `process.stdout.write` are swapped for an in-memory
/// collector for the duration of the evaluation and put back in `finally`, so
/// they are restored even when the unit throws. The collected records go to the
/// real stdout between [`FRAME_BEGIN`] and [`FRAME_END`].
const EVAL_SCRIPT: &str = r#"
const __unit = __UNIT__;
const __lines = [];
const __show = (v) => (typeof v === "string" ? v : JSON.stringify(v) ?? String(v));
const __emit = process.stdout.write.bind(process.stdout);
const __levels = ["log", "info", "debug", "warn", "error"];
const __saved = { write: process.stdout.write };
let __pending = "";
const __flush = () => {
  if (__pending) {
    __lines.push({ kind: "log", content: __pending });
    __pending = "";
  }
};
for (const level of __levels) {
  __saved[level] = console[level];
  console[level] = (...args) => {
    __flush();
    __lines.push({ kind: "log", content: args.map(__show).join(" ") });
  };
}
process.stdout.write = (chunk, ...rest) => {
  __pending += typeof chunk === "string" ? chunk : Buffer.from(chunk).toString();
  let i;
  while ((i = __pending.indexOf("\n")) >= 0) {
    __lines.push({ kind: "log", content: __pending.slice(0, i) });
    __pending = __pending.slice(i + 1);
  }
  const done = rest.find((a) => typeof a === "function");
  if (done) done();
  return true;
};
try {
  const __value = new Function(__unit)();
  __flush();
  if (__value !== undefined) {
    __lines.push({ kind: "result", content: JSON.stringify(__value) ?? String(__value) });
  }
} catch (e) {
  __flush();
  const name = e && e.name ? e.name : "Error";
  const message = e && e.message !== undefined ? e.message : String(e);
  __lines.push({ kind: "error", content: `${name}: ${message}` });
} finally {
  for (const level of __levels) console[level] = __saved[level];
  process.stdout.write = __saved.write;
}
__emit("\n" + __FRAME_BEGIN__ + JSON.stringify(__lines) + __FRAME_END__ + "\n");
"#;

/// Markers around the record array on node's stdout. Anything outside them
/// (late output from timers, for instance) is ignored.
pub const FRAME_BEGIN: &str = "\u{1e}proctor:records:begin\u{1e}";
pub const FRAME_END: &str = "\u{1e}proctor:records:end\u{1e}";

fn framed_records(stdout: &str) -> Option<&str> {
    let start = stdout.find(FRAME_BEGIN)? + FRAME_BEGIN.len();
    let len = stdout[start..].find(FRAME_END)?;
    Some(&stdout[start..start + len])
}

#[derive(Debug, Clone)]
pub struct JavaScriptAdapter {
    program: PathBuf,
    timeout: Duration,
}

impl JavaScriptAdapter {
    const DEFAULT_PROGRAM: &str = "node";
    const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

    pub fn new() -> Self {
        Self {
            program: Self::DEFAULT_PROGRAM.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Candidate code followed by `return entryPoint(args);`, evaluated as a function body.
    pub fn composite_unit(inv: &Invocation<'_>) -> String {
        format!("{}\nreturn {};", inv.code, inv.call_expr())
    }

    pub fn eval_script(inv: &Invocation<'_>) -> String {
        let unit = Self::composite_unit(inv);
        // Markers first: the unit may itself contain placeholder text.
        EVAL_SCRIPT
            .replacen("__FRAME_BEGIN__", &js_string(FRAME_BEGIN), 1)
            .replacen("__FRAME_END__", &js_string(FRAME_END), 1)
            .replacen("__UNIT__", &js_string(&unit), 1)
    }

    async fn eval(&self, inv: Invocation<'_>) -> Result<Vec<ExecutionOutcome>, ExecutionError> {
        let script = Self::eval_script(&inv);
        let proc = Command::new(&self.program)
            .args(["-e", &script])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // On timeout the child is dropped and therefore killed.
        let output = tokio::time::timeout(self.timeout, proc.wait_with_output())
            .await
            .map_err(|_| {
                log::warn!("JavaScript evaluation timed out; killed the node process");
                ExecutionError::Timeout(self.timeout)
            })?
            .map_err(|e| ExecutionError::Protocol(format!("Failed to read node output: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match framed_records(&stdout) {
            Some(body) => serde_json::from_str(body).map_err(|e| {
                ExecutionError::Protocol(format!("Malformed records from node: {}", e))
            }),
            None if !output.status.success() => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ExecutionError::Runtime(last_meaningful_line(&stderr)))
            }
            None => Err(ExecutionError::Protocol(
                "node exited without reporting any records".to_owned(),
            )),
        }
    }
}

impl Default for JavaScriptAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// A JSON string is a valid JS string literal.
fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_owned())
}

fn last_meaningful_line(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("at "))
        .last()
        .unwrap_or("process exited abnormally")
        .to_owned()
}

#[async_trait]
impl ExecutionAdapter for JavaScriptAdapter {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    async fn execute(&self, inv: Invocation<'_>) -> Vec<ExecutionOutcome> {
        log::debug!("node: {}", inv.call_expr());
        self.eval(inv).await.unwrap_or_else(|e| vec![e.into()])
    }
}
