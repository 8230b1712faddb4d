use std::{path::PathBuf, process::Stdio, sync::Arc, time::Duration};

use async_trait::async_trait;
use lazy_regex::regex;
use serde::Deserialize;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    process::{Child, ChildStdin, ChildStdout, Command},
    sync::Mutex,
};

use super::{
    adapter::{ExecutionAdapter, Invocation},
    outcome::{ExecutionError, ExecutionOutcome, OutcomeKind},
};
use crate::language::Language;

/// Driver loop of the worker process. One JSON request per stdin line; each
/// printed line of the candidate's program is echoed back as a `result`
/// record, followed by an optional `error` record and a `done` marker.
const DRIVER: &str = r#"
import io, json, sys

_out = sys.stdout

def _emit(kind, content):
    _out.write(json.dumps({"kind": kind, "content": content}) + "\n")
    _out.flush()

class _Sink(io.TextIOBase):
    def __init__(self):
        self._buf = ""
    def writable(self):
        return True
    def write(self, s):
        self._buf += s
        while "\n" in self._buf:
            line, self._buf = self._buf.split("\n", 1)
            _emit("result", line)
        return len(s)
    def drain(self):
        if self._buf:
            _emit("result", self._buf)
            self._buf = ""

_emit("ready", "")
while True:
    raw = sys.stdin.readline()
    if not raw:
        break
    try:
        source = json.loads(raw)["source"]
    except (ValueError, KeyError) as e:
        _emit("error", "ProtocolError: %s" % e)
        _emit("done", "")
        continue
    sink = _Sink()
    error = None
    sys.stdout, sys.stdin = sink, io.StringIO("")
    try:
        exec(compile(source, "<candidate>", "exec"), {"__name__": "__main__"})
    except SyntaxError as e:
        error = "%s: %s (line %s)" % (type(e).__name__, e.msg, e.lineno)
    except BaseException as e:
        error = "%s: %s" % (type(e).__name__, e)
    finally:
        sys.stdout, sys.stdin = _out, sys.__stdin__
    sink.drain()
    if error is not None:
        _emit("error", error)
    _emit("done", "")
"#;

/// Label the composite unit prints in front of the returned value.
pub const RESULT_LABEL: &str = "Result:";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RecordKind {
    Ready,
    Result,
    Error,
    Done,
}

#[derive(Debug, Deserialize)]
struct Record {
    kind: RecordKind,
    content: String,
}

/// The worker's stdio pair. Its stdout is the one output sink every
/// invocation shares.
#[derive(Debug)]
struct Sink {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl Sink {
    async fn read_record(&mut self) -> Result<Record, ExecutionError> {
        let line = self
            .stdout
            .next_line()
            .await
            .map_err(|e| ExecutionError::Protocol(format!("Failed to read from python: {}", e)))?
            .ok_or_else(|| ExecutionError::Runtime("python interpreter exited".to_owned()))?;
        serde_json::from_str(&line)
            .map_err(|e| ExecutionError::Protocol(format!("Malformed record {:?}: {}", line, e)))
    }

    async fn submit(&mut self, source: &str) -> Result<Vec<ExecutionOutcome>, ExecutionError> {
        let mut request = serde_json::to_string(&serde_json::json!({ "source": source }))
            .map_err(|e| ExecutionError::Protocol(e.to_string()))?;
        request.push('\n');
        self.stdin
            .write_all(request.as_bytes())
            .await
            .map_err(|e| ExecutionError::Protocol(format!("Failed to write to python: {}", e)))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| ExecutionError::Protocol(format!("Failed to write to python: {}", e)))?;

        let mut lines = Vec::new();
        loop {
            let Record { kind, content } = self.read_record().await?;
            match kind {
                RecordKind::Result => lines.push(ExecutionOutcome::result(content)),
                RecordKind::Error => lines.push(ExecutionOutcome::error(content)),
                RecordKind::Done => return Ok(lines),
                RecordKind::Ready => {
                    return Err(ExecutionError::Protocol("Unexpected ready record".to_owned()))
                }
            }
        }
    }
}

/// Long-lived Python worker process.
///
/// The sink is claimed for the whole write-request / read-until-done exchange,
/// so concurrent callers are serialized and never see each other's output.
#[derive(Debug)]
pub struct PythonInterpreter {
    program: PathBuf,
    timeout: Duration,
    sink: Mutex<Option<Sink>>,
}

impl PythonInterpreter {
    const DEFAULT_PROGRAM: &str = "python3";
    const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

    pub fn new() -> Self {
        Self {
            program: Self::DEFAULT_PROGRAM.into(),
            timeout: Self::DEFAULT_TIMEOUT,
            sink: Mutex::new(None),
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

    pub async fn is_ready(&self) -> bool {
        self.sink.lock().await.is_some()
    }

    /// Starts the worker. Booting an already running interpreter is a no-op.
    pub async fn boot(&self) -> Result<(), ExecutionError> {
        let mut sink = self.sink.lock().await;
        if sink.is_none() {
            *sink = Some(self.spawn().await?);
        }
        Ok(())
    }

    pub async fn shutdown(&self) {
        if let Some(mut sink) = self.sink.lock().await.take() {
            drop(sink.stdin);
            if let Err(e) = sink.child.kill().await {
                log::warn!("Failed to kill python interpreter: {:#}", e);
            }
            log::info!("Python interpreter shut down");
        }
    }

    async fn spawn(&self) -> Result<Sink, ExecutionError> {
        let mut child = Command::new(&self.program)
            .args(["-u", "-c", DRIVER])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExecutionError::Protocol("Failed to open stdin".to_owned()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionError::Protocol("Failed to open stdout".to_owned()))?;

        let mut sink = Sink {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };
        let handshake = tokio::time::timeout(self.timeout, sink.read_record())
            .await
            .map_err(|_| ExecutionError::Timeout(self.timeout))??;
        match handshake.kind {
            RecordKind::Ready => {
                log::info!("Python interpreter booted ({})", self.program.to_string_lossy());
                Ok(sink)
            }
            _ => Err(ExecutionError::Protocol(format!(
                "Expected ready record, got {:?}",
                handshake
            ))),
        }
    }

    /// Runs `source` in a fresh module namespace and returns its printed lines.
    pub async fn run_source(&self, source: &str) -> Vec<ExecutionOutcome> {
        let mut guard = self.sink.lock().await;
        let Some(sink) = guard.as_mut() else {
            return vec![ExecutionError::SinkUnavailable("python").into()];
        };

        let res = tokio::time::timeout(self.timeout, sink.submit(source)).await;
        match res {
            Ok(Ok(lines)) => lines,
            Ok(Err(e)) => {
                log::warn!("Python interpreter failed, restarting: {}", e);
                *guard = None;
                self.reboot(&mut guard).await;
                vec![e.into()]
            }
            Err(_) => {
                log::warn!("Python execution timed out after {:?}, restarting interpreter", self.timeout);
                *guard = None;
                self.reboot(&mut guard).await;
                vec![ExecutionError::Timeout(self.timeout).into()]
            }
        }
    }

    async fn reboot(&self, slot: &mut Option<Sink>) {
        match self.spawn().await {
            Ok(sink) => *slot = Some(sink),
            Err(e) => log::error!("Failed to restart python interpreter: {}", e),
        }
    }
}

impl Default for PythonInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct PythonAdapter {
    interpreter: Arc<PythonInterpreter>,
}

impl PythonAdapter {
    pub fn new(interpreter: Arc<PythonInterpreter>) -> Self {
        Self { interpreter }
    }

    pub fn interpreter(&self) -> &Arc<PythonInterpreter> {
        &self.interpreter
    }

    /// Candidate code followed by a labelled print of the entry point's return value.
    /// Output the call leaves without a trailing newline is flushed first, so the
    /// label always starts its own line.
    pub fn composite_unit(inv: &Invocation<'_>) -> String {
        format!(
            "{}\n\nimport json as __json, sys as __sys\n\
             __value = __json.dumps({}, default=repr)\n\
             __sys.stdout.drain()\n\
             print({:?}, __value)\n",
            inv.code,
            inv.call_expr(),
            RESULT_LABEL,
        )
    }
}

#[async_trait]
impl ExecutionAdapter for PythonAdapter {
    fn language(&self) -> Language {
        Language::Python
    }

    async fn execute(&self, inv: Invocation<'_>) -> Vec<ExecutionOutcome> {
        log::debug!("python: {}", inv.call_expr());
        self.interpreter
            .run_source(&Self::composite_unit(&inv))
            .await
    }

    fn extract_actual(&self, outcomes: &[ExecutionOutcome]) -> Option<String> {
        if let Some(e) = outcomes.iter().rev().find(|o| o.is_error()) {
            return Some(e.content.clone());
        }
        outcomes
            .iter()
            .rev()
            .find(|o| o.kind == OutcomeKind::Result)
            .map(|o| strip_result_label(&o.content))
    }
}

pub fn strip_result_label(line: &str) -> String {
    regex!(r"^\s*Result:\s*").replace(line, "").into_owned()
}

#[cfg(test)]
mod test {
    use super::*;

    fn python_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn booted() -> Option<PythonAdapter> {
        if !python_available() {
            eprintln!("python3 is not installed; skipping");
            return None;
        }
        let interp = PythonInterpreter::new().timeout(Duration::from_millis(3000));
        interp.boot().await.unwrap();
        Some(PythonAdapter::new(Arc::new(interp)))
    }

    #[test]
    fn strip_label() {
        assert_eq!(strip_result_label("Result: [1, 2]"), "[1, 2]");
        assert_eq!(strip_result_label("  Result:3"), "3");
        assert_eq!(strip_result_label("[1]"), "[1]");
    }

    #[test]
    fn composite_unit_prints_labelled_json() {
        let inv = Invocation::new("def f(x):\n    return x", "f", "[1, 2]");
        assert_eq!(
            PythonAdapter::composite_unit(&inv),
            "def f(x):\n    return x\n\n\
             import json as __json, sys as __sys\n\
             __value = __json.dumps(f([1, 2]), default=repr)\n\
             __sys.stdout.drain()\n\
             print(\"Result:\", __value)\n"
        );
    }

    #[tokio::test]
    async fn unbooted_interpreter_reports_sink_unavailable() {
        let a = PythonAdapter::new(Arc::new(PythonInterpreter::new()));
        let lines = a.execute(Invocation::new("", "f", "")).await;
        assert_eq!(
            lines,
            vec![ExecutionOutcome::error(
                "SinkUnavailable: the python interpreter has not been booted"
            )]
        );
    }

    #[tokio::test]
    async fn prints_land_in_sink_as_result_lines() {
        let Some(a) = booted().await else { return };
        let lines = a
            .execute(Invocation::new(
                "def f(a, b):\n    print('adding', a, b)\n    return [a + b]",
                "f",
                "1, 2",
            ))
            .await;
        assert_eq!(
            lines,
            vec![
                ExecutionOutcome::result("adding 1 2"),
                ExecutionOutcome::result("Result: [3]"),
            ]
        );
        assert_eq!(a.extract_actual(&lines).as_deref(), Some("[3]"));
        a.interpreter().shutdown().await;
    }

    #[tokio::test]
    async fn unterminated_print_does_not_swallow_the_label() {
        let Some(a) = booted().await else { return };
        let lines = a
            .execute(Invocation::new(
                "def f(a):\n    print('x', end='')\n    return a",
                "f",
                "1",
            ))
            .await;
        assert_eq!(
            lines,
            vec![ExecutionOutcome::result("x"), ExecutionOutcome::result("Result: 1")]
        );
        assert_eq!(a.extract_actual(&lines).as_deref(), Some("1"));
        a.interpreter().shutdown().await;
    }

    #[tokio::test]
    async fn errors_are_stringified() {
        let Some(a) = booted().await else { return };

        let lines = a
            .execute(Invocation::new("def f(:\n    pass", "f", ""))
            .await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].is_error());
        assert!(lines[0].content.starts_with("SyntaxError:"), "{:?}", lines);

        let lines = a
            .execute(Invocation::new("def f():\n    return 1 // 0", "f", ""))
            .await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].content.starts_with("ZeroDivisionError:"), "{:?}", lines);
        a.interpreter().shutdown().await;
    }

    #[tokio::test]
    async fn namespace_does_not_leak_between_runs() {
        let Some(a) = booted().await else { return };
        let lines = a
            .execute(Invocation::new("leak = 42\ndef f():\n    return leak", "f", ""))
            .await;
        assert_eq!(a.extract_actual(&lines).as_deref(), Some("42"));

        let lines = a
            .execute(Invocation::new("def g():\n    return leak", "g", ""))
            .await;
        assert_eq!(
            a.extract_actual(&lines).as_deref(),
            Some("NameError: name 'leak' is not defined")
        );
        a.interpreter().shutdown().await;
    }

    #[tokio::test]
    async fn timeout_restarts_the_worker() {
        if !python_available() {
            return;
        }
        let interp = Arc::new(PythonInterpreter::new().timeout(Duration::from_millis(500)));
        interp.boot().await.unwrap();
        let a = PythonAdapter::new(interp.clone());

        let lines = a
            .execute(Invocation::new("def f():\n    while True: pass", "f", ""))
            .await;
        assert_eq!(
            lines,
            vec![ExecutionOutcome::error("TimeoutError: execution exceeded 500ms")]
        );

        assert!(interp.is_ready().await);
        let lines = a
            .execute(Invocation::new("def f():\n    return 'ok'", "f", ""))
            .await;
        assert_eq!(a.extract_actual(&lines).as_deref(), Some(r#""ok""#));
        interp.shutdown().await;
    }

    #[tokio::test]
    async fn concurrent_calls_do_not_interleave() {
        let Some(a) = booted().await else { return };
        let code = "def f(tag):\n    for i in range(50):\n        print(tag, i)\n    return tag";
        let (x, y) = tokio::join!(
            a.execute(Invocation::new(code, "f", "'x'")),
            a.execute(Invocation::new(code, "f", "'y'")),
        );
        assert!(x[..50].iter().all(|l| l.content.starts_with("x ")));
        assert!(y[..50].iter().all(|l| l.content.starts_with("y ")));
        a.interpreter().shutdown().await;
    }
}
