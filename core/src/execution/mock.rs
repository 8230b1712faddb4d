use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use super::{ExecutionAdapter, ExecutionOutcome, Invocation};
use crate::language::Language;

/// Adapter that answers from a table keyed by argument text.
#[derive(Debug)]
pub struct MockAdapter {
    language: Language,
    responses: HashMap<String, Vec<ExecutionOutcome>>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
}

impl MockAdapter {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            responses: HashMap::new(),
            delay: Duration::from_millis(10),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(mut self, args: &str, lines: Vec<ExecutionOutcome>) -> Self {
        self.responses.insert(args.to_owned(), lines);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionAdapter for MockAdapter {
    fn language(&self) -> Language {
        self.language
    }

    async fn execute(&self, inv: Invocation<'_>) -> Vec<ExecutionOutcome> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.calls.lock().unwrap().push(inv.args.to_owned());
        self.responses.get(inv.args).cloned().unwrap_or_else(|| {
            vec![ExecutionOutcome::error(format!(
                "ReferenceError: {} is not defined",
                inv.entry_point
            ))]
        })
    }
}
