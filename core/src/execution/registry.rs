use std::{collections::HashMap, sync::Arc};

use super::{
    adapter::ExecutionAdapter, javascript::JavaScriptAdapter, python::PythonAdapter,
    python::PythonInterpreter,
};
use crate::{config::ExecutionConfig, language::Language};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("No execution adapter registered for language '{0}'")]
    Unsupported(Language),
}

/// Execution strategies selected by language tag.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Language, Arc<dyn ExecutionAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers both built-in adapters. The Python interpreter is returned
    /// unbooted so the caller decides when to pay its start-up cost.
    pub fn from_config(cfg: &ExecutionConfig) -> (Self, Arc<PythonInterpreter>) {
        let js = JavaScriptAdapter::new()
            .program(&cfg.javascript.program)
            .timeout(cfg.timeout());
        let interpreter = Arc::new(
            PythonInterpreter::new()
                .program(&cfg.python.program)
                .timeout(cfg.timeout()),
        );
        let py = PythonAdapter::new(interpreter.clone());

        let registry = Self::new().register(Arc::new(js)).register(Arc::new(py));
        (registry, interpreter)
    }

    /// Adds or replaces the adapter for `adapter.language()`.
    pub fn register(mut self, adapter: Arc<dyn ExecutionAdapter>) -> Self {
        self.adapters.insert(adapter.language(), adapter);
        self
    }

    pub fn get(&self, language: Language) -> Result<&Arc<dyn ExecutionAdapter>, RegistryError> {
        self.adapters
            .get(&language)
            .ok_or(RegistryError::Unsupported(language))
    }

    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.adapters.keys().copied()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("languages", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}
