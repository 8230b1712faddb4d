use std::{
    path::{Path, PathBuf},
    process::exit,
};

use anyhow::Context as _;
use proctor_core::Language;

pub fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|e| {
        eprintln!("Failed to get current dir: {}", e);
        exit(1);
    })
}

pub fn read_source(path: impl AsRef<Path>) -> anyhow::Result<String> {
    let path = path.as_ref();
    std::fs::read_to_string(path).with_context(|| format!("Cannot read source file {:?}", path))
}

pub fn guess_language(path: &Path) -> Option<Language> {
    match path.extension()?.to_str()? {
        "js" | "mjs" | "cjs" => Some(Language::JavaScript),
        "py" => Some(Language::Python),
        _ => None,
    }
}
