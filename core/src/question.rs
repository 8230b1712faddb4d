use std::{collections::BTreeMap, path::Path};

use anyhow::{bail, ensure, Context as _};
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::language::Language;

/// Author-defined test case. `input` is the argument list text of the call,
/// `expected_output` a literal of the expected return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question_number: u32,
    pub entry_point: String,
    pub time_limit_seconds: u64,
    pub default_language: Language,
    /// Starter code for each offered language.
    #[serde(deserialize_with = "deserialize_starter_code")]
    pub starter_code: BTreeMap<Language, String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

fn deserialize_starter_code<'de, D>(d: D) -> Result<BTreeMap<Language, String>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<String, String>::deserialize(d)?
        .into_iter()
        .map(|(lang, code)| {
            let lang = lang
                .parse::<Language>()
                .map_err(|_| <D::Error as de::Error>::custom(format!("unsupported language '{}'", lang)))?;
            Ok((lang, code))
        })
        .collect()
}

impl TestCase {
    pub fn new(
        input: impl Into<String>,
        expected_output: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            description: description.into(),
        }
    }
}

impl Question {
    pub const MAX_LANGUAGES: usize = 2;

    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        let q: Self = toml::from_str(s).context("Invalid question TOML")?;
        q.validate()?;
        Ok(q)
    }

    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let q: Self = serde_json::from_str(s).context("Invalid question JSON")?;
        q.validate()?;
        Ok(q)
    }

    /// Loads a question file; the format is chosen by extension (`.toml` or `.json`).
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read question file {:?}", path))?;
        let res = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&s),
            Some("json") => Self::from_json(&s),
            _ => bail!("Unknown question file format {:?} (expected .toml or .json)", path),
        };
        res.with_context(|| format!("Failed to load question {:?}", path))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.entry_point.trim().is_empty(), "Empty entry point name");
        ensure!(
            !self.starter_code.is_empty() && self.starter_code.len() <= Self::MAX_LANGUAGES,
            "A question must offer 1 to {} languages (got {})",
            Self::MAX_LANGUAGES,
            self.starter_code.len()
        );
        ensure!(
            self.offers(self.default_language),
            "Default language '{}' has no starter code",
            self.default_language
        );
        Ok(())
    }

    pub fn offers(&self, language: Language) -> bool {
        self.starter_code.contains_key(&language)
    }

    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.starter_code.keys().copied()
    }

    pub fn starter_code(&self, language: Language) -> Option<&str> {
        self.starter_code.get(&language).map(String::as_str)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const FLATTEN_TOML: &str = r#"
questionNumber = 3
entryPoint = "flattenArray"
timeLimitSeconds = 600
defaultLanguage = "javascript"

[starterCode]
javascript = "function flattenArray(arr) {\n}\n"
python = "def flattenArray(arr):\n    pass\n"

[[testCases]]
input = "[[1,[2,3]],[4,[5,6]],7,8]"
expectedOutput = "[1,2,3,4,5,6,7,8]"
description = "deeply nested"

[[testCases]]
input = "[[]]"
expectedOutput = "[]"
"#;

    #[test]
    fn parse_toml_question() {
        let q = Question::from_toml(FLATTEN_TOML).unwrap();
        assert_eq!(q.question_number, 3);
        assert_eq!(q.entry_point, "flattenArray");
        assert_eq!(q.time_limit_seconds, 600);
        assert_eq!(q.default_language, Language::JavaScript);
        assert_eq!(
            q.languages().collect::<Vec<_>>(),
            vec![Language::JavaScript, Language::Python]
        );
        assert_eq!(q.test_cases.len(), 2);
        assert_eq!(
            q.test_cases[0],
            TestCase::new("[[1,[2,3]],[4,[5,6]],7,8]", "[1,2,3,4,5,6,7,8]", "deeply nested")
        );
        assert_eq!(q.test_cases[1].description, "");
    }

    #[test]
    fn parse_json_question() {
        let q = Question::from_json(
            r#"{
                "questionNumber": 1,
                "entryPoint": "add",
                "timeLimitSeconds": 60,
                "defaultLanguage": "py",
                "starterCode": { "python": "def add(a, b):\n    pass\n" },
                "testCases": [{ "input": "1, 2", "expectedOutput": "3", "description": "" }]
            }"#,
        )
        .unwrap();
        assert_eq!(q.default_language, Language::Python);
        assert_eq!(q.starter_code(Language::Python), Some("def add(a, b):\n    pass\n"));
        assert_eq!(q.starter_code(Language::JavaScript), None);
    }

    #[test]
    fn default_language_must_be_offered() {
        let err = Question::from_json(
            r#"{
                "questionNumber": 1,
                "entryPoint": "add",
                "timeLimitSeconds": 60,
                "defaultLanguage": "javascript",
                "starterCode": { "python": "" }
            }"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Default language 'javascript' has no starter code"
        );
    }

    #[test]
    fn unknown_starter_language_is_rejected() {
        let err = Question::from_json(
            r#"{
                "questionNumber": 1,
                "entryPoint": "add",
                "timeLimitSeconds": 60,
                "defaultLanguage": "python",
                "starterCode": { "python": "", "cobol": "" }
            }"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("unsupported language 'cobol'"));
    }

    #[test]
    fn entry_point_must_not_be_empty() {
        let err = Question::from_json(
            r#"{
                "questionNumber": 1,
                "entryPoint": " ",
                "timeLimitSeconds": 60,
                "defaultLanguage": "python",
                "starterCode": { "python": "" }
            }"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Empty entry point name");
    }
}
