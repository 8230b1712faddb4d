use serde::{Deserialize, Serialize};

/// Language tag a question is authored in. Selects the execution adapter.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Language {
    #[strum(to_string = "javascript", serialize = "js", serialize = "node")]
    #[serde(alias = "js")]
    JavaScript,

    #[strum(to_string = "python", serialize = "py", serialize = "python3")]
    #[serde(alias = "py")]
    Python,
}

impl Language {
    pub fn file_extension(&self) -> &'static str {
        use Language::*;
        match self {
            JavaScript => "js",
            Python => "py",
        }
    }
}
