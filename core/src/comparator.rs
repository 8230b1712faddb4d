//! Normalizes captured output text into comparable values.
//!
//! Values use a JSON-compatible model (numbers, strings, booleans, null,
//! sequences, maps). Python-style literals are rewritten into JSON before parsing.

use serde_json::{Number, Value};

use crate::language::Language;

pub type Comparable = Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot parse {raw:?} as a literal: {reason}")]
pub struct ParseFailure {
    pub raw: String,
    pub reason: String,
}

pub fn normalize(raw: &str, language: Language) -> Result<Comparable, ParseFailure> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ParseFailure {
            raw: raw.to_owned(),
            reason: "empty output".to_owned(),
        });
    }
    if let Ok(v) = serde_json::from_str(text) {
        return Ok(v);
    }
    let rewritten = relaxed_literal_to_json(text, language);
    serde_json::from_str(&rewritten).map_err(|e| ParseFailure {
        raw: raw.to_owned(),
        reason: e.to_string(),
    })
}

/// Structural equality. Sequences compare by length and then element-wise,
/// recursing into nested sequences and maps. Numbers compare by value.
pub fn equals(a: &Comparable, b: &Comparable) -> bool {
    use Value::*;
    match (a, b) {
        (Array(xs), Array(ys)) => xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| equals(x, y)),
        (Object(xs), Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).map_or(false, |y| equals(x, y)))
        }
        (Number(x), Number(y)) => numbers_equal(x, y),
        _ => a == b,
    }
}

/// Judges raw actual output against the expected literal.
/// Anything that fails to normalize is a mismatch.
pub fn matches(actual: &str, expected: &str, language: Language) -> bool {
    match (normalize(actual, language), normalize(expected, language)) {
        (Ok(a), Ok(e)) => equals(&a, &e),
        (Err(e), _) => {
            log::debug!("{}", e);
            false
        }
        (_, Err(e)) => {
            log::warn!("Expected output does not normalize: {}", e);
            false
        }
    }
}

/// Integers compare by their exact digits, whatever their magnitude.
/// Only a fractional or exponent form on either side falls back to `f64`.
fn numbers_equal(x: &Number, y: &Number) -> bool {
    let (xs, ys) = (x.to_string(), y.to_string());
    match (integer_digits(&xs), integer_digits(&ys)) {
        (Some(a), Some(b)) => a == b,
        _ => matches!((x.as_f64(), y.as_f64()), (Some(a), Some(b)) if a == b),
    }
}

fn integer_digits(text: &str) -> Option<&str> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(if digits.bytes().all(|b| b == b'0') { "0" } else { text })
}

/// Rewrites single-quoted strings into JSON strings and, for Python,
/// `True`/`False`/`None` and tuples into their JSON counterparts.
/// Trailing commas before a closing bracket are dropped.
fn relaxed_literal_to_json(text: &str, language: Language) -> String {
    let python = language == Language::Python;
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push('"');
                while let Some(c) = chars.next() {
                    out.push(c);
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '\'' => {
                out.push('"');
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some('\'') => out.push('\''),
                            Some(escaped) => {
                                out.push('\\');
                                out.push(escaped);
                            }
                            None => {}
                        },
                        '\'' => break,
                        '"' => out.push_str("\\\""),
                        _ => out.push(c),
                    }
                }
                out.push('"');
            }
            '(' if python => out.push('['),
            ')' | ']' | '}' => {
                let trimmed = out.trim_end().strip_suffix(',').map(str::len);
                if let Some(len) = trimmed {
                    out.truncate(len);
                }
                out.push(if c == ')' && python { ']' } else { c });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&n) = chars.peek() {
                    if !(n.is_ascii_alphanumeric() || n == '_') {
                        break;
                    }
                    word.push(n);
                    chars.next();
                }
                let mapped = match word.as_str() {
                    "True" if python => "true",
                    "False" if python => "false",
                    "None" if python => "null",
                    w => w,
                };
                out.push_str(mapped);
            }
            _ => out.push(c),
        }
    }
    out
}
