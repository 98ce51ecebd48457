//! Parsing and repair of model responses into requirement vectors.
//!
//! Models wrap JSON in code fences, return the wrong number of objects, skip
//! categories and overshoot the score range. [`parse_and_repair`] absorbs all
//! of that: it always yields exactly the requested number of well-formed
//! vectors and reports every fix it made as a [`RepairDiagnostic`].

use std::fmt;

use serde_json::Value;

use crate::models::{Category, RequirementVector, MISSING_SCORE};

/// Characters of the raw response kept in an unparseable-response diagnostic.
const EXCERPT_CHARS: usize = 500;

/// One repair applied to a model response. Indices are 0-based within the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum RepairDiagnostic {
    /// Response was not valid JSON; the whole batch got neutral vectors.
    Unparseable { error: String, excerpt: String },
    /// Response was valid JSON but not an array; the whole batch got neutral vectors.
    NotAnArray,
    /// Array length differed from the batch size; padded or truncated.
    LengthMismatch { expected: usize, actual: usize },
    /// An element was not a JSON object; the whole batch got neutral vectors.
    NotAnObject { index: usize },
    /// A category was absent; filled with the missing-category default.
    MissingCategory { index: usize, category: Category },
    /// A value could not be read as a number; the whole batch got neutral vectors.
    NonNumeric {
        index: usize,
        category: Category,
        value: String,
    },
    /// A value was outside `[0, 1]` and was clamped.
    Clamped {
        index: usize,
        category: Category,
        original: f64,
    },
}

impl RepairDiagnostic {
    /// Diagnostics that replaced the whole batch with neutral vectors.
    pub fn is_fatal_to_batch(&self) -> bool {
        matches!(
            self,
            Self::Unparseable { .. }
                | Self::NotAnArray
                | Self::NotAnObject { .. }
                | Self::NonNumeric { .. }
        )
    }
}

impl fmt::Display for RepairDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unparseable { error, excerpt } => {
                write!(f, "JSON parse failed: {} (response: {}...)", error, excerpt)
            }
            Self::NotAnArray => write!(f, "response is not a JSON array"),
            Self::LengthMismatch { expected, actual } => write!(
                f,
                "returned vector count ({}) does not match requested count ({})",
                actual, expected
            ),
            Self::NotAnObject { index } => {
                write!(f, "resource {} is not a JSON object", index + 1)
            }
            Self::MissingCategory { index, category } => write!(
                f,
                "resource {} missing category '{}', set to {}",
                index + 1,
                category,
                MISSING_SCORE
            ),
            Self::NonNumeric {
                index,
                category,
                value,
            } => write!(
                f,
                "resource {} category '{}' has non-numeric value {}",
                index + 1,
                category,
                value
            ),
            Self::Clamped {
                index,
                category,
                original,
            } => write!(
                f,
                "resource {} category '{}' value {} clamped into [0, 1]",
                index + 1,
                category,
                original
            ),
        }
    }
}

/// Vectors for one batch plus everything that had to be fixed to get them.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairOutcome {
    pub vectors: Vec<RequirementVector>,
    pub diagnostics: Vec<RepairDiagnostic>,
}

impl RepairOutcome {
    /// `count` neutral vectors, with the reason they were needed.
    pub fn neutral(count: usize, diagnostic: RepairDiagnostic) -> Self {
        Self {
            vectors: vec![RequirementVector::neutral(); count],
            diagnostics: vec![diagnostic],
        }
    }

    /// True when the response was used exactly as returned.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Remove a surrounding Markdown code fence (```` ``` ```` or ```` ```json ````).
pub fn strip_code_fence(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        };
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Parse a model response into exactly `expected` requirement vectors.
///
/// Never fails. Undecodable responses degrade to neutral vectors, short
/// arrays are padded with neutral vectors, long arrays are truncated, missing
/// categories get [`MISSING_SCORE`] and every score is clamped into `[0, 1]`.
/// An element that is not an object, or a score that is not a number, throws
/// away the whole batch in favour of neutral vectors.
pub fn parse_and_repair(raw: &str, expected: usize) -> RepairOutcome {
    let body = strip_code_fence(raw);

    let parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            return RepairOutcome::neutral(
                expected,
                RepairDiagnostic::Unparseable {
                    error: e.to_string(),
                    excerpt: body.chars().take(EXCERPT_CHARS).collect(),
                },
            )
        }
    };

    let items = match parsed {
        Value::Array(items) => items,
        _ => return RepairOutcome::neutral(expected, RepairDiagnostic::NotAnArray),
    };

    let mut diagnostics = Vec::new();
    if items.len() != expected {
        diagnostics.push(RepairDiagnostic::LengthMismatch {
            expected,
            actual: items.len(),
        });
    }

    let mut vectors = Vec::with_capacity(expected);
    for (index, item) in items.iter().take(expected).enumerate() {
        match repair_vector(index, item, &mut diagnostics) {
            Ok(vector) => vectors.push(vector),
            Err(fatal) => {
                diagnostics.push(fatal);
                return RepairOutcome {
                    vectors: vec![RequirementVector::neutral(); expected],
                    diagnostics,
                };
            }
        }
    }
    vectors.resize(expected, RequirementVector::neutral());

    RepairOutcome {
        vectors,
        diagnostics,
    }
}

fn repair_vector(
    index: usize,
    item: &Value,
    diagnostics: &mut Vec<RepairDiagnostic>,
) -> Result<RequirementVector, RepairDiagnostic> {
    let object = item
        .as_object()
        .ok_or(RepairDiagnostic::NotAnObject { index })?;

    let mut vector = RequirementVector::filled(MISSING_SCORE);
    for category in Category::ALL {
        let Some(value) = object.get(category.as_str()) else {
            diagnostics.push(RepairDiagnostic::MissingCategory { index, category });
            continue;
        };

        let score = coerce_score(value).ok_or_else(|| RepairDiagnostic::NonNumeric {
            index,
            category,
            value: value.to_string(),
        })?;
        if !(0.0..=1.0).contains(&score) {
            diagnostics.push(RepairDiagnostic::Clamped {
                index,
                category,
                original: score,
            });
        }
        vector.set(category, score);
    }
    Ok(vector)
}

/// Read a JSON value as a score: numbers, numeric strings (including `inf`
/// and `nan`) and booleans.
fn coerce_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
