//! Requirement vectors: one relevance score per category.

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::category::{Category, CATEGORY_COUNT};

/// Score used for every category when a whole vector has to be made up.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Score used for a single category the service left out.
pub const MISSING_SCORE: f64 = 0.4;

/// Per-record mapping from each category to a score in `[0, 1]`.
///
/// Every category always has a value; scores are clamped on the way in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequirementVector {
    scores: [f64; CATEGORY_COUNT],
}

impl RequirementVector {
    /// A vector with every category set to `score` (clamped).
    pub fn filled(score: f64) -> Self {
        Self {
            scores: [clamp_score(score); CATEGORY_COUNT],
        }
    }

    /// The all-0.5 vector used when a response cannot be used at all.
    pub fn neutral() -> Self {
        Self::filled(NEUTRAL_SCORE)
    }

    pub fn get(&self, category: Category) -> f64 {
        self.scores[category.index()]
    }

    /// Set a score, clamping it into `[0, 1]`.
    pub fn set(&mut self, category: Category, score: f64) {
        self.scores[category.index()] = clamp_score(score);
    }

    /// Iterate `(category, score)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        Category::ALL.iter().map(move |c| (*c, self.scores[c.index()]))
    }

    /// Serialize to the JSON object string stored in the output table.
    ///
    /// Keys appear in canonical category order; non-ASCII names are kept as-is.
    pub fn to_json_string(&self) -> String {
        // Only f64 values and static keys; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl Default for RequirementVector {
    fn default() -> Self {
        Self::neutral()
    }
}

impl Serialize for RequirementVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(CATEGORY_COUNT))?;
        for (category, score) in self.iter() {
            map.serialize_entry(&category, &score)?;
        }
        map.end()
    }
}

/// Clamp into `[0, 1]`; NaN collapses to 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
