//! Data models for reqvector.

mod category;
mod table;
mod vector;

pub use category::{Category, CATEGORY_COUNT};
pub use table::{Cell, Record, Table};
pub use vector::{clamp_score, RequirementVector, MISSING_SCORE, NEUTRAL_SCORE};
