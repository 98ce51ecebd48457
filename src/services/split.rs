//! Knowledge-point splitting.
//!
//! Turns a hierarchically indented sheet (category labels only on the first
//! row of each group, several knowledge points packed into the last column)
//! into one knowledge point per row.

use std::path::Path;

use tracing::info;

use crate::models::{Cell, Table};
use crate::storage::{load_table, save_table, TableError};

/// Separator between knowledge points in the last column.
pub const KNOWLEDGE_POINT_DELIMITER: &str = "、";

/// Input file used when none is given.
pub const DEFAULT_SPLIT_INPUT: &str = "label_before.xlsx";

/// Output file used when none is given.
pub const DEFAULT_SPLIT_OUTPUT: &str = "output.xlsx";

/// Summary of a split run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSummary {
    pub input_rows: usize,
    pub output_rows: usize,
}

/// Fill every empty cell with the nearest non-empty value above it in the
/// same column. Empty cells before the first value stay empty; text that is
/// only whitespace counts as a value.
pub fn forward_fill(table: &Table) -> Table {
    let mut last_seen: Vec<Option<Cell>> = vec![None; table.width()];
    let rows = table
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .zip(last_seen.iter_mut())
                .map(|(cell, seen)| {
                    if matches!(cell, Cell::Empty) {
                        seen.clone().unwrap_or_default()
                    } else {
                        *seen = Some(cell.clone());
                        cell.clone()
                    }
                })
                .collect()
        })
        .collect();
    Table::from_rows(table.headers().to_vec(), rows)
}

/// Split a cell's text into trimmed, non-empty knowledge points.
pub fn split_points(text: &str) -> Vec<&str> {
    text.split(KNOWLEDGE_POINT_DELIMITER)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Expand each row into one row per knowledge point in its last column.
///
/// Rows with a blank last cell, or with at most one point, pass through
/// unchanged. Row order and point order are preserved.
pub fn expand_last_column(table: &Table) -> Table {
    let Some(last) = table.width().checked_sub(1) else {
        return table.clone();
    };

    let mut expanded = Table::new(table.headers().to_vec());
    for row in table.rows() {
        let text = match row.get(last) {
            Some(cell) if !cell.is_blank() => cell.to_string(),
            _ => {
                expanded.push_row(row.clone());
                continue;
            }
        };

        let points = split_points(&text);
        if points.len() <= 1 {
            expanded.push_row(row.clone());
            continue;
        }

        for point in points {
            let mut new_row = row[..last].to_vec();
            new_row.push(Cell::text(point));
            expanded.push_row(new_row);
        }
    }
    expanded
}

/// Forward-fill then expand.
pub fn split_knowledge_points(table: &Table) -> Table {
    expand_last_column(&forward_fill(table))
}

/// Read `input`, split it, and write the result to `output` (replacing it).
pub fn split_file(input: &Path, output: &Path) -> Result<SplitSummary, TableError> {
    let table = load_table(input)?;
    let result = split_knowledge_points(&table);
    save_table(&result, output)?;

    info!(
        "Split {} rows into {} rows: {}",
        table.len(),
        result.len(),
        output.display()
    );
    Ok(SplitSummary {
        input_rows: table.len(),
        output_rows: result.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        vec!["学科".into(), "层级".into(), "知识点".into()]
    }

    fn t(s: &str) -> Cell {
        Cell::text(s)
    }

    #[test]
    fn test_forward_fill() {
        let table = Table::from_rows(
            headers(),
            vec![
                vec![Cell::Empty, t("基础"), t("a")],
                vec![t("物理"), Cell::Empty, t("b")],
                vec![Cell::Empty, Cell::Empty, Cell::Empty],
                vec![t("化学"), t("进阶"), t("   ")],
            ],
        );
        let filled = forward_fill(&table);

        assert_eq!(filled.rows()[0], vec![Cell::Empty, t("基础"), t("a")]);
        assert_eq!(filled.rows()[1], vec![t("物理"), t("基础"), t("b")]);
        assert_eq!(filled.rows()[2], vec![t("物理"), t("基础"), t("b")]);
        assert_eq!(filled.rows()[3], vec![t("化学"), t("进阶"), t("   ")]);
        // Input untouched
        assert_eq!(table.rows()[2], vec![Cell::Empty; 3]);
    }

    #[test]
    fn test_expand_splits_into_rows_in_order() {
        let table = Table::from_rows(headers(), vec![vec![t("物理"), t("基础"), t("力学、光学、热学")]]);
        let expanded = expand_last_column(&table);

        assert_eq!(
            expanded.rows(),
            &[
                vec![t("物理"), t("基础"), t("力学")],
                vec![t("物理"), t("基础"), t("光学")],
                vec![t("物理"), t("基础"), t("热学")],
            ]
        );
    }

    #[test]
    fn test_expand_trims_and_drops_empty_fragments() {
        let table = Table::from_rows(
            headers(),
            vec![
                vec![t("a"), t("b"), t(" 电磁 、、 声学 、")],
                vec![t("a"), t("b"), t("原子、")],
                vec![t("a"), t("b"), Cell::Empty],
                vec![t("a"), t("b"), Cell::Number(3.0)],
            ],
        );
        let expanded = expand_last_column(&table);

        assert_eq!(expanded.len(), 5);
        assert_eq!(expanded.rows()[0][2], t("电磁"));
        assert_eq!(expanded.rows()[1][2], t("声学"));
        // Single fragment: original row kept verbatim
        assert_eq!(expanded.rows()[2][2], t("原子、"));
        assert_eq!(expanded.rows()[3][2], Cell::Empty);
        assert_eq!(expanded.rows()[4][2], Cell::Number(3.0));
    }

    #[test]
    fn test_filled_cell_without_delimiter_not_split() {
        let table = Table::from_rows(
            headers(),
            vec![
                vec![t("物理"), t("基础"), t("力学")],
                vec![Cell::Empty, t("进阶"), Cell::Empty],
            ],
        );
        let result = split_knowledge_points(&table);

        assert_eq!(
            result.rows(),
            &[
                vec![t("物理"), t("基础"), t("力学")],
                vec![t("物理"), t("进阶"), t("力学")],
            ]
        );
    }

    #[test]
    fn test_split_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.xlsx");
        let output = dir.path().join("out.xlsx");

        let table = Table::from_rows(
            headers(),
            vec![
                vec![t("物理"), t("基础"), t("力学、光学")],
                vec![Cell::Empty, Cell::Empty, t("热学")],
            ],
        );
        save_table(&table, &input).unwrap();

        let summary = split_file(&input, &output).unwrap();
        assert_eq!(
            summary,
            SplitSummary {
                input_rows: 2,
                output_rows: 3
            }
        );

        let written = load_table(&output).unwrap();
        assert_eq!(written.rows()[2], vec![t("物理"), t("基础"), t("热学")]);
    }
}
