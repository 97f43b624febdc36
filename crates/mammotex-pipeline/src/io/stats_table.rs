//! Per-sample "mean" / "std" statistic tables.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::PipelineError;

/// The catalog columns of a statistics table, with incomplete rows dropped.
///
/// Columns outside the selection are never parsed, so tables may carry text
/// columns such as image identifiers.
#[derive(Debug, Clone)]
pub struct StatsTable {
    pub path: PathBuf,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub dropped_rows: usize,
}

impl StatsTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of the selected columns, in selection order, from the first
    /// complete row.
    pub fn first_row(&self) -> Result<&[f64]> {
        self.rows.first().map(Vec::as_slice).ok_or_else(|| {
            PipelineError::EmptyInput(format!("no complete rows in {}", self.path.display())).into()
        })
    }
}

/// Read `columns` of a statistics table, dropping every row that has a
/// missing value in one of them.
pub fn read_stats_table(path: &Path, columns: &[String]) -> Result<StatsTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open statistics table: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .clone();

    let indices = columns
        .iter()
        .map(|column| {
            headers
                .iter()
                .position(|h| h == column.as_str())
                .ok_or_else(|| PipelineError::MissingColumn {
                    path: path.to_path_buf(),
                    column: column.clone(),
                })
        })
        .collect::<Result<Vec<usize>, PipelineError>>()?;

    let mut rows = Vec::new();
    let mut dropped_rows = 0;

    'records: for (row_idx, result) in reader.records().enumerate() {
        let record = result
            .with_context(|| format!("Failed to read row {} of {}", row_idx + 1, path.display()))?;

        let mut values = Vec::with_capacity(indices.len());
        for (&idx, column) in indices.iter().zip(columns) {
            let field = match record.get(idx) {
                Some(field) if !is_missing(field) => field,
                _ => {
                    dropped_rows += 1;
                    continue 'records;
                }
            };
            let value = field.parse::<f64>().with_context(|| {
                format!(
                    "Invalid value '{}' in column '{}' at row {} of {}",
                    field,
                    column,
                    row_idx + 1,
                    path.display()
                )
            })?;
            values.push(value);
        }
        rows.push(values);
    }

    Ok(StatsTable {
        path: path.to_path_buf(),
        columns: columns.to_vec(),
        rows,
        dropped_rows,
    })
}

fn is_missing(field: &str) -> bool {
    matches!(
        field.to_lowercase().as_str(),
        "" | "nan" | "na" | "n/a" | "null" | "none"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_table(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("sample_mean.csv");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn names(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn rows_with_missing_values_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(dir.path(), "a,b\n1,\n2,NaN\n3,4\n5\n");
        let table = read_stats_table(&path, &names(&["a", "b"])).unwrap();
        assert_eq!(table.rows, vec![vec![3.0, 4.0]]);
        assert_eq!(table.dropped_rows, 3);
    }

    #[test]
    fn columns_are_selected_in_requested_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(dir.path(), "c,a,b\n3,1,2\n");
        let table = read_stats_table(&path, &names(&["a", "b", "c"])).unwrap();
        assert_eq!(table.first_row().unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn unselected_text_columns_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(dir.path(), "image,a,b,note\nL_CC.dcm,1,2,\n");
        let table = read_stats_table(&path, &names(&["a", "b"])).unwrap();
        assert_eq!(table.first_row().unwrap(), &[1.0, 2.0]);
        assert_eq!(table.dropped_rows, 0);
    }

    #[test]
    fn text_in_a_selected_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(dir.path(), "a,b\n1,high\n");
        assert!(read_stats_table(&path, &names(&["a", "b"])).is_err());
    }

    #[test]
    fn unknown_column_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(dir.path(), "a\n1\n");
        let err = read_stats_table(&path, &names(&["z"])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingColumn { .. })
        ));
    }
}
