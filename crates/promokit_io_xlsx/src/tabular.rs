//! Conversions between polars `DataFrame`s and worksheet cell grids.

use polars::prelude::{AnyValue, Column, DataFrame};

use crate::spec::{EnumCellValue, XlsxError};

/// Every row of `df` as cells. Column names are not part of the grid.
///
/// Text cells stay text, so `00042` is written as `00042`. Nulls become
/// [`EnumCellValue::None`] and are skipped by writers.
pub fn derive_cell_grid(df: &DataFrame) -> Result<Vec<Vec<EnumCellValue>>, XlsxError> {
    let l_cols = df.get_columns();
    let mut l_grid = Vec::with_capacity(df.height());
    for idx_row in 0..df.height() {
        let mut l_row = Vec::with_capacity(l_cols.len());
        for col in l_cols {
            let value = col
                .get(idx_row)
                .map_err(|err| XlsxError::Tabular(format!("Failed to read cell value: {err}")))?;
            l_row.push(derive_cell_value_from_any_value(value));
        }
        l_grid.push(l_row);
    }
    Ok(l_grid)
}

/// Build a `DataFrame` holding every row of a cell grid, columns named
/// `column_1..column_n`. Short rows are padded with nulls.
///
/// A column whose cells are all numbers stays numeric and one whose cells
/// are all booleans stays boolean; any other column is text.
pub fn derive_dataframe_from_grid(l_grid: &[Vec<EnumCellValue>]) -> Result<DataFrame, XlsxError> {
    let n_width = l_grid.iter().map(Vec::len).max().unwrap_or(0);
    let l_columns: Vec<Column> = (0..n_width)
        .map(|idx_col| {
            let l_cells: Vec<Option<&EnumCellValue>> = l_grid
                .iter()
                .map(|row| row.get(idx_col).filter(|value| !value.is_none()))
                .collect();
            derive_column(format!("column_{}", idx_col + 1), &l_cells)
        })
        .collect();

    DataFrame::new(l_columns).map_err(|err| XlsxError::Tabular(err.to_string()))
}

fn derive_column(name: String, l_cells: &[Option<&EnumCellValue>]) -> Column {
    let l_present: Vec<&EnumCellValue> = l_cells.iter().flatten().copied().collect();
    let if_all = |predicate: fn(&EnumCellValue) -> bool| {
        !l_present.is_empty() && l_present.iter().all(|value| predicate(value))
    };

    if if_all(|value| matches!(value, EnumCellValue::Number(_))) {
        let l_values: Vec<Option<f64>> = l_cells
            .iter()
            .map(|value| match value {
                Some(EnumCellValue::Number(n)) => Some(*n),
                _ => None,
            })
            .collect();
        Column::new(name.into(), l_values)
    } else if if_all(|value| matches!(value, EnumCellValue::Boolean(_))) {
        let l_values: Vec<Option<bool>> = l_cells
            .iter()
            .map(|value| match value {
                Some(EnumCellValue::Boolean(b)) => Some(*b),
                _ => None,
            })
            .collect();
        Column::new(name.into(), l_values)
    } else {
        let l_values: Vec<Option<String>> = l_cells
            .iter()
            .map(|value| value.map(EnumCellValue::to_text))
            .collect();
        Column::new(name.into(), l_values)
    }
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => EnumCellValue::Boolean(val),
        AnyValue::UInt8(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt16(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int8(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int16(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) if val.is_finite() => EnumCellValue::Number(val),
        AnyValue::Float64(_) => EnumCellValue::None,
        _ => EnumCellValue::String(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> EnumCellValue {
        EnumCellValue::String(s.to_string())
    }

    #[test]
    fn test_grid_round_trip_keeps_text_and_blanks() {
        let l_grid = vec![
            vec![text("Article"), EnumCellValue::None, text("Qty")],
            vec![text("00042"), EnumCellValue::None, EnumCellValue::Number(3.0)],
            vec![text("00077")],
        ];
        let df = derive_dataframe_from_grid(&l_grid).unwrap();
        assert_eq!(df.shape(), (3, 3));
        assert_eq!(df.get_column_names_str(), vec!["column_1", "column_2", "column_3"]);

        assert_eq!(
            derive_cell_grid(&df).unwrap(),
            vec![
                vec![text("Article"), EnumCellValue::None, text("Qty")],
                vec![text("00042"), EnumCellValue::None, text("3")],
                vec![text("00077"), EnumCellValue::None, EnumCellValue::None],
            ]
        );
    }

    #[test]
    fn test_uniform_columns_keep_their_type() {
        let l_grid = vec![
            vec![EnumCellValue::Number(100.0), EnumCellValue::Boolean(true)],
            vec![EnumCellValue::None, EnumCellValue::Boolean(false)],
            vec![EnumCellValue::Number(2.5)],
        ];
        let df = derive_dataframe_from_grid(&l_grid).unwrap();
        assert_eq!(
            derive_cell_grid(&df).unwrap(),
            vec![
                vec![EnumCellValue::Number(100.0), EnumCellValue::Boolean(true)],
                vec![EnumCellValue::None, EnumCellValue::Boolean(false)],
                vec![EnumCellValue::Number(2.5), EnumCellValue::None],
            ]
        );
    }

    #[test]
    fn test_empty_grid() {
        let df = derive_dataframe_from_grid(&[]).unwrap();
        assert_eq!(df.shape(), (0, 0));
    }
}
