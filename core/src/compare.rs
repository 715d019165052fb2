//! Exact table comparison between a candidate result and a reference answer.
//!
//! Order matters everywhere: columns are matched by position and name, rows
//! by position. Physical types are normalised per family first (every
//! integer width is `Int64`, every string encoding is `Utf8`, every float is
//! `Float64`) because SQL engines pick widths the learner never wrote.

use datafusion::arrow::array::{Array, ArrayRef};
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::{DataType, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use std::fmt;

/// Why a candidate table differs from the reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    /// Different number of rows or columns, as `(rows, columns)`.
    Shape {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    /// Same width, different column names or column order.
    Columns {
        expected: Vec<String>,
        actual: Vec<String>,
    },
    Types {
        column: String,
        expected: DataType,
        actual: DataType,
    },
    /// First row at which `column` differs.
    Values { column: String, row: usize },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Shape { expected, actual } => write!(
                f,
                "table has shape {actual:?} but should have shape {expected:?}"
            ),
            Mismatch::Columns { expected, actual } => {
                write!(f, "columns {actual:?} should be {expected:?}")
            }
            Mismatch::Types {
                column,
                expected,
                actual,
            } => write!(f, "column {column} has type {actual} but should be {expected}"),
            Mismatch::Values { column, row } => {
                write!(f, "column {column} differs first at row {row}")
            }
        }
    }
}

/// Outcome of comparing two tables.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Equal,
    Different(Mismatch),
}

impl Comparison {
    pub fn is_equal(&self) -> bool {
        matches!(self, Comparison::Equal)
    }
}

/// Shape of a table as `(rows, columns)`.
pub fn shape(batch: &RecordBatch) -> (usize, usize) {
    (batch.num_rows(), batch.num_columns())
}

/// Collapse a physical type to the family it is compared in.
pub fn normalized_type(data_type: &DataType) -> DataType {
    match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => DataType::Int64,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => DataType::Utf8,
        DataType::Float16 | DataType::Float32 | DataType::Float64 => DataType::Float64,
        other => other.clone(),
    }
}

fn normalize(array: &ArrayRef) -> Option<ArrayRef> {
    let target = normalized_type(array.data_type());
    if &target == array.data_type() {
        Some(array.clone())
    } else {
        cast(array.as_ref(), &target).ok()
    }
}

fn first_difference(actual: &dyn Array, expected: &dyn Array) -> Option<usize> {
    if actual == expected {
        return None;
    }
    (0..expected.len())
        .find(|&row| actual.slice(row, 1).as_ref() != expected.slice(row, 1).as_ref())
        .or(Some(0))
}

/// Compare `actual` against `expected`.
///
/// Checks run in order shape, column names, types, values, and the first
/// failing check is reported.
pub fn compare_tables(actual: &RecordBatch, expected: &RecordBatch) -> Comparison {
    if shape(actual) != shape(expected) {
        return Comparison::Different(Mismatch::Shape {
            expected: shape(expected),
            actual: shape(actual),
        });
    }

    let actual_schema = actual.schema();
    let expected_schema = expected.schema();
    let names = |schema: &Schema| -> Vec<String> {
        schema.fields().iter().map(|f| f.name().clone()).collect()
    };
    if names(actual_schema.as_ref()) != names(expected_schema.as_ref()) {
        return Comparison::Different(Mismatch::Columns {
            expected: names(expected_schema.as_ref()),
            actual: names(actual_schema.as_ref()),
        });
    }

    for (index, field) in expected_schema.fields().iter().enumerate() {
        let actual_column = actual.column(index);
        let expected_column = expected.column(index);

        let type_mismatch = || {
            Comparison::Different(Mismatch::Types {
                column: field.name().clone(),
                expected: expected_column.data_type().clone(),
                actual: actual_column.data_type().clone(),
            })
        };
        if normalized_type(actual_column.data_type())
            != normalized_type(expected_column.data_type())
        {
            return type_mismatch();
        }
        let (Some(actual_column), Some(expected_column)) =
            (normalize(actual_column), normalize(expected_column))
        else {
            return type_mismatch();
        };

        if let Some(row) = first_difference(actual_column.as_ref(), expected_column.as_ref()) {
            return Comparison::Different(Mismatch::Values {
                column: field.name().clone(),
                row,
            });
        }
    }

    Comparison::Equal
}
