//! Columnar conversion utilities.
//!
//! The generator and the reference analysis work on plain Rust rows; the
//! store and the SQL session work on Arrow `RecordBatch`es. This module is
//! the bridge between the two.

use datafusion::arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray,
};
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::{DataType, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use std::sync::Arc;
use taskgrade_common::{CommonError, ErrorContext, Result};

/// Trait for converting data types to Arrow arrays
pub trait ToArrowArray {
    /// Convert a vector of values to an Arrow array
    fn to_arrow_array(values: Vec<Self>) -> ArrayRef
    where
        Self: Sized;
}

impl ToArrowArray for i64 {
    fn to_arrow_array(values: Vec<Self>) -> ArrayRef {
        Arc::new(Int64Array::from(values))
    }
}

impl ToArrowArray for f64 {
    fn to_arrow_array(values: Vec<Self>) -> ArrayRef {
        Arc::new(Float64Array::from(values))
    }
}

impl ToArrowArray for String {
    fn to_arrow_array(values: Vec<Self>) -> ArrayRef {
        Arc::new(StringArray::from(values))
    }
}

impl ToArrowArray for bool {
    fn to_arrow_array(values: Vec<Self>) -> ArrayRef {
        Arc::new(BooleanArray::from(values))
    }
}

/// Trait for converting from Arrow arrays back to Rust types.
///
/// Arrays of a different but castable type (`Int32` for `i64`, `Utf8View`
/// for `String`, ...) are cast first, so rows can be decoded from whatever a
/// learner's query produced.
pub trait FromArrowArray: Sized {
    /// Convert an Arrow array to a vector of values
    fn from_arrow_array(array: &dyn Array) -> Result<Vec<Self>>;
}

fn cast_to(array: &dyn Array, data_type: &DataType) -> Result<ArrayRef> {
    cast(array, data_type).with_serialization_context(|| {
        format!("Cannot read {} column as {}", array.data_type(), data_type)
    })
}

fn null_error(index: usize) -> CommonError {
    CommonError::serialization_error(format!("Unexpected null value at row {index}"))
}

impl FromArrowArray for i64 {
    fn from_arrow_array(array: &dyn Array) -> Result<Vec<Self>> {
        let array = cast_to(array, &DataType::Int64)?;
        let int_array = array
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| CommonError::serialization_error("Expected Int64Array"))?;

        (0..int_array.len())
            .map(|i| {
                if int_array.is_null(i) {
                    Err(null_error(i))
                } else {
                    Ok(int_array.value(i))
                }
            })
            .collect()
    }
}

impl FromArrowArray for f64 {
    fn from_arrow_array(array: &dyn Array) -> Result<Vec<Self>> {
        let array = cast_to(array, &DataType::Float64)?;
        let float_array = array
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| CommonError::serialization_error("Expected Float64Array"))?;

        (0..float_array.len())
            .map(|i| {
                if float_array.is_null(i) {
                    Err(null_error(i))
                } else {
                    Ok(float_array.value(i))
                }
            })
            .collect()
    }
}

impl FromArrowArray for String {
    fn from_arrow_array(array: &dyn Array) -> Result<Vec<Self>> {
        let array = cast_to(array, &DataType::Utf8)?;
        let string_array = array
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| CommonError::serialization_error("Expected StringArray"))?;

        (0..string_array.len())
            .map(|i| {
                if string_array.is_null(i) {
                    Err(null_error(i))
                } else {
                    Ok(string_array.value(i).to_string())
                }
            })
            .collect()
    }
}

impl FromArrowArray for bool {
    fn from_arrow_array(array: &dyn Array) -> Result<Vec<Self>> {
        let array = cast_to(array, &DataType::Boolean)?;
        let bool_array = array
            .as_any()
            .downcast_ref::<BooleanArray>()
            .ok_or_else(|| CommonError::serialization_error("Expected BooleanArray"))?;

        (0..bool_array.len())
            .map(|i| {
                if bool_array.is_null(i) {
                    Err(null_error(i))
                } else {
                    Ok(bool_array.value(i))
                }
            })
            .collect()
    }
}

/// Rows that can be written as a table.
pub trait ToRecordBatch: Sized {
    /// Convert a slice of rows into a single RecordBatch.
    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch>;

    /// Get the Arrow schema corresponding to this row type.
    fn to_schema() -> SchemaRef;
}

/// Rows that can be read back from a table.
pub trait FromRecordBatch: Sized {
    /// Decode every row of the batch, matching columns by name.
    fn from_record_batch(batch: &RecordBatch) -> Result<Vec<Self>>;
}

/// Utility for creating RecordBatches from typed data
pub struct RecordBatchBuilder {
    schema: SchemaRef,
    columns: Vec<ArrayRef>,
}

impl RecordBatchBuilder {
    /// Create a new RecordBatch builder with the given schema
    pub fn new(schema: SchemaRef) -> Self {
        Self {
            schema,
            columns: Vec::new(),
        }
    }

    /// Add a column of data to the builder
    pub fn add_column<T: ToArrowArray>(mut self, values: Vec<T>) -> Self {
        self.columns.push(T::to_arrow_array(values));
        self
    }

    /// Build the RecordBatch
    pub fn build(self) -> Result<RecordBatch> {
        if self.columns.len() != self.schema.fields().len() {
            return Err(CommonError::serialization_error(format!(
                "Column count mismatch: expected {}, got {}",
                self.schema.fields().len(),
                self.columns.len()
            )));
        }

        RecordBatch::try_new(self.schema, self.columns)
            .with_serialization_context(|| "Failed to create RecordBatch".to_string())
    }
}

/// Utility for extracting data from RecordBatches
pub struct RecordBatchExtractor<'a> {
    batch: &'a RecordBatch,
}

impl<'a> RecordBatchExtractor<'a> {
    /// Create a new extractor for the given RecordBatch
    pub fn new(batch: &'a RecordBatch) -> Self {
        Self { batch }
    }

    /// Extract a column as a vector of values
    pub fn extract_column<T: FromArrowArray>(&self, column_index: usize) -> Result<Vec<T>> {
        if column_index >= self.batch.num_columns() {
            return Err(CommonError::serialization_error(format!(
                "Column index {} out of bounds for a table with {} columns",
                column_index,
                self.batch.num_columns()
            )));
        }

        T::from_arrow_array(self.batch.column(column_index).as_ref())
    }

    /// Extract a column by name
    pub fn extract_named<T: FromArrowArray>(&self, name: &str) -> Result<Vec<T>> {
        let index = self.batch.schema().index_of(name).map_err(|_| {
            CommonError::serialization_error(format!("Table has no column named {name:?}"))
        })?;
        self.extract_column(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::Int32Array;
    use datafusion::arrow::datatypes::{Field, Schema};

    #[test]
    fn test_string_to_arrow_array() {
        let values = vec!["hello".to_string(), "world".to_string()];
        let array = String::to_arrow_array(values);

        assert_eq!(array.len(), 2);
        assert_eq!(array.data_type(), &DataType::Utf8);
    }

    #[test]
    fn test_record_batch_builder() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, false),
        ]));

        let batch = RecordBatchBuilder::new(schema)
            .add_column(vec![1i64, 2, 3])
            .add_column(vec!["a".to_string(), "b".to_string(), "c".to_string()])
            .build()
            .unwrap();

        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 2);
    }

    #[test]
    fn test_builder_rejects_missing_column() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, false),
        ]));

        let result = RecordBatchBuilder::new(schema)
            .add_column(vec![1i64])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_named_casts_integers() {
        let schema = Arc::new(Schema::new(vec![Field::new(
            "skipped",
            DataType::Int32,
            false,
        )]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![0, 4]))]).unwrap();

        let extractor = RecordBatchExtractor::new(&batch);
        let values: Vec<i64> = extractor.extract_named("skipped").unwrap();
        assert_eq!(values, vec![0, 4]);
        assert!(extractor.extract_named::<i64>("missing").is_err());
    }

    #[test]
    fn test_nulls_are_rejected() {
        let array = Int64Array::from(vec![Some(1), None]);
        assert!(i64::from_arrow_array(&array).is_err());
    }
}
