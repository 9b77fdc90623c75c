//! Parquet data files to JSON rows.

use std::fs::File;
use std::path::Path;

use arrow::json::ArrayWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::{Row, StoreError, StoreResult};

/// Read every row of the parquet file at `path`.
///
/// Each row becomes a JSON object keyed by column name. Null columns are
/// omitted from the object, matching how Groonga treats missing values.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is not valid parquet.
pub fn read_parquet_rows(path: &Path) -> StoreResult<Vec<Row>> {
    let decode_error = |message: String| StoreError::Parquet {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .and_then(|builder| builder.build())
        .map_err(|e| decode_error(e.to_string()))?;

    let mut writer = ArrayWriter::new(Vec::new());
    for batch in reader {
        let batch = batch.map_err(|e| decode_error(e.to_string()))?;
        writer
            .write(&batch)
            .map_err(|e| decode_error(e.to_string()))?;
    }
    writer.finish().map_err(|e| decode_error(e.to_string()))?;

    let buffer = writer.into_inner();
    if buffer.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&buffer).map_err(|e| decode_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Int64Array, StringArray};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_parquet(path: &Path, batch: &RecordBatch) {
        let file = File::create(path).unwrap();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(batch).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn test_rows_are_keyed_by_column() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("2024-03-01-00-00-00-000000000.parquet");

        let keys: ArrayRef = Arc::new(StringArray::from(vec!["a", "b"]));
        let prices: ArrayRef = Arc::new(Int64Array::from(vec![Some(10), None]));
        let batch = RecordBatch::try_from_iter([("_key", keys), ("price", prices)]).unwrap();
        write_parquet(&path, &batch);

        let rows = read_parquet_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(serde_json::Value::Object(rows[0].clone()), json!({"_key": "a", "price": 10}));
        assert_eq!(serde_json::Value::Object(rows[1].clone()), json!({"_key": "b"}));
    }

    #[test]
    fn test_empty_file_has_no_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.parquet");

        let keys: ArrayRef = Arc::new(StringArray::from(Vec::<&str>::new()));
        let batch = RecordBatch::try_from_iter([("_key", keys)]).unwrap();
        write_parquet(&path, &batch);

        assert!(read_parquet_rows(&path).unwrap().is_empty());
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.parquet");
        std::fs::write(&path, "not parquet").unwrap();

        assert!(matches!(
            read_parquet_rows(&path),
            Err(StoreError::Parquet { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            read_parquet_rows(&temp_dir.path().join("missing.parquet")),
            Err(StoreError::Read { .. })
        ));
    }
}
