//! Storage backend (Arrow/Parquet)
//!
//! **Append-Only Write Pattern**:
//! - Experiment rows are written as whole Parquet part files, never edited
//! - A later part may supersede rows of an earlier one; readers resolve that
//! - NOT suitable for: random single-row updates
//!
//! Toyota Way Principles:
//! - Poka-Yoke: a part is only written when it has rows
//! - Muda elimination: One part file per write, no rewrite of old parts

use crate::{Error, Result};
use arrow::record_batch::RecordBatch;
use std::path::Path;

/// In-memory set of record batches sharing one schema, loadable from and
/// writable to a Parquet part file.
#[derive(Debug, Default)]
pub struct StorageEngine {
    batches: Vec<RecordBatch>,
}

impl StorageEngine {
    /// Create a new storage engine from existing batches
    #[must_use]
    pub fn new(batches: Vec<RecordBatch>) -> Self {
        Self { batches }
    }

    /// Load table from Parquet file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
        use std::fs::File;

        let file = File::open(path.as_ref()).map_err(|e| {
            Error::StorageError(format!(
                "Failed to open Parquet file {}: {e}",
                path.as_ref().display()
            ))
        })?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
            Error::StorageError(format!("Failed to parse Parquet file: {e}"))
        })?;

        let reader = builder.build().map_err(|e| {
            Error::StorageError(format!("Failed to create Parquet reader: {e}"))
        })?;

        // Read all batches into memory
        let mut batches = Vec::new();
        for batch in reader {
            let batch = batch.map_err(|e| {
                Error::StorageError(format!("Failed to read record batch: {e}"))
            })?;
            batches.push(batch);
        }

        Ok(Self { batches })
    }

    /// Write all batches to a new Parquet file at `path`.
    ///
    /// # Errors
    /// Returns error if there is nothing to write or the file cannot be written
    pub fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        use parquet::arrow::ArrowWriter;
        use std::fs::File;

        let Some(first) = self.batches.first() else {
            return Err(Error::StorageError(
                "Refusing to write an empty Parquet file".to_string(),
            ));
        };

        let file = File::create(path.as_ref())?;
        let mut writer = ArrowWriter::try_new(file, first.schema(), None)?;
        for batch in &self.batches {
            writer.write(batch)?;
        }
        writer.close()?;
        Ok(())
    }

    /// Get all record batches
    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total rows across all batches
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}
