// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Leaf operators: CSV, Parquet, and in-memory table sources. Each one
//! hands out batches it already has (or reads lazily) without taking any
//! child plan.

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::csv;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::{ArrowReader, ParquetFileArrowReader};
use parquet::file::reader::SerializedFileReader;

use crate::error::{QueryError, Result};
use crate::physical_plan::QueryPlan;

/// Scans batches already held in memory, the source used for literal
/// tables and for query results embedded directly in test fixtures.
pub struct InMemoryScan {
    schema: SchemaRef,
    batches: Vec<Arc<RecordBatch>>,
    index: usize,
}

impl InMemoryScan {
    pub fn new(schema: SchemaRef, batches: Vec<Arc<RecordBatch>>) -> Self {
        InMemoryScan {
            schema,
            batches,
            index: 0,
        }
    }
}

impl fmt::Display for InMemoryScan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "InMemoryScan(columns={:?}, rows={})",
            self.schema.fields().iter().map(|f| f.name().clone()).collect::<Vec<_>>(),
            self.batches.iter().map(|b| b.num_rows()).sum::<usize>()
        )
    }
}

impl QueryPlan for InMemoryScan {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next(&mut self) -> Result<Option<RecordBatch>> {
        if self.index < self.batches.len() {
            let batch = self.batches[self.index].as_ref().clone();
            self.index += 1;
            Ok(Some(batch))
        } else {
            Ok(None)
        }
    }
}

/// Scans a CSV file, producing batches of up to `batch_size` rows.
pub struct CsvScan {
    reader: csv::Reader<File>,
    schema: SchemaRef,
}

impl CsvScan {
    pub fn open(path: impl AsRef<Path>, batch_size: usize) -> Result<Self> {
        log::debug!("opening CSV scan: {}", path.as_ref().display());
        let file = File::open(path.as_ref())?;
        let schema = Arc::new(csv::infer_schema_from_files(
            &[path.as_ref().to_string_lossy().to_string()],
            b',',
            Some(100),
            true,
        )?);
        let reader = csv::Reader::new(
            file,
            Arc::clone(&schema),
            true,
            None,
            batch_size,
            None,
            None,
        );
        Ok(CsvScan { reader, schema })
    }
}

impl fmt::Display for CsvScan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CsvScan(columns={:?})", self.schema.fields().iter().map(|f| f.name().clone()).collect::<Vec<_>>())
    }
}

impl QueryPlan for CsvScan {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next(&mut self) -> Result<Option<RecordBatch>> {
        match self.reader.next() {
            Some(Ok(batch)) => Ok(Some(batch)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }
}

/// Scans a Parquet file, producing batches of up to `batch_size` rows.
pub struct ParquetScan {
    reader: Box<dyn RecordBatchReaderLike>,
    schema: SchemaRef,
}

trait RecordBatchReaderLike {
    fn next_batch(&mut self) -> Option<arrow::error::Result<RecordBatch>>;
}

struct ArrowReaderAdapter(parquet::arrow::arrow_reader::ParquetRecordBatchReader);

impl RecordBatchReaderLike for ArrowReaderAdapter {
    fn next_batch(&mut self) -> Option<arrow::error::Result<RecordBatch>> {
        self.0.next()
    }
}

impl ParquetScan {
    pub fn open(path: impl AsRef<Path>, batch_size: usize) -> Result<Self> {
        log::debug!("opening Parquet scan: {}", path.as_ref().display());
        let file = File::open(path.as_ref())?;
        let file_reader = SerializedFileReader::new(file)
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        let mut arrow_reader = ParquetFileArrowReader::new(Arc::new(file_reader));
        let schema = arrow_reader
            .get_schema()
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        let schema = Arc::new(schema);
        let record_reader = arrow_reader
            .get_record_reader(batch_size)
            .map_err(|e| QueryError::Execution(e.to_string()))?;
        Ok(ParquetScan {
            reader: Box::new(ArrowReaderAdapter(record_reader)),
            schema,
        })
    }
}

impl fmt::Display for ParquetScan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ParquetScan(columns={:?})", self.schema.fields().iter().map(|f| f.name().clone()).collect::<Vec<_>>())
    }
}

impl QueryPlan for ParquetScan {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next(&mut self) -> Result<Option<RecordBatch>> {
        match self.reader.next_batch() {
            Some(Ok(batch)) => Ok(Some(batch)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};

    #[test]
    fn in_memory_scan_yields_batches_then_none() {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, false)]));
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![Arc::new(Int64Array::from(vec![1, 2, 3]))],
        )
        .unwrap();
        let mut scan = InMemoryScan::new(schema, vec![Arc::new(batch)]);
        assert!(scan.next().unwrap().is_some());
        assert!(scan.next().unwrap().is_none());
        assert!(scan.next().unwrap().is_none());
    }
}
