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

//! A bounded-memory sort: each input batch is sorted on its own and
//! spilled to a temp Arrow IPC file, memory-mapped back, then all runs
//! are merged with a k-way heap merge that only ever holds one row's
//! worth of state per run at a time (plus the mmap'd pages themselves).

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;

use arrow::compute::{lexsort_to_indices, take, SortColumn, SortOptions};
use arrow::datatypes::SchemaRef;
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use memmap2::Mmap;
use tempfile::{Builder as TempFileBuilder, NamedTempFile};

use crate::config::ExecutionConfig;
use crate::error::Result;
use crate::physical_plan::{BoxedPlan, QueryPlan};
use crate::scalar::{ScalarValue, SortKey};

struct Run {
    _mmap: Mmap,
    _file: NamedTempFile,
    batch: RecordBatch,
    cursor: usize,
}

impl Run {
    fn peek_key(&self, keys: &[String], descending: &[bool]) -> Option<SortKey> {
        if self.cursor >= self.batch.num_rows() {
            return None;
        }
        let values = keys
            .iter()
            .map(|k| {
                let idx = self.batch.schema().index_of(k).expect("sort key column must exist");
                ScalarValue::from_array(&self.batch.column(idx).clone(), self.cursor)
                    .expect("sort key column must be of a comparable type")
            })
            .collect();
        Some(SortKey {
            values,
            ascending: descending.iter().map(|d| !d).collect(),
        })
    }
}

struct HeapEntry {
    key: SortKey,
    run_idx: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the smallest key surfaces first.
        other.key.cmp(&self.key)
    }
}

pub struct ExternalSortPlan {
    keys: Vec<String>,
    descending: Vec<bool>,
    child: BoxedPlan,
    schema: SchemaRef,
    config: ExecutionConfig,
    runs: Option<Vec<Run>>,
    heap: BinaryHeap<HeapEntry>,
    done: bool,
}

impl ExternalSortPlan {
    pub fn new(keys: Vec<String>, descending: Vec<bool>, child: BoxedPlan, config: ExecutionConfig) -> Self {
        let schema = child.schema();
        ExternalSortPlan {
            keys,
            descending,
            child,
            schema,
            config,
            runs: None,
            heap: BinaryHeap::new(),
            done: false,
        }
    }

    fn sort_batch(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let sort_columns: Result<Vec<SortColumn>> = self
            .keys
            .iter()
            .zip(self.descending.iter())
            .map(|(key, desc)| {
                let idx = batch.schema().index_of(key)?;
                Ok(SortColumn {
                    values: Arc::clone(batch.column(idx)),
                    options: Some(SortOptions {
                        descending: *desc,
                        nulls_first: true,
                    }),
                })
            })
            .collect();
        let indices = lexsort_to_indices(&sort_columns?, None)?;
        let columns = batch
            .columns()
            .iter()
            .map(|c| take(c.as_ref(), &indices, None))
            .collect::<arrow::error::Result<Vec<_>>>()?;
        Ok(RecordBatch::try_new(batch.schema(), columns)?)
    }

    fn build_runs(&mut self) -> Result<()> {
        let mut runs = Vec::new();
        while let Some(batch) = self.child.next()? {
            if batch.num_rows() == 0 {
                continue;
            }
            let sorted = self.sort_batch(&batch)?;

            let temp_file = TempFileBuilder::new()
                .prefix("queryground-sort-")
                .suffix(".arrow")
                .tempfile_in(self.config.temp_dir())?;
            log::debug!(
                "external sort spilling {} rows to {}",
                sorted.num_rows(),
                temp_file.path().display()
            );
            {
                let file = temp_file.reopen()?;
                let mut writer = FileWriter::try_new(BufWriter::new(file), &self.schema)?;
                writer.write(&sorted)?;
                writer.finish()?;
            }

            let file = File::open(temp_file.path())?;
            let mmap = unsafe { Mmap::map(&file)? };
            let cursor = std::io::Cursor::new(&mmap[..]);
            let mut reader = FileReader::try_new(cursor)?;
            let batch = reader
                .next()
                .transpose()?
                .unwrap_or_else(|| sorted.clone());

            runs.push(Run {
                _mmap: mmap,
                _file: temp_file,
                batch,
                cursor: 0,
            });
        }

        for (idx, run) in runs.iter().enumerate() {
            if let Some(key) = run.peek_key(&self.keys, &self.descending) {
                self.heap.push(HeapEntry { key, run_idx: idx });
            }
        }
        self.runs = Some(runs);
        Ok(())
    }
}

impl fmt::Display for ExternalSortPlan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "ExternalSort(keys={:?}, descending={:?}, child={})",
            self.keys, self.descending, self.child
        )
    }
}

impl QueryPlan for ExternalSortPlan {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next(&mut self) -> Result<Option<RecordBatch>> {
        if self.done {
            return Ok(None);
        }
        if self.runs.is_none() {
            self.build_runs()?;
        }

        let batch_size = self.config.batch_size;
        let mut picked_rows: Vec<RecordBatch> = Vec::with_capacity(batch_size);

        while picked_rows.len() < batch_size {
            let entry = match self.heap.pop() {
                Some(entry) => entry,
                None => break,
            };
            let runs = self.runs.as_mut().unwrap();
            let run = &mut runs[entry.run_idx];
            picked_rows.push(run.batch.slice(run.cursor, 1));
            run.cursor += 1;
            if let Some(next_key) = run.peek_key(&self.keys, &self.descending) {
                self.heap.push(HeapEntry {
                    key: next_key,
                    run_idx: entry.run_idx,
                });
            }
        }

        if picked_rows.is_empty() {
            self.done = true;
            return Ok(None);
        }

        let combined = crate::physical_plan::common::combine_batches(&picked_rows, Arc::clone(&self.schema))?;
        Ok(combined)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(runs) = &self.runs {
            log::debug!("external sort releasing {} spill file(s)", runs.len());
        }
        self.done = true;
        self.heap.clear();
        self.runs = None;
        self.child.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::physical_plan::scan::InMemoryScan;

    #[test]
    fn external_sort_merges_runs_in_order() {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, false)]));
        let b1 = RecordBatch::try_new(Arc::clone(&schema), vec![Arc::new(Int64Array::from(vec![5, 1, 9]))]).unwrap();
        let b2 = RecordBatch::try_new(Arc::clone(&schema), vec![Arc::new(Int64Array::from(vec![2, 8, 3]))]).unwrap();
        let scan = InMemoryScan::new(Arc::clone(&schema), vec![Arc::new(b1), Arc::new(b2)]);
        let mut plan = ExternalSortPlan::new(
            vec!["a".to_string()],
            vec![false],
            Box::new(scan),
            ExecutionConfig::default(),
        );
        let mut values = Vec::new();
        while let Some(batch) = plan.next().unwrap() {
            let col = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
            values.extend(col.values());
        }
        assert_eq!(values, vec![1, 2, 3, 5, 8, 9]);
        plan.close().unwrap();
    }
}
