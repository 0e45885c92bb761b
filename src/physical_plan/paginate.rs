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

use std::fmt;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::error::Result;
use crate::physical_plan::{BoxedPlan, QueryPlan};

/// Skips `offset` rows then emits at most `length` more, stopping the
/// child early once enough rows have been produced. Skipped and trailing
/// batches are dropped without being materialized past a zero-copy slice.
pub struct PaginatePlan {
    offset: usize,
    length: usize,
    child: BoxedPlan,
    consumed_rows: usize,
    emitted_rows: usize,
    done: bool,
}

impl PaginatePlan {
    pub fn new(offset: usize, length: usize, child: BoxedPlan) -> Self {
        PaginatePlan {
            offset,
            length,
            child,
            consumed_rows: 0,
            emitted_rows: 0,
            done: length == 0,
        }
    }
}

impl fmt::Display for PaginatePlan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Paginate(offset={}, length={}, child={})", self.offset, self.length, self.child)
    }
}

impl QueryPlan for PaginatePlan {
    fn schema(&self) -> SchemaRef {
        self.child.schema()
    }

    fn next(&mut self) -> Result<Option<RecordBatch>> {
        if self.done {
            return Ok(None);
        }
        loop {
            let batch = match self.child.next()? {
                Some(batch) => batch,
                None => {
                    self.done = true;
                    return Ok(None);
                }
            };
            let batch_rows = batch.num_rows();
            let batch_end = self.consumed_rows + batch_rows;

            if batch_end <= self.offset {
                // Entirely before the window; skip without slicing.
                self.consumed_rows = batch_end;
                continue;
            }

            let start_in_batch = self.offset.saturating_sub(self.consumed_rows);
            let remaining = self.length - self.emitted_rows;
            let available = batch_rows - start_in_batch;
            let take = remaining.min(available);

            self.consumed_rows = batch_end;
            if take == 0 {
                self.done = true;
                return Ok(None);
            }

            let sliced = batch.slice(start_in_batch, take);
            self.emitted_rows += take;
            if self.emitted_rows >= self.length {
                self.done = true;
            }
            return Ok(Some(sliced));
        }
    }

    fn close(&mut self) -> Result<()> {
        self.done = true;
        self.child.close()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};

    use super::*;
    use crate::physical_plan::scan::InMemoryScan;

    fn batch(values: Vec<i64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values))]).unwrap()
    }

    #[test]
    fn paginate_spans_multiple_batches() {
        let scan = InMemoryScan::new(
            batch(vec![]).schema(),
            vec![
                Arc::new(batch(vec![1, 2, 3])),
                Arc::new(batch(vec![4, 5, 6])),
                Arc::new(batch(vec![7, 8, 9])),
            ],
        );
        let mut plan = PaginatePlan::new(2, 4, Box::new(scan));
        let mut values = Vec::new();
        while let Some(b) = plan.next().unwrap() {
            let col = b.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
            values.extend(col.values());
        }
        assert_eq!(values, vec![3, 4, 5, 6]);
    }

    #[test]
    fn paginate_zero_length_emits_nothing() {
        let scan = InMemoryScan::new(batch(vec![]).schema(), vec![Arc::new(batch(vec![1, 2, 3]))]);
        let mut plan = PaginatePlan::new(0, 0, Box::new(scan));
        assert!(plan.next().unwrap().is_none());
    }
}
