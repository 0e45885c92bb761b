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
use std::sync::Arc;

use arrow::compute::{lexsort_to_indices, take, SortColumn, SortOptions};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::error::{QueryError, Result};
use crate::physical_plan::common::combine_batches;
use crate::physical_plan::{BoxedPlan, QueryPlan};

/// Fully materializes the child, sorts it once by `keys` (nulls first,
/// per-key ascending/descending) and emits the result as a single batch.
/// Suitable when the whole input is known to fit in memory; for larger
/// inputs see [`super::external_sort::ExternalSortPlan`].
pub struct SortPlan {
    keys: Vec<String>,
    descending: Vec<bool>,
    child: BoxedPlan,
    schema: SchemaRef,
    sorted: Option<RecordBatch>,
    emitted: bool,
}

impl SortPlan {
    pub fn new(keys: Vec<String>, descending: Vec<bool>, child: BoxedPlan) -> Result<Self> {
        if keys.len() != descending.len() {
            return Err(QueryError::Value(
                "sort keys and descending flags must have the same length".into(),
            ));
        }
        let schema = child.schema();
        Ok(SortPlan {
            keys,
            descending,
            child,
            schema,
            sorted: None,
            emitted: false,
        })
    }

    fn materialize(&mut self) -> Result<()> {
        let mut batches = Vec::new();
        while let Some(batch) = self.child.next()? {
            batches.push(batch);
        }
        let combined = combine_batches(&batches, Arc::clone(&self.schema))?;
        let combined = match combined {
            Some(b) => b,
            None => {
                self.sorted = None;
                return Ok(());
            }
        };

        let sort_columns: Result<Vec<SortColumn>> = self
            .keys
            .iter()
            .zip(self.descending.iter())
            .map(|(key, desc)| {
                let idx = combined.schema().index_of(key)?;
                Ok(SortColumn {
                    values: Arc::clone(combined.column(idx)),
                    options: Some(SortOptions {
                        descending: *desc,
                        nulls_first: true,
                    }),
                })
            })
            .collect();
        let indices = lexsort_to_indices(&sort_columns?, None)?;

        let columns = combined
            .columns()
            .iter()
            .map(|c| take(c.as_ref(), &indices, None))
            .collect::<arrow::error::Result<Vec<_>>>()?;
        self.sorted = Some(RecordBatch::try_new(Arc::clone(&self.schema), columns)?);
        Ok(())
    }
}

impl fmt::Display for SortPlan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Sort(keys={:?}, descending={:?}, child={})", self.keys, self.descending, self.child)
    }
}

impl QueryPlan for SortPlan {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next(&mut self) -> Result<Option<RecordBatch>> {
        if self.emitted {
            return Ok(None);
        }
        if self.sorted.is_none() {
            self.materialize()?;
        }
        self.emitted = true;
        Ok(self.sorted.take())
    }

    fn close(&mut self) -> Result<()> {
        self.emitted = true;
        self.sorted = None;
        self.child.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::physical_plan::scan::InMemoryScan;

    #[test]
    fn sort_orders_rows_ascending_nulls_first() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, true),
            Field::new("n", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![
                Arc::new(StringArray::from(vec![Some("b"), Some("a"), None])),
                Arc::new(Int64Array::from(vec![2, 1, 3])),
            ],
        )
        .unwrap();
        let scan = InMemoryScan::new(Arc::clone(&schema), vec![Arc::new(batch)]);
        let mut plan = SortPlan::new(vec!["name".to_string()], vec![false], Box::new(scan)).unwrap();
        let out = plan.next().unwrap().unwrap();
        let names = out.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(names.value(0), "");
        assert!(names.is_null(0));
        assert_eq!(names.value(1), "a");
        assert_eq!(names.value(2), "b");
    }
}
