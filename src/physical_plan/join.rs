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

//! Inner equi-join. Both sides are read fully, restricted to rows whose
//! join key also appears (non-null) on the other side, sorted by that
//! key, then zipped column-by-column. A null join key never matches,
//! even a null against a null. Right-side columns whose name collides
//! with a left-side column are renamed with a `_right` suffix; the right
//! join key column is dropped from the output.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray};
use arrow::compute::{filter_record_batch, lexsort_to_indices, take, SortColumn, SortOptions};
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::error::{QueryError, Result};
use crate::physical_plan::common::combine_batches;
use crate::physical_plan::{BoxedPlan, QueryPlan};
use crate::scalar::ScalarValue;

#[derive(PartialEq, PartialOrd)]
struct OrdKey(ScalarValue);
impl Eq for OrdKey {}
impl Ord for OrdKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        crate::scalar::cmp_scalars(&self.0, &other.0, true)
    }
}

fn unique_non_null(array: &ArrayRef) -> Result<BTreeSet<OrdKey>> {
    let mut set = BTreeSet::new();
    for row in 0..array.len() {
        if array.is_null(row) {
            continue;
        }
        set.insert(OrdKey(ScalarValue::from_array(array, row)?));
    }
    Ok(set)
}

fn is_in_mask(array: &ArrayRef, other: &BTreeSet<OrdKey>) -> Result<BooleanArray> {
    let mut values = Vec::with_capacity(array.len());
    for row in 0..array.len() {
        if array.is_null(row) {
            values.push(false);
            continue;
        }
        let key = OrdKey(ScalarValue::from_array(array, row)?);
        values.push(other.contains(&key));
    }
    Ok(BooleanArray::from(values))
}

fn sort_by_column(batch: &RecordBatch, col_idx: usize) -> Result<RecordBatch> {
    let indices = lexsort_to_indices(
        &[SortColumn {
            values: Arc::clone(batch.column(col_idx)),
            options: Some(SortOptions {
                descending: false,
                nulls_first: true,
            }),
        }],
        None,
    )?;
    let columns = batch
        .columns()
        .iter()
        .map(|c| take(c.as_ref(), &indices, None))
        .collect::<arrow::error::Result<Vec<_>>>()?;
    Ok(RecordBatch::try_new(batch.schema(), columns)?)
}

pub struct InnerJoinPlan {
    left_key: String,
    right_key: String,
    left: BoxedPlan,
    right: BoxedPlan,
    schema: SchemaRef,
    emitted: bool,
}

impl InnerJoinPlan {
    pub fn new(left_key: impl Into<String>, right_key: impl Into<String>, left: BoxedPlan, right: BoxedPlan) -> Result<Self> {
        let left_key = left_key.into();
        let right_key = right_key.into();
        let left_schema = left.schema();
        let right_schema = right.schema();
        left_schema.field_with_name(&left_key)?;
        right_schema.field_with_name(&right_key)?;

        let mut fields: Vec<Field> = left_schema.fields().clone();
        let left_names: BTreeSet<&str> = fields.iter().map(|f| f.name().as_str()).collect();
        for f in right_schema.fields() {
            if f.name() == &right_key {
                continue;
            }
            if left_names.contains(f.name().as_str()) {
                fields.push(Field::new(format!("{}_right", f.name()), f.data_type().clone(), true));
            } else {
                fields.push(f.clone());
            }
        }
        let schema = Arc::new(Schema::new(fields));

        Ok(InnerJoinPlan {
            left_key,
            right_key,
            left,
            right,
            schema,
            emitted: false,
        })
    }

    fn compute(&mut self) -> Result<RecordBatch> {
        let left_schema = self.left.schema();
        let right_schema = self.right.schema();

        let mut left_batches = Vec::new();
        while let Some(b) = self.left.next()? {
            left_batches.push(b);
        }
        let mut right_batches = Vec::new();
        while let Some(b) = self.right.next()? {
            right_batches.push(b);
        }

        let left_batch = combine_batches(&left_batches, Arc::clone(&left_schema))?;
        let right_batch = combine_batches(&right_batches, Arc::clone(&right_schema))?;

        let (left_batch, right_batch) = match (left_batch, right_batch) {
            (Some(l), Some(r)) => (l, r),
            _ => {
                let columns = self
                    .schema
                    .fields()
                    .iter()
                    .map(|f| arrow::array::new_empty_array(f.data_type()))
                    .collect();
                return Ok(RecordBatch::try_new(Arc::clone(&self.schema), columns)?);
            }
        };

        let left_key_idx = left_batch.schema().index_of(&self.left_key)?;
        let right_key_idx = right_batch.schema().index_of(&self.right_key)?;

        let left_unique = unique_non_null(left_batch.column(left_key_idx))?;
        let right_unique = unique_non_null(right_batch.column(right_key_idx))?;

        let left_mask = is_in_mask(left_batch.column(left_key_idx), &right_unique)?;
        let right_mask = is_in_mask(right_batch.column(right_key_idx), &left_unique)?;

        let filtered_left = filter_record_batch(&left_batch, &left_mask)?;
        let filtered_right = filter_record_batch(&right_batch, &right_mask)?;

        let sorted_left = sort_by_column(&filtered_left, left_key_idx)?;
        let sorted_right = sort_by_column(&filtered_right, right_key_idx)?;

        if sorted_left.num_rows() != sorted_right.num_rows() {
            return Err(QueryError::Execution(
                "inner join key is not unique on at least one side".into(),
            ));
        }

        let mut columns: Vec<ArrayRef> = sorted_left.columns().to_vec();
        for (i, f) in right_schema.fields().iter().enumerate() {
            if f.name() == &self.right_key {
                continue;
            }
            columns.push(Arc::clone(sorted_right.column(i)));
        }

        Ok(RecordBatch::try_new(Arc::clone(&self.schema), columns)?)
    }
}

impl fmt::Display for InnerJoinPlan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "InnerJoin(left_key={}, right_key={}, left={}, right={})",
            self.left_key, self.right_key, self.left, self.right
        )
    }
}

impl QueryPlan for InnerJoinPlan {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next(&mut self) -> Result<Option<RecordBatch>> {
        if self.emitted {
            return Ok(None);
        }
        self.emitted = true;
        Ok(Some(self.compute()?))
    }

    fn close(&mut self) -> Result<()> {
        self.emitted = true;
        self.left.close()?;
        self.right.close()
    }
}
