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

use arrow::array::{Array, BooleanArray};
use arrow::compute;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::error::{QueryError, Result};
use crate::expr::Expr;
use crate::physical_plan::{BoxedPlan, QueryPlan};

/// Pulls batches from `child`, keeping only the rows for which `predicate`
/// evaluates to `true`.
pub struct FilterPlan {
    predicate: Expr,
    child: BoxedPlan,
}

impl FilterPlan {
    pub fn new(predicate: Expr, child: BoxedPlan) -> Self {
        FilterPlan { predicate, child }
    }
}

impl fmt::Display for FilterPlan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Filter(predicate={}, child={})", self.predicate, self.child)
    }
}

impl QueryPlan for FilterPlan {
    fn schema(&self) -> SchemaRef {
        self.child.schema()
    }

    fn next(&mut self) -> Result<Option<RecordBatch>> {
        loop {
            let batch = match self.child.next()? {
                Some(batch) => batch,
                None => return Ok(None),
            };
            let mask = self.predicate.evaluate(&batch)?;
            let mask = mask
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(|| {
                    QueryError::Execution("filter predicate did not evaluate to a boolean array".into())
                })?;
            let filtered = compute::filter_record_batch(&batch, mask)?;
            return Ok(Some(filtered));
        }
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }
}
