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

//! The physical operator tree. Every node is a single-threaded, pull-based
//! iterator of `RecordBatch`es: callers drive it by repeatedly calling
//! `next()` until it returns `None`, then call `close()`. There is no
//! async runtime here and no background work happens between calls.

pub mod aggregate;
pub mod common;
pub mod external_sort;
pub mod filter;
pub mod join;
pub mod paginate;
pub mod project;
pub mod scan;
pub mod sort;

use std::fmt;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::error::Result;

/// A node in the physical plan tree.
///
/// `next()` pulls the next batch, or `Ok(None)` once the node is exhausted.
/// Nodes are free to return zero-row batches; callers must not treat that
/// as end-of-stream. `close()` releases any held resources (temp files,
/// memory-mapped runs) and is safe to call multiple times or before the
/// stream is drained.
pub trait QueryPlan: fmt::Display {
    fn schema(&self) -> SchemaRef;
    fn next(&mut self) -> Result<Option<RecordBatch>>;
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

pub type BoxedPlan = Box<dyn QueryPlan>;

/// Drains a plan into a `Vec<RecordBatch>`, always calling `close()`
/// afterwards even if iteration fails partway through.
pub fn collect(mut plan: BoxedPlan) -> Result<Vec<RecordBatch>> {
    let mut out = Vec::new();
    let result = loop {
        match plan.next() {
            Ok(Some(batch)) => out.push(batch),
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    plan.close()?;
    result.map(|_| out)
}
