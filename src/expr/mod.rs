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

//! Expressions evaluate a `RecordBatch` into a single `ArrayRef`. A closed
//! enum of three shapes is enough for this engine: a named column, a
//! constant, and a call to one of the builtin scalar functions below.
//! Aggregations are a distinct concept handled entirely inside the
//! aggregate operator; they never appear as `Expr::Call` targets.

pub mod functions;

use std::fmt;
use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::record_batch::RecordBatch;

use crate::error::{QueryError, Result};
use crate::scalar::ScalarValue;

pub use functions::BuiltinFunction;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Literal(ScalarValue),
    Call(BuiltinFunction, Vec<Expr>),
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Expr {
        Expr::Column(name.into())
    }

    pub fn lit(value: ScalarValue) -> Expr {
        Expr::Literal(value)
    }

    /// Evaluates this expression against a batch, returning one array with
    /// as many rows as the batch has.
    pub fn evaluate(&self, batch: &RecordBatch) -> Result<ArrayRef> {
        match self {
            Expr::Column(name) => {
                let idx = batch.schema().index_of(name).map_err(|_| {
                    QueryError::Expression(format!("no column named '{}' in batch", name))
                })?;
                Ok(Arc::clone(batch.column(idx)))
            }
            Expr::Literal(value) => functions::literal_array(value, batch.num_rows()),
            Expr::Call(func, args) => {
                let arg_arrays: Result<Vec<ArrayRef>> =
                    args.iter().map(|a| a.evaluate(batch)).collect();
                functions::apply(*func, &arg_arrays?)
            }
        }
    }

    /// All column names this expression references, in traversal order.
    pub fn column_refs(&self, out: &mut Vec<String>) {
        match self {
            Expr::Column(name) => out.push(name.clone()),
            Expr::Literal(_) => {}
            Expr::Call(_, args) => {
                for a in args {
                    a.column_refs(out);
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{}", name),
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Call(func, args) => {
                write!(f, "{}(", func)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
        }
    }
}
