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

//! A small, synchronous, single-threaded analytical query engine over
//! Apache Arrow `RecordBatch`es. Register tables in a [`Catalog`], hand a
//! SQL string to [`sql::plan_sql`], and pull [`arrow::record_batch::RecordBatch`]es
//! out of the resulting plan with [`physical_plan::collect`] or by calling
//! [`physical_plan::QueryPlan::next`] directly.
//!
//! ```no_run
//! use queryground::{catalog::Catalog, config::ExecutionConfig, physical_plan, sql};
//!
//! let mut catalog = Catalog::new();
//! catalog.register_csv("users", "users.csv");
//!
//! let plan = sql::plan_sql("SELECT id FROM users WHERE id > 10", &catalog, &ExecutionConfig::default())?;
//! let batches = physical_plan::collect(plan)?;
//! # Ok::<(), queryground::error::QueryError>(())
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod expr;
pub mod physical_plan;
pub mod scalar;
pub mod sql;

pub use catalog::Catalog;
pub use config::ExecutionConfig;
pub use error::{QueryError, Result};
pub use physical_plan::{collect, BoxedPlan, QueryPlan};
pub use sql::plan_sql;
