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

//! Maps table names the planner sees in a `FROM` clause to a concrete
//! source. File-system discovery of tables is an external collaborator's
//! concern; a catalog here is always built explicitly by the caller.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;

#[derive(Debug, Clone)]
pub enum TableSource {
    Csv(PathBuf),
    Parquet(PathBuf),
    InMemory(Vec<Arc<RecordBatch>>),
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: HashMap<String, TableSource>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog {
            tables: HashMap::new(),
        }
    }

    pub fn register_csv(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.tables.insert(name.into(), TableSource::Csv(path.into()));
    }

    pub fn register_parquet(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.tables
            .insert(name.into(), TableSource::Parquet(path.into()));
    }

    pub fn register_batches(&mut self, name: impl Into<String>, batches: Vec<RecordBatch>) {
        let batches = batches.into_iter().map(Arc::new).collect();
        self.tables.insert(name.into(), TableSource::InMemory(batches));
    }

    pub fn lookup(&self, name: &str) -> Option<&TableSource> {
        self.tables.get(name)
    }
}
