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

use std::path::PathBuf;

/// Knobs shared by scan and sort operators. Constructed with sane defaults
/// and tweaked with the builder methods below, the same shape the teacher
/// uses for its read-options structs.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub batch_size: usize,
    pub external_sort_temp_dir: Option<PathBuf>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            batch_size: 8192,
            external_sort_temp_dir: None,
        }
    }
}

impl ExecutionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_external_sort_temp_dir(mut self, dir: PathBuf) -> Self {
        self.external_sort_temp_dir = Some(dir);
        self
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.external_sort_temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
