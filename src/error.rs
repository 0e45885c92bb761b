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

pub type Result<T> = std::result::Result<T, QueryError>;

/// Error taxonomy for every stage of the engine, from tokenizing SQL text
/// through executing a physical plan.
#[derive(Debug)]
pub enum QueryError {
    Lex(String),
    Parse(String),
    Expression(String),
    Plan(String),
    NotImplemented(String),
    Execution(String),
    Value(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueryError::Lex(msg) => write!(f, "Lex error: {}", msg),
            QueryError::Parse(msg) => write!(f, "Parse error: {}", msg),
            QueryError::Expression(msg) => write!(f, "Expression error: {}", msg),
            QueryError::Plan(msg) => write!(f, "Plan error: {}", msg),
            QueryError::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            QueryError::Execution(msg) => write!(f, "Execution error: {}", msg),
            QueryError::Value(msg) => write!(f, "Value error: {}", msg),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<arrow::error::ArrowError> for QueryError {
    fn from(e: arrow::error::ArrowError) -> Self {
        QueryError::Execution(e.to_string())
    }
}

impl From<std::io::Error> for QueryError {
    fn from(e: std::io::Error) -> Self {
        QueryError::Execution(e.to_string())
    }
}

impl From<parquet::errors::ParquetError> for QueryError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        QueryError::Execution(e.to_string())
    }
}
