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

//! A typed scalar value, used as a literal in expressions and as the
//! element type of composite sort/group keys, where pyarrow would reach
//! for a dynamically typed Python object.

use std::cmp::Ordering;
use std::fmt;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::DataType;
use ordered_float::OrderedFloat;

use crate::error::{QueryError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

impl ScalarValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Null => DataType::Null,
            ScalarValue::Boolean(_) => DataType::Boolean,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::Utf8(_) => DataType::Utf8,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Reads the value at `row` out of `array` into an owned scalar.
    pub fn from_array(array: &ArrayRef, row: usize) -> Result<ScalarValue> {
        if array.is_null(row) {
            return Ok(ScalarValue::Null);
        }
        let value = match array.data_type() {
            DataType::Boolean => {
                ScalarValue::Boolean(array.as_any().downcast_ref::<BooleanArray>().unwrap().value(row))
            }
            DataType::Int64 => {
                ScalarValue::Int64(array.as_any().downcast_ref::<Int64Array>().unwrap().value(row))
            }
            DataType::Float64 => {
                ScalarValue::Float64(array.as_any().downcast_ref::<Float64Array>().unwrap().value(row))
            }
            DataType::Utf8 => ScalarValue::Utf8(
                array
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .unwrap()
                    .value(row)
                    .to_string(),
            ),
            other => {
                return Err(QueryError::NotImplemented(format!(
                    "scalar extraction for data type {:?}",
                    other
                )))
            }
        };
        Ok(value)
    }

    /// Parses a literal token coming out of the SQL tokenizer: a quoted
    /// string is kept verbatim, otherwise an integer then a float parse is
    /// attempted, falling back to a bare string (mirrors the tokenizer's
    /// "try int, then float, then string" literal-casting rule).
    pub fn parse_literal(text: &str) -> ScalarValue {
        let bytes = text.as_bytes();
        if bytes.len() >= 2 {
            let first = bytes[0];
            let last = bytes[bytes.len() - 1];
            if (first == b'\'' || first == b'"') && first == last {
                return ScalarValue::Utf8(text[1..text.len() - 1].to_string());
            }
        }
        if let Ok(i) = text.parse::<i64>() {
            return ScalarValue::Int64(i);
        }
        if let Ok(f) = text.parse::<f64>() {
            return ScalarValue::Float64(f);
        }
        ScalarValue::Utf8(text.to_string())
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Boolean(v) => write!(f, "{}", v),
            ScalarValue::Int64(v) => write!(f, "{}", v),
            ScalarValue::Float64(v) => write!(f, "{}", v),
            ScalarValue::Utf8(v) => write!(f, "{}", v),
        }
    }
}

/// Total order over two scalars of possibly different variants, nulls
/// first. Used both for single-column sort keys and as the per-field
/// comparator inside composite keys.
pub fn cmp_scalars(l: &ScalarValue, r: &ScalarValue, asc: bool) -> Ordering {
    let ord = match (l, r) {
        (ScalarValue::Null, ScalarValue::Null) => Ordering::Equal,
        (ScalarValue::Null, _) => Ordering::Less,
        (_, ScalarValue::Null) => Ordering::Greater,
        (ScalarValue::Boolean(a), ScalarValue::Boolean(b)) => a.cmp(b),
        (ScalarValue::Int64(a), ScalarValue::Int64(b)) => a.cmp(b),
        (ScalarValue::Float64(a), ScalarValue::Float64(b)) => {
            OrderedFloat(*a).cmp(&OrderedFloat(*b))
        }
        (ScalarValue::Int64(a), ScalarValue::Float64(b)) => {
            OrderedFloat(*a as f64).cmp(&OrderedFloat(*b))
        }
        (ScalarValue::Float64(a), ScalarValue::Int64(b)) => {
            OrderedFloat(*a).cmp(&OrderedFloat(*b as f64))
        }
        (ScalarValue::Utf8(a), ScalarValue::Utf8(b)) => a.cmp(b),
        _ => panic!("cannot compare scalars of type {:?} and {:?}", l.data_type(), r.data_type()),
    };
    if asc {
        ord
    } else {
        ord.reverse()
    }
}

/// A composite key made of one scalar per sort/group column, with a
/// per-column ascending/descending flag baked in so `Ord` alone captures
/// the full ordering `ORDER BY a ASC, b DESC` needs.
#[derive(Debug, Clone)]
pub struct SortKey {
    pub values: Vec<ScalarValue>,
    pub ascending: Vec<bool>,
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}
impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for ((l, r), asc) in self.values.iter().zip(other.values.iter()).zip(self.ascending.iter()) {
            let ord = cmp_scalars(l, r, *asc);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}
