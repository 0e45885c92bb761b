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

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray,
};
use arrow::compute;
use arrow::datatypes::DataType;

use crate::error::{QueryError, Result};
use crate::scalar::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFunction {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Not,
    Round,
}

impl BuiltinFunction {
    /// Maps an operator token or a non-aggregation function-call name from
    /// the SQL surface to a builtin, returning `None` for anything the
    /// planner should instead try as an aggregation.
    pub fn from_name(name: &str) -> Option<BuiltinFunction> {
        use BuiltinFunction::*;
        Some(match name.to_ascii_uppercase().as_str() {
            "+" => Add,
            "-" => Sub,
            "*" => Mul,
            "/" => Div,
            "=" => Eq,
            "<>" | "!=" => NotEq,
            "<" => Lt,
            "<=" => LtEq,
            ">" => Gt,
            ">=" => GtEq,
            "AND" => And,
            "OR" => Or,
            "NOT" => Not,
            "ROUND" => Round,
            _ => return None,
        })
    }
}

impl fmt::Display for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use BuiltinFunction::*;
        let s = match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Eq => "=",
            NotEq => "<>",
            Lt => "<",
            LtEq => "<=",
            Gt => ">",
            GtEq => ">=",
            And => "AND",
            Or => "OR",
            Not => "NOT",
            Round => "ROUND",
        };
        write!(f, "{}", s)
    }
}

pub fn literal_array(value: &ScalarValue, num_rows: usize) -> Result<ArrayRef> {
    let array: ArrayRef = match value {
        ScalarValue::Null => Arc::new(BooleanArray::from(vec![None; num_rows])),
        ScalarValue::Boolean(v) => Arc::new(BooleanArray::from(vec![*v; num_rows])),
        ScalarValue::Int64(v) => Arc::new(Int64Array::from(vec![*v; num_rows])),
        ScalarValue::Float64(v) => Arc::new(Float64Array::from(vec![*v; num_rows])),
        ScalarValue::Utf8(v) => {
            Arc::new(StringArray::from(vec![v.as_str(); num_rows]))
        }
    };
    Ok(array)
}

fn as_f64(array: &ArrayRef) -> Result<Float64Array> {
    match array.data_type() {
        DataType::Float64 => Ok(array.as_any().downcast_ref::<Float64Array>().unwrap().clone()),
        DataType::Int64 => {
            let ints = array.as_any().downcast_ref::<Int64Array>().unwrap();
            Ok(Float64Array::from(
                (0..ints.len())
                    .map(|i| {
                        if ints.is_null(i) {
                            None
                        } else {
                            Some(ints.value(i) as f64)
                        }
                    })
                    .collect::<Vec<_>>(),
            ))
        }
        other => Err(QueryError::Expression(format!(
            "cannot coerce {:?} to a numeric type",
            other
        ))),
    }
}

fn is_numeric(dt: &DataType) -> bool {
    matches!(dt, DataType::Int64 | DataType::Float64)
}

pub fn apply(func: BuiltinFunction, args: &[ArrayRef]) -> Result<ArrayRef> {
    use BuiltinFunction::*;
    match func {
        Add | Sub | Mul | Div => {
            let (l, r) = (args[0].clone(), args[1].clone());
            if l.data_type() == &DataType::Int64 && r.data_type() == &DataType::Int64 {
                let l = l.as_any().downcast_ref::<Int64Array>().unwrap();
                let r = r.as_any().downcast_ref::<Int64Array>().unwrap();
                let out = match func {
                    Add => compute::add(l, r)?,
                    Sub => compute::subtract(l, r)?,
                    Mul => compute::multiply(l, r)?,
                    Div => compute::divide(l, r)?,
                    _ => unreachable!(),
                };
                Ok(Arc::new(out))
            } else if is_numeric(l.data_type()) && is_numeric(r.data_type()) {
                let l = as_f64(&l)?;
                let r = as_f64(&r)?;
                let out = match func {
                    Add => compute::add(&l, &r)?,
                    Sub => compute::subtract(&l, &r)?,
                    Mul => compute::multiply(&l, &r)?,
                    Div => compute::divide(&l, &r)?,
                    _ => unreachable!(),
                };
                Ok(Arc::new(out))
            } else {
                Err(QueryError::Expression(format!(
                    "arithmetic operator {} requires numeric operands, got {:?} and {:?}",
                    func,
                    l.data_type(),
                    r.data_type()
                )))
            }
        }
        Eq | NotEq | Lt | LtEq | Gt | GtEq => compare(func, &args[0], &args[1]),
        And | Or => {
            let l = args[0]
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(|| QueryError::Expression("AND/OR require boolean operands".into()))?;
            let r = args[1]
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(|| QueryError::Expression("AND/OR require boolean operands".into()))?;
            let out = if func == And {
                compute::and(l, r)?
            } else {
                compute::or(l, r)?
            };
            Ok(Arc::new(out))
        }
        Not => {
            let v = args[0]
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(|| QueryError::Expression("NOT requires a boolean operand".into()))?;
            Ok(Arc::new(compute::not(v)?))
        }
        Round => {
            let v = as_f64(&args[0])?;
            let rounded: Float64Array = v
                .iter()
                .map(|opt| opt.map(|x| x.round()))
                .collect::<Vec<_>>()
                .into();
            Ok(Arc::new(rounded))
        }
    }
}

fn compare(func: BuiltinFunction, l: &ArrayRef, r: &ArrayRef) -> Result<ArrayRef> {
    use BuiltinFunction::*;
    if l.data_type() == &DataType::Utf8 && r.data_type() == &DataType::Utf8 {
        let l = l.as_any().downcast_ref::<StringArray>().unwrap();
        let r = r.as_any().downcast_ref::<StringArray>().unwrap();
        let out = match func {
            Eq => compute::eq_utf8(l, r)?,
            NotEq => compute::neq_utf8(l, r)?,
            Lt => compute::lt_utf8(l, r)?,
            LtEq => compute::lt_eq_utf8(l, r)?,
            Gt => compute::gt_utf8(l, r)?,
            GtEq => compute::gt_eq_utf8(l, r)?,
            _ => unreachable!(),
        };
        return Ok(Arc::new(out));
    }
    if l.data_type() == &DataType::Boolean && r.data_type() == &DataType::Boolean {
        let l = l.as_any().downcast_ref::<BooleanArray>().unwrap();
        let r = r.as_any().downcast_ref::<BooleanArray>().unwrap();
        let out = match func {
            Eq => compute::eq_bool(l, r)?,
            NotEq => compute::neq_bool(l, r)?,
            Lt => compute::lt_bool(l, r)?,
            LtEq => compute::lt_eq_bool(l, r)?,
            Gt => compute::gt_bool(l, r)?,
            GtEq => compute::gt_eq_bool(l, r)?,
            _ => unreachable!(),
        };
        return Ok(Arc::new(out));
    }
    if is_numeric(l.data_type()) && is_numeric(r.data_type()) {
        if l.data_type() == &DataType::Int64 && r.data_type() == &DataType::Int64 {
            let l = l.as_any().downcast_ref::<Int64Array>().unwrap();
            let r = r.as_any().downcast_ref::<Int64Array>().unwrap();
            let out = match func {
                Eq => compute::eq(l, r)?,
                NotEq => compute::neq(l, r)?,
                Lt => compute::lt(l, r)?,
                LtEq => compute::lt_eq(l, r)?,
                Gt => compute::gt(l, r)?,
                GtEq => compute::gt_eq(l, r)?,
                _ => unreachable!(),
            };
            return Ok(Arc::new(out));
        }
        let l = as_f64(l)?;
        let r = as_f64(r)?;
        let out = match func {
            Eq => compute::eq(&l, &r)?,
            NotEq => compute::neq(&l, &r)?,
            Lt => compute::lt(&l, &r)?,
            LtEq => compute::lt_eq(&l, &r)?,
            Gt => compute::gt(&l, &r)?,
            GtEq => compute::gt_eq(&l, &r)?,
            _ => unreachable!(),
        };
        return Ok(Arc::new(out));
    }
    Err(QueryError::Expression(format!(
        "cannot compare {:?} and {:?}",
        l.data_type(),
        r.data_type()
    )))
}
