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

//! Grouped aggregation. Every aggregation is expressed as a
//! `compute_chunk`/`reduce` pair: `compute_chunk` folds one group's rows
//! of one input batch into a partial value, `reduce` folds the partials
//! collected across every batch that contributed to the group into the
//! final scalar. `keys = []` aggregates the whole input as a single
//! group and always produces exactly one output row.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::compute;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::error::{QueryError, Result};
use crate::physical_plan::common::combine_batches;
use crate::physical_plan::{BoxedPlan, QueryPlan};
use crate::scalar::{ScalarValue, SortKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Sum,
    Min,
    Max,
    Count,
    Mean,
}

impl AggregateFunc {
    pub fn from_name(name: &str) -> Option<AggregateFunc> {
        use AggregateFunc::*;
        Some(match name.to_ascii_uppercase().as_str() {
            "SUM" => Sum,
            "MIN" => Min,
            "MAX" => Max,
            "COUNT" => Count,
            "AVG" => Mean,
            _ => return None,
        })
    }

    fn result_type(&self, input_type: &DataType) -> DataType {
        match self {
            AggregateFunc::Count => DataType::Int64,
            AggregateFunc::Mean => DataType::Float64,
            _ => input_type.clone(),
        }
    }
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            AggregateFunc::Sum => "SumAggregation",
            AggregateFunc::Min => "MinAggregation",
            AggregateFunc::Max => "MaxAggregation",
            AggregateFunc::Count => "CountAggregation",
            AggregateFunc::Mean => "MeanAggregation",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct AggregateExpr {
    pub func: AggregateFunc,
    pub column: String,
    pub alias: String,
}

/// The partial value one batch contributes towards one group's result.
#[derive(Debug, Clone)]
enum Partial {
    Scalar(ScalarValue),
    CountSum(i64, ScalarValue),
}

fn numeric_sum(array: &ArrayRef) -> Result<ScalarValue> {
    match array.data_type() {
        DataType::Int64 => {
            let a = array.as_any().downcast_ref::<Int64Array>().unwrap();
            Ok(match compute::sum(a) {
                Some(v) => ScalarValue::Int64(v),
                None => ScalarValue::Null,
            })
        }
        DataType::Float64 => {
            let a = array.as_any().downcast_ref::<Float64Array>().unwrap();
            Ok(match compute::sum(a) {
                Some(v) => ScalarValue::Float64(v),
                None => ScalarValue::Null,
            })
        }
        other => Err(QueryError::NotImplemented(format!("SUM over {:?}", other))),
    }
}

fn numeric_min_max(array: &ArrayRef, max: bool) -> Result<ScalarValue> {
    match array.data_type() {
        DataType::Int64 => {
            let a = array.as_any().downcast_ref::<Int64Array>().unwrap();
            let v = if max { compute::max(a) } else { compute::min(a) };
            Ok(v.map(ScalarValue::Int64).unwrap_or(ScalarValue::Null))
        }
        DataType::Float64 => {
            let a = array.as_any().downcast_ref::<Float64Array>().unwrap();
            let v = if max { compute::max(a) } else { compute::min(a) };
            Ok(v.map(ScalarValue::Float64).unwrap_or(ScalarValue::Null))
        }
        DataType::Utf8 => {
            let a = array.as_any().downcast_ref::<StringArray>().unwrap();
            let v = if max {
                compute::max_string(a)
            } else {
                compute::min_string(a)
            };
            Ok(v.map(|s| ScalarValue::Utf8(s.to_string())).unwrap_or(ScalarValue::Null))
        }
        other => Err(QueryError::NotImplemented(format!("MIN/MAX over {:?}", other))),
    }
}

fn non_null_count(array: &ArrayRef) -> i64 {
    (array.len() - array.null_count()) as i64
}

fn compute_chunk(func: AggregateFunc, array: &ArrayRef) -> Result<Partial> {
    Ok(match func {
        AggregateFunc::Sum => Partial::Scalar(numeric_sum(array)?),
        AggregateFunc::Min => Partial::Scalar(numeric_min_max(array, false)?),
        AggregateFunc::Max => Partial::Scalar(numeric_min_max(array, true)?),
        AggregateFunc::Count => Partial::Scalar(ScalarValue::Int64(non_null_count(array))),
        AggregateFunc::Mean => Partial::CountSum(non_null_count(array), numeric_sum(array)?),
    })
}

fn reduce(func: AggregateFunc, partials: &[Partial]) -> ScalarValue {
    match func {
        AggregateFunc::Sum | AggregateFunc::Min | AggregateFunc::Max | AggregateFunc::Count => {
            let scalars: Vec<&ScalarValue> = partials
                .iter()
                .map(|p| match p {
                    Partial::Scalar(s) => s,
                    Partial::CountSum(..) => unreachable!(),
                })
                .collect();
            reduce_scalars(func, &scalars)
        }
        AggregateFunc::Mean => {
            let mut total_count = 0i64;
            let mut total_sum: Option<ScalarValue> = None;
            for p in partials {
                if let Partial::CountSum(count, sum) = p {
                    total_count += count;
                    total_sum = Some(match (total_sum.take(), sum) {
                        (None, s) => s.clone(),
                        (Some(ScalarValue::Int64(a)), ScalarValue::Int64(b)) => {
                            ScalarValue::Int64(a + b)
                        }
                        (Some(a), b) => {
                            let a = as_f64(&a);
                            let b = as_f64(b);
                            ScalarValue::Float64(a + b)
                        }
                    });
                }
            }
            match total_sum {
                None => ScalarValue::Null,
                Some(_) if total_count == 0 => ScalarValue::Null,
                Some(sum) => ScalarValue::Float64(as_f64(&sum) / total_count as f64),
            }
        }
    }
}

fn as_f64(v: &ScalarValue) -> f64 {
    match v {
        ScalarValue::Int64(i) => *i as f64,
        ScalarValue::Float64(f) => *f,
        ScalarValue::Null => 0.0,
        _ => 0.0,
    }
}

fn reduce_scalars(func: AggregateFunc, scalars: &[&ScalarValue]) -> ScalarValue {
    match func {
        AggregateFunc::Count => {
            let total: i64 = scalars
                .iter()
                .map(|s| if let ScalarValue::Int64(c) = s { *c } else { 0 })
                .sum();
            ScalarValue::Int64(total)
        }
        AggregateFunc::Sum => fold_numeric(scalars, |a, b| a + b),
        AggregateFunc::Min => fold_extreme(scalars, false),
        AggregateFunc::Max => fold_extreme(scalars, true),
        AggregateFunc::Mean => unreachable!(),
    }
}

fn fold_numeric(scalars: &[&ScalarValue], op: impl Fn(f64, f64) -> f64) -> ScalarValue {
    let mut acc: Option<ScalarValue> = None;
    let mut all_int = true;
    for s in scalars {
        if s.is_null() {
            continue;
        }
        if !matches!(s, ScalarValue::Int64(_)) {
            all_int = false;
        }
        acc = Some(match acc {
            None => (*s).clone(),
            Some(a) => {
                if all_int {
                    if let (ScalarValue::Int64(a), ScalarValue::Int64(b)) = (&a, s) {
                        ScalarValue::Int64(op(*a as f64, *b as f64) as i64)
                    } else {
                        ScalarValue::Float64(op(as_f64(&a), as_f64(s)))
                    }
                } else {
                    ScalarValue::Float64(op(as_f64(&a), as_f64(s)))
                }
            }
        });
    }
    acc.unwrap_or(ScalarValue::Null)
}

fn fold_extreme(scalars: &[&ScalarValue], max: bool) -> ScalarValue {
    let mut acc: Option<ScalarValue> = None;
    for s in scalars {
        if s.is_null() {
            continue;
        }
        acc = Some(match acc {
            None => (*s).clone(),
            Some(a) => {
                let better = if max {
                    crate::scalar::cmp_scalars(s, &a, true) == std::cmp::Ordering::Greater
                } else {
                    crate::scalar::cmp_scalars(s, &a, true) == std::cmp::Ordering::Less
                };
                if better {
                    (*s).clone()
                } else {
                    a
                }
            }
        });
    }
    acc.unwrap_or(ScalarValue::Null)
}

fn array_from_scalars(values: &[ScalarValue], data_type: &DataType) -> Result<ArrayRef> {
    let array: ArrayRef = match data_type {
        DataType::Int64 => Arc::new(Int64Array::from(
            values
                .iter()
                .map(|v| match v {
                    ScalarValue::Int64(i) => Some(*i),
                    ScalarValue::Null => None,
                    other => Some(as_f64(other) as i64),
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Float64 => Arc::new(Float64Array::from(
            values
                .iter()
                .map(|v| match v {
                    ScalarValue::Null => None,
                    other => Some(as_f64(other)),
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Utf8 => Arc::new(StringArray::from(
            values
                .iter()
                .map(|v| match v {
                    ScalarValue::Utf8(s) => Some(s.as_str()),
                    ScalarValue::Null => None,
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Boolean => Arc::new(BooleanArray::from(
            values
                .iter()
                .map(|v| match v {
                    ScalarValue::Boolean(b) => Some(*b),
                    ScalarValue::Null => None,
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        other => return Err(QueryError::NotImplemented(format!("group key of type {:?}", other))),
    };
    Ok(array)
}

pub struct AggregatePlan {
    keys: Vec<String>,
    aggregations: Vec<AggregateExpr>,
    child: BoxedPlan,
    schema: SchemaRef,
    result: Option<RecordBatch>,
    emitted: bool,
}

impl AggregatePlan {
    pub fn new(keys: Vec<String>, aggregations: Vec<AggregateExpr>, child: BoxedPlan) -> Result<Self> {
        let child_schema = child.schema();
        let mut fields = Vec::new();
        for key in &keys {
            fields.push(child_schema.field_with_name(key)?.clone());
        }
        for agg in &aggregations {
            let input_field = child_schema.field_with_name(&agg.column)?;
            fields.push(Field::new(&agg.alias, agg.func.result_type(input_field.data_type()), true));
        }
        let schema = Arc::new(Schema::new(fields));
        Ok(AggregatePlan {
            keys,
            aggregations,
            child,
            schema,
            result: None,
            emitted: false,
        })
    }

    fn compute(&mut self) -> Result<()> {
        let child_schema = self.child.schema();
        let mut batches = Vec::new();
        while let Some(batch) = self.child.next()? {
            batches.push(batch);
        }
        let combined = combine_batches(&batches, Arc::clone(&child_schema))?;
        let combined = match combined {
            Some(b) => b,
            None => {
                // No input rows: keyed aggregation yields zero groups,
                // the whole-table (keys = []) case still yields one row.
                self.result = Some(self.empty_result(child_schema)?);
                return Ok(());
            }
        };

        let mut groups: BTreeMap<SortKey, Vec<usize>> = BTreeMap::new();
        if self.keys.is_empty() {
            groups.insert(
                SortKey {
                    values: vec![],
                    ascending: vec![],
                },
                (0..combined.num_rows()).collect(),
            );
        } else {
            let key_columns: Vec<ArrayRef> = self
                .keys
                .iter()
                .map(|k| Ok(Arc::clone(combined.column(combined.schema().index_of(k)?))))
                .collect::<Result<Vec<_>>>()?;
            for row in 0..combined.num_rows() {
                let values = key_columns
                    .iter()
                    .map(|c| ScalarValue::from_array(c, row))
                    .collect::<Result<Vec<_>>>()?;
                let ascending = vec![true; values.len()];
                groups.entry(SortKey { values, ascending }).or_default().push(row);
            }
        }

        let mut key_columns_out: Vec<Vec<ScalarValue>> = vec![Vec::new(); self.keys.len()];
        let mut agg_columns_out: Vec<Vec<ScalarValue>> = vec![Vec::new(); self.aggregations.len()];

        for (key, rows) in groups {
            for (i, v) in key.values.into_iter().enumerate() {
                key_columns_out[i].push(v);
            }
            let indices = Int64Array::from(rows.iter().map(|r| *r as i64).collect::<Vec<_>>());
            for (i, agg) in self.aggregations.iter().enumerate() {
                let idx = combined.schema().index_of(&agg.column)?;
                let column = compute::take(combined.column(idx).as_ref(), &indices, None)?;
                let partial = compute_chunk(agg.func, &column)?;
                let value = reduce(agg.func, std::slice::from_ref(&partial));
                agg_columns_out[i].push(value);
            }
        }

        let mut columns = Vec::new();
        for (i, key) in self.keys.iter().enumerate() {
            let dt = child_schema.field_with_name(key)?.data_type().clone();
            columns.push(array_from_scalars(&key_columns_out[i], &dt)?);
        }
        for (i, agg) in self.aggregations.iter().enumerate() {
            let input_field = child_schema.field_with_name(&agg.column)?;
            let dt = agg.func.result_type(input_field.data_type());
            columns.push(array_from_scalars(&agg_columns_out[i], &dt)?);
        }

        self.result = Some(RecordBatch::try_new(Arc::clone(&self.schema), columns)?);
        Ok(())
    }

    fn empty_result(&self, child_schema: SchemaRef) -> Result<RecordBatch> {
        if self.keys.is_empty() {
            let mut columns = Vec::new();
            for agg in &self.aggregations {
                let value = match agg.func {
                    AggregateFunc::Count => ScalarValue::Int64(0),
                    _ => ScalarValue::Null,
                };
                let input_field = child_schema.field_with_name(&agg.column)?;
                let dt = agg.func.result_type(input_field.data_type());
                columns.push(array_from_scalars(&[value], &dt)?);
            }
            Ok(RecordBatch::try_new(Arc::clone(&self.schema), columns)?)
        } else {
            let columns = self
                .schema
                .fields()
                .iter()
                .map(|f| arrow::array::new_empty_array(f.data_type()))
                .collect();
            Ok(RecordBatch::try_new(Arc::clone(&self.schema), columns)?)
        }
    }
}

impl fmt::Display for AggregatePlan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Aggregate(keys={:?}, aggregations={:?}, child={})",
            self.keys,
            self.aggregations.iter().map(|a| format!("{}={}({})", a.alias, a.func, a.column)).collect::<Vec<_>>(),
            self.child
        )
    }
}

impl QueryPlan for AggregatePlan {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next(&mut self) -> Result<Option<RecordBatch>> {
        if self.emitted {
            return Ok(None);
        }
        if self.result.is_none() {
            self.compute()?;
        }
        self.emitted = true;
        Ok(self.result.take())
    }

    fn close(&mut self) -> Result<()> {
        self.emitted = true;
        self.result = None;
        self.child.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::StringArray;
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::physical_plan::scan::InMemoryScan;

    fn test_data() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("city", DataType::Utf8, false),
            Field::new("n_employees", DataType::Int64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![
                    "New York",
                    "New York",
                    "Los Angeles",
                    "Los Angeles",
                    "New York",
                ])),
                Arc::new(Int64Array::from(vec![10, 15, 8, 12, 20])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn single_key_sum_aggregation() {
        let batch = test_data();
        let scan = InMemoryScan::new(batch.schema(), vec![Arc::new(batch)]);
        let mut plan = AggregatePlan::new(
            vec!["city".to_string()],
            vec![AggregateExpr {
                func: AggregateFunc::Sum,
                column: "n_employees".to_string(),
                alias: "total_employees".to_string(),
            }],
            Box::new(scan),
        )
        .unwrap();
        let out = plan.next().unwrap().unwrap();
        let cities = out.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        let sums = out.column(1).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(cities.value(0), "Los Angeles");
        assert_eq!(sums.value(0), 20);
        assert_eq!(cities.value(1), "New York");
        assert_eq!(sums.value(1), 45);
    }

    #[test]
    fn empty_key_aggregation_emits_one_row() {
        let batch = test_data();
        let scan = InMemoryScan::new(batch.schema(), vec![Arc::new(batch)]);
        let mut plan = AggregatePlan::new(
            vec![],
            vec![AggregateExpr {
                func: AggregateFunc::Count,
                column: "n_employees".to_string(),
                alias: "n".to_string(),
            }],
            Box::new(scan),
        )
        .unwrap();
        let out = plan.next().unwrap().unwrap();
        assert_eq!(out.num_rows(), 1);
        let counts = out.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(counts.value(0), 5);
    }
}
