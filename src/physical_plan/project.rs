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

use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::error::Result;
use crate::expr::Expr;
use crate::physical_plan::{BoxedPlan, QueryPlan};

/// Adds computed columns, then optionally restricts the output to a fixed
/// list of column names. `select = None` keeps every original column
/// (followed by any computed ones); `select = Some(names)` keeps exactly
/// `names` plus the computed columns, in that order.
pub struct ProjectPlan {
    select: Option<Vec<String>>,
    project: Vec<(String, Expr)>,
    child: BoxedPlan,
    /// Child schema extended with one field per projection, in order;
    /// evaluation against a batch walks this schema so that `b` is
    /// visible when evaluating `c` in `SELECT a+1 AS b, b*2 AS c`.
    running_schema: SchemaRef,
    schema: SchemaRef,
}

impl ProjectPlan {
    pub fn new(select: Option<Vec<String>>, project: Vec<(String, Expr)>, child: BoxedPlan) -> Result<Self> {
        let child_schema = child.schema();
        let running_schema = Self::compute_running_schema(&project, &child_schema)?;
        let schema = Self::compute_output_schema(&select, &project, &child_schema, &running_schema)?;
        Ok(ProjectPlan {
            select,
            project,
            child,
            running_schema,
            schema,
        })
    }

    /// The child schema with one field appended per projection, each
    /// inferred against everything appended before it.
    fn compute_running_schema(project: &[(String, Expr)], child_schema: &SchemaRef) -> Result<SchemaRef> {
        let mut fields: Vec<Field> = child_schema.fields().clone();
        for (name, expr) in project {
            let running = Arc::new(Schema::new(fields.clone()));
            let dt = infer_projected_type(expr, &running)?;
            fields.push(Field::new(name, dt, true));
        }
        Ok(Arc::new(Schema::new(fields)))
    }

    fn compute_output_schema(
        select: &Option<Vec<String>>,
        project: &[(String, Expr)],
        child_schema: &SchemaRef,
        running_schema: &SchemaRef,
    ) -> Result<SchemaRef> {
        let mut fields: Vec<Field> = match select {
            None => child_schema.fields().clone(),
            Some(names) => names
                .iter()
                .map(|name| {
                    child_schema
                        .field_with_name(name)
                        .cloned()
                        .map_err(|e| e.into())
                })
                .collect::<Result<Vec<_>>>()?,
        };
        let n = child_schema.fields().len();
        for i in 0..project.len() {
            fields.push(running_schema.field(n + i).clone());
        }
        Ok(Arc::new(Schema::new(fields)))
    }
}

/// Infers the output type of a projected expression by evaluating it
/// against a zero-row batch carved out of the child schema.
fn infer_projected_type(expr: &Expr, child_schema: &SchemaRef) -> Result<arrow::datatypes::DataType> {
    let empty_columns = child_schema
        .fields()
        .iter()
        .map(|f| arrow::array::new_empty_array(f.data_type()))
        .collect::<Vec<_>>();
    let empty_batch = RecordBatch::try_new(Arc::clone(child_schema), empty_columns)?;
    let array = expr.evaluate(&empty_batch)?;
    Ok(array.data_type().clone())
}

impl fmt::Display for ProjectPlan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Project(select={:?}, project={:?}, child={})",
            self.select,
            self.project.iter().map(|(n, e)| format!("{}={}", n, e)).collect::<Vec<_>>(),
            self.child
        )
    }
}

impl QueryPlan for ProjectPlan {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next(&mut self) -> Result<Option<RecordBatch>> {
        let batch = match self.child.next()? {
            Some(batch) => batch,
            None => return Ok(None),
        };

        // Evaluate projections in order against a batch that grows one
        // column at a time, so each expression can see prior aliases.
        let mut running_columns = batch.columns().to_vec();
        let mut projected_columns = Vec::with_capacity(self.project.len());
        for (i, (_, expr)) in self.project.iter().enumerate() {
            let n = batch.schema().fields().len();
            let running_schema = Arc::new(Schema::new(
                self.running_schema.fields()[..n + i].to_vec(),
            ));
            let running_batch = RecordBatch::try_new(running_schema, running_columns.clone())?;
            let value = expr.evaluate(&running_batch)?;
            running_columns.push(Arc::clone(&value));
            projected_columns.push(value);
        }

        let mut columns: Vec<arrow::array::ArrayRef> = match &self.select {
            None => batch.columns().to_vec(),
            Some(names) => names
                .iter()
                .map(|name| {
                    let idx = batch.schema().index_of(name)?;
                    Ok(Arc::clone(batch.column(idx)))
                })
                .collect::<arrow::error::Result<Vec<_>>>()?,
        };
        columns.extend(projected_columns);
        Ok(Some(RecordBatch::try_new(Arc::clone(&self.schema), columns)?))
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::expr::BuiltinFunction;
    use crate::physical_plan::scan::InMemoryScan;

    #[test]
    fn project_adds_computed_column_and_restricts_selection() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int64, false),
            Field::new("b", DataType::Int64, false),
        ]));
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(Int64Array::from(vec![4, 5, 6])),
            ],
        )
        .unwrap();
        let scan = InMemoryScan::new(Arc::clone(&schema), vec![Arc::new(batch)]);
        let sum_expr = Expr::Call(BuiltinFunction::Add, vec![Expr::col("a"), Expr::col("b")]);
        let mut plan = ProjectPlan::new(
            Some(vec!["a".to_string()]),
            vec![("ab_sum".to_string(), sum_expr)],
            Box::new(scan),
        )
        .unwrap();
        let out = plan.next().unwrap().unwrap();
        assert_eq!(out.schema().fields().len(), 2);
        assert_eq!(out.schema().field(1).name(), "ab_sum");
        let sums = out.column(1).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(sums.values(), &[5, 7, 9]);
    }

    #[test]
    fn later_projection_sees_earlier_alias() {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, false)]));
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![Arc::new(Int64Array::from(vec![1, 2, 3]))],
        )
        .unwrap();
        let scan = InMemoryScan::new(Arc::clone(&schema), vec![Arc::new(batch)]);
        let b_expr = Expr::Call(
            BuiltinFunction::Add,
            vec![Expr::col("a"), Expr::lit(crate::scalar::ScalarValue::Int64(1))],
        );
        let c_expr = Expr::Call(
            BuiltinFunction::Mul,
            vec![Expr::col("b"), Expr::lit(crate::scalar::ScalarValue::Int64(2))],
        );
        let mut plan = ProjectPlan::new(
            None,
            vec![("b".to_string(), b_expr), ("c".to_string(), c_expr)],
            Box::new(scan),
        )
        .unwrap();
        let out = plan.next().unwrap().unwrap();
        let b = out.column(1).as_any().downcast_ref::<Int64Array>().unwrap();
        let c = out.column(2).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(b.values(), &[2, 3, 4]);
        assert_eq!(c.values(), &[4, 6, 8]);
    }
}
