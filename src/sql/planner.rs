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

//! Lowers a parsed [`ast::SelectStmt`] into the fixed physical shape
//! `Paginate(Sort(Project(Aggregate(Filter(From)))))`, each stage present
//! only when the query actually needs it.
//!
//! Every table opened through a `FROM`/`JOIN` clause has its columns
//! renamed to `table.column` immediately, before any filtering or
//! projection happens; this is what lets `users.id` and `orders.id`
//! coexist after a join, and what `resolve_identifier` undoes for
//! unqualified references.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::datatypes::SchemaRef;

use crate::catalog::{Catalog, TableSource};
use crate::config::ExecutionConfig;
use crate::error::{QueryError, Result};
use crate::expr::{BuiltinFunction, Expr as PhysExpr};
use crate::physical_plan::aggregate::{AggregateExpr, AggregateFunc, AggregatePlan};
use crate::physical_plan::filter::FilterPlan;
use crate::physical_plan::join::InnerJoinPlan;
use crate::physical_plan::paginate::PaginatePlan;
use crate::physical_plan::project::ProjectPlan;
use crate::physical_plan::scan::{CsvScan, InMemoryScan, ParquetScan};
use crate::physical_plan::sort::SortPlan;
use crate::physical_plan::{BoxedPlan, QueryPlan};
use crate::sql::ast;
use crate::sql::parser;

/// Parses and plans `sql` against the tables registered in `catalog`.
pub fn plan_sql(sql: &str, catalog: &Catalog, config: &ExecutionConfig) -> Result<BoxedPlan> {
    log::debug!("planning query: {}", sql);
    let statement = parser::parse(sql)?;
    let ast::Statement::Select(select) = statement;
    let mut planner = Planner {
        catalog,
        config,
        open_tables: HashMap::new(),
    };
    planner.plan_select(&select)
}

struct Planner<'a> {
    catalog: &'a Catalog,
    config: &'a ExecutionConfig,
    /// Pre-namespacing schema of every table opened so far, keyed by the
    /// name it was opened under.
    open_tables: HashMap<String, SchemaRef>,
}

impl<'a> Planner<'a> {
    fn plan_select(&mut self, select: &ast::SelectStmt) -> Result<BoxedPlan> {
        let mut plan = self.parse_from(&select.from)?;

        if let Some(where_expr) = &select.where_clause {
            let predicate = self.parse_expression(where_expr)?;
            let known: Vec<String> = plan.schema().fields().iter().map(|f| f.name().clone()).collect();
            self.validate_column_refs(&predicate, &known)?;
            plan = Box::new(FilterPlan::new(predicate, plan));
        }

        let (plan, projections) = self.maybe_aggregate(select, plan)?;

        let (select_cols, project_cols) = self.parse_projections(&projections, &plan.schema())?;
        let mut plan: BoxedPlan = Box::new(ProjectPlan::new(select_cols, project_cols, plan)?);

        if let Some(order_by) = &select.order_by {
            let schema = plan.schema();
            let (keys, descending) = self.parse_order_by(order_by, &schema)?;
            plan = Box::new(SortPlan::new(keys, descending, plan)?);
        }

        if select.offset.is_some() || select.limit.is_some() {
            let offset = select.offset.unwrap_or(0);
            let length = select.limit.unwrap_or(usize::MAX);
            plan = Box::new(PaginatePlan::new(offset, length, plan));
        }

        Ok(plan)
    }

    fn parse_from(&mut self, from: &[ast::FromItem]) -> Result<BoxedPlan> {
        if from.len() != 1 {
            return Err(QueryError::Plan(
                "only a single FROM table, optionally with one JOIN, is supported".into(),
            ));
        }
        match &from[0] {
            ast::FromItem::Table(name) => self.open_table(name),
            ast::FromItem::Join(join) => self.parse_join(join),
        }
    }

    fn parse_join(&mut self, join: &ast::Join) -> Result<BoxedPlan> {
        if join.join_type != "inner" {
            return Err(QueryError::NotImplemented(format!(
                "{} JOIN",
                join.join_type.to_ascii_uppercase()
            )));
        }
        let condition = join
            .join_condition
            .as_ref()
            .ok_or_else(|| QueryError::Plan("JOIN requires an ON condition".into()))?;
        let (left_col, right_col) = match condition {
            ast::Expr::Comparison { op, left, right } if op == "=" => {
                match (left.as_ref(), right.as_ref()) {
                    (ast::Expr::Identifier(l), ast::Expr::Identifier(r)) => (l.clone(), r.clone()),
                    _ => {
                        return Err(QueryError::Plan(
                            "JOIN ON condition must compare two columns".into(),
                        ))
                    }
                }
            }
            _ => {
                return Err(QueryError::Plan(
                    "JOIN ON condition must be an equality comparison between two columns".into(),
                ))
            }
        };

        let left_plan = self.open_table(&join.left_table)?;
        let right_plan = self.open_table(&join.right_table)?;
        let left_key = self.resolve_identifier(&left_col)?;
        let right_key = self.resolve_identifier(&right_col)?;
        Ok(Box::new(InnerJoinPlan::new(left_key, right_key, left_plan, right_plan)?))
    }

    /// Opens `name` against the catalog and wraps it in a projection that
    /// renames every column to `name.column`, recording the table's
    /// original (pre-rename) schema for identifier resolution.
    fn open_table(&mut self, name: &str) -> Result<BoxedPlan> {
        if self.open_tables.contains_key(name) {
            return Err(QueryError::Plan(format!(
                "table '{}' is referenced more than once in this query",
                name
            )));
        }
        log::debug!("resolving table '{}' against the catalog", name);
        let source = self
            .catalog
            .lookup(name)
            .cloned()
            .ok_or_else(|| QueryError::Plan(format!("unknown table '{}'", name)))?;

        let scan: BoxedPlan = match source {
            TableSource::Csv(path) => Box::new(CsvScan::open(path, self.config.batch_size)?),
            TableSource::Parquet(path) => Box::new(ParquetScan::open(path, self.config.batch_size)?),
            TableSource::InMemory(batches) => {
                let schema = batches
                    .first()
                    .map(|b| b.schema())
                    .ok_or_else(|| QueryError::Plan(format!("table '{}' has no registered batches", name)))?;
                Box::new(InMemoryScan::new(schema, batches))
            }
        };

        let schema = scan.schema();
        self.open_tables.insert(name.to_string(), Arc::clone(&schema));

        let namespaced: Vec<(String, PhysExpr)> = schema
            .fields()
            .iter()
            .map(|f| (format!("{}.{}", name, f.name()), PhysExpr::col(f.name().clone())))
            .collect();
        let project = ProjectPlan::new(Some(vec![]), namespaced, scan)?;
        Ok(Box::new(project))
    }

    /// Resolves an unqualified column name against every open table,
    /// erroring on ambiguity and passing through dotted names and names
    /// that match no open table (assumed to be a computed/alias column).
    fn resolve_identifier(&self, name: &str) -> Result<String> {
        if name.contains('.') {
            return Ok(name.to_string());
        }
        let matches: Vec<&String> = self
            .open_tables
            .iter()
            .filter(|(_, schema)| schema.field_with_name(name).is_ok())
            .map(|(table, _)| table)
            .collect();
        match matches.len() {
            0 => Ok(name.to_string()),
            1 => Ok(format!("{}.{}", matches[0], name)),
            _ => Err(QueryError::Plan(format!(
                "column '{}' is ambiguous across open tables",
                name
            ))),
        }
    }

    /// If `select` needs aggregation (an explicit `GROUP BY`, or an
    /// aggregation function call among its projections), extracts every
    /// aggregation-function projection into an `AggregatePlan` and
    /// replaces it in the returned projection list with a plain reference
    /// to its alias. Otherwise returns `child` and `select.projections`
    /// unchanged.
    fn maybe_aggregate(
        &self,
        select: &ast::SelectStmt,
        child: BoxedPlan,
    ) -> Result<(BoxedPlan, Vec<ast::Projection>)> {
        let has_aggregate_call = select.projections.iter().any(|p| is_aggregate_call(&p.value));
        if select.group_by.is_none() && !has_aggregate_call {
            return Ok((child, select.projections.clone()));
        }

        let keys = match &select.group_by {
            Some(cols) => cols
                .iter()
                .map(|c| self.resolve_identifier(c))
                .collect::<Result<Vec<_>>>()?,
            None => vec![],
        };

        let mut aggregations = Vec::new();
        let mut rewritten = Vec::with_capacity(select.projections.len());
        for p in &select.projections {
            if let ast::Expr::FunctionCall { name, args } = &p.value {
                if let Some(func) = AggregateFunc::from_name(name) {
                    let alias = p.alias.clone().ok_or_else(|| {
                        QueryError::Plan(format!("aggregation {} requires an alias", name))
                    })?;
                    if args.len() != 1 {
                        return Err(QueryError::Plan(format!(
                            "aggregation {} takes exactly one argument",
                            name
                        )));
                    }
                    let column = match &args[0] {
                        ast::Expr::Identifier(col) => self.resolve_identifier(col)?,
                        _ => {
                            return Err(QueryError::Plan(format!(
                                "aggregation {} argument must be a bare column reference",
                                name
                            )))
                        }
                    };
                    aggregations.push(AggregateExpr { func, column, alias: alias.clone() });
                    rewritten.push(ast::Projection {
                        value: ast::Expr::Identifier(alias),
                        alias: None,
                    });
                    continue;
                }
            }
            rewritten.push(p.clone());
        }

        let plan = AggregatePlan::new(keys, aggregations, child)?;
        Ok((Box::new(plan) as BoxedPlan, rewritten))
    }

    /// Splits projections into plain pass-through column names (`select`)
    /// and computed columns (`project`). A bare identifier whose resolved
    /// name differs from the text the user wrote (namespacing resolved it
    /// to `table.column`) becomes a computed column aliased back to the
    /// original text, so `SELECT id FROM users` still surfaces as `id`.
    fn parse_projections(
        &self,
        projections: &[ast::Projection],
        schema: &SchemaRef,
    ) -> Result<(Option<Vec<String>>, Vec<(String, PhysExpr)>)> {
        let mut known: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        let mut select = Vec::new();
        let mut project = Vec::new();
        for p in projections {
            let parsed = self.parse_expression(&p.value)?;
            self.validate_column_refs(&parsed, &known)?;
            match (&parsed, &p.alias) {
                (PhysExpr::Column(resolved), None) => {
                    let raw = match &p.value {
                        ast::Expr::Identifier(name) => name.clone(),
                        _ => unreachable!("Expr::Column can only come from an Identifier"),
                    };
                    if resolved == &raw {
                        select.push(resolved.clone());
                        known.push(resolved.clone());
                    } else {
                        known.push(raw.clone());
                        project.push((raw, parsed));
                    }
                }
                (_, Some(alias)) => {
                    known.push(alias.clone());
                    project.push((alias.clone(), parsed));
                }
                (_, None) => {
                    return Err(QueryError::Plan(
                        "a projection that is not a bare column reference requires an alias".into(),
                    ));
                }
            }
        }
        Ok((Some(select), project))
    }

    /// Validates every column `expr` references is present in `known`,
    /// raising the spec's Expression error at plan time instead of waiting
    /// for the first batch to fail inside `Expr::evaluate`.
    fn validate_column_refs(&self, expr: &PhysExpr, known: &[String]) -> Result<()> {
        let mut refs = Vec::new();
        expr.column_refs(&mut refs);
        for name in refs {
            if !known.iter().any(|k| k == &name) {
                return Err(QueryError::Expression(format!("unknown column '{}'", name)));
            }
        }
        Ok(())
    }

    /// Resolves an `ORDER BY` column against the schema `Sort` will
    /// actually see: the just-built `Project` output. A name already
    /// present there (a select pass-through or a projection alias) is
    /// used as-is; otherwise it falls back to table-namespaced lookup, for
    /// queries that order by a column the projection also kept namespaced.
    fn parse_order_by(&self, items: &[ast::OrderingItem], schema: &SchemaRef) -> Result<(Vec<String>, Vec<bool>)> {
        let mut keys = Vec::with_capacity(items.len());
        let mut descending = Vec::with_capacity(items.len());
        for item in items {
            let name = if schema.field_with_name(&item.column).is_ok() {
                item.column.clone()
            } else {
                let resolved = self.resolve_identifier(&item.column)?;
                if schema.field_with_name(&resolved).is_err() {
                    return Err(QueryError::Plan(format!(
                        "no column named '{}' in the projected output",
                        item.column
                    )));
                }
                resolved
            };
            keys.push(name);
            descending.push(item.order == ast::Order::Desc);
        }
        Ok((keys, descending))
    }

    fn parse_expression(&self, expr: &ast::Expr) -> Result<PhysExpr> {
        match expr {
            ast::Expr::Identifier(name) => Ok(PhysExpr::col(self.resolve_identifier(name)?)),
            ast::Expr::Literal(value) => Ok(PhysExpr::lit(value.clone())),
            ast::Expr::BinaryOp { op, left, right } | ast::Expr::Comparison { op, left, right } => {
                let func = BuiltinFunction::from_name(op)
                    .ok_or_else(|| QueryError::Plan(format!("unsupported operator '{}'", op)))?;
                Ok(PhysExpr::Call(
                    func,
                    vec![self.parse_expression(left)?, self.parse_expression(right)?],
                ))
            }
            ast::Expr::Conjunction { op, left, right } => {
                let func = BuiltinFunction::from_name(op)
                    .ok_or_else(|| QueryError::Plan(format!("unsupported operator '{}'", op)))?;
                Ok(PhysExpr::Call(
                    func,
                    vec![self.parse_expression(left)?, self.parse_expression(right)?],
                ))
            }
            ast::Expr::UnaryOp { op, operand } => {
                if op == "-" {
                    Ok(PhysExpr::Call(
                        BuiltinFunction::Sub,
                        vec![PhysExpr::lit(crate::scalar::ScalarValue::Int64(0)), self.parse_expression(operand)?],
                    ))
                } else if op.eq_ignore_ascii_case("NOT") {
                    Ok(PhysExpr::Call(BuiltinFunction::Not, vec![self.parse_expression(operand)?]))
                } else {
                    Err(QueryError::Plan(format!("unsupported unary operator '{}'", op)))
                }
            }
            ast::Expr::FunctionCall { name, args } => {
                if AggregateFunc::from_name(name).is_some() {
                    return Err(QueryError::Plan(format!(
                        "aggregation {} is only allowed as a top-level projection under GROUP BY",
                        name
                    )));
                }
                let func = BuiltinFunction::from_name(name)
                    .ok_or_else(|| QueryError::NotImplemented(format!("function '{}'", name)))?;
                let args = args
                    .iter()
                    .map(|a| self.parse_expression(a))
                    .collect::<Result<Vec<_>>>()?;
                Ok(PhysExpr::Call(func, args))
            }
        }
    }
}

fn is_aggregate_call(expr: &ast::Expr) -> bool {
    matches!(expr, ast::Expr::FunctionCall { name, .. } if AggregateFunc::from_name(name).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;

    use crate::physical_plan::collect;

    fn users_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("age", DataType::Int64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 1, 2, 3])),
                Arc::new(Int64Array::from(vec![25, 30, 35, 40, 45])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn plans_simple_filter_and_projection() {
        let mut catalog = Catalog::new();
        catalog.register_batches("users", vec![users_batch()]);
        let plan = plan_sql(
            "SELECT id FROM users WHERE age > 30",
            &catalog,
            &ExecutionConfig::default(),
        )
        .unwrap();
        let batches = collect(plan).unwrap();
        let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total_rows, 3);
        let ids: Vec<i64> = batches
            .iter()
            .flat_map(|b| {
                b.column(0)
                    .as_any()
                    .downcast_ref::<Int64Array>()
                    .unwrap()
                    .values()
                    .to_vec()
            })
            .collect();
        assert_eq!(ids, vec![2, 2, 3]);
    }

    #[test]
    fn plans_group_by_with_chained_alias() {
        let mut catalog = Catalog::new();
        catalog.register_batches("users", vec![users_batch()]);
        let sql = "SELECT id, COUNT(id) AS count, AVG(age) AS average_age, average_age + 1 AS adjusted_avg_age \
                   FROM users GROUP BY id";
        let plan = plan_sql(sql, &catalog, &ExecutionConfig::default()).unwrap();
        let batches = collect(plan).unwrap();
        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 3);
        let int_col = |name: &str| -> Int64Array {
            let idx = batch.schema().index_of(name).unwrap();
            batch.column(idx).as_any().downcast_ref::<Int64Array>().unwrap().clone()
        };
        let float_col = |name: &str| -> arrow::array::Float64Array {
            let idx = batch.schema().index_of(name).unwrap();
            batch
                .column(idx)
                .as_any()
                .downcast_ref::<arrow::array::Float64Array>()
                .unwrap()
                .clone()
        };
        assert_eq!(int_col("id").values(), &[1, 2, 3]);
        assert_eq!(int_col("count").values(), &[2, 2, 1]);
        assert_eq!(float_col("average_age").values(), &[30.0, 35.0, 45.0]);
        assert_eq!(float_col("adjusted_avg_age").values(), &[31.0, 36.0, 46.0]);
    }

    #[test]
    fn plans_inner_join_with_group_by_and_filter() {
        let mut catalog = Catalog::new();
        let users_schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("age", DataType::Int64, false),
        ]));
        let users = RecordBatch::try_new(
            Arc::clone(&users_schema),
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(Int64Array::from(vec![25, 30, 30])),
            ],
        )
        .unwrap();
        catalog.register_batches("users", vec![users]);

        let orders_schema = Arc::new(Schema::new(vec![
            Field::new("user_id", DataType::Int64, false),
            Field::new("amount", DataType::Int64, false),
        ]));
        let orders = RecordBatch::try_new(
            orders_schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3, 4])),
                Arc::new(Int64Array::from(vec![100, 200, 150, 300])),
            ],
        )
        .unwrap();
        catalog.register_batches("orders", vec![orders]);

        let sql = "SELECT users.age, SUM(orders.amount) AS total_amount FROM users \
                   JOIN orders ON users.id = orders.user_id \
                   WHERE orders.amount > 100 GROUP BY users.age";
        let plan = plan_sql(sql, &catalog, &ExecutionConfig::default()).unwrap();
        let batches = collect(plan).unwrap();
        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 1);
        let ages = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        let totals = batch.column(1).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(ages.value(0), 30);
        assert_eq!(totals.value(0), 350);
    }

    #[test]
    fn ambiguous_unqualified_column_is_a_plan_error() {
        let mut catalog = Catalog::new();
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let a = RecordBatch::try_new(Arc::clone(&schema), vec![Arc::new(Int64Array::from(vec![1]))]).unwrap();
        let b = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1]))]).unwrap();
        catalog.register_batches("a", vec![a]);
        catalog.register_batches("b", vec![b]);
        let err = plan_sql(
            "SELECT id FROM a JOIN b ON a.id = b.id",
            &catalog,
            &ExecutionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::Plan(_)));
    }

    #[test]
    fn unknown_table_is_a_plan_error() {
        let catalog = Catalog::new();
        let err = plan_sql("SELECT a FROM missing", &catalog, &ExecutionConfig::default()).unwrap_err();
        assert!(matches!(err, QueryError::Plan(_)));
    }

    #[test]
    fn unknown_column_in_where_is_an_expression_error_at_plan_time() {
        let mut catalog = Catalog::new();
        catalog.register_batches("users", vec![users_batch()]);
        let err = plan_sql(
            "SELECT id FROM users WHERE height > 10",
            &catalog,
            &ExecutionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::Expression(_)));
    }

    #[test]
    fn unknown_column_in_projection_is_an_expression_error_at_plan_time() {
        let mut catalog = Catalog::new();
        catalog.register_batches("users", vec![users_batch()]);
        let err = plan_sql(
            "SELECT height + 1 AS h FROM users",
            &catalog,
            &ExecutionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::Expression(_)));
    }

    #[test]
    fn limit_and_offset_paginate_the_result() {
        let mut catalog = Catalog::new();
        let schema = Arc::new(Schema::new(vec![Field::new("name", DataType::Utf8, false)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(vec!["a", "b", "c", "d"]))],
        )
        .unwrap();
        catalog.register_batches("t", vec![batch]);
        let plan = plan_sql(
            "SELECT name FROM t ORDER BY name LIMIT 2 OFFSET 1",
            &catalog,
            &ExecutionConfig::default(),
        )
        .unwrap();
        let batches = collect(plan).unwrap();
        let names: Vec<String> = batches
            .iter()
            .flat_map(|b| {
                let col = b.column(0).as_any().downcast_ref::<StringArray>().unwrap();
                (0..col.len()).map(|i| col.value(i).to_string()).collect::<Vec<_>>()
            })
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }
}
