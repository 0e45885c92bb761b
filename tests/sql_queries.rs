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

//! End-to-end coverage that runs SQL text all the way through the
//! tokenizer, parser, planner and physical operator tree.

use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use queryground::catalog::Catalog;
use queryground::config::ExecutionConfig;
use queryground::error::QueryError;
use queryground::physical_plan::collect;
use queryground::sql::plan_sql;

fn users_cities_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, false),
        Field::new("city", DataType::Utf8, false),
        Field::new("age", DataType::Int64, false),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec!["Alice", "Bob", "Carol", "Dave", "Erin"])),
            Arc::new(StringArray::from(vec![
                "Rome", "Rome", "Milan", "Milan", "Rome",
            ])),
            Arc::new(Int64Array::from(vec![30, 25, 40, 35, 22])),
        ],
    )
    .unwrap()
}

#[test]
fn filters_on_literal_equality() {
    let mut catalog = Catalog::new();
    catalog.register_batches("people", vec![users_cities_batch()]);
    let plan = plan_sql(
        "SELECT name FROM people WHERE city = 'Rome'",
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
    assert_eq!(names, vec!["Alice", "Bob", "Erin"]);
}

#[test]
fn multi_key_group_by_aggregates_per_group() {
    let mut catalog = Catalog::new();
    catalog.register_batches("people", vec![users_cities_batch()]);
    let plan = plan_sql(
        "SELECT city, COUNT(name) AS n, MAX(age) AS oldest FROM people GROUP BY city ORDER BY city ASC",
        &catalog,
        &ExecutionConfig::default(),
    )
    .unwrap();
    let batches = collect(plan).unwrap();
    let batch = &batches[0];
    let cities = batch
        .column(batch.schema().index_of("city").unwrap())
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    let ns_idx = batch.schema().index_of("n").unwrap();
    let oldest_idx = batch.schema().index_of("oldest").unwrap();
    let ns = batch.column(ns_idx).as_any().downcast_ref::<Int64Array>().unwrap();
    let oldest = batch.column(oldest_idx).as_any().downcast_ref::<Int64Array>().unwrap();
    assert_eq!(cities.value(0), "Milan");
    assert_eq!(ns.value(0), 2);
    assert_eq!(oldest.value(0), 40);
    assert_eq!(cities.value(1), "Rome");
    assert_eq!(ns.value(1), 3);
    assert_eq!(oldest.value(1), 30);
}

#[test]
fn order_by_descending_then_paginate() {
    let mut catalog = Catalog::new();
    catalog.register_batches("people", vec![users_cities_batch()]);
    let plan = plan_sql(
        "SELECT name, age FROM people ORDER BY age DESC LIMIT 2",
        &catalog,
        &ExecutionConfig::default(),
    )
    .unwrap();
    let batches = collect(plan).unwrap();
    let batch = &batches[0];
    let names_idx = batch.schema().index_of("name").unwrap();
    let names = batch
        .column(names_idx)
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    let names: Vec<String> = (0..names.len()).map(|i| names.value(i).to_string()).collect();
    assert_eq!(names, vec!["Carol", "Dave"]);
}

#[test]
fn empty_key_aggregation_over_whole_table() {
    let mut catalog = Catalog::new();
    catalog.register_batches("people", vec![users_cities_batch()]);
    let plan = plan_sql(
        "SELECT COUNT(name) AS n, AVG(age) AS average_age FROM people",
        &catalog,
        &ExecutionConfig::default(),
    )
    .unwrap();
    let batches = collect(plan).unwrap();
    let batch = &batches[0];
    assert_eq!(batch.num_rows(), 1);
    let n = batch
        .column(batch.schema().index_of("n").unwrap())
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    let avg = batch
        .column(batch.schema().index_of("average_age").unwrap())
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(n.value(0), 5);
    assert!((avg.value(0) - 30.4).abs() < 1e-9);
}

#[test]
fn unqualified_column_after_join_requires_disambiguation() {
    let mut catalog = Catalog::new();
    let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
    let a = RecordBatch::try_new(Arc::clone(&schema), vec![Arc::new(Int64Array::from(vec![1, 2]))]).unwrap();
    let b = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2]))]).unwrap();
    catalog.register_batches("a", vec![a]);
    catalog.register_batches("b", vec![b]);
    let err = plan_sql("SELECT id FROM a JOIN b ON a.id = b.id", &catalog, &ExecutionConfig::default())
        .unwrap_err();
    assert!(matches!(err, QueryError::Plan(_)));
}

#[test]
fn select_star_is_unsupported() {
    let mut catalog = Catalog::new();
    catalog.register_batches("people", vec![users_cities_batch()]);
    let err = plan_sql("SELECT * FROM people", &catalog, &ExecutionConfig::default()).unwrap_err();
    assert!(matches!(err, QueryError::Lex(_) | QueryError::Parse(_)));
}
