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

//! The abstract syntax tree produced by the parser. This is the sole
//! contract between the parser and the planner: tagged, closed enums
//! rather than an open class hierarchy, with the field names fixed by
//! the node-kind shapes the planner matches on.

use crate::scalar::ScalarValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub projections: Vec<Projection>,
    pub from: Vec<FromItem>,
    pub where_clause: Option<Expr>,
    pub group_by: Option<Vec<String>>,
    pub order_by: Option<Vec<OrderingItem>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub value: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderingItem {
    pub column: String,
    pub order: Order,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    Table(String),
    Join(Join),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Lower-case, underscore-joined (e.g. `"inner"`, `"left"`).
    pub join_type: String,
    pub left_table: String,
    pub right_table: String,
    pub join_condition: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier(String),
    Literal(ScalarValue),
    BinaryOp {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Comparison {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conjunction {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: String,
        operand: Box<Expr>,
    },
    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },
}
