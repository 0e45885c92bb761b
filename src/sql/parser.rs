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

//! Recursive-descent parser with expression precedence climbing.
//!
//! Entry point dispatches on the first token: only `SELECT` proceeds,
//! `INSERT`/`UPDATE` are recognized but raise [`QueryError::NotImplemented`],
//! anything else is a parse error.
//!
//! Expression precedence, low to high:
//! `OR < AND < NOT < comparison < + - < * / < unary - < primary`.

use crate::error::{QueryError, Result};
use crate::scalar::ScalarValue;
use crate::sql::ast::{Expr, FromItem, Join, Order, OrderingItem, Projection, SelectStmt, Statement};
use crate::sql::token::{tokenize, Token};

/// Parses a SQL query text into a [`Statement`].
pub fn parse(text: &str) -> Result<Statement> {
    let tokens = tokenize(text)?;
    Parser::new(tokens).parse_statement()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        if self.tokens.is_empty() {
            return Err(QueryError::Parse("empty query".into()));
        }
        match self.current() {
            Token::Select => Ok(Statement::Select(self.parse_select()?)),
            Token::Insert => Err(QueryError::NotImplemented("INSERT statements".into())),
            Token::Update => Err(QueryError::NotImplemented("UPDATE statements".into())),
            other => Err(QueryError::Parse(format!(
                "unsupported statement, expected SELECT, got {:?}",
                other
            ))),
        }
    }

    fn parse_select(&mut self) -> Result<SelectStmt> {
        self.advance(); // consume SELECT

        let projections = self.parse_projections()?;

        if !matches!(self.current(), Token::From) {
            return Err(QueryError::Parse(format!(
                "expected FROM after projections, got {:?}",
                self.current()
            )));
        }
        self.advance();
        let from = self.parse_from_clause()?;

        let where_clause = if matches!(self.current(), Token::Where) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };

        let group_by = if matches!(self.current(), Token::GroupBy) {
            self.advance();
            Some(self.parse_identifier_list()?)
        } else {
            None
        };

        let order_by = if matches!(self.current(), Token::OrderBy) {
            self.advance();
            Some(self.parse_order_by_clause()?)
        } else {
            None
        };

        let limit = if matches!(self.current(), Token::Limit) {
            self.advance();
            Some(self.parse_numeric_literal()?)
        } else {
            None
        };

        let offset = if matches!(self.current(), Token::Offset) {
            self.advance();
            Some(self.parse_numeric_literal()?)
        } else {
            None
        };

        if !matches!(self.current(), Token::Eof) {
            return Err(QueryError::Parse(format!("unexpected token: {:?}", self.current())));
        }

        Ok(SelectStmt {
            projections,
            from,
            where_clause,
            group_by,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_projections(&mut self) -> Result<Vec<Projection>> {
        let mut projections = Vec::new();
        loop {
            let value = self.parse_expression()?;
            let mut alias = None;
            if matches!(self.current(), Token::As) {
                self.advance();
                if let Token::Identifier(name) = self.current().clone() {
                    alias = Some(name);
                    self.advance();
                } else {
                    return Err(QueryError::Parse(format!(
                        "expected identifier after AS, got {:?}",
                        self.current()
                    )));
                }
            }
            projections.push(Projection { value, alias });
            if !self.consume_punctuation(',') {
                break;
            }
        }
        Ok(projections)
    }

    fn parse_from_clause(&mut self) -> Result<Vec<FromItem>> {
        let mut tables = Vec::new();
        loop {
            let left_table = self.expect_identifier("table name in FROM clause")?;
            if self.is_join_start() {
                tables.push(FromItem::Join(self.parse_join_clause(left_table)?));
            } else {
                tables.push(FromItem::Table(left_table));
            }
            if !self.consume_punctuation(',') {
                break;
            }
        }
        Ok(tables)
    }

    fn is_join_start(&self) -> bool {
        matches!(self.current(), Token::Join | Token::JoinType(_))
    }

    fn parse_join_clause(&mut self, left_table: String) -> Result<Join> {
        let mut join_type_words = Vec::new();
        while let Token::JoinType(kind) = self.current().clone() {
            join_type_words.push(kind);
            self.advance();
        }
        if join_type_words.is_empty() {
            join_type_words.push("INNER".to_string());
        }

        if !matches!(self.current(), Token::Join) {
            return Err(QueryError::Parse("expected JOIN keyword in JOIN clause".into()));
        }
        self.advance();

        let right_table = self.expect_identifier("table name in JOIN clause")?;

        let join_condition = if matches!(self.current(), Token::On) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(Join {
            join_type: join_type_words.join("_").to_ascii_lowercase(),
            left_table,
            right_table,
            join_condition,
        })
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        loop {
            names.push(self.expect_identifier("column name")?);
            if !self.consume_punctuation(',') {
                break;
            }
        }
        Ok(names)
    }

    fn parse_order_by_clause(&mut self) -> Result<Vec<OrderingItem>> {
        let mut items = Vec::new();
        loop {
            let column = self.expect_identifier("column name in ORDER BY clause")?;
            let order = match self.current() {
                Token::Asc => {
                    self.advance();
                    Order::Asc
                }
                Token::Desc => {
                    self.advance();
                    Order::Desc
                }
                _ => Order::Asc,
            };
            items.push(OrderingItem { column, order });
            if !self.consume_punctuation(',') {
                break;
            }
        }
        Ok(items)
    }

    fn parse_numeric_literal(&mut self) -> Result<usize> {
        match self.current().clone() {
            Token::Literal(text) => {
                self.advance();
                text.parse::<usize>()
                    .map_err(|_| QueryError::Parse(format!("expected a non-negative integer, got {:?}", text)))
            }
            other => Err(QueryError::Parse(format!(
                "expected a numeric literal after LIMIT or OFFSET, got {:?}",
                other
            ))),
        }
    }

    // ---- expression precedence climb -------------------------------

    fn parse_expression(&mut self) -> Result<Expr> {
        let mut term = self.parse_term()?;
        while self.is_operator_keyword(&Token::Or) {
            self.advance();
            let right = self.parse_term()?;
            term = Expr::Conjunction {
                op: "OR".into(),
                left: Box::new(term),
                right: Box::new(right),
            };
        }
        Ok(term)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut factor = self.parse_factor()?;
        while self.is_operator_keyword(&Token::And) {
            self.advance();
            let right = self.parse_factor()?;
            factor = Expr::Conjunction {
                op: "AND".into(),
                left: Box::new(factor),
                right: Box::new(right),
            };
        }
        Ok(factor)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        if self.is_operator_keyword(&Token::Not) {
            self.advance();
            let operand = self.parse_factor()?;
            return Ok(Expr::UnaryOp {
                op: "NOT".into(),
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_additive_expr()?;
        if let Some(op) = self.match_operator(&["=", "<", ">", "<=", ">=", "<>", "!="]) {
            self.advance();
            let right = self.parse_additive_expr()?;
            return Ok(Expr::Comparison {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_additive_expr(&mut self) -> Result<Expr> {
        let mut expr = self.parse_multiplicative_expr()?;
        while let Some(op) = self.match_operator(&["+", "-"]) {
            self.advance();
            let right = self.parse_multiplicative_expr()?;
            expr = Expr::BinaryOp {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr> {
        let mut expr = self.parse_unary_expr()?;
        while let Some(op) = self.match_operator(&["*", "/"]) {
            self.advance();
            let right = self.parse_unary_expr()?;
            expr = Expr::BinaryOp {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        if let Some(op) = self.match_operator(&["-"]) {
            self.advance();
            let operand = self.parse_unary_expr()?;
            return Ok(Expr::UnaryOp {
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        if matches!(self.current(), Token::Punctuation('(')) {
            self.advance();
            let expr = self.parse_expression()?;
            if !matches!(self.current(), Token::Punctuation(')')) {
                return Err(QueryError::Parse("expected ')'".into()));
            }
            self.advance();
            return Ok(expr);
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                if matches!(self.current(), Token::Punctuation('(')) {
                    self.parse_function_call(name)
                } else {
                    Ok(Expr::Identifier(name))
                }
            }
            Token::Literal(text) => {
                self.advance();
                Ok(Expr::Literal(ScalarValue::parse_literal(&text)))
            }
            other => Err(QueryError::Parse(format!("unexpected token: {:?}", other))),
        }
    }

    fn parse_function_call(&mut self, name: String) -> Result<Expr> {
        self.advance(); // consume '('
        let mut args = Vec::new();
        if !matches!(self.current(), Token::Punctuation(')')) {
            loop {
                args.push(self.parse_expression()?);
                if self.consume_punctuation(',') {
                    continue;
                }
                break;
            }
        }
        if !matches!(self.current(), Token::Punctuation(')')) {
            return Err(QueryError::Parse("expected ')'".into()));
        }
        self.advance();
        Ok(Expr::FunctionCall { name, args })
    }

    // ---- small helpers ------------------------------------------------

    fn is_operator_keyword(&self, expected: &Token) -> bool {
        self.current() == expected
    }

    fn match_operator(&self, candidates: &[&str]) -> Option<String> {
        if let Token::Operator(op) = self.current() {
            if candidates.iter().any(|c| c.eq_ignore_ascii_case(op)) {
                return Some(op.clone());
            }
        }
        None
    }

    fn consume_punctuation(&mut self, value: char) -> bool {
        if matches!(self.current(), Token::Punctuation(c) if *c == value) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String> {
        match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(QueryError::Parse(format!("expected {}, got {:?}", what, other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_select() {
        let stmt = match parse("SELECT a, b FROM t WHERE a > 1").unwrap() {
            Statement::Select(s) => s,
        };
        assert_eq!(stmt.projections.len(), 2);
        assert_eq!(stmt.from, vec![FromItem::Table("t".into())]);
        assert!(stmt.where_clause.is_some());
    }

    #[test]
    fn parses_precedence_chain() {
        let stmt = match parse("SELECT a FROM t WHERE a + 1 * 2 = 3 AND NOT b").unwrap() {
            Statement::Select(s) => s,
        };
        let expected = Expr::Conjunction {
            op: "AND".into(),
            left: Box::new(Expr::Comparison {
                op: "=".into(),
                left: Box::new(Expr::BinaryOp {
                    op: "+".into(),
                    left: Box::new(Expr::Identifier("a".into())),
                    right: Box::new(Expr::BinaryOp {
                        op: "*".into(),
                        left: Box::new(Expr::Literal(ScalarValue::Int64(1))),
                        right: Box::new(Expr::Literal(ScalarValue::Int64(2))),
                    }),
                }),
                right: Box::new(Expr::Literal(ScalarValue::Int64(3))),
            }),
            right: Box::new(Expr::UnaryOp {
                op: "NOT".into(),
                operand: Box::new(Expr::Identifier("b".into())),
            }),
        };
        assert_eq!(stmt.where_clause, Some(expected));
    }

    #[test]
    fn parses_group_by_order_by_limit_offset() {
        let stmt = match parse("SELECT city, SUM(n) AS total FROM t GROUP BY city ORDER BY total DESC LIMIT 10 OFFSET 5")
            .unwrap()
        {
            Statement::Select(s) => s,
        };
        assert_eq!(stmt.group_by, Some(vec!["city".to_string()]));
        assert_eq!(
            stmt.order_by,
            Some(vec![OrderingItem {
                column: "total".into(),
                order: Order::Desc
            }])
        );
        assert_eq!(stmt.limit, Some(10));
        assert_eq!(stmt.offset, Some(5));
    }

    #[test]
    fn parses_join_clause_with_default_inner_type() {
        let stmt = match parse("SELECT a FROM users JOIN orders ON users.id = orders.user_id").unwrap() {
            Statement::Select(s) => s,
        };
        assert_eq!(
            stmt.from,
            vec![FromItem::Join(Join {
                join_type: "inner".into(),
                left_table: "users".into(),
                right_table: "orders".into(),
                join_condition: Some(Expr::Comparison {
                    op: "=".into(),
                    left: Box::new(Expr::Identifier("users.id".into())),
                    right: Box::new(Expr::Identifier("orders.user_id".into())),
                }),
            })]
        );
    }

    #[test]
    fn insert_is_not_implemented() {
        let err = parse("INSERT INTO t VALUES (1)").unwrap_err();
        assert!(matches!(err, QueryError::NotImplemented(_)));
    }

    #[test]
    fn missing_from_is_a_parse_error() {
        let err = parse("SELECT a").unwrap_err();
        assert!(matches!(err, QueryError::Parse(_)));
    }

    #[test]
    fn function_call_projection_with_alias() {
        let stmt = match parse("SELECT ROUND(a, 2) AS rounded FROM t").unwrap() {
            Statement::Select(s) => s,
        };
        assert_eq!(stmt.projections[0].alias.as_deref(), Some("rounded"));
        assert!(matches!(stmt.projections[0].value, Expr::FunctionCall { .. }));
    }
}
