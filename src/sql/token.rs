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

//! A regular-expression-driven, left-to-right longest-match-per-position
//! scanner for SQL text. Alternation is ordered so that keywords are
//! matched before a bare identifier could swallow them, matching the
//! priority order a hand-rolled `re`-based tokenizer would use.
//!
//! Known limitations, same as the reference implementation this was
//! ported from: no nested quotes, no string escapes, no comments.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{QueryError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Select,
    Insert,
    Update,
    From,
    Where,
    GroupBy,
    OrderBy,
    Asc,
    Desc,
    Limit,
    Offset,
    As,
    Join,
    On,
    /// INNER | LEFT | RIGHT | FULL | CROSS | NATURAL, upper-cased.
    JoinType(String),
    And,
    Or,
    Not,
    /// `<> <= >= != == = < > + - * /`, kept verbatim.
    Operator(String),
    Identifier(String),
    /// Raw literal text: quotes and digits untouched; the parser casts it.
    Literal(String),
    Punctuation(char),
    Eof,
}

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(
        r#"(?xi)
        ^(?:
              (?P<keyword>\bSELECT\b|\bINSERT\b|\bUPDATE\b|\bFROM\b|\bWHERE\b
                  |\bGROUP\s+BY\b|\bORDER\s+BY\b|\bASC\b|\bDESC\b|\bLIMIT\b|\bOFFSET\b|\bAS\b
                  |\bJOIN\b|\bON\b|\bINNER\b|\bLEFT\b|\bRIGHT\b|\bFULL\b|\bCROSS\b|\bNATURAL\b)
            | (?P<text_operator>\bAND\b|\bOR\b|\bNOT\b)
            | (?P<operator><>|<=|>=|!=|==|=|<|>|\+|-|\*|/)
            | (?P<identifier>[A-Za-z_][A-Za-z0-9_.]*)
            | (?P<literal>'[^']*'|"[^"]*"|\d+(?:\.\d+)?)
            | (?P<punctuation>[,();])
            | (?P<skip>\s+)
            | (?P<mismatch>.)
        )"#
    )
    .expect("token regex is valid");
}

/// Tokenizes a SQL query into a flat sequence terminated by [`Token::Eof`].
pub fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while pos < text.len() {
        let rest = &text[pos..];
        let caps = TOKEN_RE
            .captures(rest)
            .ok_or_else(|| QueryError::Lex(format!("unexpected input at position {}", pos)))?;
        let whole = caps.get(0).unwrap();
        let consumed = whole.end();

        if let Some(m) = caps.name("keyword") {
            tokens.push(keyword_token(m.as_str()));
        } else if let Some(m) = caps.name("text_operator") {
            tokens.push(match m.as_str().to_ascii_uppercase().as_str() {
                "AND" => Token::And,
                "OR" => Token::Or,
                "NOT" => Token::Not,
                other => unreachable!("text operator regex only matches AND/OR/NOT, got {other}"),
            });
        } else if let Some(m) = caps.name("operator") {
            tokens.push(Token::Operator(m.as_str().to_string()));
        } else if let Some(m) = caps.name("identifier") {
            tokens.push(Token::Identifier(m.as_str().to_string()));
        } else if let Some(m) = caps.name("literal") {
            tokens.push(Token::Literal(m.as_str().to_string()));
        } else if let Some(m) = caps.name("punctuation") {
            tokens.push(Token::Punctuation(m.as_str().chars().next().unwrap()));
        } else if caps.name("skip").is_some() {
            // Whitespace is dropped.
        } else if let Some(m) = caps.name("mismatch") {
            return Err(QueryError::Lex(format!(
                "unexpected character {:?} at position {}",
                m.as_str(),
                pos
            )));
        }

        pos += consumed;
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

fn keyword_token(matched: &str) -> Token {
    let normalized = matched.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();
    match normalized.as_str() {
        "SELECT" => Token::Select,
        "INSERT" => Token::Insert,
        "UPDATE" => Token::Update,
        "FROM" => Token::From,
        "WHERE" => Token::Where,
        "GROUP BY" => Token::GroupBy,
        "ORDER BY" => Token::OrderBy,
        "ASC" => Token::Asc,
        "DESC" => Token::Desc,
        "LIMIT" => Token::Limit,
        "OFFSET" => Token::Offset,
        "AS" => Token::As,
        "JOIN" => Token::Join,
        "ON" => Token::On,
        other @ ("INNER" | "LEFT" | "RIGHT" | "FULL" | "CROSS" | "NATURAL") => {
            Token::JoinType(other.to_string())
        }
        other => unreachable!("keyword regex only matches known keywords, got {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_simple_select() {
        let tokens = tokenize("SELECT a, b FROM t WHERE a > 1").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Select,
                Token::Identifier("a".into()),
                Token::Punctuation(','),
                Token::Identifier("b".into()),
                Token::From,
                Token::Identifier("t".into()),
                Token::Where,
                Token::Identifier("a".into()),
                Token::Operator(">".into()),
                Token::Literal("1".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn normalizes_keyword_and_text_operator_case() {
        let tokens = tokenize("select a from t where a = 1 and b = 2").unwrap();
        assert!(tokens.contains(&Token::Select));
        assert!(tokens.contains(&Token::And));
    }

    #[test]
    fn group_by_and_order_by_are_single_tokens() {
        let tokens = tokenize("SELECT a FROM t GROUP BY a ORDER BY a DESC").unwrap();
        assert!(tokens.contains(&Token::GroupBy));
        assert!(tokens.contains(&Token::OrderBy));
        assert!(tokens.contains(&Token::Desc));
    }

    #[test]
    fn dotted_identifiers_are_kept_whole() {
        let tokens = tokenize("SELECT users.id FROM users").unwrap();
        assert_eq!(tokens[1], Token::Identifier("users.id".into()));
    }

    #[test]
    fn join_keywords_are_recognized() {
        let tokens = tokenize("SELECT a FROM t1 LEFT JOIN t2 ON t1.id = t2.id").unwrap();
        assert!(tokens.contains(&Token::JoinType("LEFT".into())));
        assert!(tokens.contains(&Token::Join));
        assert!(tokens.contains(&Token::On));
    }

    #[test]
    fn quoted_string_literal_is_kept_with_quotes() {
        let tokens = tokenize("SELECT a FROM t WHERE a = 'Rome'").unwrap();
        assert_eq!(tokens[tokens.len() - 2], Token::Literal("'Rome'".into()));
    }

    #[test]
    fn mismatch_raises_lex_error() {
        let err = tokenize("SELECT a FROM t WHERE a = #").unwrap_err();
        assert!(matches!(err, QueryError::Lex(_)));
    }
}
