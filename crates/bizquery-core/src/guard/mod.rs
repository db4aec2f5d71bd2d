//! SQL safety gate.
//!
//! Two checks run before anything reaches the store:
//!
//! 1. Read-only policy: the statement must begin with `SELECT` and be a
//!    single statement (trailing `;` is tolerated and stripped).
//! 2. Date predicate: unless a `date` column is already compared with
//!    `= == <> != >= <= > < GLOB LIKE`, one `date GLOB '????-??-??'` filter is
//!    injected. After the first top-level `WHERE` if there is one, else
//!    before the first top-level `GROUP BY`, `ORDER BY`, or `LIMIT` (in
//!    that priority), else appended on a new line.
//!
//! Keyword lookup uses [`lexer`] so keywords inside string literals,
//! quoted identifiers, comments, and parenthesized subqueries are ignored.
//! A statement that ends inside an unclosed comment, literal, or quoted
//! identifier is refused.
//! The glob is a lexical shape filter: `'2024-99-99'` passes it.

mod lexer;

use std::fmt;

use thiserror::Error;

use lexer::{Token, TokenKind, tokenize};

/// The injected predicate.
pub const DATE_GLOB: &str = "date GLOB '????-??-??'";

/// Top-level clause a `WHERE` was inserted before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    GroupBy,
    OrderBy,
    Limit,
}

/// Which date-predicate rewrite was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRewrite {
    /// The statement already compared `date`; text unchanged.
    AlreadyFiltered,
    /// Inserted right after the first top-level `WHERE`.
    AfterWhere,
    /// A new `WHERE` inserted before this clause.
    BeforeClause(Clause),
    /// A new `WHERE` appended at the end.
    Appended,
}

/// A single read-only `SELECT` that carries a date predicate.
///
/// Only [`guard`] constructs values of this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedSql {
    sql: String,
    rewrite: DateRewrite,
}

impl GuardedSql {
    pub fn as_str(&self) -> &str {
        &self.sql
    }

    pub fn rewrite(&self) -> DateRewrite {
        self.rewrite
    }

    pub fn into_string(self) -> String {
        self.sql
    }
}

impl fmt::Display for GuardedSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

impl AsRef<str> for GuardedSql {
    fn as_ref(&self) -> &str {
        &self.sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyViolation {
    Empty,
    NotSelect,
    MultipleStatements,
    Unterminated,
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty statement",
            Self::NotSelect => "only SELECT statements are allowed",
            Self::MultipleStatements => "multiple statements are not allowed",
            Self::Unterminated => "unterminated comment or quoted text",
        })
    }
}

/// A statement the gate refused. `sql` is the statement as received.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct PolicyError {
    pub sql: String,
    pub reason: PolicyViolation,
}

/// Whether `sql` begins with the `SELECT` keyword, ignoring case and
/// leading whitespace.
pub fn is_select(sql: &str) -> bool {
    let text = sql.trim_start();
    let Some(head) = text.get(..6) else {
        return false;
    };
    head.eq_ignore_ascii_case("select")
        && text[6..]
            .chars()
            .next()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_' || c == '$'))
}

/// Whether `sql` holds one statement, allowing trailing `;` separators.
pub fn is_single_statement(sql: &str) -> bool {
    strip_terminator(sql.trim()).is_some()
}

/// Apply the read-only policy and the date-predicate guarantee.
pub fn guard(sql: &str) -> Result<GuardedSql, PolicyError> {
    let refuse = |reason| PolicyError {
        sql: sql.to_string(),
        reason,
    };

    let text = sql.trim();
    if text.is_empty() {
        return Err(refuse(PolicyViolation::Empty));
    }
    if !is_select(text) {
        return Err(refuse(PolicyViolation::NotSelect));
    }
    let statement =
        strip_terminator(text).ok_or_else(|| refuse(PolicyViolation::MultipleStatements))?;

    let tokens = tokenize(statement);
    if tokens.iter().any(|t| !t.closed) {
        return Err(refuse(PolicyViolation::Unterminated));
    }
    let significant: Vec<&Token<'_>> = tokens.iter().filter(|t| !t.is_trivia()).collect();

    if has_date_predicate(&significant) {
        return Ok(GuardedSql {
            sql: statement.to_string(),
            rewrite: DateRewrite::AlreadyFiltered,
        });
    }

    if let Some(at) = find_top_level(&significant, "WHERE", None) {
        let end = at.start + at.text.len();
        return Ok(GuardedSql {
            sql: format!("{} {DATE_GLOB} AND{}", &statement[..end], &statement[end..]),
            rewrite: DateRewrite::AfterWhere,
        });
    }

    let clauses = [
        (Clause::GroupBy, "GROUP", Some("BY")),
        (Clause::OrderBy, "ORDER", Some("BY")),
        (Clause::Limit, "LIMIT", None),
    ];
    for (clause, first, second) in clauses {
        if let Some(at) = find_top_level(&significant, first, second) {
            return Ok(GuardedSql {
                sql: format!(
                    "{}WHERE {DATE_GLOB} {}",
                    &statement[..at.start],
                    &statement[at.start..]
                ),
                rewrite: DateRewrite::BeforeClause(clause),
            });
        }
    }

    Ok(GuardedSql {
        sql: format!("{statement}\nWHERE {DATE_GLOB}"),
        rewrite: DateRewrite::Appended,
    })
}

/// Drop trailing `;` separators. `None` if a `;` is followed by anything
/// other than whitespace, comments, or more separators.
fn strip_terminator(text: &str) -> Option<&str> {
    let tokens = tokenize(text);
    let Some(first) = tokens.iter().position(|t| t.kind == TokenKind::Semicolon) else {
        return Some(text);
    };
    let tail_is_empty = tokens[first..]
        .iter()
        .all(|t| t.is_trivia() || t.kind == TokenKind::Semicolon);
    tail_is_empty.then(|| text[..tokens[first].start].trim_end())
}

/// `date` (bare, qualified, or quoted) directly followed by a comparison.
fn has_date_predicate(significant: &[&Token<'_>]) -> bool {
    significant.windows(2).any(|pair| {
        pair[0].names("date")
            && match pair[1].kind {
                TokenKind::Op => matches!(
                    pair[1].text,
                    "=" | "==" | "<>" | "!=" | ">=" | "<=" | ">" | "<"
                ),
                TokenKind::Word => pair[1].is_word("GLOB") || pair[1].is_word("LIKE"),
                _ => false,
            }
    })
}

/// First depth-0 `first` keyword, optionally followed by `second`.
fn find_top_level<'t, 'a>(
    significant: &[&'t Token<'a>],
    first: &str,
    second: Option<&str>,
) -> Option<&'t Token<'a>> {
    significant.iter().enumerate().find_map(|(i, tok)| {
        let matched = tok.depth == 0
            && tok.is_word(first)
            && second.is_none_or(|s| significant.get(i + 1).is_some_and(|next| next.is_word(s)));
        matched.then_some(*tok)
    })
}
