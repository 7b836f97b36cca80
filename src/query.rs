//! Where-expression parsing and evaluation.
//!
//! Queries over the collection use a small boolean-expression grammar:
//! clauses joined by `&&`, where a clause is `field == "value"`,
//! `field != "value"`, `field == null`, `field != null`, or
//! `field.contains("value")`. Comparisons are case-sensitive on scalar
//! values; `contains` is a case-insensitive substring test on strings and
//! a case-insensitive element match on lists. `file.basename` is a virtual
//! field holding the filename without its `.md` extension.

use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

/// Comparison operator of one clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    /// Scalar equality.
    Eq,
    /// Scalar inequality.
    Ne,
    /// Substring / element containment.
    Contains,
}

/// One `field <op> value` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// Field name, possibly the virtual `file.basename`.
    pub field: String,
    /// Comparison operator.
    pub cmp: Cmp,
    /// Right-hand side; `None` is the `null` literal.
    pub value: Option<String>,
}

/// A parsed where-expression: a conjunction of clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereExpr {
    clauses: Vec<Clause>,
}

impl WhereExpr {
    /// Parse an expression string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] describing the first syntax problem.
    pub fn parse(input: &str) -> Result<Self> {
        Parser { src: input, pos: 0 }.parse()
    }

    /// The parsed clauses, in source order.
    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Evaluate the expression against a document's path and frontmatter.
    #[must_use]
    pub fn matches(&self, path: &str, frontmatter: &Mapping) -> bool {
        self.clauses
            .iter()
            .all(|clause| eval_clause(clause, path, frontmatter))
    }
}

/// Escape embedded double quotes for inclusion in an expression string
/// literal.
#[must_use]
pub fn escape_quotes(value: &str) -> String {
    value.replace('"', "\\\"")
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn parse(mut self) -> Result<WhereExpr> {
        let mut clauses = Vec::new();
        loop {
            self.skip_ws();
            clauses.push(self.parse_clause()?);
            self.skip_ws();
            if self.rest().is_empty() {
                break;
            }
            if !self.eat("&&") {
                return Err(self.error("expected \"&&\""));
            }
        }
        Ok(WhereExpr { clauses })
    }

    fn parse_clause(&mut self) -> Result<Clause> {
        let ident = self.parse_ident()?;

        if let Some(field) = ident.strip_suffix(".contains") {
            if self.eat("(") {
                self.skip_ws();
                let needle = self.parse_string()?;
                self.skip_ws();
                if !self.eat(")") {
                    return Err(self.error("expected \")\""));
                }
                return Ok(Clause {
                    field: field.to_string(),
                    cmp: Cmp::Contains,
                    value: Some(needle),
                });
            }
        }

        self.skip_ws();
        let cmp = if self.eat("==") {
            Cmp::Eq
        } else if self.eat("!=") {
            Cmp::Ne
        } else {
            return Err(self.error("expected \"==\", \"!=\" or \".contains(\""));
        };
        self.skip_ws();

        let value = if self.eat("null") {
            None
        } else {
            Some(self.parse_string()?)
        };

        Ok(Clause {
            field: ident,
            cmp,
            value,
        })
    }

    fn parse_ident(&mut self) -> Result<String> {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|&(_, ch)| !(ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.')))
            .map_or(rest.len(), |(offset, _)| offset);
        if end == 0 {
            return Err(self.error("expected a field name"));
        }
        let ident = rest[..end].to_string();
        self.pos += end;
        Ok(ident)
    }

    fn parse_string(&mut self) -> Result<String> {
        if !self.eat("\"") {
            return Err(self.error("expected a string literal"));
        }
        let mut out = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((offset, ch)) = chars.next() {
            match ch {
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        out.push(escaped);
                    } else {
                        return Err(self.error("unterminated escape"));
                    }
                }
                '"' => {
                    self.pos += offset + 1;
                    return Ok(out);
                }
                _ => out.push(ch),
            }
        }
        Err(self.error("unterminated string literal"))
    }

    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn error(&self, message: &str) -> Error {
        Error::InvalidQuery(format!("{message} at offset {} in {:?}", self.pos, self.src))
    }
}

fn eval_clause(clause: &Clause, path: &str, frontmatter: &Mapping) -> bool {
    if clause.field == "file.basename" {
        let basename = file_basename(path);
        return eval_scalar(clause, Some(&Value::from(basename)));
    }
    let value = frontmatter
        .get(clause.field.as_str())
        .filter(|v| !v.is_null());
    eval_scalar(clause, value)
}

fn eval_scalar(clause: &Clause, value: Option<&Value>) -> bool {
    match (clause.cmp, &clause.value) {
        (Cmp::Eq, None) => value.is_none(),
        (Cmp::Ne, None) => value.is_some(),
        (Cmp::Eq, Some(rhs)) => value
            .and_then(scalar_repr)
            .is_some_and(|lhs| &lhs == rhs),
        (Cmp::Ne, Some(rhs)) => value
            .and_then(scalar_repr)
            .map_or(true, |lhs| &lhs != rhs),
        (Cmp::Contains, Some(needle)) => {
            let needle_lower = needle.to_lowercase();
            match value {
                Some(Value::String(s)) => s.to_lowercase().contains(&needle_lower),
                Some(Value::Sequence(items)) => items
                    .iter()
                    .filter_map(scalar_repr)
                    .any(|item| item.to_lowercase() == needle_lower),
                _ => false,
            }
        }
        (Cmp::Contains, None) => false,
    }
}

fn scalar_repr(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Filename of a collection-relative path, without a `.md` extension.
#[must_use]
pub fn file_basename(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.strip_suffix(".md").unwrap_or(name).to_string()
}
