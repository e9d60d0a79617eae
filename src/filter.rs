//! Per-field filter rules.
//!
//! A rule is written `field[__modifier...]: value`. The base predicate is a
//! case-insensitive substring test; `exact` and `startswith` add a further
//! condition on top of it and `not` inverts the combined result.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::record::Record;

const MODIFIER_SEPARATOR: &str = "__";

/// How rules combine. Only conjunction is evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterOperator {
    #[default]
    And,
    Or,
}

impl FromStr for FilterOperator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            other => Err(Error::InvalidArgument(format!(
                "unknown filter operator '{other}', expected 'and' or 'or'"
            ))),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
        }
    }
}

/// One single-field constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub field: String,
    pub value: String,
    pub exact: bool,
    pub starts_with: bool,
    pub negate: bool,
}

impl Rule {
    /// Parse `key` (`field` plus `__` modifiers) and the wanted value.
    ///
    /// Unknown modifiers are ignored.
    pub fn parse(key: &str, value: &str) -> Self {
        let mut parts = key.trim().split(MODIFIER_SEPARATOR);
        let field = parts.next().unwrap_or_default().to_string();
        let mut rule = Self {
            field,
            value: value.to_string(),
            exact: false,
            starts_with: false,
            negate: false,
        };
        for modifier in parts {
            match modifier {
                "exact" => rule.exact = true,
                "startswith" => rule.starts_with = true,
                "not" => rule.negate = true,
                other => tracing::debug!(modifier = other, "ignoring unknown filter modifier"),
            }
        }
        rule
    }

    /// Evaluate against `record`; a missing field is an error.
    pub fn matches<R: Record>(&self, record: &R) -> Result<bool> {
        let text = record.value_of(&self.field)?;
        let mut matched = text.to_lowercase().contains(&self.value.to_lowercase());
        if self.exact {
            matched = matched && text == self.value;
        }
        if self.starts_with {
            matched = matched && text.starts_with(&self.value);
        }
        Ok(matched != self.negate)
    }
}

/// Parse `field:value,field__not:value` into rules, in order.
pub fn parse_filter_expr(expr: &str) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();
    for part in expr.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = part.split_once(':').ok_or_else(|| {
            Error::InvalidArgument(format!("filter '{part}' must look like field:value"))
        })?;
        if key.trim().is_empty() {
            return Err(Error::InvalidArgument(format!(
                "filter '{part}' is missing a field name"
            )));
        }
        rules.push(Rule::parse(key, value.trim()));
    }
    Ok(rules)
}
