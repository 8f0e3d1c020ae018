//! Condition - Predicates over the flattened mental state
//!
//! Grammar used by conditional-event rules:
//!
//! ```text
//! condition := conjunction ( "||" conjunction )*
//! conjunction := comparison ( "&&" comparison )*
//! comparison := field op number
//! op := ">" | ">=" | "<" | "<=" | "==" | "!="
//! ```
//!
//! `field` is any name in [`MentalState::FIELD_NAMES`]. `depression_level`
//! compares by rank and also accepts a level name on the right-hand side.

use crate::domain::entities::MentalState;
use crate::domain::errors::DomainError;
use crate::domain::value_objects::DepressionLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Comparator {
    fn apply(self, left: f64, right: f64) -> bool {
        match self {
            Comparator::Gt => left > right,
            Comparator::Ge => left >= right,
            Comparator::Lt => left < right,
            Comparator::Le => left <= right,
            Comparator::Eq => (left - right).abs() < 1e-9,
            Comparator::Ne => (left - right).abs() >= 1e-9,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub field: String,
    pub comparator: Comparator,
    pub value: f64,
}

/// Parsed condition in disjunctive normal form
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    any_of: Vec<Vec<Comparison>>,
}

impl Condition {
    pub fn parse(expression: &str) -> Result<Self, DomainError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_condition(expression, "empty condition"));
        }

        let mut any_of = Vec::new();
        for disjunct in trimmed.split("||") {
            let mut all_of = Vec::new();
            for clause in disjunct.split("&&") {
                all_of.push(parse_comparison(expression, clause.trim())?);
            }
            any_of.push(all_of);
        }

        Ok(Self {
            source: trimmed.to_string(),
            any_of,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, state: &MentalState) -> bool {
        self.any_of.iter().any(|all_of| {
            all_of.iter().all(|cmp| match state.field(&cmp.field) {
                Some(left) => cmp.comparator.apply(left, cmp.value),
                None => false,
            })
        })
    }
}

fn parse_comparison(expression: &str, clause: &str) -> Result<Comparison, DomainError> {
    if clause.is_empty() {
        return Err(DomainError::invalid_condition(expression, "empty clause"));
    }

    // Two-character operators first so ">=" is not read as ">"
    const OPERATORS: [(&str, Comparator); 6] = [
        (">=", Comparator::Ge),
        ("<=", Comparator::Le),
        ("==", Comparator::Eq),
        ("!=", Comparator::Ne),
        (">", Comparator::Gt),
        ("<", Comparator::Lt),
    ];

    let (position, op, comparator) = OPERATORS
        .iter()
        .filter_map(|(op, cmp)| clause.find(op).map(|pos| (pos, *op, *cmp)))
        .min_by_key(|(pos, op, _)| (*pos, std::cmp::Reverse(op.len())))
        .ok_or_else(|| {
            DomainError::invalid_condition(expression, format!("no operator in '{}'", clause))
        })?;

    let field = clause[..position].trim();
    let raw_value = clause[position + op.len()..].trim();

    if !MentalState::FIELD_NAMES.contains(&field) {
        return Err(DomainError::invalid_condition(
            expression,
            format!("unknown field '{}'", field),
        ));
    }

    let value = match raw_value.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ if field == "depression_level" => raw_value
            .parse::<DepressionLevel>()
            .map(|level| level.rank() as f64)
            .map_err(|e| DomainError::invalid_condition(expression, e))?,
        _ => {
            return Err(DomainError::invalid_condition(
                expression,
                format!("'{}' is not a number", raw_value),
            ))
        }
    };

    Ok(Comparison {
        field: field.to_string(),
        comparator,
        value,
    })
}
