//! Filter evaluation for in-memory documents.
//!
//! Evaluates the commonly used subset of the MongoDB filter language against BSON
//! documents: implicit equality, dotted field paths, comparison operators, `$in`/`$nin`,
//! `$exists`, `$not` and the logical operators `$and`, `$or`, `$nor`.

use std::cmp::Ordering;
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use mongodbr_core::error::{RepositoryError, RepositoryResult};


/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that `1`, `1i64` and `1.0` compare equal.
/// Embedded documents keep their field order, which is significant for equality.
/// Types without a dedicated variant are wrapped as-is and only equal themselves.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    Decimal128([u8; 16]),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Binary(u8, &'a [u8]),
    Array(Vec<Comparable<'a>>),
    Map(Vec<(&'a str, Comparable<'a>)>),
    Other(&'a Bson),
}

impl<'a> Comparable<'a> {
    /// Position of the value's type in the store's cross-type sort order.
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Number(_) | Comparable::Decimal128(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Binary(..) => 6,
            Comparable::ObjectId(_) => 7,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
            Comparable::Other(bson) => match bson {
                Bson::MinKey => 0,
                Bson::Symbol(_) => 3,
                Bson::Timestamp(_) => 10,
                Bson::RegularExpression(_) => 11,
                Bson::MaxKey => 12,
                _ => 13,
            },
        }
    }

    /// Total order used for sorting, ranking values of different types by type first.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.type_rank()
            .cmp(&other.type_rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Decimal128(value) => Comparable::Decimal128(value.bytes()),
            Bson::Binary(binary) => Comparable::Binary(u8::from(binary.subtype), &binary.bytes),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<Vec<_>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::Decimal128(a), Comparable::Decimal128(b)) => a == b,
            (Comparable::Binary(a_type, a), Comparable::Binary(b_type, b)) => a_type == b_type && a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.bytes().partial_cmp(&b.bytes()),
            // Shorter payloads sort first, then by subtype, then bytewise.
            (Comparable::Binary(a_type, a), Comparable::Binary(b_type, b)) => Some(
                a.len()
                    .cmp(&b.len())
                    .then_with(|| a_type.cmp(b_type))
                    .then_with(|| a.cmp(b)),
            ),
            (Comparable::Other(Bson::Timestamp(a)), Comparable::Other(Bson::Timestamp(b))) => {
                Some((a.time, a.increment).cmp(&(b.time, b.increment)))
            }
            (a, b) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }
}

/// Resolves a dotted field path such as `address.city`.
pub(crate) fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Returns `true` for documents whose keys are all operators, e.g. `{ "$gt": 5 }`.
pub(crate) fn is_operator_document(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

/// Interprets a BSON value as a boolean flag the way the store does.
pub(crate) fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

/// Matches documents against a filter document.
pub(crate) struct FilterEvaluator<'a> {
    document: &'a Document,
}

impl<'a> FilterEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns whether the document satisfies every clause of `filter`.
    pub fn matches(&self, filter: &Document) -> RepositoryResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => {
                    let mut all = true;
                    for clause in Self::clauses(key, condition)? {
                        if !self.matches(clause)? {
                            all = false;
                            break;
                        }
                    }
                    all
                }
                "$or" => {
                    let mut any = false;
                    for clause in Self::clauses(key, condition)? {
                        if self.matches(clause)? {
                            any = true;
                            break;
                        }
                    }
                    any
                }
                "$nor" => {
                    let mut none = true;
                    for clause in Self::clauses(key, condition)? {
                        if self.matches(clause)? {
                            none = false;
                            break;
                        }
                    }
                    none
                }
                operator if operator.starts_with('$') => {
                    return Err(RepositoryError::UnsupportedOperator(operator.to_string()));
                }
                field => Self::matches_condition(get_path(self.document, field), condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Keeps the documents matching `filter`, in their original order.
    pub fn filter_documents<'d>(
        documents: impl IntoIterator<Item = &'d Document>,
        filter: &Document,
    ) -> RepositoryResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if FilterEvaluator::new(document).matches(filter)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    fn clauses<'f>(operator: &str, condition: &'f Bson) -> RepositoryResult<Vec<&'f Document>> {
        condition
            .as_array()
            .ok_or_else(|| RepositoryError::InvalidDocument(format!("{} requires an array", operator)))?
            .iter()
            .map(|clause| {
                clause.as_document().ok_or_else(|| {
                    RepositoryError::InvalidDocument(format!("{} entries must be documents", operator))
                })
            })
            .collect()
    }

    fn matches_condition(value: Option<&Bson>, condition: &Bson) -> RepositoryResult<bool> {
        let operators = match condition {
            Bson::Document(operators) if is_operator_document(operators) => operators,
            _ => return Ok(Self::equals(value, condition)),
        };

        for (operator, argument) in operators {
            let matched = match operator.as_str() {
                "$eq" => Self::equals(value, argument),
                "$ne" => !Self::equals(value, argument),
                "$gt" => Self::compares(value, argument, |o| o == Ordering::Greater),
                "$gte" => Self::compares(value, argument, |o| o != Ordering::Less),
                "$lt" => Self::compares(value, argument, |o| o == Ordering::Less),
                "$lte" => Self::compares(value, argument, |o| o != Ordering::Greater),
                "$in" => Self::candidates(operator, argument)?
                    .iter()
                    .any(|candidate| Self::equals(value, candidate)),
                "$nin" => !Self::candidates(operator, argument)?
                    .iter()
                    .any(|candidate| Self::equals(value, candidate)),
                "$exists" => value.is_some() == is_truthy(argument),
                "$not" => !Self::matches_condition(value, argument)?,
                other => return Err(RepositoryError::UnsupportedOperator(other.to_string())),
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn candidates<'b>(operator: &str, argument: &'b Bson) -> RepositoryResult<&'b Vec<Bson>> {
        argument
            .as_array()
            .ok_or_else(|| RepositoryError::InvalidDocument(format!("{} requires an array", operator)))
    }

    /// Equality with the store's array semantics: an array field matches a scalar it contains.
    fn equals(value: Option<&Bson>, target: &Bson) -> bool {
        let target = Comparable::from(target);

        match value {
            None => target == Comparable::Null,
            Some(value) => {
                let value = Comparable::from(value);
                if value == target {
                    return true;
                }
                match value {
                    Comparable::Array(items) => items.iter().any(|item| item == &target),
                    _ => false,
                }
            }
        }
    }

    fn compares(value: Option<&Bson>, target: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
        let target = Comparable::from(target);

        match value.map(Comparable::from) {
            Some(Comparable::Array(items)) => items
                .iter()
                .any(|item| item.partial_cmp(&target).is_some_and(&accept)),
            Some(value) => value.partial_cmp(&target).is_some_and(&accept),
            None => false,
        }
    }
}
