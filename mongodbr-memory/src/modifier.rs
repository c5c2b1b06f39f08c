//! Update and replacement application for in-memory documents.

use bson::{Bson, Document};

use mongodbr_core::error::{RepositoryError, RepositoryResult};

use crate::evaluator::is_operator_document;

/// Applies an operator update (`$set`, `$unset`, `$inc`, `$setOnInsert`) in place.
///
/// `$setOnInsert` is only honored when `inserting` is true. The `_id` field cannot be
/// changed.
pub(crate) fn apply_update(
    document: &mut Document,
    update: &Document,
    inserting: bool,
) -> RepositoryResult<()> {
    if !is_operator_document(update) {
        return Err(RepositoryError::InvalidDocument(
            "update document must contain only update operators".to_string(),
        ));
    }

    for (operator, fields) in update {
        let fields = fields.as_document().ok_or_else(|| {
            RepositoryError::InvalidDocument(format!("{} requires a document", operator))
        })?;

        for (path, value) in fields {
            if path == "_id" || path.starts_with("_id.") {
                if operator == "$setOnInsert" || document.get("_id") == Some(value) {
                    continue;
                }
                return Err(RepositoryError::InvalidDocument(
                    "the _id field is immutable".to_string(),
                ));
            }

            match operator.as_str() {
                "$set" => set_path(document, path, value.clone())?,
                "$setOnInsert" if inserting => set_path(document, path, value.clone())?,
                "$setOnInsert" => {}
                "$unset" => unset_path(document, path),
                "$inc" => increment_path(document, path, value)?,
                other => return Err(RepositoryError::UnsupportedOperator(other.to_string())),
            }
        }
    }

    Ok(())
}

/// Replaces every field of `document` except `_id` with the fields of `replacement`.
pub(crate) fn apply_replacement(document: &mut Document, replacement: &Document) -> RepositoryResult<()> {
    if replacement.keys().any(|key| key.starts_with('$')) {
        return Err(RepositoryError::InvalidDocument(
            "replacement document must not contain update operators".to_string(),
        ));
    }

    let id = document.get("_id").cloned();
    if let (Some(current), Some(requested)) = (&id, replacement.get("_id")) {
        if current != requested {
            return Err(RepositoryError::InvalidDocument(
                "the _id field is immutable".to_string(),
            ));
        }
    }

    let mut replaced = Document::new();
    if let Some(id) = id {
        replaced.insert("_id", id);
    }
    for (key, value) in replacement {
        if key != "_id" {
            replaced.insert(key.clone(), value.clone());
        }
    }

    *document = replaced;
    Ok(())
}

/// Builds the starting document of an upsert from the equality clauses of `filter`.
pub(crate) fn upsert_seed(filter: &Document) -> Document {
    let mut seed = Document::new();
    collect_equalities(filter, &mut seed);
    seed
}

fn collect_equalities(filter: &Document, seed: &mut Document) {
    for (key, condition) in filter {
        if key == "$and" {
            for clause in condition.as_array().into_iter().flatten() {
                if let Some(clause) = clause.as_document() {
                    collect_equalities(clause, seed);
                }
            }
            continue;
        }
        if key.starts_with('$') {
            continue;
        }

        let value = match condition {
            Bson::Document(operators) if is_operator_document(operators) => match operators.get("$eq") {
                Some(value) => value.clone(),
                None => continue,
            },
            value => value.clone(),
        };

        // Seeds only fail on conflicting paths, which the store rejects anyway.
        let _ = set_path(seed, key, value);
    }
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> RepositoryResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !document.contains_key(head) {
                document.insert(head, Document::new());
            }
            match document.get_mut(head) {
                Some(Bson::Document(child)) => set_path(child, rest, value),
                _ => Err(RepositoryError::InvalidDocument(format!(
                    "cannot create field '{}' in non-document field '{}'",
                    rest, head
                ))),
            }
        }
    }
}

fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = document.get_mut(head) {
                unset_path(child, rest);
            }
        }
    }
}

fn increment_path(document: &mut Document, path: &str, amount: &Bson) -> RepositoryResult<()> {
    let current = crate::evaluator::get_path(document, path).cloned();

    let incremented = match current {
        None => match amount {
            Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => amount.clone(),
            _ => return Err(non_numeric(path)),
        },
        Some(current) => add(path, &current, amount)?,
    };

    set_path(document, path, incremented)
}

/// Adds two numbers the way `$inc` does: `Int32` overflow widens to `Int64`, while
/// `Int64` overflow is an error.
fn add(path: &str, left: &Bson, right: &Bson) -> RepositoryResult<Bson> {
    let wide = |sum: Option<i64>| {
        sum.map(Bson::Int64).ok_or_else(|| {
            RepositoryError::InvalidDocument(format!("$inc overflows the value of field '{}'", path))
        })
    };

    match (left, right) {
        (Bson::Int32(a), Bson::Int32(b)) => Ok(match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(i64::from(*a) + i64::from(*b)),
        }),
        (Bson::Int32(a), Bson::Int64(b)) => wide(i64::from(*a).checked_add(*b)),
        (Bson::Int64(a), Bson::Int32(b)) => wide(a.checked_add(i64::from(*b))),
        (Bson::Int64(a), Bson::Int64(b)) => wide(a.checked_add(*b)),
        (Bson::Double(a), Bson::Double(b)) => Ok(Bson::Double(a + b)),
        (Bson::Double(a), Bson::Int32(b)) => Ok(Bson::Double(a + f64::from(*b))),
        (Bson::Double(a), Bson::Int64(b)) => Ok(Bson::Double(a + *b as f64)),
        (Bson::Int32(a), Bson::Double(b)) => Ok(Bson::Double(f64::from(*a) + b)),
        (Bson::Int64(a), Bson::Double(b)) => Ok(Bson::Double(*a as f64 + b)),
        _ => Err(non_numeric(path)),
    }
}

fn non_numeric(path: &str) -> RepositoryError {
    RepositoryError::InvalidDocument(format!("cannot apply $inc to non-numeric field '{}'", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};

    #[test]
    fn set_and_unset_reach_nested_fields() {
        let mut document = doc! { "name": "ada", "profile": { "city": "london" } };

        apply_update(
            &mut document,
            &doc! { "$set": { "profile.zip": "n1", "age": 36 }, "$unset": { "name": "" } },
            false,
        )
        .unwrap();

        assert_eq!(document, doc! { "profile": { "city": "london", "zip": "n1" }, "age": 36 });
    }

    #[test]
    fn inc_adds_or_initializes() {
        let mut document = doc! { "visits": 1, "score": 1.5 };

        apply_update(
            &mut document,
            &doc! { "$inc": { "visits": 2, "score": 1, "fresh": 5i64 } },
            false,
        )
        .unwrap();

        assert_eq!(document, doc! { "visits": 3, "score": 2.5, "fresh": 5i64 });
    }

    #[test]
    fn inc_widens_int32_overflow() {
        let mut document = doc! { "n": i32::MAX };

        apply_update(&mut document, &doc! { "$inc": { "n": 1 } }, false).unwrap();

        assert_eq!(document, doc! { "n": i32::MAX as i64 + 1 });
    }

    #[test]
    fn inc_rejects_int64_overflow() {
        let mut document = doc! { "n": i64::MAX };

        assert!(matches!(
            apply_update(&mut document, &doc! { "$inc": { "n": 1i64 } }, false),
            Err(RepositoryError::InvalidDocument(_))
        ));
        assert!(apply_update(&mut document, &doc! { "$inc": { "n": 1 } }, false).is_err());
        assert_eq!(document, doc! { "n": i64::MAX });
    }

    #[test]
    fn inc_rejects_non_numeric_fields() {
        let mut document = doc! { "name": "ada" };

        assert!(apply_update(&mut document, &doc! { "$inc": { "name": 1 } }, false).is_err());
    }

    #[test]
    fn set_on_insert_only_applies_when_inserting() {
        let mut existing = doc! { "n": 1 };
        apply_update(&mut existing, &doc! { "$setOnInsert": { "created": true } }, false).unwrap();
        assert_eq!(existing, doc! { "n": 1 });

        let mut inserted = doc! { "n": 1 };
        apply_update(&mut inserted, &doc! { "$setOnInsert": { "created": true } }, true).unwrap();
        assert_eq!(inserted, doc! { "n": 1, "created": true });
    }

    #[test]
    fn plain_documents_are_not_updates() {
        let mut document = doc! { "n": 1 };

        assert!(matches!(
            apply_update(&mut document, &doc! { "n": 2 }, false),
            Err(RepositoryError::InvalidDocument(_))
        ));
    }

    #[test]
    fn id_cannot_be_changed() {
        let mut document = doc! { "_id": ObjectId::new() };

        assert!(apply_update(&mut document, &doc! { "$set": { "_id": ObjectId::new() } }, false).is_err());
    }

    #[test]
    fn replacement_keeps_the_id() {
        let id = ObjectId::new();
        let mut document = doc! { "_id": id, "a": 1, "b": 2 };

        apply_replacement(&mut document, &doc! { "c": 3 }).unwrap();

        assert_eq!(document, doc! { "_id": id, "c": 3 });
    }

    #[test]
    fn upsert_seed_takes_equality_clauses() {
        let seed = upsert_seed(&doc! {
            "email": "ada@example.com",
            "age": { "$gt": 30 },
            "tier": { "$eq": "gold" },
            "$and": [{ "team.name": "core" }],
        });

        assert_eq!(
            seed,
            doc! { "email": "ada@example.com", "tier": "gold", "team": { "name": "core" } }
        );
    }
}
