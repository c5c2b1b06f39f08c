//! Sorting, projection and aggregation over in-memory documents.

use std::cmp::Ordering;
use bson::{Bson, Document};

use mongodbr_core::error::{RepositoryError, RepositoryResult};

use crate::evaluator::{Comparable, FilterEvaluator, get_path, is_truthy};

/// A parsed multi-key sort specification such as `{ "age": -1, "name": 1 }`.
pub(crate) struct SortSpec<'a> {
    keys: Vec<(&'a str, bool)>,
}

impl<'a> SortSpec<'a> {
    pub fn parse(sort: &'a Document) -> RepositoryResult<Self> {
        let keys = sort
            .iter()
            .map(|(field, direction)| match direction {
                Bson::Int32(1) | Bson::Int64(1) => Ok((field.as_str(), false)),
                Bson::Int32(-1) | Bson::Int64(-1) => Ok((field.as_str(), true)),
                Bson::Double(d) if *d == 1.0 => Ok((field.as_str(), false)),
                Bson::Double(d) if *d == -1.0 => Ok((field.as_str(), true)),
                other => Err(RepositoryError::InvalidDocument(format!(
                    "invalid sort direction for '{}': {}",
                    field, other
                ))),
            })
            .collect::<RepositoryResult<Vec<_>>>()?;

        Ok(Self { keys })
    }

    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (field, descending) in &self.keys {
            let left = get_path(a, field)
                .map(Comparable::from)
                .unwrap_or(Comparable::Null);
            let right = get_path(b, field)
                .map(Comparable::from)
                .unwrap_or(Comparable::Null);

            let ordering = match descending {
                false => left.sort_cmp(&right),
                true => right.sort_cmp(&left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Sorts documents by a sort specification.
///
/// The sort is stable, so documents with equal keys keep their insertion order.
pub(crate) fn sort_documents(documents: &mut [Document], sort: &Document) -> RepositoryResult<()> {
    let spec = SortSpec::parse(sort)?;
    documents.sort_by(|a, b| spec.compare(a, b));

    Ok(())
}

/// Applies an inclusion or exclusion projection.
///
/// `_id` is kept unless excluded explicitly. Mixing inclusions and exclusions of other
/// fields is an error.
pub(crate) fn project(document: &Document, projection: &Document) -> RepositoryResult<Document> {
    let mut include_id = true;
    let mut included = Vec::new();
    let mut excluded = Vec::new();

    for (field, flag) in projection {
        let flag = is_truthy(flag);
        if field == "_id" {
            include_id = flag;
        } else if flag {
            included.push(field.as_str());
        } else {
            excluded.push(field.as_str());
        }
    }

    if !included.is_empty() && !excluded.is_empty() {
        return Err(RepositoryError::InvalidDocument(
            "projection cannot mix inclusion and exclusion".to_string(),
        ));
    }

    if included.is_empty() {
        let mut projected = document.clone();
        for field in excluded {
            remove_path(&mut projected, field);
        }
        if !include_id {
            projected.remove("_id");
        }
        return Ok(projected);
    }

    let mut projected = Document::new();
    if include_id {
        if let Some(id) = document.get("_id") {
            projected.insert("_id", id.clone());
        }
    }
    for (key, value) in document {
        if key == "_id" {
            continue;
        }
        let nested = included
            .iter()
            .filter_map(|field| field.strip_prefix(key.as_str())?.strip_prefix('.'))
            .collect::<Vec<_>>();

        if included.contains(&key.as_str()) {
            projected.insert(key.clone(), value.clone());
        } else if let (false, Bson::Document(child)) = (nested.is_empty(), value) {
            let spec = nested.into_iter().map(|field| (field.to_string(), Bson::Int32(1))).collect();
            let mut child = project(child, &spec)?;
            child.remove("_id");
            projected.insert(key.clone(), child);
        }
    }

    Ok(projected)
}

fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = document.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}

/// Runs an aggregation pipeline.
///
/// Supports the `$match`, `$sort`, `$skip`, `$limit`, `$project` and `$count` stages.
pub(crate) fn run_pipeline(
    documents: Vec<Document>,
    pipeline: &[Document],
) -> RepositoryResult<Vec<Document>> {
    let mut current = documents;

    for stage in pipeline {
        let mut entries = stage.iter();
        let (name, argument) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(RepositoryError::InvalidDocument(
                    "each pipeline stage must have exactly one field".to_string(),
                ));
            }
        };

        current = match name.as_str() {
            "$match" => FilterEvaluator::filter_documents(&current, stage_document(name, argument)?)?,
            "$sort" => {
                sort_documents(&mut current, stage_document(name, argument)?)?;
                current
            }
            "$skip" => {
                let skip = stage_count(name, argument)?;
                current.into_iter().skip(skip).collect()
            }
            "$limit" => {
                let limit = stage_count(name, argument)?;
                if limit == 0 {
                    return Err(RepositoryError::InvalidDocument(
                        "$limit must be positive".to_string(),
                    ));
                }
                current.truncate(limit);
                current
            }
            "$project" => {
                let projection = stage_document(name, argument)?;
                current
                    .iter()
                    .map(|document| project(document, projection))
                    .collect::<RepositoryResult<Vec<_>>>()?
            }
            "$count" => {
                let field = argument
                    .as_str()
                    .filter(|field| !field.is_empty() && !field.starts_with('$'))
                    .ok_or_else(|| {
                        RepositoryError::InvalidDocument("$count requires a field name".to_string())
                    })?;
                match current.len() {
                    0 => Vec::new(),
                    n => {
                        let mut counted = Document::new();
                        counted.insert(field, n as i64);
                        vec![counted]
                    }
                }
            }
            other => return Err(RepositoryError::UnsupportedOperator(other.to_string())),
        };
    }

    Ok(current)
}

fn stage_document<'a>(name: &str, argument: &'a Bson) -> RepositoryResult<&'a Document> {
    argument
        .as_document()
        .ok_or_else(|| RepositoryError::InvalidDocument(format!("{} requires a document", name)))
}

fn stage_count(name: &str, argument: &Bson) -> RepositoryResult<usize> {
    let count = match argument {
        Bson::Int32(n) => i64::from(*n),
        Bson::Int64(n) => *n,
        Bson::Double(n) if n.fract() == 0.0 => *n as i64,
        _ => -1,
    };

    usize::try_from(count)
        .map_err(|_| RepositoryError::InvalidDocument(format!("{} requires a non-negative integer", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn sorts_by_multiple_keys() {
        let mut documents = vec![
            doc! { "team": "b", "score": 1 },
            doc! { "team": "a", "score": 1 },
            doc! { "team": "a", "score": 5 },
        ];

        sort_documents(&mut documents, &doc! { "team": 1, "score": -1 }).unwrap();

        assert_eq!(
            documents,
            vec![
                doc! { "team": "a", "score": 5 },
                doc! { "team": "a", "score": 1 },
                doc! { "team": "b", "score": 1 },
            ]
        );
    }

    #[test]
    fn missing_sort_keys_come_first_ascending() {
        let mut documents = vec![doc! { "n": 2 }, doc! {}, doc! { "n": 1 }];

        sort_documents(&mut documents, &doc! { "n": 1 }).unwrap();

        assert_eq!(documents, vec![doc! {}, doc! { "n": 1 }, doc! { "n": 2 }]);
    }

    #[test]
    fn rejects_invalid_sort_direction() {
        let mut documents = vec![doc! { "n": 1 }];

        assert!(sort_documents(&mut documents, &doc! { "n": "up" }).is_err());
    }

    #[test]
    fn inclusion_projection_keeps_id_by_default() {
        let document = doc! { "_id": 1, "name": "ada", "age": 36, "address": { "city": "london", "zip": "n1" } };

        assert_eq!(
            project(&document, &doc! { "name": 1, "address.city": 1 }).unwrap(),
            doc! { "_id": 1, "name": "ada", "address": { "city": "london" } }
        );
        assert_eq!(
            project(&document, &doc! { "name": 1, "_id": 0 }).unwrap(),
            doc! { "name": "ada" }
        );
    }

    #[test]
    fn exclusion_projection_removes_fields() {
        let document = doc! { "_id": 1, "name": "ada", "secret": "x" };

        assert_eq!(
            project(&document, &doc! { "secret": 0 }).unwrap(),
            doc! { "_id": 1, "name": "ada" }
        );
    }

    #[test]
    fn mixed_projection_is_rejected() {
        assert!(project(&doc! { "a": 1 }, &doc! { "a": 1, "b": 0 }).is_err());
    }

    #[test]
    fn pipeline_runs_stages_in_order() {
        let documents = (1..=5).map(|n| doc! { "n": n, "even": n % 2 == 0 }).collect();

        let result = run_pipeline(
            documents,
            &[
                doc! { "$match": { "even": false } },
                doc! { "$sort": { "n": -1 } },
                doc! { "$skip": 1 },
                doc! { "$limit": 1 },
                doc! { "$project": { "n": 1 } },
            ],
        )
        .unwrap();

        assert_eq!(result, vec![doc! { "n": 3 }]);
    }

    #[test]
    fn count_stage_emits_a_single_document() {
        let documents = vec![doc! { "n": 1 }, doc! { "n": 2 }];

        assert_eq!(
            run_pipeline(documents, &[doc! { "$count": "total" }]).unwrap(),
            vec![doc! { "total": 2i64 }]
        );
        assert!(run_pipeline(Vec::new(), &[doc! { "$count": "total" }]).unwrap().is_empty());
    }

    #[test]
    fn limit_stage_must_be_positive() {
        let documents = vec![doc! { "n": 1 }, doc! { "n": 2 }];

        assert_eq!(run_pipeline(documents.clone(), &[doc! { "$limit": 1 }]).unwrap().len(), 1);
        assert!(matches!(
            run_pipeline(documents.clone(), &[doc! { "$limit": 0 }]),
            Err(RepositoryError::InvalidDocument(_))
        ));
        assert!(run_pipeline(documents, &[doc! { "$limit": -1 }]).is_err());
    }

    #[test]
    fn unknown_stages_are_rejected() {
        assert!(matches!(
            run_pipeline(vec![doc! {}], &[doc! { "$lookup": {} }]),
            Err(RepositoryError::UnsupportedOperator(_))
        ));
    }
}
