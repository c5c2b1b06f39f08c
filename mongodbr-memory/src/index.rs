//! Index bookkeeping for in-memory collections.
//!
//! Indexes are not used to speed up queries. They exist so that index management calls
//! behave like the real store: names are generated and listed, the `_id_` index is always
//! present, and unique indexes reject duplicate keys.

use bson::{Bson, Document, doc};

use mongodbr_core::{
    error::{RepositoryError, RepositoryResult},
    index::EntityIndexDefine,
    options::IndexOptions,
};

use crate::evaluator::{Comparable, get_path};

const ID_INDEX: &str = "_id_";

#[derive(Debug, Clone)]
struct IndexSpec {
    name: String,
    keys: Document,
    fields: Vec<String>,
    options: IndexOptions,
}

impl IndexSpec {
    fn is_unique(&self) -> bool {
        self.name == ID_INDEX || self.options.unique.unwrap_or(false)
    }

    /// Returns the indexed values of `document`, or `None` when a sparse index skips it.
    fn key_of<'a>(&self, document: &'a Document) -> Option<Vec<Option<&'a Bson>>> {
        let key = self
            .fields
            .iter()
            .map(|field| get_path(document, field))
            .collect::<Vec<_>>();

        if self.options.sparse.unwrap_or(false) && key.iter().all(Option::is_none) {
            return None;
        }

        Some(key)
    }

    fn to_document(&self) -> Document {
        let mut spec = doc! { "v": 2, "key": self.keys.clone(), "name": self.name.clone() };

        if let Some(true) = self.options.unique {
            spec.insert("unique", true);
        }
        if let Some(true) = self.options.sparse {
            spec.insert("sparse", true);
        }
        if let Some(expire_after) = self.options.expire_after {
            spec.insert("expireAfterSeconds", expire_after.as_secs() as i64);
        }

        spec
    }
}

fn same_key(left: &[Option<&Bson>], right: &[Option<&Bson>]) -> bool {
    left.len() == right.len()
        && left.iter().zip(right).all(|(a, b)| {
            let a = a.map(Comparable::from).unwrap_or(Comparable::Null);
            let b = b.map(Comparable::from).unwrap_or(Comparable::Null);
            a == b
        })
}

/// The indexes of one in-memory collection.
#[derive(Debug, Clone)]
pub(crate) struct IndexCatalog {
    indexes: Vec<IndexSpec>,
}

impl Default for IndexCatalog {
    fn default() -> Self {
        Self {
            indexes: vec![IndexSpec {
                name: ID_INDEX.to_string(),
                keys: doc! { "_id": 1 },
                fields: vec!["_id".to_string()],
                options: IndexOptions::default(),
            }],
        }
    }
}

impl IndexCatalog {
    /// Registers an index, checking existing documents against it when it is unique.
    ///
    /// Creating an index that already exists with the same keys is a no-op.
    pub fn create(
        &mut self,
        define: &EntityIndexDefine,
        options: Option<&IndexOptions>,
        documents: &[Document],
    ) -> RepositoryResult<String> {
        define.validate()?;

        let options = define.resolve(options);
        let keys = define.keys_document();
        let name = options.name.clone().unwrap_or_else(|| define.default_name());

        if let Some(existing) = self.indexes.iter().find(|index| index.name == name) {
            if existing.keys == keys {
                return Ok(name);
            }
            return Err(RepositoryError::InvalidIndex(format!(
                "an index named '{}' already exists with different keys",
                name
            )));
        }
        if self.indexes.iter().any(|index| index.keys == keys) {
            return Err(RepositoryError::InvalidIndex(format!(
                "an index with keys {} already exists",
                keys
            )));
        }

        let spec = IndexSpec {
            name: name.clone(),
            keys,
            fields: define.keys.iter().map(|(field, _)| field.clone()).collect(),
            options,
        };

        if spec.is_unique() {
            let mut seen: Vec<Vec<Option<&Bson>>> = Vec::new();
            for document in documents {
                if let Some(key) = spec.key_of(document) {
                    if seen.iter().any(|other| same_key(other, &key)) {
                        return Err(RepositoryError::DuplicateKey(format!(
                            "cannot build unique index '{}': duplicate key",
                            name
                        )));
                    }
                    seen.push(key);
                }
            }
        }

        self.indexes.push(spec);
        Ok(name)
    }

    /// Drops an index by name. The `_id_` index cannot be dropped.
    pub fn drop(&mut self, name: &str) -> RepositoryResult<()> {
        if name == ID_INDEX {
            return Err(RepositoryError::InvalidIndex(
                "cannot drop the _id_ index".to_string(),
            ));
        }

        let before = self.indexes.len();
        self.indexes.retain(|index| index.name != name);

        if self.indexes.len() == before {
            return Err(RepositoryError::IndexNotFound(name.to_string()));
        }

        Ok(())
    }

    /// Drops every index except `_id_`.
    pub fn drop_all(&mut self) {
        self.indexes.retain(|index| index.name == ID_INDEX);
    }

    pub fn list(&self) -> Vec<Document> {
        self.indexes.iter().map(IndexSpec::to_document).collect()
    }

    /// Verifies that `candidate` would not duplicate a unique key held by `documents`.
    ///
    /// The document at position `skip` is ignored, so an updated document is not compared
    /// with its previous version.
    pub fn check_unique(
        &self,
        documents: &[Document],
        candidate: &Document,
        skip: Option<usize>,
    ) -> RepositoryResult<()> {
        for index in self.indexes.iter().filter(|index| index.is_unique()) {
            let Some(key) = index.key_of(candidate) else {
                continue;
            };

            let duplicate = documents
                .iter()
                .enumerate()
                .filter(|(position, _)| Some(*position) != skip)
                .filter_map(|(_, document)| index.key_of(document))
                .any(|other| same_key(&other, &key));

            if duplicate {
                return Err(RepositoryError::DuplicateKey(format!(
                    "duplicate key for index '{}'",
                    index.name
                )));
            }
        }

        Ok(())
    }
}
