//! Index definitions.
//!
//! An [`EntityIndexDefine`] lists the indexed fields in order together with their
//! direction. It can carry its own name and uniqueness flag, which take precedence
//! over the [`IndexOptions`] passed alongside it.

use bson::{Bson, Document};
use std::collections::HashSet;

use crate::{
    error::{RepositoryError, RepositoryResult},
    options::IndexOptions,
};

/// Direction of an indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrder {
    /// Ascending order (`1`).
    Asc,
    /// Descending order (`-1`).
    Desc,
}

impl IndexOrder {
    /// Returns the numeric key value used by the store.
    pub fn value(self) -> i32 {
        match self {
            IndexOrder::Asc => 1,
            IndexOrder::Desc => -1,
        }
    }
}

impl From<IndexOrder> for Bson {
    fn from(order: IndexOrder) -> Self {
        Bson::Int32(order.value())
    }
}

/// Definition of an index to create.
///
/// # Example
///
/// ```ignore
/// use mongodbr::index::EntityIndexDefine;
///
/// let define = EntityIndexDefine::asc("email").unique();
/// let compound = EntityIndexDefine::asc("tenant").then_desc("created_at");
///
/// assert_eq!(compound.default_name(), "tenant_1_created_at_-1");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityIndexDefine {
    /// Indexed fields in key order.
    pub keys: Vec<(String, IndexOrder)>,
    /// Explicit index name.
    pub name: Option<String>,
    /// Whether the index enforces uniqueness.
    pub unique: Option<bool>,
}

impl EntityIndexDefine {
    /// Creates a definition with no keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a definition with a single ascending key.
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new().then_asc(field)
    }

    /// Creates a definition with a single descending key.
    pub fn desc(field: impl Into<String>) -> Self {
        Self::new().then_desc(field)
    }

    /// Appends an ascending key.
    pub fn then_asc(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), IndexOrder::Asc));
        self
    }

    /// Appends a descending key.
    pub fn then_desc(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), IndexOrder::Desc));
        self
    }

    /// Sets an explicit index name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Marks the index as unique.
    pub fn unique(mut self) -> Self {
        self.unique = Some(true);
        self
    }

    /// Returns the key specification, e.g. `{ "tenant": 1, "created_at": -1 }`.
    pub fn keys_document(&self) -> Document {
        self.keys
            .iter()
            .map(|(field, order)| (field.clone(), Bson::from(*order)))
            .collect()
    }

    /// Returns the name the store assigns when none is given.
    pub fn default_name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, order)| format!("{}_{}", field, order.value()))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Checks that the definition has keys and that no field repeats.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidIndex`] when the definition cannot be created.
    pub fn validate(&self) -> RepositoryResult<()> {
        if self.keys.is_empty() {
            return Err(RepositoryError::InvalidIndex(
                "index definition has no keys".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (field, _) in &self.keys {
            if field.is_empty() {
                return Err(RepositoryError::InvalidIndex(
                    "index key has an empty field name".to_string(),
                ));
            }
            if !seen.insert(field.as_str()) {
                return Err(RepositoryError::InvalidIndex(format!(
                    "field '{}' appears more than once in index",
                    field
                )));
            }
        }

        Ok(())
    }

    /// Merges the shared options with the definition's own name and uniqueness flag.
    pub fn resolve(&self, options: Option<&IndexOptions>) -> IndexOptions {
        let mut resolved = options.cloned().unwrap_or_default();

        if let Some(name) = &self.name {
            resolved.name = Some(name.clone());
        }
        if let Some(unique) = self.unique {
            resolved.unique = Some(unique);
        }

        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn keys_keep_their_order() {
        let define = EntityIndexDefine::desc("created_at").then_asc("tenant");

        assert_eq!(define.keys_document(), doc! { "created_at": -1, "tenant": 1 });
        assert_eq!(define.default_name(), "created_at_-1_tenant_1");
    }

    #[test]
    fn empty_definitions_are_invalid() {
        assert!(matches!(
            EntityIndexDefine::new().validate(),
            Err(RepositoryError::InvalidIndex(_))
        ));
    }

    #[test]
    fn repeated_fields_are_invalid() {
        let define = EntityIndexDefine::asc("email").then_desc("email");

        assert!(matches!(define.validate(), Err(RepositoryError::InvalidIndex(_))));
    }

    #[test]
    fn definition_settings_override_shared_options() {
        let shared = IndexOptions::default().name("shared").unique(false).sparse(true);
        let resolved = EntityIndexDefine::asc("email")
            .with_name("email_unique")
            .unique()
            .resolve(Some(&shared));

        assert_eq!(resolved.name.as_deref(), Some("email_unique"));
        assert_eq!(resolved.unique, Some(true));
        assert_eq!(resolved.sparse, Some(true));
    }

    #[test]
    fn resolve_without_options_uses_definition_only() {
        let resolved = EntityIndexDefine::asc("email").resolve(None);

        assert_eq!(resolved, IndexOptions::default());
    }
}
