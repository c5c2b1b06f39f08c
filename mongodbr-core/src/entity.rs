//! Core traits for entities persisted through a repository.
//!
//! An entity is any serde-serializable type identified by a 12-byte [`ObjectId`].
//! [`AnyEntity`] is the object-safe form used where a repository accepts "some entity"
//! without knowing its concrete type.

use bson::{Bson, Document, oid::ObjectId, de::deserialize_from_document, ser::serialize_to_document};
use serde::{Deserialize, Serialize};
use std::any::Any;

use crate::error::{RepositoryError, RepositoryResult};

/// Core trait that all typed entities must implement.
///
/// The identifier is expected to be serialized as the document's `_id` field,
/// usually via `#[serde(rename = "_id")]`.
///
/// # Example
///
/// ```ignore
/// use mongodbr::{Entity, bson::oid::ObjectId};
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
/// pub struct User {
///     #[serde(rename = "_id")]
///     pub id: ObjectId,
///     pub name: String,
/// }
/// ```
pub trait Entity: Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static {
    /// Returns this entity's identifier.
    fn object_id(&self) -> ObjectId;
}

/// Extension trait providing BSON conversion for entities.
///
/// Implemented automatically for every [`Entity`].
pub trait EntityExt: Entity {
    /// Converts this entity into a BSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the entity does not serialize to a document.
    fn to_document(&self) -> RepositoryResult<Document>;

    /// Creates an entity from a BSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    fn from_document(document: Document) -> RepositoryResult<Self>
    where
        Self: Sized;
}

impl<E: Entity> EntityExt for E {
    fn to_document(&self) -> RepositoryResult<Document> {
        Ok(serialize_to_document(self)?)
    }

    fn from_document(document: Document) -> RepositoryResult<Self> {
        Ok(deserialize_from_document(document)?)
    }
}

/// Type-erased entity.
///
/// Lets repository traits accept entities of any type while staying object-safe.
pub trait AnyEntity: Send + Sync {
    /// Returns the entity's identifier.
    fn entity_id(&self) -> ObjectId;

    /// Converts the entity into a BSON document.
    fn to_any_document(&self) -> RepositoryResult<Document>;

    /// Returns a reference to the entity as a generic `Any` type.
    fn as_any(&self) -> &dyn Any;
}

impl dyn AnyEntity {
    /// Attempts to downcast a reference to a specific entity type.
    pub fn downcast_ref<E: Entity>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }
}

impl<E: Entity> AnyEntity for E {
    fn entity_id(&self) -> ObjectId {
        self.object_id()
    }

    fn to_any_document(&self) -> RepositoryResult<Document> {
        EntityExt::to_document(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Returns the document's `_id`, assigning a fresh [`ObjectId`] first when it has none.
///
/// # Errors
///
/// Returns [`RepositoryError::InvalidDocument`] when `_id` is present but is not an `ObjectId`.
pub fn ensure_object_id(document: &mut Document) -> RepositoryResult<ObjectId> {
    match document.get("_id") {
        Some(Bson::ObjectId(id)) => Ok(*id),
        Some(other) => Err(RepositoryError::InvalidDocument(format!(
            "expected _id to be an ObjectId, found {:?}",
            other.element_type()
        ))),
        None => {
            let id = ObjectId::new();
            document.insert("_id", id);
            Ok(id)
        }
    }
}
