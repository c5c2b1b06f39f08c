//! The repository contract.
//!
//! A repository binds one named collection and exposes find, create, update, delete,
//! index, aggregate, and replace operations over it. The contract is split into
//! capability traits that [`Repository`] combines:
//!
//! - [`EntityFind`]: counting and lazy finds returning [`FindResult`]
//! - [`EntityCreate`]: single and bulk inserts returning assigned ids
//! - [`EntityUpdate`]: update by filter, by id, or from an entity
//! - [`EntityDelete`]: delete by id or filter, reporting the deleted count
//! - [`EntityIndex`]: index provisioning, including the fail-fast `must_*` variants
//!
//! Implementations forward each call to their store. Store errors are returned in
//! [`RepositoryError::Backend`](crate::error::RepositoryError::Backend) without retries.
//!
//! # Example
//!
//! ```ignore
//! use mongodbr::prelude::*;
//! use bson::doc;
//!
//! async fn top_players(repository: &impl Repository) -> RepositoryResult<Vec<Player>> {
//!     repository
//!         .find_by_filter(
//!             doc! { "active": true },
//!             vec![FindOption::with_sort(doc! { "score": -1 }), FindOption::with_limit(10)],
//!         )
//!         .all()
//!         .await
//! }
//! ```

use async_trait::async_trait;
use bson::{Document, de::deserialize_from_document, doc, oid::ObjectId, ser::serialize_to_document};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;
use tracing::error;

use crate::{
    entity::AnyEntity,
    error::{RepositoryError, RepositoryResult},
    find_result::FindResult,
    index::EntityIndexDefine,
    options::{
        AggregateOption, DeleteOptions, FindOneAndUpdateOptions, FindOneOption, FindOption,
        IndexOptions, InsertManyOptions, InsertOneOptions, ReplaceOptions, UpdateOptions,
    },
};

/// Outcome of a delete call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    /// Number of documents removed.
    pub deleted_count: u64,
}

/// Read operations.
#[async_trait]
pub trait EntityFind: Send + Sync {
    /// Counts the documents matching `filter`.
    async fn count_by_filter(&self, filter: Document) -> RepositoryResult<u64>;

    /// Finds every document in the collection.
    fn find_all(&self, options: Vec<FindOption>) -> FindResult {
        self.find_by_filter(doc! {}, options)
    }

    /// Finds the document with the given id. Decoding yields at most one entity.
    fn find_by_object_id(&self, id: ObjectId) -> FindResult {
        self.find_one(doc! { "_id": id }, Vec::new())
    }

    /// Finds the first document matching `filter`.
    fn find_one(&self, filter: Document, options: Vec<FindOneOption>) -> FindResult;

    /// Finds every document matching `filter`.
    fn find_by_filter(&self, filter: Document, options: Vec<FindOption>) -> FindResult;
}

/// Insert operations.
#[async_trait]
pub trait EntityCreate: Send + Sync {
    /// Inserts one document and returns its id.
    ///
    /// A document without `_id` is given a fresh [`ObjectId`].
    async fn create(
        &self,
        document: Document,
        options: Option<InsertOneOptions>,
    ) -> RepositoryResult<ObjectId>;

    /// Inserts many documents and returns their ids in input order.
    ///
    /// Whether a failure leaves earlier documents in place follows the store's bulk insert
    /// semantics and [`InsertManyOptions::ordered`].
    async fn create_many(
        &self,
        documents: Vec<Document>,
        options: Option<InsertManyOptions>,
    ) -> RepositoryResult<Vec<ObjectId>>;
}

/// Update operations. Matching nothing is not an error.
#[async_trait]
pub trait EntityUpdate: Send + Sync {
    /// Sets every field of `entity` on the stored document with the same id.
    async fn find_one_and_update(
        &self,
        entity: &dyn AnyEntity,
        options: Option<FindOneAndUpdateOptions>,
    ) -> RepositoryResult<()> {
        let mut fields = entity.to_any_document()?;
        fields.remove("_id");

        self.find_one_and_update_with_id(entity.entity_id(), doc! { "$set": fields }, options)
            .await
    }

    /// Applies `update` to the document with the given id.
    async fn find_one_and_update_with_id(
        &self,
        id: ObjectId,
        update: Document,
        options: Option<FindOneAndUpdateOptions>,
    ) -> RepositoryResult<()>;

    /// Applies `update` to the first document matching `filter`.
    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: Option<UpdateOptions>,
    ) -> RepositoryResult<()>;

    /// Applies `update` to every document matching `filter`.
    async fn update_many(
        &self,
        filter: Document,
        update: Document,
        options: Option<UpdateOptions>,
    ) -> RepositoryResult<()>;
}

/// Delete operations.
#[async_trait]
pub trait EntityDelete: Send + Sync {
    /// Deletes the document with the given id.
    async fn delete_one(
        &self,
        id: ObjectId,
        options: Option<DeleteOptions>,
    ) -> RepositoryResult<DeleteResult> {
        self.delete_one_by_filter(doc! { "_id": id }, options)
            .await
    }

    /// Deletes the first document matching `filter`.
    async fn delete_one_by_filter(
        &self,
        filter: Document,
        options: Option<DeleteOptions>,
    ) -> RepositoryResult<DeleteResult>;

    /// Deletes every document matching `filter`.
    async fn delete_many(
        &self,
        filter: Document,
        options: Option<DeleteOptions>,
    ) -> RepositoryResult<DeleteResult>;
}

/// Index management.
#[async_trait]
pub trait EntityIndex: Send + Sync {
    /// Creates an index and returns its name.
    async fn create_index(
        &self,
        define: EntityIndexDefine,
        options: Option<IndexOptions>,
    ) -> RepositoryResult<String>;

    /// Creates several indexes and returns their names in input order.
    async fn create_indexes(
        &self,
        defines: Vec<EntityIndexDefine>,
        options: Option<IndexOptions>,
    ) -> RepositoryResult<Vec<String>>;

    /// Creates an index the application cannot run without.
    ///
    /// Meant for startup-time provisioning only.
    ///
    /// # Panics
    ///
    /// Panics if the index cannot be created.
    async fn must_create_index(
        &self,
        define: EntityIndexDefine,
        options: Option<IndexOptions>,
    ) -> String {
        let keys = define.keys_document();

        match self.create_index(define, options).await {
            Ok(name) => name,
            Err(err) => {
                error!(%keys, error = %err, "failed to create required index");
                panic!("failed to create required index {keys}: {err}");
            }
        }
    }

    /// Creates several indexes the application cannot run without.
    ///
    /// # Panics
    ///
    /// Panics if any index cannot be created.
    async fn must_create_indexes(
        &self,
        defines: Vec<EntityIndexDefine>,
        options: Option<IndexOptions>,
    ) -> Vec<String> {
        match self.create_indexes(defines, options).await {
            Ok(names) => names,
            Err(err) => {
                error!(error = %err, "failed to create required indexes");
                panic!("failed to create required indexes: {err}");
            }
        }
    }

    /// Drops the index with the given name.
    async fn delete_index(&self, name: &str) -> RepositoryResult<()>;

    /// Drops every index except the one on `_id`.
    async fn delete_all_indexes(&self) -> RepositoryResult<()>;

    /// Lists the collection's index specifications.
    async fn list_indexes(&self) -> RepositoryResult<Vec<Document>>;
}

/// A repository over one named collection.
#[async_trait]
pub trait Repository:
    EntityFind + EntityCreate + EntityUpdate + EntityDelete + EntityIndex + Debug
{
    /// The store's own collection handle.
    type Handle: Send + Sync;

    /// Runs an aggregation pipeline and returns the resulting documents.
    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        options: Vec<AggregateOption>,
    ) -> RepositoryResult<Vec<Document>>;

    /// Replaces the document with the given id.
    async fn replace_by_id(
        &self,
        id: ObjectId,
        replacement: Document,
        options: Option<ReplaceOptions>,
    ) -> RepositoryResult<()> {
        self.replace(doc! { "_id": id }, replacement, options)
            .await
    }

    /// Replaces the first document matching `filter`.
    async fn replace(
        &self,
        filter: Document,
        replacement: Document,
        options: Option<ReplaceOptions>,
    ) -> RepositoryResult<()>;

    /// Returns the collection name.
    fn name(&self) -> &str;

    /// Returns the underlying collection handle, for operations the contract does not cover.
    fn collection(&self) -> &Self::Handle;
}

/// Typed conveniences over [`Repository`].
///
/// Automatically implemented for every repository.
#[async_trait]
pub trait RepositoryExt: Repository {
    /// Serializes `value` and inserts it.
    async fn create_entity<T>(
        &self,
        value: &T,
        options: Option<InsertOneOptions>,
    ) -> RepositoryResult<ObjectId>
    where
        T: Serialize + Sync;

    /// Serializes every value and inserts them, returning ids in input order.
    async fn create_many_entities<T>(
        &self,
        values: &[T],
        options: Option<InsertManyOptions>,
    ) -> RepositoryResult<Vec<ObjectId>>
    where
        T: Serialize + Sync;

    /// Runs an aggregation pipeline and decodes every result as `T`.
    async fn aggregate_as<T>(
        &self,
        pipeline: Vec<Document>,
        options: Vec<AggregateOption>,
    ) -> RepositoryResult<Vec<T>>
    where
        T: DeserializeOwned + Send;

    /// Replaces the stored document that has the entity's id.
    async fn replace_entity(
        &self,
        entity: &dyn AnyEntity,
        options: Option<ReplaceOptions>,
    ) -> RepositoryResult<()>;
}

#[async_trait]
impl<R: Repository> RepositoryExt for R {
    async fn create_entity<T>(
        &self,
        value: &T,
        options: Option<InsertOneOptions>,
    ) -> RepositoryResult<ObjectId>
    where
        T: Serialize + Sync,
    {
        self.create(serialize_to_document(value)?, options)
            .await
    }

    async fn create_many_entities<T>(
        &self,
        values: &[T],
        options: Option<InsertManyOptions>,
    ) -> RepositoryResult<Vec<ObjectId>>
    where
        T: Serialize + Sync,
    {
        let documents = values
            .iter()
            .map(|value| serialize_to_document(value).map_err(RepositoryError::from))
            .collect::<RepositoryResult<Vec<Document>>>()?;

        self.create_many(documents, options)
            .await
    }

    async fn aggregate_as<T>(
        &self,
        pipeline: Vec<Document>,
        options: Vec<AggregateOption>,
    ) -> RepositoryResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.aggregate(pipeline, options)
            .await?
            .into_iter()
            .map(|document| deserialize_from_document(document).map_err(RepositoryError::from))
            .collect()
    }

    async fn replace_entity(
        &self,
        entity: &dyn AnyEntity,
        options: Option<ReplaceOptions>,
    ) -> RepositoryResult<()> {
        self.replace_by_id(entity.entity_id(), entity.to_any_document()?, options)
            .await
    }
}

/// Factory for repositories that need asynchronous setup.
#[async_trait]
pub trait RepositoryBuilder {
    type Output: Repository;

    async fn build(self) -> RepositoryResult<Self::Output>;
}
