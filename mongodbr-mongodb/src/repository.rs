use std::time::Duration;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use bson::{Document, doc, oid::ObjectId, ser::serialize_to_document};
use mongodb::{Client, Collection, IndexModel, options::ClientOptions};
use tracing::debug;

use mongodbr_core::{
    entity::ensure_object_id,
    error::{RepositoryError, RepositoryResult},
    find_result::{DocumentStream, FindResult},
    index::EntityIndexDefine,
    options::{
        AggregateOption, AggregateOptions, DeleteOptions, FindOneAndUpdateOptions, FindOneOption,
        FindOneOptions, FindOption, FindOptions, IndexOptions, InsertManyOptions, InsertOneOptions,
        ReplaceOptions, UpdateOptions,
    },
    repository::{
        DeleteResult, EntityCreate, EntityDelete, EntityFind, EntityIndex, EntityUpdate, Repository,
        RepositoryBuilder,
    },
};

use crate::options::IntoDriverOptions;


/// A [`Repository`] backed by a MongoDB collection.
///
/// Cloning is cheap and shares the driver's connection pool.
#[derive(Debug, Clone)]
pub struct MongoRepository {
    collection: Collection<Document>,
}

impl MongoRepository {
    /// Wraps an existing driver collection.
    pub fn new(collection: Collection<Document>) -> Self {
        Self { collection }
    }

    pub fn builder(uri: &str, database: &str, collection: &str) -> MongoRepositoryBuilder {
        MongoRepositoryBuilder::new(uri, database, collection)
    }

    fn index_model(define: &EntityIndexDefine, options: Option<&IndexOptions>) -> RepositoryResult<IndexModel> {
        define.validate()?;

        Ok(
            IndexModel::builder()
                .keys(define.keys_document())
                .options(define.resolve(options).into_driver())
                .build()
        )
    }
}

/// Gives every document an `_id`, returning the ids in input order.
fn assign_ids(documents: &mut [Document]) -> RepositoryResult<Vec<ObjectId>> {
    documents
        .iter_mut()
        .map(ensure_object_id)
        .collect()
}

#[async_trait]
impl EntityFind for MongoRepository {
    async fn count_by_filter(&self, filter: Document) -> RepositoryResult<u64> {
        debug!(collection = %self.collection.name(), %filter, "count_by_filter");

        self.collection
            .count_documents(filter)
            .await
            .map_err(RepositoryError::backend)
    }

    fn find_one(&self, filter: Document, options: Vec<FindOneOption>) -> FindResult {
        let collection = self.collection.clone();
        let options = FindOneOptions::from_options(options).into_driver();

        FindResult::new(async move {
            debug!(collection = %collection.name(), %filter, "find_one");

            let document = collection
                .find_one(filter)
                .with_options(options)
                .await
                .map_err(RepositoryError::backend)?;

            Ok::<DocumentStream, RepositoryError>(stream::iter(document.map(Ok)).boxed())
        })
    }

    fn find_by_filter(&self, filter: Document, options: Vec<FindOption>) -> FindResult {
        let collection = self.collection.clone();
        let options = FindOptions::from_options(options).into_driver();

        FindResult::new(async move {
            debug!(collection = %collection.name(), %filter, "find");

            let cursor = collection
                .find(filter)
                .with_options(options)
                .await
                .map_err(RepositoryError::backend)?;

            Ok::<DocumentStream, RepositoryError>(cursor.map_err(RepositoryError::backend).boxed())
        })
    }
}

#[async_trait]
impl EntityCreate for MongoRepository {
    async fn create(
        &self,
        document: Document,
        options: Option<InsertOneOptions>,
    ) -> RepositoryResult<ObjectId> {
        let mut document = document;
        let id = ensure_object_id(&mut document)?;

        self.collection
            .insert_one(document)
            .with_options(options.map(IntoDriverOptions::into_driver))
            .await
            .map_err(RepositoryError::backend)?;

        debug!(collection = %self.collection.name(), %id, "create");
        Ok(id)
    }

    async fn create_many(
        &self,
        documents: Vec<Document>,
        options: Option<InsertManyOptions>,
    ) -> RepositoryResult<Vec<ObjectId>> {
        // The driver rejects an empty batch.
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let mut documents = documents;
        let ids = assign_ids(&mut documents)?;

        self.collection
            .insert_many(documents)
            .with_options(options.map(IntoDriverOptions::into_driver))
            .await
            .map_err(RepositoryError::backend)?;

        debug!(collection = %self.collection.name(), inserted = ids.len(), "create_many");
        Ok(ids)
    }
}

#[async_trait]
impl EntityUpdate for MongoRepository {
    async fn find_one_and_update_with_id(
        &self,
        id: ObjectId,
        update: Document,
        options: Option<FindOneAndUpdateOptions>,
    ) -> RepositoryResult<()> {
        self.collection
            .find_one_and_update(doc! { "_id": id }, update)
            .with_options(options.map(IntoDriverOptions::into_driver))
            .await
            .map_err(RepositoryError::backend)?;

        debug!(collection = %self.collection.name(), %id, "find_one_and_update");
        Ok(())
    }

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: Option<UpdateOptions>,
    ) -> RepositoryResult<()> {
        let result = self.collection
            .update_one(filter, update)
            .with_options(options.map(IntoDriverOptions::into_driver))
            .await
            .map_err(RepositoryError::backend)?;

        debug!(
            collection = %self.collection.name(),
            matched = result.matched_count,
            modified = result.modified_count,
            "update_one"
        );
        Ok(())
    }

    async fn update_many(
        &self,
        filter: Document,
        update: Document,
        options: Option<UpdateOptions>,
    ) -> RepositoryResult<()> {
        let result = self.collection
            .update_many(filter, update)
            .with_options(options.map(IntoDriverOptions::into_driver))
            .await
            .map_err(RepositoryError::backend)?;

        debug!(
            collection = %self.collection.name(),
            matched = result.matched_count,
            modified = result.modified_count,
            "update_many"
        );
        Ok(())
    }
}

#[async_trait]
impl EntityDelete for MongoRepository {
    async fn delete_one_by_filter(
        &self,
        filter: Document,
        options: Option<DeleteOptions>,
    ) -> RepositoryResult<DeleteResult> {
        let result = self.collection
            .delete_one(filter)
            .with_options(options.map(IntoDriverOptions::into_driver))
            .await
            .map_err(RepositoryError::backend)?;

        debug!(collection = %self.collection.name(), deleted = result.deleted_count, "delete_one");
        Ok(DeleteResult { deleted_count: result.deleted_count })
    }

    async fn delete_many(
        &self,
        filter: Document,
        options: Option<DeleteOptions>,
    ) -> RepositoryResult<DeleteResult> {
        let result = self.collection
            .delete_many(filter)
            .with_options(options.map(IntoDriverOptions::into_driver))
            .await
            .map_err(RepositoryError::backend)?;

        debug!(collection = %self.collection.name(), deleted = result.deleted_count, "delete_many");
        Ok(DeleteResult { deleted_count: result.deleted_count })
    }
}

#[async_trait]
impl EntityIndex for MongoRepository {
    async fn create_index(
        &self,
        define: EntityIndexDefine,
        options: Option<IndexOptions>,
    ) -> RepositoryResult<String> {
        let model = Self::index_model(&define, options.as_ref())?;

        let name = self.collection
            .create_index(model)
            .await
            .map_err(RepositoryError::backend)?
            .index_name;

        debug!(collection = %self.collection.name(), index = %name, "create_index");
        Ok(name)
    }

    async fn create_indexes(
        &self,
        defines: Vec<EntityIndexDefine>,
        options: Option<IndexOptions>,
    ) -> RepositoryResult<Vec<String>> {
        let models = defines
            .iter()
            .map(|define| Self::index_model(define, options.as_ref()))
            .collect::<RepositoryResult<Vec<_>>>()?;

        let names = self.collection
            .create_indexes(models)
            .await
            .map_err(RepositoryError::backend)?
            .index_names;

        debug!(collection = %self.collection.name(), indexes = ?names, "create_indexes");
        Ok(names)
    }

    async fn delete_index(&self, name: &str) -> RepositoryResult<()> {
        self.collection
            .drop_index(name)
            .await
            .map_err(RepositoryError::backend)?;

        debug!(collection = %self.collection.name(), index = %name, "delete_index");
        Ok(())
    }

    async fn delete_all_indexes(&self) -> RepositoryResult<()> {
        self.collection
            .drop_indexes()
            .await
            .map_err(RepositoryError::backend)?;

        debug!(collection = %self.collection.name(), "delete_all_indexes");
        Ok(())
    }

    async fn list_indexes(&self) -> RepositoryResult<Vec<Document>> {
        self.collection
            .list_indexes()
            .await
            .map_err(RepositoryError::backend)?
            .map_err(RepositoryError::backend)
            .and_then(|model| async move { serialize_to_document(&model).map_err(RepositoryError::from) })
            .try_collect()
            .await
    }
}

#[async_trait]
impl Repository for MongoRepository {
    type Handle = Collection<Document>;

    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        options: Vec<AggregateOption>,
    ) -> RepositoryResult<Vec<Document>> {
        debug!(collection = %self.collection.name(), stages = pipeline.len(), "aggregate");

        self.collection
            .aggregate(pipeline)
            .with_options(AggregateOptions::from_options(options).into_driver())
            .await
            .map_err(RepositoryError::backend)?
            .map_err(RepositoryError::backend)
            .try_collect()
            .await
    }

    async fn replace(
        &self,
        filter: Document,
        replacement: Document,
        options: Option<ReplaceOptions>,
    ) -> RepositoryResult<()> {
        let result = self.collection
            .replace_one(filter, replacement)
            .with_options(options.map(IntoDriverOptions::into_driver))
            .await
            .map_err(RepositoryError::backend)?;

        debug!(
            collection = %self.collection.name(),
            matched = result.matched_count,
            modified = result.modified_count,
            "replace"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        self.collection.name()
    }

    fn collection(&self) -> &Self::Handle {
        &self.collection
    }
}

/// Connects to MongoDB and binds a [`MongoRepository`] to one collection.
///
/// # Example
///
/// ```ignore
/// use mongodbr::{mongodb::MongoRepository, repository::RepositoryBuilder};
/// use std::time::Duration;
///
/// let users = MongoRepository::builder("mongodb://localhost:27017", "app", "users")
///     .app_name("billing")
///     .max_pool_size(20)
///     .connect_timeout(Duration::from_secs(5))
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct MongoRepositoryBuilder {
    uri: String,
    database: String,
    collection: String,
    app_name: Option<String>,
    max_pool_size: Option<u32>,
    connect_timeout: Option<Duration>,
}

impl MongoRepositoryBuilder {
    pub fn new(uri: &str, database: &str, collection: &str) -> Self {
        Self {
            uri: uri.to_string(),
            database: database.to_string(),
            collection: collection.to_string(),
            app_name: None,
            max_pool_size: None,
            connect_timeout: None,
        }
    }

    /// Name reported to the server in the connection handshake.
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn max_pool_size(mut self, max_pool_size: u32) -> Self {
        self.max_pool_size = Some(max_pool_size);
        self
    }

    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = Some(connect_timeout);
        self
    }
}

#[async_trait]
impl RepositoryBuilder for MongoRepositoryBuilder {
    type Output = MongoRepository;

    /// Parses the URI and creates the client. No connection is made until the first
    /// operation.
    async fn build(self) -> RepositoryResult<Self::Output> {
        if self.database.is_empty() || self.collection.is_empty() {
            return Err(RepositoryError::Initialization(
                "database and collection names must not be empty".to_string(),
            ));
        }

        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| RepositoryError::Initialization(e.to_string()))?;

        if let Some(app_name) = self.app_name {
            options.app_name = Some(app_name);
        }
        if let Some(max_pool_size) = self.max_pool_size {
            options.max_pool_size = Some(max_pool_size);
        }
        if let Some(connect_timeout) = self.connect_timeout {
            options.connect_timeout = Some(connect_timeout);
        }

        let client = Client::with_options(options)
            .map_err(|e| RepositoryError::Initialization(e.to_string()))?;

        debug!(database = %self.database, collection = %self.collection, "created repository");
        Ok(MongoRepository::new(
            client
                .database(&self.database)
                .collection(&self.collection),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Bson, doc};

    #[test]
    fn assign_ids_keeps_input_order() {
        let existing = ObjectId::new();
        let mut documents = vec![doc! { "n": 1 }, doc! { "_id": existing }, doc! { "n": 3 }];

        let ids = assign_ids(&mut documents).unwrap();

        assert_eq!(ids.len(), 3);
        assert_eq!(ids[1], existing);
        for (id, document) in ids.iter().zip(&documents) {
            assert_eq!(document.get("_id"), Some(&Bson::ObjectId(*id)));
        }
    }

    #[test]
    fn assign_ids_rejects_foreign_ids() {
        let mut documents = vec![doc! { "_id": 42 }];

        assert!(matches!(
            assign_ids(&mut documents),
            Err(RepositoryError::InvalidDocument(_))
        ));
    }

    #[test]
    fn index_models_carry_keys_and_resolved_options() {
        let model = MongoRepository::index_model(
            &EntityIndexDefine::asc("tenant").then_desc("created_at").unique(),
            Some(&IndexOptions::default().sparse(true)),
        )
        .unwrap();

        assert_eq!(model.keys, doc! { "tenant": 1, "created_at": -1 });
        let options = model.options.unwrap();
        assert_eq!(options.unique, Some(true));
        assert_eq!(options.sparse, Some(true));
        assert_eq!(options.name, None);
    }

    #[test]
    fn empty_index_definitions_are_rejected_before_the_driver() {
        assert!(matches!(
            MongoRepository::index_model(&EntityIndexDefine::new(), None),
            Err(RepositoryError::InvalidIndex(_))
        ));
    }

    #[tokio::test]
    async fn builder_binds_the_collection_without_connecting() {
        let repository = MongoRepository::builder("mongodb://localhost:27017", "app", "users")
            .app_name("tests")
            .max_pool_size(4)
            .connect_timeout(Duration::from_millis(200))
            .build()
            .await
            .unwrap();

        assert_eq!(repository.name(), "users");
        assert_eq!(repository.collection().namespace().db, "app");
    }

    #[tokio::test]
    async fn builder_reports_invalid_uris() {
        let result = MongoRepository::builder("not-a-uri", "app", "users")
            .build()
            .await;

        assert!(matches!(result, Err(RepositoryError::Initialization(_))));
    }

    #[tokio::test]
    async fn builder_requires_names() {
        let result = MongoRepository::builder("mongodb://localhost:27017", "app", "")
            .build()
            .await;

        assert!(matches!(result, Err(RepositoryError::Initialization(_))));
    }
}
