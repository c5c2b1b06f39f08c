//! In-memory repository implementation.
//!
//! Documents live in insertion order inside an async-aware read-write lock, so clones
//! of a repository share the same collection.

use std::sync::Arc;
use async_trait::async_trait;
use bson::{Document, doc, oid::ObjectId};
use futures::stream::{self, StreamExt};
use mea::rwlock::RwLock;
use tracing::debug;

use mongodbr_core::{
    entity::ensure_object_id,
    error::{RepositoryError, RepositoryResult},
    find_result::{DocumentStream, FindResult},
    index::EntityIndexDefine,
    options::{
        AggregateOption, DeleteOptions, FindOneAndUpdateOptions, FindOneOption,
        FindOneOptions, FindOption, FindOptions, IndexOptions, InsertManyOptions, InsertOneOptions,
        ReplaceOptions, UpdateOptions,
    },
    repository::{
        DeleteResult, EntityCreate, EntityDelete, EntityFind, EntityIndex, EntityUpdate, Repository,
        RepositoryBuilder,
    },
};

use crate::{
    evaluator::FilterEvaluator,
    index::IndexCatalog,
    modifier::{apply_replacement, apply_update, upsert_seed},
    pipeline::{SortSpec, project, run_pipeline, sort_documents},
};

#[derive(Debug, Default)]
struct CollectionState {
    documents: Vec<Document>,
    indexes: IndexCatalog,
}

impl CollectionState {
    /// Positions of the documents matching `filter`, in insertion order.
    fn positions(&self, filter: &Document) -> RepositoryResult<Vec<usize>> {
        let mut positions = Vec::new();

        for (position, document) in self.documents.iter().enumerate() {
            if FilterEvaluator::new(document).matches(filter)? {
                positions.push(position);
            }
        }

        Ok(positions)
    }

    /// Position of the first match, honoring `sort` when given.
    fn first_position(&self, filter: &Document, sort: Option<&Document>) -> RepositoryResult<Option<usize>> {
        let positions = self.positions(filter)?;

        let Some(sort) = sort else {
            return Ok(positions.first().copied());
        };

        let spec = SortSpec::parse(sort)?;
        Ok(positions
            .into_iter()
            .min_by(|a, b| spec.compare(&self.documents[*a], &self.documents[*b])))
    }

    fn select(
        &self,
        filter: &Document,
        sort: Option<&Document>,
        skip: Option<u64>,
        limit: Option<usize>,
        projection: Option<&Document>,
    ) -> RepositoryResult<Vec<Document>> {
        let mut documents = FilterEvaluator::filter_documents(&self.documents, filter)?;

        if let Some(sort) = sort {
            sort_documents(&mut documents, sort)?;
        }

        documents
            .into_iter()
            .skip(skip.map_or(0, |skip| usize::try_from(skip).unwrap_or(usize::MAX)))
            .take(limit.unwrap_or(usize::MAX))
            .map(|document| match projection {
                Some(projection) => project(&document, projection),
                None => Ok(document),
            })
            .collect()
    }

    fn insert(&mut self, mut document: Document) -> RepositoryResult<ObjectId> {
        let id = ensure_object_id(&mut document)?;
        self.indexes.check_unique(&self.documents, &document, None)?;
        self.documents.push(document);

        Ok(id)
    }

    fn write_at(&mut self, position: usize, document: Document) -> RepositoryResult<()> {
        self.indexes.check_unique(&self.documents, &document, Some(position))?;
        self.documents[position] = document;

        Ok(())
    }

    /// Applies `update` to the given positions, or upserts when none matched.
    ///
    /// Returns the number of documents written.
    fn update_positions(
        &mut self,
        positions: Vec<usize>,
        filter: &Document,
        update: &Document,
        upsert: bool,
    ) -> RepositoryResult<usize> {
        if positions.is_empty() {
            if !upsert {
                return Ok(0);
            }

            let mut seed = upsert_seed(filter);
            apply_update(&mut seed, update, true)?;
            self.insert(seed)?;
            return Ok(1);
        }

        let written = positions.len();
        for position in positions {
            let mut document = self.documents[position].clone();
            apply_update(&mut document, update, false)?;
            self.write_at(position, document)?;
        }

        Ok(written)
    }
}

/// Handle to the documents of an [`InMemoryRepository`].
///
/// Returned by [`Repository::collection`] for inspection outside the contract.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCollection {
    state: Arc<RwLock<CollectionState>>,
}

impl InMemoryCollection {
    /// Returns a snapshot of every stored document in insertion order.
    pub async fn documents(&self) -> Vec<Document> {
        self.state
            .read()
            .await
            .documents
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// A [`Repository`] that keeps one collection in process memory.
///
/// Filters, updates, sorting, projection, aggregation and indexes cover the commonly
/// used subset of the store's behavior; anything outside it fails with
/// [`RepositoryError::UnsupportedOperator`]. Clones share the same documents.
///
/// # Example
///
/// ```ignore
/// use mongodbr::{memory::InMemoryRepository, prelude::*};
/// use bson::doc;
///
/// let repository = InMemoryRepository::new("users");
/// let id = repository.create(doc! { "name": "ada" }, None).await?;
/// let count = repository.count_by_filter(doc! { "name": "ada" }).await?;
/// assert_eq!(count, 1);
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryRepository {
    name: String,
    collection: InMemoryCollection,
}

impl InMemoryRepository {
    /// Creates an empty repository for the named collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: InMemoryCollection::default(),
        }
    }

    pub fn builder(name: impl Into<String>) -> InMemoryRepositoryBuilder {
        InMemoryRepositoryBuilder {
            name: name.into(),
            documents: Vec::new(),
            indexes: Vec::new(),
        }
    }

    fn find_result(&self, filter: Document, options: FindOptions) -> FindResult {
        let collection = self.collection.clone();
        let name = self.name.clone();

        // A limit of zero means no limit; a negative one is taken by absolute value.
        let limit = options
            .limit
            .filter(|limit| *limit != 0)
            .map(|limit| usize::try_from(limit.unsigned_abs()).unwrap_or(usize::MAX));

        FindResult::new(async move {
            let documents = collection.state.read().await.select(
                &filter,
                options.sort.as_ref(),
                options.skip,
                limit,
                options.projection.as_ref(),
            )?;

            debug!(collection = %name, %filter, returned = documents.len(), "find");
            Ok::<DocumentStream, RepositoryError>(stream::iter(documents.into_iter().map(Ok)).boxed())
        })
    }
}

#[async_trait]
impl EntityFind for InMemoryRepository {
    async fn count_by_filter(&self, filter: Document) -> RepositoryResult<u64> {
        let count = self.collection.state.read().await.positions(&filter)?.len() as u64;

        debug!(collection = %self.name, %filter, count, "count_by_filter");
        Ok(count)
    }

    fn find_one(&self, filter: Document, options: Vec<FindOneOption>) -> FindResult {
        let FindOneOptions { skip, sort, projection } = FindOneOptions::from_options(options);

        self.find_result(filter, FindOptions { skip, limit: Some(1), sort, projection })
    }

    fn find_by_filter(&self, filter: Document, options: Vec<FindOption>) -> FindResult {
        self.find_result(filter, FindOptions::from_options(options))
    }
}

#[async_trait]
impl EntityCreate for InMemoryRepository {
    async fn create(
        &self,
        document: Document,
        _options: Option<InsertOneOptions>,
    ) -> RepositoryResult<ObjectId> {
        let id = self.collection.state.write().await.insert(document)?;

        debug!(collection = %self.name, %id, "create");
        Ok(id)
    }

    async fn create_many(
        &self,
        documents: Vec<Document>,
        options: Option<InsertManyOptions>,
    ) -> RepositoryResult<Vec<ObjectId>> {
        let ordered = options
            .and_then(|options| options.ordered)
            .unwrap_or(true);

        let mut documents = documents;
        let ids = documents
            .iter_mut()
            .map(ensure_object_id)
            .collect::<RepositoryResult<Vec<_>>>()?;

        let mut state = self.collection.state.write().await;
        let mut first_error = None;

        for document in documents {
            if let Err(err) = state.insert(document) {
                if ordered {
                    return Err(err);
                }
                first_error.get_or_insert(err);
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        debug!(collection = %self.name, inserted = ids.len(), "create_many");
        Ok(ids)
    }
}

#[async_trait]
impl EntityUpdate for InMemoryRepository {
    async fn find_one_and_update_with_id(
        &self,
        id: ObjectId,
        update: Document,
        options: Option<FindOneAndUpdateOptions>,
    ) -> RepositoryResult<()> {
        let options = options.unwrap_or_default();
        let filter = doc! { "_id": id };

        let mut state = self.collection.state.write().await;
        let position = state.first_position(&filter, options.sort.as_ref())?;
        let written = state.update_positions(
            position.into_iter().collect(),
            &filter,
            &update,
            options.upsert.unwrap_or(false),
        )?;

        debug!(collection = %self.name, %id, written, "find_one_and_update");
        Ok(())
    }

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: Option<UpdateOptions>,
    ) -> RepositoryResult<()> {
        let upsert = options.and_then(|options| options.upsert).unwrap_or(false);

        let mut state = self.collection.state.write().await;
        let position = state.first_position(&filter, None)?;
        let written = state.update_positions(position.into_iter().collect(), &filter, &update, upsert)?;

        debug!(collection = %self.name, %filter, written, "update_one");
        Ok(())
    }

    async fn update_many(
        &self,
        filter: Document,
        update: Document,
        options: Option<UpdateOptions>,
    ) -> RepositoryResult<()> {
        let upsert = options.and_then(|options| options.upsert).unwrap_or(false);

        let mut state = self.collection.state.write().await;
        let positions = state.positions(&filter)?;
        let written = state.update_positions(positions, &filter, &update, upsert)?;

        debug!(collection = %self.name, %filter, written, "update_many");
        Ok(())
    }
}

#[async_trait]
impl EntityDelete for InMemoryRepository {
    async fn delete_one_by_filter(
        &self,
        filter: Document,
        _options: Option<DeleteOptions>,
    ) -> RepositoryResult<DeleteResult> {
        let mut state = self.collection.state.write().await;

        let deleted_count = match state.first_position(&filter, None)? {
            Some(position) => {
                state.documents.remove(position);
                1
            }
            None => 0,
        };

        debug!(collection = %self.name, %filter, deleted_count, "delete_one");
        Ok(DeleteResult { deleted_count })
    }

    async fn delete_many(
        &self,
        filter: Document,
        _options: Option<DeleteOptions>,
    ) -> RepositoryResult<DeleteResult> {
        let mut state = self.collection.state.write().await;
        let positions = state.positions(&filter)?;

        // Remove from the back so earlier positions stay valid.
        for position in positions.iter().rev() {
            state.documents.remove(*position);
        }

        let deleted_count = positions.len() as u64;
        debug!(collection = %self.name, %filter, deleted_count, "delete_many");
        Ok(DeleteResult { deleted_count })
    }
}

#[async_trait]
impl EntityIndex for InMemoryRepository {
    async fn create_index(
        &self,
        define: EntityIndexDefine,
        options: Option<IndexOptions>,
    ) -> RepositoryResult<String> {
        let mut state = self.collection.state.write().await;
        let state = &mut *state;
        let name = state.indexes.create(&define, options.as_ref(), &state.documents)?;

        debug!(collection = %self.name, index = %name, "create_index");
        Ok(name)
    }

    async fn create_indexes(
        &self,
        defines: Vec<EntityIndexDefine>,
        options: Option<IndexOptions>,
    ) -> RepositoryResult<Vec<String>> {
        for define in &defines {
            define.validate()?;
        }

        let mut state = self.collection.state.write().await;
        let state = &mut *state;
        let mut names = Vec::with_capacity(defines.len());
        for define in &defines {
            names.push(state.indexes.create(define, options.as_ref(), &state.documents)?);
        }

        debug!(collection = %self.name, indexes = ?names, "create_indexes");
        Ok(names)
    }

    async fn delete_index(&self, name: &str) -> RepositoryResult<()> {
        self.collection.state.write().await.indexes.drop(name)?;

        debug!(collection = %self.name, index = %name, "delete_index");
        Ok(())
    }

    async fn delete_all_indexes(&self) -> RepositoryResult<()> {
        self.collection.state.write().await.indexes.drop_all();

        debug!(collection = %self.name, "delete_all_indexes");
        Ok(())
    }

    async fn list_indexes(&self) -> RepositoryResult<Vec<Document>> {
        Ok(self.collection.state.read().await.indexes.list())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    type Handle = InMemoryCollection;

    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        _options: Vec<AggregateOption>,
    ) -> RepositoryResult<Vec<Document>> {
        let documents = self.collection.documents().await;
        let results = run_pipeline(documents, &pipeline)?;

        debug!(collection = %self.name, stages = pipeline.len(), returned = results.len(), "aggregate");
        Ok(results)
    }

    async fn replace(
        &self,
        filter: Document,
        replacement: Document,
        options: Option<ReplaceOptions>,
    ) -> RepositoryResult<()> {
        let upsert = options.and_then(|options| options.upsert).unwrap_or(false);
        let mut state = self.collection.state.write().await;

        match state.first_position(&filter, None)? {
            Some(position) => {
                let mut document = state.documents[position].clone();
                apply_replacement(&mut document, &replacement)?;
                state.write_at(position, document)?;
            }
            None if upsert => {
                let mut document = replacement;
                if !document.contains_key("_id") {
                    if let Some(id) = upsert_seed(&filter).get("_id") {
                        document.insert("_id", id.clone());
                    }
                }
                state.insert(document)?;
            }
            None => {}
        }

        debug!(collection = %self.name, %filter, "replace");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self) -> &Self::Handle {
        &self.collection
    }
}

/// Builds an [`InMemoryRepository`], optionally seeded with documents and indexes.
///
/// # Example
///
/// ```ignore
/// use mongodbr::{memory::InMemoryRepository, prelude::*};
///
/// let repository = InMemoryRepository::builder("users")
///     .with_index(EntityIndexDefine::asc("email").unique())
///     .build()
///     .await?;
/// ```
#[derive(Debug)]
pub struct InMemoryRepositoryBuilder {
    name: String,
    documents: Vec<Document>,
    indexes: Vec<EntityIndexDefine>,
}

impl InMemoryRepositoryBuilder {
    /// Seeds the collection with documents, inserted in order.
    pub fn with_documents(mut self, documents: impl IntoIterator<Item = Document>) -> Self {
        self.documents.extend(documents);
        self
    }

    /// Creates an index before the repository is handed out.
    pub fn with_index(mut self, define: EntityIndexDefine) -> Self {
        self.indexes.push(define);
        self
    }
}

#[async_trait]
impl RepositoryBuilder for InMemoryRepositoryBuilder {
    type Output = InMemoryRepository;

    async fn build(self) -> RepositoryResult<Self::Output> {
        let repository = InMemoryRepository::new(self.name);

        if !self.documents.is_empty() {
            repository.create_many(self.documents, None).await?;
        }
        if !self.indexes.is_empty() {
            repository.create_indexes(self.indexes, None).await?;
        }

        Ok(repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn find_applies_sort_skip_limit_and_projection() {
        let repository = InMemoryRepository::builder("scores")
            .with_documents((1..=5).map(|n| doc! { "n": n, "label": format!("item-{n}") }))
            .build()
            .await
            .unwrap();

        let documents = repository
            .find_by_filter(
                doc! { "n": { "$gte": 2 } },
                vec![
                    FindOption::with_sort(doc! { "n": -1 }),
                    FindOption::with_skip(1),
                    FindOption::with_limit(2),
                    FindOption::with_projection(doc! { "n": 1, "_id": 0 }),
                ],
            )
            .documents()
            .await
            .unwrap();

        assert_eq!(documents, vec![doc! { "n": 4 }, doc! { "n": 3 }]);
    }

    #[tokio::test]
    async fn zero_and_negative_limits() {
        let repository = InMemoryRepository::builder("scores")
            .with_documents((1..=3).map(|n| doc! { "n": n }))
            .build()
            .await
            .unwrap();

        let unlimited = repository.find_all(vec![FindOption::with_limit(0)]).documents().await.unwrap();
        let negative = repository.find_all(vec![FindOption::with_limit(-2)]).documents().await.unwrap();

        assert_eq!(unlimited.len(), 3);
        assert_eq!(negative.len(), 2);
    }

    #[tokio::test]
    async fn skipping_past_the_end_yields_nothing() {
        let repository = InMemoryRepository::builder("scores")
            .with_documents((1..=3).map(|n| doc! { "n": n }))
            .build()
            .await
            .unwrap();

        let documents = repository
            .find_all(vec![FindOption::with_skip(u64::MAX)])
            .documents()
            .await
            .unwrap();

        assert!(documents.is_empty());
    }

    #[tokio::test]
    async fn find_one_honors_sort() {
        let repository = InMemoryRepository::builder("scores")
            .with_documents([doc! { "n": 1 }, doc! { "n": 9 }, doc! { "n": 5 }])
            .build()
            .await
            .unwrap();

        let top = repository
            .find_one(doc! {}, vec![FindOneOption::with_sort(doc! { "n": -1 })])
            .documents()
            .await
            .unwrap();

        assert_eq!(top.len(), 1);
        assert_eq!(top[0].get_i32("n").unwrap(), 9);
    }

    #[tokio::test]
    async fn unordered_create_many_keeps_going_after_a_duplicate() {
        let repository = InMemoryRepository::new("users");
        repository
            .create_index(EntityIndexDefine::asc("email").unique(), None)
            .await
            .unwrap();

        let result = repository
            .create_many(
                vec![doc! { "email": "a" }, doc! { "email": "a" }, doc! { "email": "b" }],
                Some(InsertManyOptions::default().ordered(false)),
            )
            .await;

        assert!(matches!(result, Err(RepositoryError::DuplicateKey(_))));
        assert_eq!(repository.collection().len().await, 2);
    }

    #[tokio::test]
    async fn ordered_create_many_stops_at_the_first_duplicate() {
        let repository = InMemoryRepository::new("users");
        repository
            .create_index(EntityIndexDefine::asc("email").unique(), None)
            .await
            .unwrap();

        let result = repository
            .create_many(
                vec![doc! { "email": "a" }, doc! { "email": "a" }, doc! { "email": "b" }],
                None,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(repository.collection().len().await, 1);
    }

    #[tokio::test]
    async fn update_one_upserts_from_the_filter() {
        let repository = InMemoryRepository::new("counters");

        repository
            .update_one(
                doc! { "key": "visits" },
                doc! { "$inc": { "value": 1 }, "$setOnInsert": { "created": true } },
                Some(UpdateOptions::default().upsert(true)),
            )
            .await
            .unwrap();
        repository
            .update_one(
                doc! { "key": "visits" },
                doc! { "$inc": { "value": 1 }, "$setOnInsert": { "created": false } },
                Some(UpdateOptions::default().upsert(true)),
            )
            .await
            .unwrap();

        let documents = repository.collection().documents().await;
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].get_i32("value").unwrap(), 2);
        assert!(documents[0].get_bool("created").unwrap());
    }

    #[tokio::test]
    async fn updates_that_break_uniqueness_are_rejected() {
        let repository = InMemoryRepository::builder("users")
            .with_documents([doc! { "email": "a" }, doc! { "email": "b" }])
            .with_index(EntityIndexDefine::asc("email").unique())
            .build()
            .await
            .unwrap();

        let result = repository
            .update_one(doc! { "email": "b" }, doc! { "$set": { "email": "a" } }, None)
            .await;

        assert!(matches!(result, Err(RepositoryError::DuplicateKey(_))));
        assert_eq!(repository.count_by_filter(doc! { "email": "b" }).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn replace_upserts_with_the_filter_id() {
        let repository = InMemoryRepository::new("users");
        let id = ObjectId::new();

        repository
            .replace_by_id(id, doc! { "name": "ada" }, Some(ReplaceOptions::default().upsert(true)))
            .await
            .unwrap();

        assert_eq!(
            repository.collection().documents().await,
            vec![doc! { "name": "ada", "_id": id }]
        );
    }

    #[tokio::test]
    async fn clones_share_documents() {
        let repository = InMemoryRepository::new("users");
        let clone = repository.clone();

        clone.create(doc! { "name": "ada" }, None).await.unwrap();

        assert_eq!(repository.count_by_filter(doc! {}).await.unwrap(), 1);
    }
}
