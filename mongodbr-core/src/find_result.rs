//! Lazy, single-use handles over the results of a find call.
//!
//! Find operations return a [`FindResult`] without touching the store. The query runs
//! when the handle is consumed through [`FindResult::one`], [`FindResult::all`],
//! [`FindResult::stream`] or [`FindResult::documents`]; each of these takes `self`, so
//! a handle is consumed exactly once. Dropping a handle, consumed or not, drops the
//! underlying cursor.

use bson::{Document, de::deserialize_from_document};
use futures::{
    future::{BoxFuture, FutureExt},
    stream::{self, BoxStream, StreamExt, TryStreamExt},
};
use serde::de::DeserializeOwned;
use std::{fmt, future::Future};

use crate::error::{RepositoryError, RepositoryResult};

/// Stream of raw documents produced by a store cursor.
pub type DocumentStream = BoxStream<'static, RepositoryResult<Document>>;

/// A pending read that has not been materialized yet.
///
/// # Example
///
/// ```ignore
/// let user: Option<User> = repository.find_by_object_id(id).one().await?;
/// let active: Vec<User> = repository
///     .find_by_filter(doc! { "active": true }, vec![FindOption::with_limit(10)])
///     .all()
///     .await?;
/// ```
pub struct FindResult {
    pending: BoxFuture<'static, RepositoryResult<DocumentStream>>,
}

impl FindResult {
    /// Wraps a future that opens a cursor when first polled.
    pub fn new<F>(open: F) -> Self
    where
        F: Future<Output = RepositoryResult<DocumentStream>> + Send + 'static,
    {
        Self { pending: open.boxed() }
    }

    /// Creates a handle over documents that are already in memory.
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self::new(async move {
            Ok::<DocumentStream, RepositoryError>(stream::iter(documents.into_iter().map(Ok)).boxed())
        })
    }

    /// Creates a handle that fails with `err` when consumed.
    pub fn from_error(err: RepositoryError) -> Self {
        Self::new(async move { Err::<DocumentStream, _>(err) })
    }

    /// Decodes the first document, or returns `None` when nothing matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the document cannot be decoded as `T`.
    pub async fn one<T>(self) -> RepositoryResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let mut documents = self.pending.await?;

        match documents.try_next().await? {
            Some(document) => Ok(Some(deserialize_from_document(document)?)),
            None => Ok(None),
        }
    }

    /// Decodes every document.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or any document cannot be decoded as `T`.
    pub async fn all<T>(self) -> RepositoryResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.pending
            .await?
            .and_then(|document| async move {
                deserialize_from_document::<T>(document).map_err(RepositoryError::from)
            })
            .try_collect()
            .await
    }

    /// Opens the cursor and decodes documents as they are pulled from the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be started. Decoding and cursor errors are
    /// reported per item.
    pub async fn stream<T>(self) -> RepositoryResult<BoxStream<'static, RepositoryResult<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        Ok(self
            .pending
            .await?
            .and_then(|document| async move {
                deserialize_from_document::<T>(document).map_err(RepositoryError::from)
            })
            .boxed())
    }

    /// Returns every document without decoding.
    pub async fn documents(self) -> RepositoryResult<Vec<Document>> {
        self.pending.await?.try_collect().await
    }
}

impl fmt::Debug for FindResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindResult").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::Deserialize;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    #[derive(Debug, PartialEq, Deserialize)]
    struct Item {
        n: i32,
    }

    #[tokio::test]
    async fn one_returns_the_first_document() {
        let result = FindResult::from_documents(vec![doc! { "n": 1 }, doc! { "n": 2 }]);

        assert_eq!(result.one::<Item>().await.unwrap(), Some(Item { n: 1 }));
    }

    #[tokio::test]
    async fn one_signals_no_match_with_none() {
        let result = FindResult::from_documents(Vec::new());

        assert_eq!(result.one::<Item>().await.unwrap(), None);
    }

    #[tokio::test]
    async fn all_decodes_in_cursor_order() {
        let result = FindResult::from_documents(vec![doc! { "n": 3 }, doc! { "n": 1 }]);

        assert_eq!(
            result.all::<Item>().await.unwrap(),
            vec![Item { n: 3 }, Item { n: 1 }]
        );
    }

    #[tokio::test]
    async fn decode_failures_surface_as_serialization_errors() {
        let result = FindResult::from_documents(vec![doc! { "n": "three" }]);

        assert!(matches!(
            result.all::<Item>().await,
            Err(RepositoryError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn stream_decodes_lazily() {
        let result = FindResult::from_documents(vec![doc! { "n": 1 }, doc! { "n": "bad" }]);
        let mut items = result.stream::<Item>().await.unwrap();

        assert_eq!(items.next().await.unwrap().unwrap(), Item { n: 1 });
        assert!(items.next().await.unwrap().is_err());
        assert!(items.next().await.is_none());
    }

    #[tokio::test]
    async fn errors_are_reported_on_consumption() {
        let result = FindResult::from_error(RepositoryError::InvalidDocument("boom".into()));

        assert!(matches!(
            result.documents().await,
            Err(RepositoryError::InvalidDocument(_))
        ));
    }

    #[tokio::test]
    async fn nothing_runs_until_consumed() {
        let opened = Arc::new(AtomicBool::new(false));
        let flag = opened.clone();

        let result = FindResult::new(async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<DocumentStream, RepositoryError>(stream::empty().boxed())
        });
        assert!(!opened.load(Ordering::SeqCst));

        assert!(result.documents().await.unwrap().is_empty());
        assert!(opened.load(Ordering::SeqCst));
    }
}
