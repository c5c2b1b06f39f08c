//! Per-call option records and functional option builders.
//!
//! Read operations take a list of functional options. Each option is a closure that
//! sets exactly one field of a fresh options record; they are applied in the order
//! given, so the last option touching a field wins.
//!
//! ```ignore
//! use mongodbr::options::{FindOption, FindOptions};
//! use bson::doc;
//!
//! let options = FindOptions::from_options([
//!     FindOption::with_skip(5),
//!     FindOption::with_limit(20),
//!     FindOption::with_sort(doc! { "created_at": -1 }),
//!     FindOption::with_skip(10),
//! ]);
//!
//! assert_eq!(options.skip, Some(10));
//! ```
//!
//! Write operations take an optional, plain options record such as [`UpdateOptions`].

use bson::{Bson, Document};
use std::{fmt, time::Duration};

/// Options for multi-document find calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Number of matching documents to skip.
    pub skip: Option<u64>,
    /// Maximum number of documents to return. Zero means no limit.
    pub limit: Option<i64>,
    /// Sort specification, e.g. `{ "age": -1 }`.
    pub sort: Option<Document>,
    /// Fields to include or exclude.
    pub projection: Option<Document>,
}

impl FindOptions {
    /// Applies the given options, in order, to a default record.
    pub fn from_options(options: impl IntoIterator<Item = FindOption>) -> Self {
        options
            .into_iter()
            .fold(Self::default(), |mut record, option| {
                option.apply(&mut record);
                record
            })
    }
}

/// A functional option for [`FindOptions`].
pub struct FindOption(Box<dyn FnOnce(&mut FindOptions) + Send>);

impl FindOption {
    /// Creates an option from an arbitrary setter.
    pub fn new(setter: impl FnOnce(&mut FindOptions) + Send + 'static) -> Self {
        Self(Box::new(setter))
    }

    /// Skips the first `skip` matching documents.
    pub fn with_skip(skip: u64) -> Self {
        Self::new(move |options| options.skip = Some(skip))
    }

    /// Returns at most `limit` documents.
    pub fn with_limit(limit: i64) -> Self {
        Self::new(move |options| options.limit = Some(limit))
    }

    /// Orders results by the given sort specification.
    pub fn with_sort(sort: Document) -> Self {
        Self::new(move |options| options.sort = Some(sort))
    }

    /// Restricts the fields returned.
    pub fn with_projection(projection: Document) -> Self {
        Self::new(move |options| options.projection = Some(projection))
    }

    /// Applies this option to `options`.
    pub fn apply(self, options: &mut FindOptions) {
        (self.0)(options)
    }
}

impl fmt::Debug for FindOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindOption").finish_non_exhaustive()
    }
}

/// Options for single-document find calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneOptions {
    /// Number of matching documents to skip before picking one.
    pub skip: Option<u64>,
    /// Sort specification used to pick among several matches.
    pub sort: Option<Document>,
    /// Fields to include or exclude.
    pub projection: Option<Document>,
}

impl FindOneOptions {
    /// Applies the given options, in order, to a default record.
    pub fn from_options(options: impl IntoIterator<Item = FindOneOption>) -> Self {
        options
            .into_iter()
            .fold(Self::default(), |mut record, option| {
                option.apply(&mut record);
                record
            })
    }
}

/// A functional option for [`FindOneOptions`].
pub struct FindOneOption(Box<dyn FnOnce(&mut FindOneOptions) + Send>);

impl FindOneOption {
    /// Creates an option from an arbitrary setter.
    pub fn new(setter: impl FnOnce(&mut FindOneOptions) + Send + 'static) -> Self {
        Self(Box::new(setter))
    }

    /// Skips the first `skip` matching documents.
    pub fn with_skip(skip: u64) -> Self {
        Self::new(move |options| options.skip = Some(skip))
    }

    /// Picks the first match according to the given sort specification.
    pub fn with_sort(sort: Document) -> Self {
        Self::new(move |options| options.sort = Some(sort))
    }

    /// Restricts the fields returned.
    pub fn with_projection(projection: Document) -> Self {
        Self::new(move |options| options.projection = Some(projection))
    }

    /// Applies this option to `options`.
    pub fn apply(self, options: &mut FindOneOptions) {
        (self.0)(options)
    }
}

impl fmt::Debug for FindOneOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindOneOption").finish_non_exhaustive()
    }
}

/// Options for aggregation calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateOptions {
    /// Allows pipeline stages to write temporary data to disk.
    pub allow_disk_use: Option<bool>,
    /// Number of documents per cursor batch.
    pub batch_size: Option<u32>,
    /// Server-side time limit for the aggregation.
    pub max_time: Option<Duration>,
    /// Comment attached to the command for profiling.
    pub comment: Option<Bson>,
}

impl AggregateOptions {
    /// Applies the given options, in order, to a default record.
    pub fn from_options(options: impl IntoIterator<Item = AggregateOption>) -> Self {
        options
            .into_iter()
            .fold(Self::default(), |mut record, option| {
                option.apply(&mut record);
                record
            })
    }
}

/// A functional option for [`AggregateOptions`].
pub struct AggregateOption(Box<dyn FnOnce(&mut AggregateOptions) + Send>);

impl AggregateOption {
    /// Creates an option from an arbitrary setter.
    pub fn new(setter: impl FnOnce(&mut AggregateOptions) + Send + 'static) -> Self {
        Self(Box::new(setter))
    }

    /// Lets the pipeline write temporary files when stages exceed the memory limit.
    pub fn with_allow_disk_use(allow: bool) -> Self {
        Self::new(move |options| options.allow_disk_use = Some(allow))
    }

    /// Sets the number of documents returned per cursor batch.
    pub fn with_batch_size(batch_size: u32) -> Self {
        Self::new(move |options| options.batch_size = Some(batch_size))
    }

    /// Bounds the server-side execution time.
    pub fn with_max_time(max_time: Duration) -> Self {
        Self::new(move |options| options.max_time = Some(max_time))
    }

    /// Attaches a comment that shows up in profiler and log output.
    pub fn with_comment(comment: impl Into<Bson>) -> Self {
        let comment = comment.into();
        Self::new(move |options| options.comment = Some(comment))
    }

    /// Applies this option to `options`.
    pub fn apply(self, options: &mut AggregateOptions) {
        (self.0)(options)
    }
}

impl fmt::Debug for AggregateOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateOption").finish_non_exhaustive()
    }
}

/// Options for inserting a single document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOneOptions {
    pub bypass_document_validation: Option<bool>,
    pub comment: Option<Bson>,
}

impl InsertOneOptions {
    pub fn bypass_document_validation(mut self, bypass: bool) -> Self {
        self.bypass_document_validation = Some(bypass);
        self
    }

    pub fn comment(mut self, comment: impl Into<Bson>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Options for inserting many documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertManyOptions {
    pub bypass_document_validation: Option<bool>,
    /// Stop at the first failed insert when `true` (the store default).
    pub ordered: Option<bool>,
    pub comment: Option<Bson>,
}

impl InsertManyOptions {
    pub fn bypass_document_validation(mut self, bypass: bool) -> Self {
        self.bypass_document_validation = Some(bypass);
        self
    }

    pub fn ordered(mut self, ordered: bool) -> Self {
        self.ordered = Some(ordered);
        self
    }

    pub fn comment(mut self, comment: impl Into<Bson>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Options for update calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    /// Insert a new document when nothing matches.
    pub upsert: Option<bool>,
    pub bypass_document_validation: Option<bool>,
    pub array_filters: Option<Vec<Document>>,
    pub comment: Option<Bson>,
}

impl UpdateOptions {
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = Some(upsert);
        self
    }

    pub fn bypass_document_validation(mut self, bypass: bool) -> Self {
        self.bypass_document_validation = Some(bypass);
        self
    }

    pub fn array_filters(mut self, filters: Vec<Document>) -> Self {
        self.array_filters = Some(filters);
        self
    }

    pub fn comment(mut self, comment: impl Into<Bson>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Which version of a document a find-and-modify call reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnDocument {
    Before,
    After,
}

/// Options for find-one-and-update calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneAndUpdateOptions {
    /// Insert a new document when nothing matches.
    pub upsert: Option<bool>,
    pub return_document: Option<ReturnDocument>,
    /// Picks which document to update when several match.
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub bypass_document_validation: Option<bool>,
}

impl FindOneAndUpdateOptions {
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = Some(upsert);
        self
    }

    pub fn return_document(mut self, return_document: ReturnDocument) -> Self {
        self.return_document = Some(return_document);
        self
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn bypass_document_validation(mut self, bypass: bool) -> Self {
        self.bypass_document_validation = Some(bypass);
        self
    }
}

/// Options for replace calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaceOptions {
    /// Insert the replacement when nothing matches.
    pub upsert: Option<bool>,
    pub bypass_document_validation: Option<bool>,
    pub comment: Option<Bson>,
}

impl ReplaceOptions {
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = Some(upsert);
        self
    }

    pub fn bypass_document_validation(mut self, bypass: bool) -> Self {
        self.bypass_document_validation = Some(bypass);
        self
    }

    pub fn comment(mut self, comment: impl Into<Bson>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Options for delete calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteOptions {
    pub comment: Option<Bson>,
}

impl DeleteOptions {
    pub fn comment(mut self, comment: impl Into<Bson>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Options shared by the indexes created in one call.
///
/// A `name` or `unique` flag set on an individual
/// [`EntityIndexDefine`](crate::index::EntityIndexDefine) takes precedence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOptions {
    pub name: Option<String>,
    pub unique: Option<bool>,
    /// Skip documents that lack the indexed fields.
    pub sparse: Option<bool>,
    pub background: Option<bool>,
    /// Time-to-live for documents indexed on a date field.
    pub expire_after: Option<Duration>,
}

impl IndexOptions {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = Some(unique);
        self
    }

    pub fn sparse(mut self, sparse: bool) -> Self {
        self.sparse = Some(sparse);
        self
    }

    pub fn background(mut self, background: bool) -> Self {
        self.background = Some(background);
        self
    }

    pub fn expire_after(mut self, expire_after: Duration) -> Self {
        self.expire_after = Some(expire_after);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn each_find_option_sets_only_its_field() {
        assert_eq!(
            FindOptions::from_options([FindOption::with_skip(5)]),
            FindOptions { skip: Some(5), ..Default::default() }
        );
        assert_eq!(
            FindOptions::from_options([FindOption::with_limit(7)]),
            FindOptions { limit: Some(7), ..Default::default() }
        );
        assert_eq!(
            FindOptions::from_options([FindOption::with_sort(doc! { "age": -1 })]),
            FindOptions { sort: Some(doc! { "age": -1 }), ..Default::default() }
        );
        assert_eq!(
            FindOptions::from_options([FindOption::with_projection(doc! { "name": 1 })]),
            FindOptions { projection: Some(doc! { "name": 1 }), ..Default::default() }
        );
    }

    #[test]
    fn last_find_option_wins() {
        let options = FindOptions::from_options([
            FindOption::with_skip(5),
            FindOption::with_limit(3),
            FindOption::with_skip(10),
        ]);

        assert_eq!(options.skip, Some(10));
        assert_eq!(options.limit, Some(3));
        assert_eq!(options.sort, None);
    }

    #[test]
    fn no_options_yield_defaults() {
        assert_eq!(FindOptions::from_options(Vec::new()), FindOptions::default());
        assert_eq!(FindOneOptions::from_options(Vec::new()), FindOneOptions::default());
        assert_eq!(AggregateOptions::from_options(Vec::new()), AggregateOptions::default());
    }

    #[test]
    fn find_one_options_apply_in_order() {
        let options = FindOneOptions::from_options([
            FindOneOption::with_sort(doc! { "a": 1 }),
            FindOneOption::with_skip(2),
            FindOneOption::with_sort(doc! { "b": -1 }),
        ]);

        assert_eq!(
            options,
            FindOneOptions {
                skip: Some(2),
                sort: Some(doc! { "b": -1 }),
                projection: None,
            }
        );
    }

    #[test]
    fn aggregate_options_set_single_fields() {
        assert_eq!(
            AggregateOptions::from_options([AggregateOption::with_allow_disk_use(true)]),
            AggregateOptions { allow_disk_use: Some(true), ..Default::default() }
        );
        assert_eq!(
            AggregateOptions::from_options([AggregateOption::with_batch_size(64)]),
            AggregateOptions { batch_size: Some(64), ..Default::default() }
        );
        assert_eq!(
            AggregateOptions::from_options([AggregateOption::with_max_time(Duration::from_secs(2))]),
            AggregateOptions { max_time: Some(Duration::from_secs(2)), ..Default::default() }
        );
        assert_eq!(
            AggregateOptions::from_options([AggregateOption::with_comment("report")]),
            AggregateOptions { comment: Some(Bson::String("report".into())), ..Default::default() }
        );
    }

    #[test]
    fn custom_setters_compose_with_builders() {
        let options = FindOptions::from_options([
            FindOption::with_limit(1),
            FindOption::new(|options| options.limit = None),
        ]);

        assert_eq!(options.limit, None);
    }
}
