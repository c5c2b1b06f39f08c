//! Translation of mongodbr option records into driver options.

use mongodb::options as driver;

use mongodbr_core::options::{
    AggregateOptions, DeleteOptions, FindOneAndUpdateOptions, FindOneOptions, FindOptions,
    IndexOptions, InsertManyOptions, InsertOneOptions, ReplaceOptions, ReturnDocument,
    UpdateOptions,
};

/// Converts an option record into its `mongodb` driver counterpart.
pub trait IntoDriverOptions {
    type Driver;

    fn into_driver(self) -> Self::Driver;
}

impl IntoDriverOptions for FindOptions {
    type Driver = driver::FindOptions;

    fn into_driver(self) -> Self::Driver {
        let mut options = driver::FindOptions::default();

        options.skip = self.skip;
        options.limit = self.limit;
        options.sort = self.sort;
        options.projection = self.projection;

        options
    }
}

impl IntoDriverOptions for FindOneOptions {
    type Driver = driver::FindOneOptions;

    fn into_driver(self) -> Self::Driver {
        let mut options = driver::FindOneOptions::default();

        options.skip = self.skip;
        options.sort = self.sort;
        options.projection = self.projection;

        options
    }
}

impl IntoDriverOptions for AggregateOptions {
    type Driver = driver::AggregateOptions;

    fn into_driver(self) -> Self::Driver {
        let mut options = driver::AggregateOptions::default();

        options.allow_disk_use = self.allow_disk_use;
        options.batch_size = self.batch_size;
        options.max_time = self.max_time;
        options.comment = self.comment;

        options
    }
}

impl IntoDriverOptions for InsertOneOptions {
    type Driver = driver::InsertOneOptions;

    fn into_driver(self) -> Self::Driver {
        let mut options = driver::InsertOneOptions::default();

        options.bypass_document_validation = self.bypass_document_validation;
        options.comment = self.comment;

        options
    }
}

impl IntoDriverOptions for InsertManyOptions {
    type Driver = driver::InsertManyOptions;

    fn into_driver(self) -> Self::Driver {
        let mut options = driver::InsertManyOptions::default();

        options.bypass_document_validation = self.bypass_document_validation;
        options.ordered = self.ordered;
        options.comment = self.comment;

        options
    }
}

impl IntoDriverOptions for UpdateOptions {
    type Driver = driver::UpdateOptions;

    fn into_driver(self) -> Self::Driver {
        let mut options = driver::UpdateOptions::default();

        options.upsert = self.upsert;
        options.bypass_document_validation = self.bypass_document_validation;
        options.array_filters = self.array_filters;
        options.comment = self.comment;

        options
    }
}

impl IntoDriverOptions for ReturnDocument {
    type Driver = driver::ReturnDocument;

    fn into_driver(self) -> Self::Driver {
        match self {
            ReturnDocument::Before => driver::ReturnDocument::Before,
            ReturnDocument::After => driver::ReturnDocument::After,
        }
    }
}

impl IntoDriverOptions for FindOneAndUpdateOptions {
    type Driver = driver::FindOneAndUpdateOptions;

    fn into_driver(self) -> Self::Driver {
        let mut options = driver::FindOneAndUpdateOptions::default();

        options.upsert = self.upsert;
        options.return_document = self.return_document.map(IntoDriverOptions::into_driver);
        options.sort = self.sort;
        options.projection = self.projection;
        options.bypass_document_validation = self.bypass_document_validation;

        options
    }
}

impl IntoDriverOptions for ReplaceOptions {
    type Driver = driver::ReplaceOptions;

    fn into_driver(self) -> Self::Driver {
        let mut options = driver::ReplaceOptions::default();

        options.upsert = self.upsert;
        options.bypass_document_validation = self.bypass_document_validation;
        options.comment = self.comment;

        options
    }
}

impl IntoDriverOptions for DeleteOptions {
    type Driver = driver::DeleteOptions;

    fn into_driver(self) -> Self::Driver {
        let mut options = driver::DeleteOptions::default();
        options.comment = self.comment;
        options
    }
}

impl IntoDriverOptions for IndexOptions {
    type Driver = driver::IndexOptions;

    fn into_driver(self) -> Self::Driver {
        let mut options = driver::IndexOptions::default();

        options.name = self.name;
        options.unique = self.unique;
        options.sparse = self.sparse;
        options.background = self.background;
        options.expire_after = self.expire_after;

        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Bson, doc};
    use std::time::Duration;

    use mongodbr_core::options::{AggregateOption, FindOption, FindOneOption};

    #[test]
    fn find_options_copy_every_field() {
        let options = FindOptions::from_options([
            FindOption::with_skip(5),
            FindOption::with_limit(10),
            FindOption::with_sort(doc! { "age": -1 }),
            FindOption::with_projection(doc! { "name": 1 }),
        ])
        .into_driver();

        assert_eq!(options.skip, Some(5));
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.sort, Some(doc! { "age": -1 }));
        assert_eq!(options.projection, Some(doc! { "name": 1 }));
    }

    #[test]
    fn unset_find_options_stay_unset() {
        let options = FindOptions::default().into_driver();

        assert_eq!(options.skip, None);
        assert_eq!(options.limit, None);
        assert_eq!(options.sort, None);
        assert_eq!(options.projection, None);
    }

    #[test]
    fn find_one_options_copy_every_field() {
        let options = FindOneOptions::from_options([
            FindOneOption::with_skip(2),
            FindOneOption::with_sort(doc! { "created_at": 1 }),
            FindOneOption::with_projection(doc! { "_id": 0 }),
        ])
        .into_driver();

        assert_eq!(options.skip, Some(2));
        assert_eq!(options.sort, Some(doc! { "created_at": 1 }));
        assert_eq!(options.projection, Some(doc! { "_id": 0 }));
    }

    #[test]
    fn aggregate_options_copy_every_field() {
        let options = AggregateOptions::from_options([
            AggregateOption::with_allow_disk_use(true),
            AggregateOption::with_batch_size(100),
            AggregateOption::with_max_time(Duration::from_secs(3)),
            AggregateOption::with_comment("report"),
        ])
        .into_driver();

        assert_eq!(options.allow_disk_use, Some(true));
        assert_eq!(options.batch_size, Some(100));
        assert_eq!(options.max_time, Some(Duration::from_secs(3)));
        assert_eq!(options.comment, Some(Bson::String("report".into())));
    }

    #[test]
    fn write_options_copy_every_field() {
        let insert = InsertManyOptions::default()
            .ordered(false)
            .bypass_document_validation(true)
            .comment("seed")
            .into_driver();
        assert_eq!(insert.ordered, Some(false));
        assert_eq!(insert.bypass_document_validation, Some(true));
        assert_eq!(insert.comment, Some(Bson::String("seed".into())));

        let update = UpdateOptions::default()
            .upsert(true)
            .array_filters(vec![doc! { "elem.done": false }])
            .into_driver();
        assert_eq!(update.upsert, Some(true));
        assert_eq!(update.array_filters, Some(vec![doc! { "elem.done": false }]));

        let replace = ReplaceOptions::default().upsert(true).into_driver();
        assert_eq!(replace.upsert, Some(true));

        let delete = DeleteOptions::default().comment(7).into_driver();
        assert_eq!(delete.comment, Some(Bson::Int32(7)));
    }

    #[test]
    fn find_one_and_update_options_map_return_document() {
        let options = FindOneAndUpdateOptions::default()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .sort(doc! { "n": 1 })
            .into_driver();

        assert_eq!(options.upsert, Some(true));
        assert!(matches!(options.return_document, Some(driver::ReturnDocument::After)));
        assert_eq!(options.sort, Some(doc! { "n": 1 }));
    }

    #[test]
    fn index_options_copy_every_field() {
        let options = IndexOptions::default()
            .name("email_unique")
            .unique(true)
            .sparse(true)
            .background(false)
            .expire_after(Duration::from_secs(3600))
            .into_driver();

        assert_eq!(options.name.as_deref(), Some("email_unique"));
        assert_eq!(options.unique, Some(true));
        assert_eq!(options.sparse, Some(true));
        assert_eq!(options.background, Some(false));
        assert_eq!(options.expire_after, Some(Duration::from_secs(3600)));
    }
}
