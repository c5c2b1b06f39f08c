//! Convenient re-exports of commonly used types from mongodbr.
//!
//! ```ignore
//! use mongodbr::prelude::*;
//! ```

pub use mongodbr_core::{
    entity::{AnyEntity, Entity, EntityExt},
    error::{RepositoryError, RepositoryResult},
    find_result::FindResult,
    index::{EntityIndexDefine, IndexOrder},
    options::{
        AggregateOption, DeleteOptions, FindOneAndUpdateOptions, FindOneOption, FindOption,
        IndexOptions, InsertManyOptions, InsertOneOptions, ReplaceOptions, ReturnDocument,
        UpdateOptions,
    },
    repository::{
        DeleteResult, EntityCreate, EntityDelete, EntityFind, EntityIndex, EntityUpdate, Repository,
        RepositoryBuilder, RepositoryExt,
    },
};
