//! Main mongodbr crate providing a generic repository over MongoDB collections.
//!
//! This crate is the primary entry point for users of mongodbr. It re-exports the
//! repository contract from the sub-crates and provides access to the available
//! implementations.
//!
//! # Features
//!
//! - **One contract per collection** - find, create, update, delete, index, aggregate and replace
//! - **Functional options** - read calls take composable option builders
//! - **Lazy results** - finds return a handle that runs the query when decoded
//! - **Two implementations** - MongoDB for production, in-memory for tests
//!
//! # Quick Start
//!
//! ```ignore
//! use mongodbr::{Entity, prelude::*, memory::InMemoryRepository};
//! use mongodbr::bson::{doc, oid::ObjectId};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
//! pub struct User {
//!     #[serde(rename = "_id")]
//!     pub id: ObjectId,
//!     pub name: String,
//!     pub age: i32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> RepositoryResult<()> {
//!     let users = InMemoryRepository::builder("users").build().await?;
//!
//!     users.must_create_index(EntityIndexDefine::asc("name").unique(), None).await;
//!
//!     let alice = User { id: ObjectId::new(), name: "Alice".to_string(), age: 30 };
//!     users.create_entity(&alice, None).await?;
//!
//!     let adults: Vec<User> = users
//!         .find_by_filter(
//!             doc! { "age": { "$gte": 18 } },
//!             vec![FindOption::with_sort(doc! { "name": 1 }), FindOption::with_limit(10)],
//!         )
//!         .all()
//!         .await?;
//!
//!     println!("Adults: {:?}", adults);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Implementations
//!
//! - [`memory`] - In-memory repository for development and testing
//! - `mongodb` - MongoDB repository (requires the `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as mongodbr;

pub mod prelude;

pub use mongodbr_core::{entity, error, find_result, index, options, repository};
pub use mongodbr_macros::Entity;

// Re-export BSON types for convenience
pub use bson;
pub use async_trait::async_trait;

/// In-memory repository implementation.
pub mod memory {
    pub use mongodbr_memory::{InMemoryCollection, InMemoryRepository, InMemoryRepositoryBuilder};
}

/// MongoDB repository implementation.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use mongodbr_mongodb::{MongoRepository, MongoRepositoryBuilder, options::IntoDriverOptions};
}
