//! In-memory repository for mongodbr.
//!
//! This crate provides [`InMemoryRepository`], a thread-safe implementation of the
//! repository contract that keeps a single collection in process memory. It is meant
//! for tests and local development, where a MongoDB server is not at hand.
//!
//! # Features
//!
//! - **Shared state** - clones see the same documents through an async-aware RwLock
//! - **Query subset** - equality, comparison, membership and logical filter operators
//! - **Updates** - `$set`, `$unset`, `$inc` and `$setOnInsert`, with upserts
//! - **Aggregation** - `$match`, `$sort`, `$skip`, `$limit`, `$project` and `$count`
//! - **Indexes** - generated names, the `_id_` index and unique key enforcement
//!
//! # Quick Start
//!
//! ```ignore
//! use mongodbr::{Entity, memory::InMemoryRepository, prelude::*};
//! use bson::oid::ObjectId;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
//! pub struct User {
//!     #[serde(rename = "_id")]
//!     pub id: ObjectId,
//!     pub name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users = InMemoryRepository::builder("users").build().await?;
//!
//!     let user = User { id: ObjectId::new(), name: "Alice".to_string() };
//!     users.create_entity(&user, None).await?;
//!
//!     let found: Option<User> = users.find_by_object_id(user.id).one().await?;
//!     assert!(found.is_some());
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as mongodbr_memory;

mod evaluator;
mod index;
mod modifier;
mod pipeline;
pub mod repository;

pub use repository::{InMemoryCollection, InMemoryRepository, InMemoryRepositoryBuilder};
