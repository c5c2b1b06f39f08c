//! MongoDB repository for mongodbr.
//!
//! This crate provides [`MongoRepository`], the implementation of the repository contract
//! on top of the official async `mongodb` driver. Every call is forwarded to the driver;
//! driver errors are returned unchanged inside
//! [`RepositoryError::Backend`](mongodbr_core::error::RepositoryError::Backend).
//!
//! To use this repository, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! mongodbr = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mongodbr::{mongodb::MongoRepository, prelude::*};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users = MongoRepository::builder("mongodb://localhost:27017", "app", "users")
//!         .build()
//!         .await?;
//!
//!     users.must_create_index(EntityIndexDefine::asc("email").unique(), None).await;
//!     let id = users.create(doc! { "email": "ada@example.com" }, None).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as mongodbr_mongodb;

pub mod options;
pub mod repository;

pub use repository::{MongoRepository, MongoRepositoryBuilder};
