//! Core of the mongodbr project: a generic repository contract over a document
//! collection.
//!
//! This crate is store-agnostic and provides:
//!
//! - **Repository contract** ([`repository`]) - Find, create, update, delete, index,
//!   aggregate, and replace traits
//! - **Option builders** ([`options`]) - Functional options for reads and option records for writes
//! - **Lazy results** ([`find_result`]) - Single-use handles over find cursors
//! - **Entities** ([`entity`]) - Traits for typed documents identified by an `ObjectId`
//! - **Index definitions** ([`index`]) - Ordered key specifications for index provisioning
//! - **Error handling** ([`error`]) - The error and result types shared by all repositories
//!
//! Store implementations live in `mongodbr-mongodb` and `mongodbr-memory`.

#[allow(unused_extern_crates)]
extern crate self as mongodbr_core;

pub mod entity;
pub mod error;
pub mod find_result;
pub mod index;
pub mod options;
pub mod repository;

pub use bson;
