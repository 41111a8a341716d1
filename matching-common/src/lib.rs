//! # Matching Common Library
//!
//! Shared code for the matching microservices including:
//! - Domain models (tags, interactions, matches, recommendations)
//! - Cache store contract and its backends
//! - Database initialization and migrations
//! - Bootstrap configuration loading
//! - Utility functions

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod time;
pub mod uuid_utils;

pub use cache::{CacheStore, MemoryCache, SqliteCache};
pub use error::{Error, Result};
