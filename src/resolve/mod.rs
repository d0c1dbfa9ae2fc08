//! Resolvers that turn user text into catalog records
//!
//! - Catalog: direct title search, hydration and debounced live search
//! - Title: language-model assisted smart search

pub mod catalog;
pub mod title;

pub use catalog::{CatalogResolver, LiveSearch};
pub use title::TitleResolver;
