//! List Pages kernel library.
//!
//! Builds search queries for configurable list pages and resolves the facets
//! shown next to them. The `list-pages` binary runs lists against site
//! fixtures for inspection.

pub mod config;
pub mod entity;
pub mod error;
pub mod facet;
pub mod field_type;
pub mod filter;
pub mod fixture;
pub mod form;
pub mod hierarchy;
pub mod index;
pub mod list;
pub mod query_type;

pub use error::{ListError, ListResult};
