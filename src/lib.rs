//! Search-index synchronization and faceted product search for a webshop catalog.
//!
//! Catalog writes enqueue the affected products into the [`backlog`]. The
//! [`sync`] synchronizer drains it in batches, turns products into search
//! documents and pushes them through a [`search::IndexClient`]. Storefront
//! searches go through [`search::ProductSearchService`].

pub mod app;
pub mod backlog;
pub mod catalog;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod search;
pub mod sync;

pub use error::{AppError, Result};
