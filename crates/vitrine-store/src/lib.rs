//! # vitrine-store
//!
//! Flat-file persistence for the Vitrine catalog.
//!
//! Each collection is a single pretty-printed JSON array on disk. A
//! [`JsonStore`] serializes every mutation behind an async mutex and
//! replaces the file atomically (write to a temp file, then rename), so
//! concurrent writers cannot lose each other's updates and a crash never
//! leaves a truncated file behind. The catalogs layer typed CRUD, reorder
//! and batch operations on top and keep `order` dense after each change.

pub mod backgrounds;
pub mod models;
pub mod ordering;
pub mod store;

mod error;

pub use backgrounds::{BackgroundCatalog, BackgroundPatch, BackgroundUpdate, NewBackground};
pub use error::{Result, StoreError};
pub use models::{BatchRemoval, FormatFilter, ModelCatalog, ModelPatch, ModelUpdate, NewModel};
pub use ordering::Record;
pub use store::JsonStore;
