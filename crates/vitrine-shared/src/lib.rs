//! Types shared between the Vitrine server, store and viewer.

pub mod constants;
pub mod error;
pub mod format;
pub mod types;

pub use error::SharedError;
pub use format::{LoaderKind, ModelFormat};
pub use types::{Background, Model, RecordId};
