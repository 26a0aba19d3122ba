//! Restoration-case catalog: typed records, the one-shot dataset store and
//! the filter engine that derives the visible subset.

pub mod error;
pub mod query;
pub mod record;
pub mod store;

pub use error::*;
pub use query::*;
pub use record::*;
pub use store::*;
