//! Database module for PostgreSQL persistence.

mod documents;
mod orders;
mod pool;

pub use documents::*;
pub use orders::*;
pub use pool::*;
