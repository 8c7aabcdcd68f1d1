//! Relational persistence for users and memories.

mod sqlite;

pub use sqlite::{Store, StoreError};
