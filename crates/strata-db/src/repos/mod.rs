//! Table-level repositories.
//!
//! Every function takes a `&libsql::Connection`; a `libsql::Transaction`
//! derefs to one, so the same calls run inside or outside a transaction.

pub mod car;
pub mod human_being;
pub mod import_operation;
