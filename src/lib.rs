//! Keel: a dialect independent micro ORM.
//!
//! Entities derive [`Entity`], a [`Database`] owns one connection and runs typed CRUD,
//! predicate filtering, paging, counting and batched reads through the [`SqlWriter`]
//! of the connection's driver.
pub use keel_core::*;
pub use keel_macros::*;
