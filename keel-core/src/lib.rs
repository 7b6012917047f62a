mod as_value;
mod configuration;
mod connection;
mod database;
mod driver;
mod entity;
mod error;
mod executor;
mod generator;
mod mapping;
mod multiple;
mod orchestrator;
mod predicate;
mod query;
mod transaction;
mod util;
mod value;
pub mod writer;

pub use ::anyhow::Context;
pub use as_value::*;
pub use configuration::*;
pub use connection::*;
pub use database::*;
pub use driver::*;
pub use entity::*;
pub use error::*;
pub use executor::*;
pub use generator::*;
pub use mapping::*;
pub use multiple::*;
pub use orchestrator::*;
pub use predicate::*;
pub use query::*;
pub use transaction::*;
pub use util::*;
pub use value::*;
pub use writer::{
    GenericSqlWriter, MySqlSqlWriter, PostgresSqlWriter, SqlServerSqlWriter, SqlWriter, Window,
};

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
