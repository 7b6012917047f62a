mod context;
mod mysql;
mod postgres;
mod sql_server;
mod sql_writer;

pub use context::*;
pub use mysql::*;
pub use postgres::*;
pub use sql_server::*;
pub use sql_writer::*;
