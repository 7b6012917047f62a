use crate::{Connection, Result, SqlWriter};

/// Entry point of a database backend.
pub trait Driver {
    type Connection: Connection;
    type SqlWriter: SqlWriter;

    /// Backend name, also the URL scheme accepted by [`Driver::connect`].
    const NAME: &'static str;

    fn sql_writer(&self) -> Self::SqlWriter;

    /// Opens a connection described by `url`.
    fn connect(&self, url: &str) -> Result<Self::Connection>;
}
