use crate::{SqliteConnection, sql_writer::SqliteSqlWriter};
use keel_core::{Context, DbError, Driver, Result};
use rusqlite::OpenFlags;
use std::path::PathBuf;
use url::Url;

#[derive(Default, Debug, Clone, Copy)]
pub struct SqliteDriver {}

impl SqliteDriver {
    pub const fn new() -> Self {
        Self {}
    }
}

impl Driver for SqliteDriver {
    type Connection = SqliteConnection;
    type SqlWriter = SqliteSqlWriter;

    const NAME: &'static str = "sqlite";

    fn sql_writer(&self) -> SqliteSqlWriter {
        SqliteSqlWriter
    }

    /// Accepts `sqlite::memory:`, `sqlite:relative/path.db`, `sqlite://../relative/path.db`
    /// and `sqlite:///absolute/path.db`, optionally followed by `?mode=ro|rw|rwc`.
    fn connect(&self, url: &str) -> Result<SqliteConnection> {
        let location = Location::parse(url)?;
        let mut connection = SqliteConnection::new(location);
        keel_core::Connection::open(&mut connection)?;
        Ok(connection)
    }
}

/// Where a connection opens its database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Memory,
    File { path: PathBuf, flags: OpenFlags },
}

impl Location {
    pub fn parse(url: &str) -> Result<Location> {
        let context = || format!("Error while decoding connection URL: `{}`", url);
        let parsed = Url::parse(url).with_context(context)?;
        if parsed.scheme() != SqliteDriver::NAME {
            return Err(DbError::provider_msg(format!(
                "Expected sqlite connection url to start with `{}:`, got `{}`",
                SqliteDriver::NAME,
                url
            ))
            .into());
        }
        let path = format!("{}{}", parsed.host_str().unwrap_or_default(), parsed.path());
        let path = urlencoding::decode(&path).with_context(context)?;
        if path == ":memory:" {
            return Ok(Location::Memory);
        }
        if path.is_empty() {
            return Err(DbError::provider_msg(format!(
                "The connection URL `{}` does not name a database file",
                url
            ))
            .into());
        }
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        for (key, value) in parsed.query_pairs() {
            match (key.as_ref(), value.as_ref()) {
                ("mode", "ro") => {
                    flags.remove(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE);
                    flags.insert(OpenFlags::SQLITE_OPEN_READ_ONLY);
                }
                ("mode", "rw") => flags.remove(OpenFlags::SQLITE_OPEN_CREATE),
                ("mode", "rwc") => {}
                ("mode", other) => {
                    return Err(DbError::provider_msg(format!(
                        "Unknown mode `{}`, expected one of: ro, rw, rwc",
                        other
                    ))
                    .into());
                }
                (other, _) => log::warn!("Ignoring the unknown connection parameter `{}`", other),
            }
        }
        Ok(Location::File {
            path: PathBuf::from(path.into_owned()),
            flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory() {
        assert_eq!(Location::parse("sqlite::memory:").expect("Valid url"), Location::Memory);
    }

    #[test]
    fn files() {
        let Location::File { path, flags } =
            Location::parse("sqlite://../target/debug/tests.sqlite?mode=rwc").expect("Valid url")
        else {
            panic!("Expected a file location");
        };
        assert_eq!(path, PathBuf::from("../target/debug/tests.sqlite"));
        assert!(flags.contains(OpenFlags::SQLITE_OPEN_CREATE));

        let Location::File { path, flags } =
            Location::parse("sqlite:///tmp/my%20db.sqlite?mode=ro").expect("Valid url")
        else {
            panic!("Expected a file location");
        };
        assert_eq!(path, PathBuf::from("/tmp/my db.sqlite"));
        assert!(flags.contains(OpenFlags::SQLITE_OPEN_READ_ONLY));
        assert!(!flags.contains(OpenFlags::SQLITE_OPEN_READ_WRITE));

        let Location::File { path, .. } = Location::parse("sqlite:data.db").expect("Valid url")
        else {
            panic!("Expected a file location");
        };
        assert_eq!(path, PathBuf::from("data.db"));
    }

    #[test]
    fn wrong_scheme() {
        assert!(Location::parse("postgres://localhost/db").is_err());
        assert!(Location::parse("sqlite:data.db?mode=x").is_err());
    }
}
