mod crud;
mod guid;
mod multiple;
mod paging;
mod raw;
mod simple;
mod transaction;

use crate::{
    crud::crud,
    guid::guid,
    multiple::multiple,
    paging::{decimals, filters, paging},
    raw::raw,
    simple::simple,
};
use keel::{Connection, Database};
use log::LevelFilter;
use std::env;
#[cfg(not(feature = "disable-transactions"))]
use transaction::transaction;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Runs the whole suite on `connection`, which must be open or openable.
pub fn execute_tests<C: Connection>(connection: C) {
    let mut database = Database::new(connection).expect("Could not create the database");
    simple(&mut database);
    crud(&mut database);
    guid(&mut database);
    paging(&mut database);
    filters(&mut database);
    decimals(&mut database);
    multiple(&mut database);
    raw(&mut database);
    #[cfg(not(feature = "disable-transactions"))]
    transaction(&mut database);
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
