use crate::{Entity, Mapping, MappingCache};
use std::sync::Arc;
use time::{OffsetDateTime, macros::date};
use uuid::Uuid;

/// Settings shared by the generator and the database facade.
#[derive(Debug, Clone)]
pub struct Configuration {
    cache: Arc<MappingCache>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            cache: MappingCache::global().clone(),
        }
    }
}

impl Configuration {
    /// Configuration backed by a private mapping cache.
    pub fn with_cache(cache: Arc<MappingCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<MappingCache> {
        &self.cache
    }

    pub fn get_map<E: Entity>(&self) -> Arc<Mapping> {
        self.cache.resolve::<E>()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// A new sequential guid, see [`sequential_guid`].
    pub fn next_guid(&self) -> Uuid {
        sequential_guid(OffsetDateTime::now_utc())
    }
}

/// Random guid whose last six bytes encode `now`, so that guids generated later
/// sort after earlier ones in databases comparing the trailing bytes first.
///
/// Bytes 10..12 hold the days elapsed since 1900-01-01, bytes 12..16 the time of
/// day in units of 1/300 of a second, both big endian.
pub fn sequential_guid(now: OffsetDateTime) -> Uuid {
    let mut bytes = *Uuid::new_v4().as_bytes();
    let days = (now.date() - date!(1900 - 01 - 01)).whole_days();
    let time = now.time();
    let milliseconds = (time.hour() as u64 * 3_600_000)
        + (time.minute() as u64 * 60_000)
        + (time.second() as u64 * 1_000)
        + time.millisecond() as u64;
    let ticks = (milliseconds as f64 / 3.333333) as u32;
    bytes[10..12].copy_from_slice(&(days as u16).to_be_bytes());
    bytes[12..16].copy_from_slice(&ticks.to_be_bytes());
    Uuid::from_bytes(bytes)
}
