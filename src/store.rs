//! Read-only access to the measurement store.
//!
//! The pipeline needs three query shapes: the overall time span, the set of
//! sensor ids, and all documents in a closed time range. Transport, auth and
//! retries are the concern of each implementation.

mod csv;
mod memory;
mod postgres;

pub use self::csv::{load_csv, read_csv};
pub use self::memory::MemoryStore;
pub use self::postgres::PgStore;

use crate::measurement::RawRecord;
use anyhow::Result;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBounds {
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
}

#[allow(async_fn_in_trait)]
pub trait MeasurementStore {
    /// Earliest and latest `measuredAt`, or `None` for an empty store.
    async fn time_bounds(&self) -> Result<Option<TimeBounds>>;

    /// Every distinct `sensorId`, sorted.
    async fn distinct_sensor_ids(&self) -> Result<Vec<String>>;

    /// Documents with `start <= measuredAt <= end`, in no particular order.
    async fn fetch_range(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<Vec<RawRecord>>;
}
