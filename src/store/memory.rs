use super::{MeasurementStore, TimeBounds};
use crate::measurement::{record_measured_at, RawRecord, RecordError, SENSOR_ID};
use crate::series::ParseFailurePolicy;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeSet;

/// Documents held in memory, e.g. loaded from a CSV dump.
///
/// Documents whose `measuredAt` cannot be read have no place on the time axis,
/// so the parse failure policy is applied to them at load time: `Skip` counts
/// and logs them, `Abort` fails the load.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<(DateTime<Utc>, RawRecord)>,
    unplaced: usize,
}

impl MemoryStore {
    /// Loads under [`ParseFailurePolicy::Skip`].
    pub fn new(records: Vec<RawRecord>) -> Self {
        let mut store = Self::default();
        for (index, record) in records.into_iter().enumerate() {
            store.skip_unplaced(index, record);
        }
        store.warn_unplaced();
        store
    }

    pub fn with_policy(
        records: Vec<RawRecord>,
        policy: ParseFailurePolicy,
    ) -> Result<Self, RecordError> {
        if policy == ParseFailurePolicy::Skip {
            return Ok(Self::new(records));
        }
        let mut store = Self::default();
        for record in records {
            let measured_at = record_measured_at(&record)?;
            store.records.push((measured_at, record));
        }
        Ok(store)
    }

    fn skip_unplaced(&mut self, index: usize, record: RawRecord) {
        match record_measured_at(&record) {
            Ok(measured_at) => self.records.push((measured_at, record)),
            Err(error) => {
                tracing::warn!(index, error = %error, "dropping document without a usable measuredAt");
                self.unplaced += 1;
            }
        }
    }

    fn warn_unplaced(&self) {
        if self.unplaced > 0 {
            tracing::warn!(
                unplaced = self.unplaced,
                "documents without a readable measuredAt were left out"
            );
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn unplaced(&self) -> usize {
        self.unplaced
    }
}

impl MeasurementStore for MemoryStore {
    async fn time_bounds(&self) -> Result<Option<TimeBounds>> {
        let first = self.records.iter().map(|(ts, _)| *ts).min();
        let last = self.records.iter().map(|(ts, _)| *ts).max();
        Ok(first.zip(last).map(|(first, last)| TimeBounds { first, last }))
    }

    async fn distinct_sensor_ids(&self) -> Result<Vec<String>> {
        let ids: BTreeSet<&str> = self
            .records
            .iter()
            .filter_map(|(_, record)| record.get(SENSOR_ID).and_then(Value::as_str))
            .filter(|id| !id.trim().is_empty())
            .collect();
        Ok(ids.into_iter().map(str::to_string).collect())
    }

    async fn fetch_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|(ts, _)| *ts >= start && *ts <= end)
            .map(|(_, record)| record.clone())
            .collect())
    }
}
