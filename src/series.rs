use crate::measurement::{normalize_record, Field, Measurement, RawRecord, RecordError};
use chrono::DateTime;
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::str::FromStr;

/// What to do with a record whose timestamp or sensor id cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseFailurePolicy {
    /// Drop the record, log it, and keep the rest of the window.
    #[default]
    Skip,
    /// Fail the whole window.
    Abort,
}

impl FromStr for ParseFailurePolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "skip" | "drop" => Ok(Self::Skip),
            "abort" | "fail" => Ok(Self::Abort),
            other => Err(format!("unknown parse failure policy {other:?} (expected skip|abort)")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ColumnError {
    #[error("column {0} already exists")]
    AlreadyPresent(&'static str),
    #[error("column {column} has {actual} values, table has {expected} rows")]
    LengthMismatch {
        column: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Columnar table of one window's measurements, ascending by `measuredAt`.
#[derive(Debug, Clone, Default)]
pub struct WindowedSeries {
    measured_at: Vec<DateTime<Tz>>,
    sensor_ids: Vec<String>,
    columns: BTreeMap<Field, Vec<Option<f64>>>,
}

impl WindowedSeries {
    pub fn from_measurements(mut rows: Vec<Measurement>) -> Self {
        // stable: equal timestamps keep their input order
        rows.sort_by(|a, b| a.measured_at.cmp(&b.measured_at));

        let mut columns: BTreeMap<Field, Vec<Option<f64>>> = Field::RAW
            .into_iter()
            .map(|field| (field, Vec::with_capacity(rows.len())))
            .collect();
        let mut measured_at = Vec::with_capacity(rows.len());
        let mut sensor_ids = Vec::with_capacity(rows.len());

        for row in rows {
            for (field, column) in columns.iter_mut() {
                column.push(row.value(*field));
            }
            measured_at.push(row.measured_at);
            sensor_ids.push(row.sensor_id);
        }

        Self {
            measured_at,
            sensor_ids,
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.measured_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measured_at.is_empty()
    }

    pub fn measured_at(&self) -> &[DateTime<Tz>] {
        &self.measured_at
    }

    pub fn sensor_ids(&self) -> &[String] {
        &self.sensor_ids
    }

    pub fn column(&self, field: Field) -> Option<&[Option<f64>]> {
        self.columns.get(&field).map(Vec::as_slice)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&[Option<f64>]> {
        Field::from_column_name(name).and_then(|field| self.column(field))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.keys().map(|field| field.column_name())
    }

    /// Adds a new column. Existing columns are never replaced.
    pub fn append_column(
        &mut self,
        field: Field,
        values: Vec<Option<f64>>,
    ) -> Result<(), ColumnError> {
        if self.columns.contains_key(&field) {
            return Err(ColumnError::AlreadyPresent(field.column_name()));
        }
        if values.len() != self.len() {
            return Err(ColumnError::LengthMismatch {
                column: field.column_name(),
                expected: self.len(),
                actual: values.len(),
            });
        }
        self.columns.insert(field, values);
        Ok(())
    }

    /// Non-missing `(measuredAt, value)` pairs of one field across all sensors.
    pub fn values(&self, field: Field) -> Vec<(DateTime<Tz>, f64)> {
        let Some(column) = self.columns.get(&field) else {
            return Vec::new();
        };
        self.measured_at
            .iter()
            .zip(column)
            .filter_map(|(ts, value)| value.map(|v| (*ts, v)))
            .collect()
    }

    /// Non-missing `(measuredAt, value)` pairs of one field for one sensor.
    pub fn sensor_values(&self, sensor_id: &str, field: Field) -> Vec<(DateTime<Tz>, f64)> {
        let Some(column) = self.columns.get(&field) else {
            return Vec::new();
        };
        self.measured_at
            .iter()
            .zip(&self.sensor_ids)
            .zip(column)
            .filter(|((_, sensor), _)| sensor.as_str() == sensor_id)
            .filter_map(|((ts, _), value)| value.map(|v| (*ts, v)))
            .collect()
    }
}

#[derive(Debug)]
pub struct RejectedRecord {
    pub index: usize,
    pub error: RecordError,
}

#[derive(Debug)]
pub struct Assembly {
    pub series: WindowedSeries,
    pub rejected: Vec<RejectedRecord>,
}

pub fn assemble(
    records: &[RawRecord],
    tz: &Tz,
    policy: ParseFailurePolicy,
) -> Result<Assembly, RecordError> {
    let mut rows = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();

    for (index, raw) in records.iter().enumerate() {
        match normalize_record(raw, tz) {
            Ok(row) => rows.push(row),
            Err(error) => match policy {
                ParseFailurePolicy::Abort => return Err(error),
                ParseFailurePolicy::Skip => {
                    tracing::warn!(index, error = %error, "dropping unreadable record");
                    rejected.push(RejectedRecord { index, error });
                }
            },
        }
    }

    Ok(Assembly {
        series: WindowedSeries::from_measurements(rows),
        rejected,
    })
}
