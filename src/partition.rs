//! Calendar-week windows over the span of available data.
//!
//! Windows are aligned to local midnight of the reporting timezone and follow
//! ISO week numbering, so the first and last windows of a span are usually
//! shorter than seven days.

use crate::time::{end_of_local_day, start_of_local_day};
use chrono::{DateTime, Datelike, Duration, IsoWeek, NaiveDate, Utc};
use chrono_tz::Tz;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub iso_week: IsoWeek,
}

impl Window {
    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date_naive()
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.with_timezone(&Utc)
    }

    pub fn end_utc(&self) -> DateTime<Utc> {
        self.end.with_timezone(&Utc)
    }

    /// Covered time including the final microsecond.
    pub fn duration(&self) -> Duration {
        self.end - self.start + Duration::microseconds(1)
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        *instant >= self.start_utc() && *instant <= self.end_utc()
    }

    /// `<start-date>_<end-date>`, stable across reruns over the same span.
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}",
            self.start_date().format("%Y-%m-%d"),
            self.end_date().format("%Y-%m-%d")
        )
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{} (week {}-W{:02})",
            self.start_date().format("%Y-%m-%d"),
            self.end_date().format("%Y-%m-%d"),
            self.iso_week.year(),
            self.iso_week.week()
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    #[error("first instant {first} is after last instant {last}")]
    InvertedRange { first: String, last: String },
}

#[derive(Debug, Clone)]
pub struct WeekPartitioner {
    tz: Tz,
    first_date: NaiveDate,
    last_date: NaiveDate,
}

impl WeekPartitioner {
    /// `last` is converted into `first`'s timezone before taking its date.
    pub fn new(first: DateTime<Tz>, last: DateTime<Tz>) -> Result<Self, PartitionError> {
        if first > last {
            return Err(PartitionError::InvertedRange {
                first: first.to_rfc3339(),
                last: last.to_rfc3339(),
            });
        }
        let tz = first.timezone();
        Ok(Self {
            tz,
            first_date: first.date_naive(),
            last_date: last.with_timezone(&tz).date_naive(),
        })
    }

    pub fn span_start(&self) -> DateTime<Tz> {
        start_of_local_day(&self.tz, self.first_date)
    }

    pub fn span_end(&self) -> DateTime<Tz> {
        end_of_local_day(&self.tz, self.last_date)
    }

    /// A fresh pass over the windows; each call starts from the beginning.
    pub fn windows(&self) -> Windows<'_> {
        Windows {
            partitioner: self,
            cursor: Some(self.first_date),
        }
    }
}

impl<'a> IntoIterator for &'a WeekPartitioner {
    type Item = Window;
    type IntoIter = Windows<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.windows()
    }
}

pub struct Windows<'a> {
    partitioner: &'a WeekPartitioner,
    cursor: Option<NaiveDate>,
}

impl Iterator for Windows<'_> {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        let first_day = self.cursor?;
        let last_date = self.partitioner.last_date;
        if first_day > last_date {
            self.cursor = None;
            return None;
        }

        let iso_week = first_day.iso_week();
        let mut last_day = first_day;
        while let Some(next) = last_day.succ_opt() {
            if next > last_date || next.iso_week() != iso_week {
                break;
            }
            last_day = next;
        }
        self.cursor = last_day.succ_opt();

        let tz = &self.partitioner.tz;
        Some(Window {
            start: start_of_local_day(tz, first_day),
            end: end_of_local_day(tz, last_day),
            iso_week,
        })
    }
}
