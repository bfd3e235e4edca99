use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

const GAP_SEARCH_MINUTES: i64 = 180;

/// First instant of `date` in `tz`.
///
/// An ambiguous local midnight resolves to the earlier instant. A midnight
/// skipped by a DST transition resolves to the first valid local time after
/// it, so consecutive days always abut.
pub fn start_of_local_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let naive = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(a, b) => earlier(a, b),
        LocalResult::None => find_next_valid_local(tz, naive, GAP_SEARCH_MINUTES)
            .unwrap_or_else(|| tz.from_utc_datetime(&naive)),
    }
}

/// Last representable instant (microsecond resolution) of `date` in `tz`.
pub fn end_of_local_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let next_start = match date.succ_opt() {
        Some(next) => start_of_local_day(tz, next),
        None => start_of_local_day(tz, date) + Duration::days(1),
    };
    next_start - Duration::microseconds(1)
}

fn earlier<Tz: TimeZone>(a: DateTime<Tz>, b: DateTime<Tz>) -> DateTime<Tz> {
    if a.with_timezone(&Utc) <= b.with_timezone(&Utc) {
        a
    } else {
        b
    }
}

fn find_next_valid_local<Tz: TimeZone>(
    tz: &Tz,
    naive: NaiveDateTime,
    max_minutes: i64,
) -> Option<DateTime<Tz>> {
    for minutes in 0..=max_minutes {
        let candidate = naive + Duration::minutes(minutes);
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return Some(dt),
            LocalResult::Ambiguous(a, b) => return Some(earlier(a, b)),
            LocalResult::None => continue,
        }
    }
    None
}
