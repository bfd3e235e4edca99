//! Raw measurement documents and their typed form.
//!
//! Documents in the store are heterogeneous: a BME280 device reports
//! temperature, humidity and pressure, an SGP30 reports tvoc and eCo2, an
//! SCD30 reports co2 plus temperature and humidity. A field a device does not
//! report is simply absent from its documents and stays `None` here.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;

pub type RawRecord = serde_json::Map<String, Value>;

pub const MEASURED_AT: &str = "measuredAt";
pub const SENSOR_ID: &str = "sensorId";
pub const MESSAGE_ID: &str = "messageId";
pub const ID: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Temperature,
    Humidity,
    Pressure,
    Tvoc,
    ECo2,
    Co2,
    AbsoluteHumidity,
}

impl Field {
    /// Fields read straight from the stored documents.
    pub const RAW: [Field; 6] = [
        Field::Temperature,
        Field::Humidity,
        Field::Pressure,
        Field::Tvoc,
        Field::ECo2,
        Field::Co2,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            Field::Temperature => "temperature",
            Field::Humidity => "humidity",
            Field::Pressure => "pressure",
            Field::Tvoc => "tvoc",
            Field::ECo2 => "eCo2",
            Field::Co2 => "co2",
            Field::AbsoluteHumidity => "absolute_humidity",
        }
    }

    pub fn from_column_name(name: &str) -> Option<Field> {
        Field::RAW
            .into_iter()
            .chain(std::iter::once(Field::AbsoluteHumidity))
            .find(|field| field.column_name() == name)
    }

    pub fn is_derived(self) -> bool {
        matches!(self, Field::AbsoluteHumidity)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("record has no measuredAt")]
    MissingTimestamp,
    #[error("invalid measuredAt {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },
    #[error("record has no sensorId")]
    MissingSensorId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub sensor_id: String,
    pub measured_at: DateTime<Tz>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub tvoc: Option<f64>,
    pub e_co2: Option<f64>,
    pub co2: Option<f64>,
    pub id: Option<String>,
    pub message_id: Option<String>,
}

impl Measurement {
    /// Value of a stored field. Derived fields are never part of a measurement.
    pub fn value(&self, field: Field) -> Option<f64> {
        match field {
            Field::Temperature => self.temperature,
            Field::Humidity => self.humidity,
            Field::Pressure => self.pressure,
            Field::Tvoc => self.tvoc,
            Field::ECo2 => self.e_co2,
            Field::Co2 => self.co2,
            Field::AbsoluteHumidity => None,
        }
    }
}

pub fn normalize_record(raw: &RawRecord, tz: &Tz) -> Result<Measurement, RecordError> {
    let measured_at = record_measured_at(raw)?;

    let sensor_id = raw
        .get(SENSOR_ID)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(RecordError::MissingSensorId)?
        .to_string();

    Ok(Measurement {
        measured_at: measured_at.with_timezone(tz),
        temperature: numeric_field(raw, Field::Temperature, &sensor_id),
        humidity: numeric_field(raw, Field::Humidity, &sensor_id),
        pressure: numeric_field(raw, Field::Pressure, &sensor_id),
        tvoc: numeric_field(raw, Field::Tvoc, &sensor_id),
        e_co2: numeric_field(raw, Field::ECo2, &sensor_id),
        co2: numeric_field(raw, Field::Co2, &sensor_id),
        id: string_field(raw, ID),
        message_id: string_field(raw, MESSAGE_ID),
        sensor_id,
    })
}

/// The document's `measuredAt` as an instant.
pub fn record_measured_at(raw: &RawRecord) -> Result<DateTime<Utc>, RecordError> {
    match raw.get(MEASURED_AT) {
        None | Some(Value::Null) => Err(RecordError::MissingTimestamp),
        Some(Value::String(value)) => parse_measured_at(value),
        Some(other) => Err(RecordError::InvalidTimestamp {
            value: other.to_string(),
            reason: "expected an ISO-8601 string".to_string(),
        }),
    }
}

/// Parses the stored timestamp. Offset-less values are taken as UTC, which is
/// how the devices write them.
pub fn parse_measured_at(raw: &str) -> Result<DateTime<Utc>, RecordError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RecordError::MissingTimestamp);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(RecordError::InvalidTimestamp {
        value: trimmed.to_string(),
        reason: "not an ISO-8601 timestamp".to_string(),
    })
}

fn numeric_field(raw: &RawRecord, field: Field, sensor_id: &str) -> Option<f64> {
    let value = match raw.get(field.column_name()) {
        None | Some(Value::Null) => return None,
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<f64>() {
                Ok(parsed) => Some(parsed),
                Err(_) => {
                    tracing::warn!(
                        sensor = %sensor_id,
                        field = field.column_name(),
                        value = %trimmed,
                        "non-numeric value treated as missing"
                    );
                    return None;
                }
            }
        }
        Some(other) => {
            tracing::warn!(
                sensor = %sensor_id,
                field = field.column_name(),
                value = %other,
                "non-numeric value treated as missing"
            );
            return None;
        }
    };
    value.filter(|v| v.is_finite())
}

fn string_field(raw: &RawRecord, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(value: serde_json::Value) -> RawRecord {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn converts_timestamp_into_target_timezone() {
        let raw = record(json!({
            "sensorId": "m5stack-bme280-device-bme280",
            "measuredAt": "2024-01-01T15:30:00Z",
            "temperature": 21.5,
        }));
        let m = normalize_record(&raw, &chrono_tz::Asia::Tokyo).expect("normalize");
        let expected = chrono_tz::Asia::Tokyo
            .with_ymd_and_hms(2024, 1, 2, 0, 30, 0)
            .single()
            .expect("tokyo");
        assert_eq!(m.measured_at, expected);
        assert_eq!(m.temperature, Some(21.5));
    }

    #[test]
    fn absent_fields_stay_missing_not_zero() {
        let raw = record(json!({
            "sensorId": "m5stack-bme280-device-sgp30",
            "measuredAt": "2024-01-01T00:00:00Z",
            "tvoc": 12,
            "eCo2": 400,
            "humidity": null,
        }));
        let m = normalize_record(&raw, &Tz::UTC).expect("normalize");
        assert_eq!(m.tvoc, Some(12.0));
        assert_eq!(m.e_co2, Some(400.0));
        assert_eq!(m.temperature, None);
        assert_eq!(m.humidity, None);
        assert_eq!(m.pressure, None);
        assert_eq!(m.co2, None);
    }

    #[test]
    fn numeric_strings_from_csv_dumps_are_parsed() {
        let raw = record(json!({
            "sensorId": "scd30",
            "measuredAt": "2024-01-01T09:00:00+0900",
            "co2": "612.5",
            "pressure": "",
            "temperature": "warm",
        }));
        let m = normalize_record(&raw, &Tz::UTC).expect("normalize");
        assert_eq!(m.co2, Some(612.5));
        assert_eq!(m.pressure, None);
        assert_eq!(m.temperature, None);
        assert_eq!(
            m.measured_at,
            Tz::UTC.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("utc")
        );
    }

    #[test]
    fn unknown_fields_are_ignored_and_identity_is_kept() {
        let raw = record(json!({
            "id": "b5f0",
            "messageId": 42,
            "sensorId": "bme280",
            "measuredAt": "2024-01-01T00:00:00.250Z",
            "batteryVoltage": 4.1,
        }));
        let m = normalize_record(&raw, &Tz::UTC).expect("normalize");
        assert_eq!(m.id.as_deref(), Some("b5f0"));
        assert_eq!(m.message_id.as_deref(), Some("42"));
        assert_eq!(m.measured_at.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let raw = record(json!({"sensorId": "bme280", "measuredAt": "yesterday"}));
        let err = normalize_record(&raw, &Tz::UTC).unwrap_err();
        assert!(matches!(err, RecordError::InvalidTimestamp { .. }));

        let raw = record(json!({"sensorId": "bme280"}));
        let err = normalize_record(&raw, &Tz::UTC).unwrap_err();
        assert!(matches!(err, RecordError::MissingTimestamp));

        let raw = record(json!({"sensorId": "bme280", "measuredAt": 1704067200}));
        let err = normalize_record(&raw, &Tz::UTC).unwrap_err();
        assert!(matches!(err, RecordError::InvalidTimestamp { .. }));
    }

    #[test]
    fn missing_sensor_id_is_an_error() {
        let raw = record(json!({"sensorId": "  ", "measuredAt": "2024-01-01T00:00:00Z"}));
        let err = normalize_record(&raw, &Tz::UTC).unwrap_err();
        assert!(matches!(err, RecordError::MissingSensorId));
    }

    #[test]
    fn offsetless_timestamps_are_utc() {
        let parsed = parse_measured_at("2024-03-05 06:07:08").expect("parse");
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2024, 3, 5, 6, 7, 8).single().expect("utc")
        );
    }

    #[test]
    fn column_names_round_trip() {
        for field in Field::RAW {
            assert_eq!(Field::from_column_name(field.column_name()), Some(field));
        }
        assert_eq!(
            Field::from_column_name("absolute_humidity"),
            Some(Field::AbsoluteHumidity)
        );
        assert!(Field::AbsoluteHumidity.is_derived());
        assert_eq!(Field::from_column_name("voltage"), None);
    }
}
