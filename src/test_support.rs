use crate::measurement::RawRecord;
use serde_json::{json, Value};

pub fn raw_with(value: Value) -> RawRecord {
    value.as_object().cloned().expect("record must be a JSON object")
}

/// A BME280-style document with only temperature and humidity.
pub fn raw(
    sensor_id: &str,
    measured_at: &str,
    temperature: Option<f64>,
    humidity: Option<f64>,
) -> RawRecord {
    let mut record = raw_with(json!({
        "sensorId": sensor_id,
        "measuredAt": measured_at,
    }));
    if let Some(value) = temperature {
        record.insert("temperature".to_string(), json!(value));
    }
    if let Some(value) = humidity {
        record.insert("humidity".to_string(), json!(value));
    }
    record
}
