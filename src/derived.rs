use crate::measurement::Field;
use crate::series::{ColumnError, WindowedSeries};

/// A per-row quantity computed from other fields of the same row.
///
/// Rows with any missing input get a missing output; implementations only
/// ever see complete inputs.
pub trait DerivedMetric {
    fn output(&self) -> Field;
    fn inputs(&self) -> &[Field];
    fn compute(&self, inputs: &[f64]) -> Option<f64>;
}

/// Absolute humidity in g/m³ from temperature (°C) and relative humidity (%),
/// using the Magnus approximation of saturation vapour pressure.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbsoluteHumidity;

impl DerivedMetric for AbsoluteHumidity {
    fn output(&self) -> Field {
        Field::AbsoluteHumidity
    }

    fn inputs(&self) -> &[Field] {
        &[Field::Temperature, Field::Humidity]
    }

    fn compute(&self, inputs: &[f64]) -> Option<f64> {
        match inputs {
            [temperature, humidity] => {
                let value = absolute_humidity(*temperature, *humidity);
                value.is_finite().then_some(value)
            }
            _ => None,
        }
    }
}

pub fn absolute_humidity(temperature_c: f64, relative_humidity: f64) -> f64 {
    let saturation_hpa = 6.112 * ((17.62 * temperature_c) / (243.12 + temperature_c)).exp();
    let vapour_hpa = (relative_humidity / 100.0) * saturation_hpa;
    216.7 * (vapour_hpa / (273.15 + temperature_c))
}

pub fn apply(series: &mut WindowedSeries, metric: &dyn DerivedMetric) -> Result<(), ColumnError> {
    let inputs: Vec<Option<&[Option<f64>]>> = metric
        .inputs()
        .iter()
        .map(|field| series.column(*field))
        .collect();

    let mut row_inputs = Vec::with_capacity(inputs.len());
    let values = (0..series.len())
        .map(|row| {
            row_inputs.clear();
            for column in &inputs {
                match column.and_then(|values| values[row]) {
                    Some(value) => row_inputs.push(value),
                    None => return None,
                }
            }
            metric.compute(&row_inputs)
        })
        .collect();

    series.append_column(metric.output(), values)
}

/// Appends every derived column the charts use.
pub fn derive_all(series: &mut WindowedSeries) -> Result<(), ColumnError> {
    apply(series, &AbsoluteHumidity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{assemble, ParseFailurePolicy};
    use crate::test_support::{raw, raw_with};
    use chrono_tz::Tz;
    use serde_json::json;

    fn close(actual: f64, expected: f64, tolerance: f64) -> bool {
        (actual - expected).abs() <= tolerance
    }

    #[test]
    fn reference_values() {
        let warm = absolute_humidity(25.0, 50.0);
        assert!(close(warm, 11.52, 0.05), "25C/50% gave {warm}");
        let freezing = absolute_humidity(0.0, 100.0);
        assert!(close(freezing, 4.85, 0.05), "0C/100% gave {freezing}");
    }

    #[test]
    fn missing_input_gives_missing_output() {
        let records = vec![
            raw("a", "2024-01-01T00:00:00Z", Some(20.0), Some(50.0)),
            raw("a", "2024-01-01T00:01:00Z", None, Some(50.0)),
            raw("a", "2024-01-01T00:02:00Z", Some(20.0), None),
            raw("a", "2024-01-01T00:03:00Z", None, None),
        ];
        let mut series = assemble(&records, &Tz::UTC, ParseFailurePolicy::Skip)
            .expect("assemble")
            .series;
        derive_all(&mut series).expect("derive");

        let ah = series.column(Field::AbsoluteHumidity).expect("absolute humidity");
        assert!(close(ah[0].expect("first row"), 8.62, 0.05));
        assert_eq!(&ah[1..], [None::<f64>, None, None]);
    }

    #[test]
    fn derivation_leaves_raw_columns_untouched() {
        let records = vec![raw_with(json!({
            "sensorId": "scd30",
            "measuredAt": "2024-01-01T00:00:00Z",
            "temperature": 22.0,
            "humidity": 55.0,
            "co2": 800.0,
        }))];
        let mut series = assemble(&records, &Tz::UTC, ParseFailurePolicy::Skip)
            .expect("assemble")
            .series;
        derive_all(&mut series).expect("derive");

        assert_eq!(series.column(Field::Temperature).expect("t"), [Some(22.0)]);
        assert_eq!(series.column(Field::Humidity).expect("h"), [Some(55.0)]);
        assert_eq!(series.column(Field::Co2).expect("co2"), [Some(800.0)]);
    }

    #[test]
    fn deriving_twice_is_rejected() {
        let mut series = WindowedSeries::default();
        derive_all(&mut series).expect("first");
        assert!(matches!(
            derive_all(&mut series),
            Err(ColumnError::AlreadyPresent("absolute_humidity"))
        ));
    }

    #[test]
    fn degenerate_temperature_does_not_produce_infinity() {
        assert_eq!(AbsoluteHumidity.compute(&[-273.15, 50.0]), None);
        assert_eq!(AbsoluteHumidity.compute(&[20.0]), None);
    }
}
