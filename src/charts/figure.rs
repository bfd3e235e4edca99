//! Chart content for one window, independent of any drawing backend.
//!
//! A [`Figure`] is assembled completely before anything is drawn, so a
//! renderer only has to walk panels and series in order.

use crate::measurement::Field;
use crate::partition::Window;
use crate::series::WindowedSeries;
use chrono::DateTime;
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisScale {
    Linear,
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    Temperature,
    Pressure,
    RelativeHumidity,
    AbsoluteHumidity,
    EquivalentCo2,
    TotalVoc,
    EquivalentCo2Log,
    TotalVocLog,
}

impl PanelKind {
    /// Grid order, row by row in a 4x2 layout.
    pub const ALL: [PanelKind; 8] = [
        PanelKind::Temperature,
        PanelKind::Pressure,
        PanelKind::RelativeHumidity,
        PanelKind::AbsoluteHumidity,
        PanelKind::EquivalentCo2,
        PanelKind::TotalVoc,
        PanelKind::EquivalentCo2Log,
        PanelKind::TotalVocLog,
    ];

    pub fn caption(self) -> &'static str {
        match self {
            PanelKind::Temperature => "temperature",
            PanelKind::Pressure => "pressure",
            PanelKind::RelativeHumidity => "relative humidity",
            PanelKind::AbsoluteHumidity => "absolute humidity",
            PanelKind::EquivalentCo2 => "equivalent CO2",
            PanelKind::TotalVoc => "Total VOC",
            PanelKind::EquivalentCo2Log => "equivalent CO2 (log)",
            PanelKind::TotalVocLog => "Total VOC (log)",
        }
    }

    pub fn y_desc(self) -> &'static str {
        match self {
            PanelKind::Temperature => "C",
            PanelKind::Pressure => "hPa",
            PanelKind::RelativeHumidity => "%RH",
            PanelKind::AbsoluteHumidity => "g/m^3",
            PanelKind::EquivalentCo2 | PanelKind::EquivalentCo2Log => "ppm",
            PanelKind::TotalVoc | PanelKind::TotalVocLog => "ppb",
        }
    }

    pub fn scale(self) -> AxisScale {
        match self {
            PanelKind::EquivalentCo2Log | PanelKind::TotalVocLog => AxisScale::Log,
            _ => AxisScale::Linear,
        }
    }

    /// Primary field, then the fallback used when a sensor never reports it.
    fn fields(self) -> (Field, Option<Field>) {
        match self {
            PanelKind::Temperature => (Field::Temperature, None),
            PanelKind::Pressure => (Field::Pressure, None),
            PanelKind::RelativeHumidity => (Field::Humidity, None),
            PanelKind::AbsoluteHumidity => (Field::AbsoluteHumidity, None),
            PanelKind::EquivalentCo2 | PanelKind::EquivalentCo2Log => {
                (Field::ECo2, Some(Field::Co2))
            }
            PanelKind::TotalVoc | PanelKind::TotalVocLog => (Field::Tvoc, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelSeries {
    /// `None` for the cross-sensor absolute humidity series.
    pub label: Option<String>,
    /// Position of the sensor in the run's sensor list, so a sensor keeps its
    /// color across panels and windows.
    pub color_index: usize,
    pub points: Vec<(DateTime<Tz>, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub kind: PanelKind,
    pub series: Vec<PanelSeries>,
}

impl Panel {
    pub fn caption(&self) -> &'static str {
        self.kind.caption()
    }

    pub fn y_desc(&self) -> &'static str {
        self.kind.y_desc()
    }

    pub fn scale(&self) -> AxisScale {
        self.kind.scale()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.series
            .iter()
            .filter_map(|series| series.label.as_deref())
            .collect()
    }

    /// Smallest and largest plotted value, if anything is plotted.
    pub fn y_bounds(&self) -> Option<(f64, f64)> {
        self.series
            .iter()
            .flat_map(|series| series.points.iter().map(|(_, v)| *v))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub title: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub panels: Vec<Panel>,
}

impl Figure {
    pub fn panel(&self, kind: PanelKind) -> Option<&Panel> {
        self.panels.iter().find(|panel| panel.kind == kind)
    }
}

pub fn build_figure(window: &Window, series: &WindowedSeries, sensor_ids: &[String]) -> Figure {
    let panels = PanelKind::ALL
        .into_iter()
        .map(|kind| Panel {
            kind,
            series: panel_series(kind, series, sensor_ids),
        })
        .collect();
    Figure {
        title: window.to_string(),
        start: window.start,
        end: window.end,
        panels,
    }
}

fn panel_series(
    kind: PanelKind,
    series: &WindowedSeries,
    sensor_ids: &[String],
) -> Vec<PanelSeries> {
    let keep = |points: Vec<(DateTime<Tz>, f64)>| -> Vec<(DateTime<Tz>, f64)> {
        match kind.scale() {
            AxisScale::Linear => points,
            AxisScale::Log => points.into_iter().filter(|(_, v)| *v > 0.0).collect(),
        }
    };

    let (field, fallback) = kind.fields();
    if field.is_derived() {
        let points = keep(series.values(field));
        if points.is_empty() {
            return Vec::new();
        }
        return vec![PanelSeries {
            label: None,
            color_index: 0,
            points,
        }];
    }

    sensor_ids
        .iter()
        .enumerate()
        .filter_map(|(color_index, sensor_id)| {
            let mut points = series.sensor_values(sensor_id, field);
            if points.is_empty() {
                if let Some(fallback) = fallback {
                    points = series.sensor_values(sensor_id, fallback);
                }
            }
            let points = keep(points);
            (!points.is_empty()).then(|| PanelSeries {
                label: Some(sensor_id.clone()),
                color_index,
                points,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derived::derive_all;
    use crate::partition::WeekPartitioner;
    use crate::series::{assemble, ParseFailurePolicy};
    use crate::test_support::{raw, raw_with};
    use chrono::TimeZone;
    use serde_json::json;

    fn window() -> Window {
        let tz = Tz::UTC;
        let first = tz.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("first");
        let last = tz.with_ymd_and_hms(2024, 1, 7, 0, 0, 0).single().expect("last");
        WeekPartitioner::new(first, last)
            .expect("partitioner")
            .windows()
            .next()
            .expect("window")
    }

    fn table(records: Vec<crate::measurement::RawRecord>) -> WindowedSeries {
        let mut series = assemble(&records, &Tz::UTC, ParseFailurePolicy::Skip)
            .expect("assemble")
            .series;
        derive_all(&mut series).expect("derive");
        series
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn sensors_without_a_metric_are_left_out_of_its_panel() {
        let series = table(vec![
            raw_with(json!({"sensorId": "A", "measuredAt": "2024-01-02T00:00:00Z", "temperature": 20.0})),
            raw_with(json!({"sensorId": "B", "measuredAt": "2024-01-02T00:01:00Z", "pressure": 1013.0})),
        ]);
        let figure = build_figure(&window(), &series, &ids(&["A", "B"]));

        let temperature = figure.panel(PanelKind::Temperature).expect("temperature");
        assert_eq!(temperature.labels(), vec!["A"]);
        let pressure = figure.panel(PanelKind::Pressure).expect("pressure");
        assert_eq!(pressure.labels(), vec!["B"]);
        assert_eq!(pressure.series[0].color_index, 1);
        assert!(figure.panel(PanelKind::TotalVoc).expect("tvoc").is_empty());
        assert!(figure.panel(PanelKind::AbsoluteHumidity).expect("ah").is_empty());
    }

    #[test]
    fn all_panels_are_present_in_grid_order() {
        let figure = build_figure(&window(), &WindowedSeries::default(), &ids(&["A"]));
        let kinds: Vec<PanelKind> = figure.panels.iter().map(|panel| panel.kind).collect();
        assert_eq!(kinds, PanelKind::ALL.to_vec());
        assert!(figure.panels.iter().all(Panel::is_empty));
        assert_eq!(figure.title, "2024-01-01..2024-01-07 (week 2024-W01)");
    }

    #[test]
    fn co2_panels_fall_back_to_co2_per_sensor() {
        let series = table(vec![
            raw_with(json!({"sensorId": "sgp30", "measuredAt": "2024-01-02T00:00:00Z", "eCo2": 450})),
            raw_with(json!({"sensorId": "scd30", "measuredAt": "2024-01-02T00:00:05Z", "co2": 612})),
        ]);
        let figure = build_figure(&window(), &series, &ids(&["scd30", "sgp30"]));
        let co2 = figure.panel(PanelKind::EquivalentCo2).expect("co2");
        assert_eq!(co2.labels(), vec!["scd30", "sgp30"]);
        assert_eq!(co2.series[0].points[0].1, 612.0);
        assert_eq!(co2.series[1].points[0].1, 450.0);
    }

    #[test]
    fn log_panels_drop_non_positive_values() {
        let series = table(vec![
            raw_with(json!({"sensorId": "sgp30", "measuredAt": "2024-01-02T00:00:00Z", "tvoc": 0})),
            raw_with(json!({"sensorId": "sgp30", "measuredAt": "2024-01-02T00:00:01Z", "tvoc": 12})),
            raw_with(json!({"sensorId": "idle", "measuredAt": "2024-01-02T00:00:02Z", "tvoc": 0})),
        ]);
        let figure = build_figure(&window(), &series, &ids(&["idle", "sgp30"]));
        let linear = figure.panel(PanelKind::TotalVoc).expect("tvoc");
        assert_eq!(linear.labels(), vec!["idle", "sgp30"]);
        let log = figure.panel(PanelKind::TotalVocLog).expect("tvoc log");
        assert_eq!(log.labels(), vec!["sgp30"]);
        assert_eq!(log.series[0].points.len(), 1);
        assert_eq!(log.scale(), AxisScale::Log);
    }

    #[test]
    fn absolute_humidity_is_one_unlabeled_series() {
        let series = table(vec![
            raw("A", "2024-01-02T00:00:00Z", Some(20.0), Some(50.0)),
            raw("B", "2024-01-02T00:00:01Z", Some(25.0), Some(50.0)),
            raw("C", "2024-01-02T00:00:02Z", Some(25.0), None),
        ]);
        let figure = build_figure(&window(), &series, &ids(&["A", "B", "C"]));
        let ah = figure.panel(PanelKind::AbsoluteHumidity).expect("ah");
        assert_eq!(ah.series.len(), 1);
        assert_eq!(ah.series[0].label, None);
        assert_eq!(ah.series[0].points.len(), 2);
        assert!(ah.labels().is_empty());
        let (lo, hi) = ah.y_bounds().expect("bounds");
        assert!((lo - 8.62).abs() < 0.05);
        assert!((hi - 11.48).abs() < 0.05);
    }
}
