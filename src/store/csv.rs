use super::MemoryStore;
use crate::measurement::RawRecord;
use crate::series::ParseFailurePolicy;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Loads a CSV export of the measurement container.
///
/// The header row names the document fields (`measuredAt`, `sensorId`,
/// `temperature`, ...). Cells are kept as strings and an empty cell means the
/// field is absent from that document, so numeric parsing happens in the same
/// place it does for documents from the database. A row whose `measuredAt`
/// cannot be read is handled by `policy`, see [`MemoryStore::with_policy`].
pub fn load_csv(path: &Path, policy: ParseFailurePolicy) -> Result<MemoryStore> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let records = read_csv(file).with_context(|| format!("failed to read {}", path.display()))?;
    let rows = records.len();
    let store = MemoryStore::with_policy(records, policy)
        .with_context(|| format!("unreadable record in {}", path.display()))?;
    tracing::info!(path = %path.display(), rows, unplaced = store.unplaced(), "loaded csv export");
    Ok(store)
}

pub fn read_csv<R: Read>(reader: R) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers().context("missing header row")?.clone();

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("malformed csv row {}", line + 2))?;
        let record: RawRecord = headers
            .iter()
            .zip(row.iter())
            .filter(|(name, cell)| !name.is_empty() && !cell.is_empty())
            .map(|(name, cell)| (name.to_string(), Value::String(cell.to_string())))
            .collect();
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MeasurementStore;
    use std::io::Write;

    const EXPORT: &str = "\
measuredAt,messageId,sensorId,temperature,humidity,pressure,tvoc,eCo2,co2
2024-01-01T00:00:00Z,1,m5-bme280,21.5,40.0,1012.3,,,
2024-01-01T00:00:10Z,2,m5-sgp30,,,,15,420,
2024-01-01T00:00:20Z,3,m5-scd30,22.1,38.5,,,,611
";

    #[test]
    fn empty_cells_are_absent_fields() {
        let records = read_csv(EXPORT.as_bytes()).expect("read");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get("pressure"), Some(&Value::String("1012.3".into())));
        assert!(records[0].get("tvoc").is_none());
        assert!(records[1].get("temperature").is_none());
        assert_eq!(records[2].get("co2"), Some(&Value::String("611".into())));
    }

    #[tokio::test]
    async fn loads_a_file_into_a_store() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(EXPORT.as_bytes()).expect("write");

        let store = load_csv(file.path(), ParseFailurePolicy::Skip).expect("load");
        assert_eq!(store.len(), 3);
        assert_eq!(
            store.distinct_sensor_ids().await.expect("ids"),
            vec!["m5-bme280", "m5-scd30", "m5-sgp30"]
        );
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_csv(Path::new("/nonexistent/export.csv"), ParseFailurePolicy::Skip).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/export.csv"));
    }

    #[test]
    fn abort_policy_fails_the_load_on_a_bad_timestamp() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "{EXPORT}not-a-time,4,m5-bme280,20.0,41.0,,,,\n").expect("write");

        let err = load_csv(file.path(), ParseFailurePolicy::Abort).unwrap_err();
        let chain = format!("{err:#}");
        assert!(chain.contains("unreadable record"));
        assert!(chain.contains("not-a-time"));

        let store = load_csv(file.path(), ParseFailurePolicy::Skip).expect("skip");
        assert_eq!(store.len(), 3);
        assert_eq!(store.unplaced(), 1);
    }
}
