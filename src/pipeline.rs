//! Week-by-week chart generation.
//!
//! One run discovers the span of stored data and the set of sensors, splits
//! the span into calendar-week windows and then, strictly one window at a
//! time: fetches the window's documents, assembles them into a sorted table,
//! adds derived columns, builds the figure and renders it to
//! `<output_dir>/<start-date>_<end-date>.<ext>`.
//!
//! A chart is drawn into a hidden sibling of its final path and renamed into
//! place once the renderer succeeds, so a failed window never leaves a file
//! that a later run would take for a finished chart.

use crate::charts::{build_figure, FigureRenderer};
use crate::derived::derive_all;
use crate::partition::{PartitionError, WeekPartitioner, Window};
use crate::series::{assemble, ParseFailurePolicy};
use crate::store::MeasurementStore;
use anyhow::Context;
use chrono_tz::Tz;
use std::fs;
use std::path::{Path, PathBuf};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub timezone: Tz,
    pub output_dir: PathBuf,
    pub on_parse_failure: ParseFailurePolicy,
    /// Re-render windows whose chart file already exists.
    pub overwrite: bool,
    /// Log a failed window and continue with the next one.
    pub keep_going: bool,
}

impl PipelineOptions {
    pub fn new(timezone: Tz, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            timezone,
            output_dir: output_dir.into(),
            on_parse_failure: ParseFailurePolicy::default(),
            overwrite: false,
            keep_going: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("cannot prepare output directory {}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to discover the stored data span")]
    Discovery(#[source] BoxError),
    #[error(transparent)]
    Partition(#[from] PartitionError),
    #[error("window {window} failed")]
    Window {
        window: String,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowStatus {
    Rendered,
    SkippedExisting,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct WindowReport {
    pub window: Window,
    pub output: PathBuf,
    pub fetched: usize,
    pub rows: usize,
    pub rejected: usize,
    pub status: WindowStatus,
}

impl WindowReport {
    fn without_rows(window: Window, output: PathBuf, status: WindowStatus) -> Self {
        Self {
            window,
            output,
            fetched: 0,
            rows: 0,
            rejected: 0,
            status,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub sensor_ids: Vec<String>,
    pub windows: Vec<WindowReport>,
}

impl RunReport {
    pub fn rendered(&self) -> usize {
        self.count(|status| *status == WindowStatus::Rendered)
    }

    pub fn skipped(&self) -> usize {
        self.count(|status| *status == WindowStatus::SkippedExisting)
    }

    pub fn failures(&self) -> Vec<&WindowReport> {
        self.windows
            .iter()
            .filter(|report| matches!(report.status, WindowStatus::Failed(_)))
            .collect()
    }

    pub fn output_paths(&self) -> Vec<&Path> {
        self.windows
            .iter()
            .map(|report| report.output.as_path())
            .collect()
    }

    fn count(&self, predicate: impl Fn(&WindowStatus) -> bool) -> usize {
        self.windows
            .iter()
            .filter(|report| predicate(&report.status))
            .count()
    }
}

pub async fn run<S, R>(
    store: &S,
    renderer: &R,
    options: &PipelineOptions,
) -> Result<RunReport, PipelineError>
where
    S: MeasurementStore,
    R: FigureRenderer,
{
    fs::create_dir_all(&options.output_dir).map_err(|source| PipelineError::OutputDir {
        path: options.output_dir.clone(),
        source,
    })?;

    let Some(bounds) = store
        .time_bounds()
        .await
        .map_err(|err| PipelineError::Discovery(err.into()))?
    else {
        tracing::warn!("store holds no measurements; nothing to chart");
        return Ok(RunReport::default());
    };
    let sensor_ids = store
        .distinct_sensor_ids()
        .await
        .map_err(|err| PipelineError::Discovery(err.into()))?;

    let tz = options.timezone;
    let partitioner =
        WeekPartitioner::new(bounds.first.with_timezone(&tz), bounds.last.with_timezone(&tz))?;
    tracing::info!(
        first = %bounds.first,
        last = %bounds.last,
        timezone = %tz,
        sensors = sensor_ids.len(),
        "charting stored measurements"
    );

    let mut report = RunReport {
        sensor_ids,
        windows: Vec::new(),
    };
    for window in &partitioner {
        let output = options.output_dir.join(format!(
            "{}.{}",
            window.file_stem(),
            renderer.file_extension()
        ));

        if !options.overwrite && output.exists() {
            tracing::info!(window = %window, output = %output.display(), "chart exists; skipping");
            report.windows.push(WindowReport::without_rows(
                window,
                output,
                WindowStatus::SkippedExisting,
            ));
            continue;
        }

        let outcome =
            chart_window(store, renderer, options, &report.sensor_ids, &window, &output).await;
        match outcome {
            Ok(window_report) => report.windows.push(window_report),
            Err(err) if options.keep_going => {
                tracing::error!(window = %window, error = %format!("{err:#}"), "window failed");
                report.windows.push(WindowReport::without_rows(
                    window,
                    output,
                    WindowStatus::Failed(format!("{err:#}")),
                ));
            }
            Err(err) => {
                return Err(PipelineError::Window {
                    window: window.to_string(),
                    source: err.into(),
                });
            }
        }
    }
    Ok(report)
}

async fn chart_window<S, R>(
    store: &S,
    renderer: &R,
    options: &PipelineOptions,
    sensor_ids: &[String],
    window: &Window,
    output: &Path,
) -> anyhow::Result<WindowReport>
where
    S: MeasurementStore,
    R: FigureRenderer,
{
    let records = store
        .fetch_range(window.start_utc(), window.end_utc())
        .await
        .context("range query failed")?;
    let assembly = assemble(&records, &options.timezone, options.on_parse_failure)
        .context("unreadable measurement")?;
    let mut series = assembly.series;
    derive_all(&mut series).context("failed to derive metrics")?;

    let figure = build_figure(window, &series, sensor_ids);
    let staging = staging_path(output);
    let rendered = renderer
        .render(&figure, &staging)
        .with_context(|| format!("failed to render {}", output.display()))
        .and_then(|()| {
            fs::rename(&staging, output)
                .with_context(|| format!("failed to move chart into {}", output.display()))
        });
    if let Err(err) = rendered {
        let _ = fs::remove_file(&staging);
        return Err(err);
    }

    tracing::info!(
        window = %window,
        fetched = records.len(),
        rows = series.len(),
        rejected = assembly.rejected.len(),
        output = %output.display(),
        "rendered chart"
    );
    Ok(WindowReport {
        window: window.clone(),
        output: output.to_path_buf(),
        fetched: records.len(),
        rows: series.len(),
        rejected: assembly.rejected.len(),
        status: WindowStatus::Rendered,
    })
}

/// `<dir>/.<name>` next to `output`. The extension is kept because the PNG
/// backend picks its encoder from it.
fn staging_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!(".{name}"))
}
