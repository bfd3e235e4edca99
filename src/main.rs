use anyhow::{bail, Context, Result};
use clap::Parser;
use weekly_sensor_charts::charts::PlottersRenderer;
use weekly_sensor_charts::cli::Args;
use weekly_sensor_charts::config::Config;
use weekly_sensor_charts::db;
use weekly_sensor_charts::pipeline::{self, RunReport};
use weekly_sensor_charts::store::{load_csv, PgStore};

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,weekly_sensor_charts=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;
    let config = Config::load(&args)?;

    let renderer = PlottersRenderer::new(config.image_format, config.width, config.height);
    let options = config.pipeline_options();

    let report = match config.csv_path.as_deref() {
        Some(path) => {
            let store = load_csv(path, config.on_parse_failure)?;
            pipeline::run(&store, &renderer, &options).await?
        }
        None => {
            let database_url = config
                .database_url
                .as_deref()
                .context("CHARTS_DATABASE_URL or DATABASE_URL is required unless --csv is given")?;
            tracing::info!(database = %db::redact(database_url), "reading measurements from postgres");
            let pool = db::connect_lazy(database_url, config.db_pool_size)?;
            pipeline::run(&PgStore::new(pool), &renderer, &options).await?
        }
    };

    summarize(&report)
}

fn summarize(report: &RunReport) -> Result<()> {
    let failures = report.failures();
    tracing::info!(
        windows = report.windows.len(),
        rendered = report.rendered(),
        skipped = report.skipped(),
        failed = failures.len(),
        "run finished"
    );
    for failure in &failures {
        tracing::error!(window = %failure.window, status = ?failure.status, "window not charted");
    }
    if !failures.is_empty() {
        bail!("{} of {} windows failed", failures.len(), report.windows.len());
    }
    Ok(())
}
