use crate::charts::ImageFormat;
use crate::cli::Args;
use crate::pipeline::PipelineOptions;
use crate::series::ParseFailurePolicy;
use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Tokyo;
const DEFAULT_SIZE: u32 = 1000;
const DEFAULT_DB_POOL_SIZE: u32 = 2;

/// Keys accepted in the JSON file named by `CHARTS_CONFIG_PATH`.
#[derive(Debug, Clone, Default, Deserialize)]
struct FileOverrides {
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    output_dir: Option<PathBuf>,
    #[serde(default)]
    image_format: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    on_parse_failure: Option<String>,
    #[serde(default)]
    db_pool_size: Option<u32>,
}

fn load_file_overrides(path: &Path) -> Result<FileOverrides> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: Option<String>,
    pub db_pool_size: u32,
    pub csv_path: Option<PathBuf>,
    pub timezone: Tz,
    pub output_dir: PathBuf,
    pub image_format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub on_parse_failure: ParseFailurePolicy,
    pub overwrite: bool,
    pub keep_going: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            db_pool_size: DEFAULT_DB_POOL_SIZE,
            csv_path: None,
            timezone: DEFAULT_TIMEZONE,
            output_dir: PathBuf::from("."),
            image_format: ImageFormat::default(),
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
            on_parse_failure: ParseFailurePolicy::default(),
            overwrite: false,
            keep_going: false,
        }
    }
}

impl Config {
    /// `.env` and process environment, then the config file, then `args`.
    /// Environment values win over the config file; flags win over both.
    pub fn load(args: &Args) -> Result<Self> {
        dotenv().ok();
        let lookup = |key: &str| env::var(key).ok();
        let overrides = match env_value(&lookup, "CHARTS_CONFIG_PATH") {
            Some(path) => load_file_overrides(Path::new(&path))?,
            None => FileOverrides::default(),
        };
        let mut config = Self::from_sources(&lookup, &overrides)?;
        config.apply_args(args)?;
        Ok(config)
    }

    fn from_sources(
        lookup: &dyn Fn(&str) -> Option<String>,
        file: &FileOverrides,
    ) -> Result<Self> {
        let mut config = Self::default();

        let pick = |keys: &[&str], from_file: Option<&str>| -> Option<String> {
            keys.iter()
                .find_map(|key| env_value(lookup, key))
                .or_else(|| {
                    from_file
                        .map(str::trim)
                        .filter(|value| !value.is_empty())
                        .map(str::to_string)
                })
        };

        config.database_url = pick(
            &["CHARTS_DATABASE_URL", "DATABASE_URL"],
            file.database_url.as_deref(),
        )
        .map(normalize_database_url);

        if let Some(name) = pick(&["CHARTS_TIMEZONE"], file.timezone.as_deref()) {
            config.timezone = parse_timezone(&name)?;
        }
        if let Some(dir) = env_value(lookup, "CHARTS_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        } else if let Some(dir) = file.output_dir.clone() {
            config.output_dir = dir;
        }
        if let Some(format) = pick(&["CHARTS_IMAGE_FORMAT"], file.image_format.as_deref()) {
            config.image_format = format.parse().map_err(|err: String| anyhow!(err))?;
        }
        if let Some(policy) = pick(&["CHARTS_ON_PARSE_FAILURE"], file.on_parse_failure.as_deref()) {
            config.on_parse_failure = policy.parse().map_err(|err: String| anyhow!(err))?;
        }

        config.width = env_number(lookup, "CHARTS_WIDTH")
            .or(file.width)
            .filter(|v| *v != 0)
            .unwrap_or(DEFAULT_SIZE);
        config.height = env_number(lookup, "CHARTS_HEIGHT")
            .or(file.height)
            .filter(|v| *v != 0)
            .unwrap_or(DEFAULT_SIZE);
        config.db_pool_size = env_number(lookup, "CHARTS_DB_POOL_SIZE")
            .or(file.db_pool_size)
            .filter(|v| *v != 0)
            .unwrap_or(DEFAULT_DB_POOL_SIZE);

        Ok(config)
    }

    fn apply_args(&mut self, args: &Args) -> Result<()> {
        if let Some(url) = args.database_url.as_deref().map(str::trim) {
            if !url.is_empty() {
                self.database_url = Some(normalize_database_url(url.to_string()));
            }
        }
        if let Some(name) = args.timezone.as_deref() {
            self.timezone = parse_timezone(name)?;
        }
        if let Some(dir) = args.out_dir.clone() {
            self.output_dir = dir;
        }
        if let Some(width) = args.width.filter(|v| *v != 0) {
            self.width = width;
        }
        if let Some(height) = args.height.filter(|v| *v != 0) {
            self.height = height;
        }
        if args.png {
            self.image_format = ImageFormat::Png;
        }
        if args.abort_on_parse_failure {
            self.on_parse_failure = ParseFailurePolicy::Abort;
        }
        self.csv_path = args.csv.clone();
        self.overwrite = args.overwrite;
        self.keep_going = args.keep_going;
        Ok(())
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            timezone: self.timezone,
            output_dir: self.output_dir.clone(),
            on_parse_failure: self.on_parse_failure,
            overwrite: self.overwrite,
            keep_going: self.keep_going,
        }
    }
}

fn env_value(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_number(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<u32> {
    env_value(lookup, key).and_then(|value| value.parse::<u32>().ok())
}

fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|err| anyhow!("invalid timezone {name:?}: {err}"))
}

fn normalize_database_url(url: String) -> String {
    if let Some(stripped) = url.strip_prefix("postgresql+psycopg://") {
        return format!("postgresql://{stripped}");
    }
    if let Some(stripped) = url.strip_prefix("postgresql+asyncpg://") {
        return format!("postgresql://{stripped}");
    }
    url
}
