use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "weekly-sensor-charts",
    version,
    about = "Render one multi-panel sensor chart per calendar week"
)]
pub struct Args {
    /// Read measurements from a CSV export instead of the database.
    #[arg(long)]
    pub csv: Option<PathBuf>,
    #[arg(long)]
    pub database_url: Option<String>,
    /// IANA timezone used for week boundaries and axis labels.
    #[arg(long)]
    pub timezone: Option<String>,
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
    /// Write PNG instead of SVG.
    #[arg(long, default_value_t = false)]
    pub png: bool,
    #[arg(short = 'x', long)]
    pub width: Option<u32>,
    #[arg(short = 'y', long)]
    pub height: Option<u32>,
    /// Re-render weeks whose chart file already exists.
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
    /// Continue with the next week when one fails; exit non-zero at the end.
    #[arg(long, default_value_t = false)]
    pub keep_going: bool,
    /// Fail a week on the first unreadable record instead of dropping it.
    #[arg(long, default_value_t = false)]
    pub abort_on_parse_failure: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_size_flags() {
        let args = Args::try_parse_from([
            "weekly-sensor-charts",
            "--csv",
            "dump.csv",
            "-x",
            "1600",
            "-y",
            "1200",
            "--png",
            "--keep-going",
        ])
        .expect("args");
        assert_eq!(args.csv, Some(PathBuf::from("dump.csv")));
        assert_eq!(args.width, Some(1600));
        assert_eq!(args.height, Some(1200));
        assert!(args.png);
        assert!(args.keep_going);
        assert!(!args.overwrite);
    }
}
