use super::figure::{AxisScale, Figure, Panel};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime, Timelike};
use plotters::coord::ranged1d::{Ranged, ValueFormatter};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;
use std::str::FromStr;

const COLOR_PALETTE: [RGBColor; 6] = [
    plotters::style::colors::full_palette::BLUE,
    plotters::style::colors::full_palette::ORANGE,
    plotters::style::colors::full_palette::GREEN,
    plotters::style::colors::full_palette::PINK,
    plotters::style::colors::full_palette::CYAN,
    plotters::style::colors::full_palette::DEEPORANGE,
];

const GRID: (usize, usize) = (4, 2);

/// Turns a finished [`Figure`] into one image file.
pub trait FigureRenderer {
    fn file_extension(&self) -> &'static str;
    fn render(&self, figure: &Figure, path: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageFormat {
    #[default]
    Svg,
    Png,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Svg => "svg",
            ImageFormat::Png => "png",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(Self::Svg),
            "png" => Ok(Self::Png),
            other => Err(format!("unknown image format {other:?} (expected svg|png)")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlottersRenderer {
    format: ImageFormat,
    size: (u32, u32),
}

impl PlottersRenderer {
    pub fn new(format: ImageFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            size: (width.max(1), height.max(1)),
        }
    }
}

impl FigureRenderer for PlottersRenderer {
    fn file_extension(&self) -> &'static str {
        self.format.extension()
    }

    fn render(&self, figure: &Figure, path: &Path) -> Result<()> {
        match self.format {
            ImageFormat::Png => {
                let root = BitMapBackend::new(path, self.size).into_drawing_area();
                draw_figure(&root, figure)?;
                root.present()
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            ImageFormat::Svg => {
                let root = SVGBackend::new(path, self.size).into_drawing_area();
                draw_figure(&root, figure)?;
                root.present()
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
        }
        Ok(())
    }
}

fn draw_figure<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, figure: &Figure) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let body = root.titled(&figure.title, ("sans-serif", 20))?;
    let areas = body.split_evenly(GRID);
    let x_range = time_axis(figure);
    for (area, panel) in areas.iter().zip(&figure.panels) {
        draw_panel(area, panel, x_range.clone())
            .with_context(|| format!("failed to draw {} panel", panel.caption()))?;
    }
    Ok(())
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    x_range: RangedDateTime<NaiveDateTime>,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let mut builder = ChartBuilder::on(area);
    builder
        .caption(panel.caption(), ("sans-serif", 16).into_font())
        .margin(10)
        .x_label_area_size(70)
        .y_label_area_size(70);

    match panel.scale() {
        AxisScale::Linear => {
            let (lo, hi) = panel
                .y_bounds()
                .map(|(lo, hi)| calculate_range(lo, hi))
                .unwrap_or((0.0, 1.0));
            let mut chart = builder.build_cartesian_2d(x_range, lo..hi)?;
            draw_series(&mut chart, panel)
        }
        AxisScale::Log => {
            let (lo, hi) = panel
                .y_bounds()
                .map(|(lo, hi)| log_range(lo, hi))
                .unwrap_or((1.0, 10.0));
            let mut chart = builder.build_cartesian_2d(x_range, (lo..hi).log_scale())?;
            draw_series(&mut chart, panel)
        }
    }
}

fn draw_series<'a, DB, Y>(
    chart: &mut ChartContext<'a, DB, Cartesian2d<RangedDateTime<NaiveDateTime>, Y>>,
    panel: &Panel,
) -> Result<()>
where
    DB: DrawingBackend + 'a,
    DB::ErrorType: 'static,
    Y: Ranged<ValueType = f64> + ValueFormatter<f64>,
{
    chart
        .configure_mesh()
        .x_labels(24)
        .x_label_style(
            ("sans-serif", 11)
                .into_font()
                .transform(FontTransform::Rotate270)
                .with_anchor::<RGBColor>(Pos::new(HPos::Right, VPos::Top)),
        )
        .x_label_formatter(&x_label)
        .set_tick_mark_size(LabelAreaPosition::Bottom, 20)
        .y_desc(panel.y_desc())
        .draw()?;

    let mut labelled = false;
    for series in &panel.series {
        let style = COLOR_PALETTE[series.color_index % COLOR_PALETTE.len()].stroke_width(1);
        let points: Vec<(NaiveDateTime, f64)> = series
            .points
            .iter()
            .map(|(ts, value)| (ts.naive_local(), *value))
            .collect();

        chart.draw_series(points.iter().map(|point| Circle::new(*point, 1, style)))?;
        let line = chart.draw_series(LineSeries::new(points, style))?;
        if let Some(label) = &series.label {
            line.label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
            labelled = true;
        }
    }

    if labelled {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.5))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

/// Window start to the instant after its last microsecond, in local wall time.
fn time_axis(figure: &Figure) -> RangedDateTime<NaiveDateTime> {
    let start = figure.start.naive_local();
    let end = (figure.end + Duration::microseconds(1)).naive_local();
    let end = if end > start { end } else { start + Duration::days(1) };
    (start..end).into()
}

fn x_label(t: &NaiveDateTime) -> String {
    if t.time().hour() == 0 && t.time().minute() == 0 {
        t.format("%Y-%m-%d %a").to_string()
    } else {
        t.format("%H:%M:%S").to_string()
    }
}

fn calculate_range(min_val: f64, max_val: f64) -> (f64, f64) {
    let range = (max_val - min_val).abs();
    let padding = if range < 1e-6 { 0.5 } else { range * 0.15 };
    (min_val - padding, max_val + padding)
}

fn log_range(min_val: f64, max_val: f64) -> (f64, f64) {
    (min_val / 1.5, max_val * 1.5)
}
