mod figure;
mod render;

pub use figure::{build_figure, AxisScale, Figure, Panel, PanelKind, PanelSeries};
pub use render::{FigureRenderer, ImageFormat, PlottersRenderer};
