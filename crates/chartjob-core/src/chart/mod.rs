//! Chart rendering: synthetic data and a small PNG line-chart renderer.

mod glyphs;
pub mod render;
pub mod series;

pub use render::{ChartOptions, RenderError, render_line_chart};
pub use series::{MAX_VALUE, SeriesPoint, synthetic_series};
