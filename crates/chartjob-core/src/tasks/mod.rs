//! Task payloads and their handlers.

pub mod render_chart;

pub use render_chart::{PNG_CONTENT_TYPE, RenderChartHandler, RenderChartTask, RenderSettings};
