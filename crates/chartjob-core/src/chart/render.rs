//! Raster line chart, encoded as PNG.

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use thiserror::Error;

use super::SeriesPoint;
use super::glyphs::{GLYPH_HEIGHT, draw_text, put, text_width};

const MARGIN_LEFT: u32 = 56;
const MARGIN_RIGHT: u32 = 24;
const MARGIN_TOP: u32 = 24;
const MARGIN_BOTTOM: u32 = 48;
const MIN_PLOT: u32 = 40;

// Multiple of GRID_LINES * 50 so every grid label is a round number.
const Y_STEP: u32 = 200;
const GRID_LINES: u32 = 4;
const LABEL_SCALE: u32 = 2;
const DATE_SCALE: u32 = 1;
const DATE_GAP: u32 = 6;
const MARKER_RADIUS: i64 = 3;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([222, 222, 222]);
const LABEL: Rgb<u8> = Rgb([64, 64, 64]);
const LINE: Rgb<u8> = Rgb([31, 119, 180]);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot render an empty series")]
    EmptySeries,

    #[error("canvas {width}x{height} is too small for a chart")]
    CanvasTooSmall { width: u32, height: u32 },

    #[error("png encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartOptions {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

impl ChartOptions {
    pub fn min_width() -> u32 {
        MARGIN_LEFT + MARGIN_RIGHT + MIN_PLOT
    }

    pub fn min_height() -> u32 {
        MARGIN_TOP + MARGIN_BOTTOM + MIN_PLOT
    }
}

/// Plot area in canvas coordinates.
struct Frame {
    left: i64,
    top: i64,
    width: i64,
    height: i64,
    y_max: u32,
}

impl Frame {
    fn bottom(&self) -> i64 {
        self.top + self.height
    }

    fn right(&self) -> i64 {
        self.left + self.width
    }

    fn x_at(&self, index: usize, count: usize) -> i64 {
        if count <= 1 {
            return self.left + self.width / 2;
        }
        self.left + (index as i64 * self.width) / (count as i64 - 1)
    }

    fn y_at(&self, value: u32) -> i64 {
        let scaled = i64::from(value) * self.height / i64::from(self.y_max);
        self.bottom() - scaled
    }
}

/// Smallest multiple of `Y_STEP` that is `>= max` (and at least one step).
fn y_axis_max(max: u32) -> u32 {
    max.div_ceil(Y_STEP).max(1) * Y_STEP
}

/// Render `points` as a line chart and return PNG bytes.
///
/// One tick and `YYYY-MM-DD` label per point; labels are thinned out when
/// they would overlap.
pub fn render_line_chart(
    points: &[SeriesPoint],
    options: &ChartOptions,
) -> Result<Vec<u8>, RenderError> {
    if points.is_empty() {
        return Err(RenderError::EmptySeries);
    }
    if options.width < ChartOptions::min_width() || options.height < ChartOptions::min_height() {
        return Err(RenderError::CanvasTooSmall {
            width: options.width,
            height: options.height,
        });
    }

    let max_value = points.iter().map(|p| p.value).max().unwrap_or(0);
    let frame = Frame {
        left: i64::from(MARGIN_LEFT),
        top: i64::from(MARGIN_TOP),
        width: i64::from(options.width - MARGIN_LEFT - MARGIN_RIGHT),
        height: i64::from(options.height - MARGIN_TOP - MARGIN_BOTTOM),
        y_max: y_axis_max(max_value),
    };

    let mut img = RgbImage::from_pixel(options.width, options.height, BACKGROUND);

    draw_grid(&mut img, &frame);
    draw_axes(&mut img, &frame);
    draw_date_labels(&mut img, &frame, points);
    draw_series(&mut img, &frame, points);

    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

fn draw_grid(img: &mut RgbImage, frame: &Frame) {
    let label_height = i64::from(GLYPH_HEIGHT * LABEL_SCALE);
    for i in 0..=GRID_LINES {
        let value = frame.y_max / GRID_LINES * i;
        let y = frame.y_at(value);
        if i > 0 {
            draw_line(img, frame.left + 1, y, frame.right(), y, GRID);
        }

        let label = value.to_string();
        let x = frame.left - 8 - i64::from(text_width(&label, LABEL_SCALE));
        draw_text(img, x, y - label_height / 2, &label, LABEL_SCALE, LABEL);
    }
}

fn draw_axes(img: &mut RgbImage, frame: &Frame) {
    draw_line(img, frame.left, frame.top, frame.left, frame.bottom(), AXIS);
    draw_line(img, frame.left, frame.bottom(), frame.right(), frame.bottom(), AXIS);
}

fn draw_date_labels(img: &mut RgbImage, frame: &Frame, points: &[SeriesPoint]) {
    let count = points.len();
    let label_width = i64::from(text_width("0000-00-00", DATE_SCALE));
    let spacing = if count > 1 {
        frame.width / (count as i64 - 1)
    } else {
        frame.width
    };
    let needed = label_width + i64::from(DATE_GAP);
    let every = if spacing >= needed {
        1
    } else {
        let spacing = spacing.max(1);
        ((needed + spacing - 1) / spacing) as usize
    };

    let canvas_width = i64::from(img.width());
    for (i, point) in points.iter().enumerate() {
        let x = frame.x_at(i, count);
        draw_line(img, x, frame.bottom(), x, frame.bottom() + 4, AXIS);

        if i % every != 0 {
            continue;
        }
        let label = point.day.format("%Y-%m-%d").to_string();
        let lx = (x - label_width / 2).clamp(0, (canvas_width - label_width).max(0));
        draw_text(img, lx, frame.bottom() + 10, &label, DATE_SCALE, LABEL);
    }
}

fn draw_series(img: &mut RgbImage, frame: &Frame, points: &[SeriesPoint]) {
    let count = points.len();
    let coords: Vec<(i64, i64)> = points
        .iter()
        .enumerate()
        .map(|(i, p)| (frame.x_at(i, count), frame.y_at(p.value)))
        .collect();

    for pair in coords.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        // 2px stroke
        for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            draw_line(img, x0 + dx, y0 + dy, x1 + dx, y1 + dy, LINE);
        }
    }

    for &(x, y) in &coords {
        for dy in -MARKER_RADIUS..=MARKER_RADIUS {
            for dx in -MARKER_RADIUS..=MARKER_RADIUS {
                if dx * dx + dy * dy <= MARKER_RADIUS * MARKER_RADIUS {
                    put(img, x + dx, y + dy, LINE);
                }
            }
        }
    }
}

/// Bresenham.
fn draw_line(img: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);

    loop {
        put(img, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
