//! Live chart rendering
//!
//! [`LiveChartRenderer`] redraws the rolling window as a single RMS line on
//! top of a fixed horizontal grid. It draws through the [`ChartSurface`]
//! trait so the same code paints into egui (see `frontend::chart_view`) and
//! into a [`DisplayList`] that can be compared in tests or shipped across
//! threads.
//!
//! # Geometry
//!
//! With surface size `w × h`, padding `p`, window capacity `W` and vertical
//! divisor `d = max(peak "max" in window, floor)`, sample `i` is placed at
//!
//! ```text
//! x = p + (w - 2p) * i / (W - 1)
//! y = h - p - (h - 2p) * rms / d
//! ```
//!
//! `x` is indexed against the window capacity rather than the current
//! length, so a window that is still filling is drawn anchored to the left
//! instead of stretched across the surface.

use crate::config::ChartConfig;
use crate::session::buffer::{BufferObserver, SampleBuffer};

/// RGBA colour
pub type Color = [u8; 4];

/// A point in surface coordinates (origin top-left, y grows downwards)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Line style
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub width: f32,
    pub color: Color,
}

/// Minimal drawing target used by the renderer
pub trait ChartSurface {
    /// Surface size in pixels as `(width, height)`
    fn size(&self) -> (f32, f32);

    /// Erase everything drawn so far
    fn clear(&mut self);

    /// Fill an axis-aligned rectangle
    fn fill_rect(&mut self, min: Point, max: Point, color: Color);

    /// Draw one straight segment
    fn line(&mut self, from: Point, to: Point, stroke: Stroke);

    /// Draw connected straight segments through `points`
    fn polyline(&mut self, points: &[Point], stroke: Stroke);

    /// Draw a text label with its baseline-left corner at `pos`
    fn text(&mut self, pos: Point, text: &str, size: f32, color: Color);
}

/// One recorded drawing operation
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    FillRect { min: Point, max: Point, color: Color },
    Line { from: Point, to: Point, stroke: Stroke },
    Polyline { points: Vec<Point>, stroke: Stroke },
    Text { pos: Point, text: String, size: f32, color: Color },
}

/// A surface that records draw commands instead of rasterizing them
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayList {
    width: f32,
    height: f32,
    commands: Vec<DrawCommand>,
}

impl DisplayList {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Replay the recorded commands onto another surface
    pub fn replay(&self, target: &mut dyn ChartSurface) {
        target.clear();
        for command in &self.commands {
            match command {
                DrawCommand::FillRect { min, max, color } => target.fill_rect(*min, *max, *color),
                DrawCommand::Line { from, to, stroke } => target.line(*from, *to, *stroke),
                DrawCommand::Polyline { points, stroke } => target.polyline(points, *stroke),
                DrawCommand::Text {
                    pos,
                    text,
                    size,
                    color,
                } => target.text(*pos, text, *size, *color),
            }
        }
    }

    /// The series line, if one was drawn
    pub fn series(&self) -> Option<&[Point]> {
        self.commands.iter().find_map(|c| match c {
            DrawCommand::Polyline { points, .. } => Some(points.as_slice()),
            _ => None,
        })
    }

    /// Number of grid lines drawn
    pub fn grid_line_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Line { .. }))
            .count()
    }
}

impl ChartSurface for DisplayList {
    fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.commands.clear();
    }

    fn fill_rect(&mut self, min: Point, max: Point, color: Color) {
        self.commands.push(DrawCommand::FillRect { min, max, color });
    }

    fn line(&mut self, from: Point, to: Point, stroke: Stroke) {
        self.commands.push(DrawCommand::Line { from, to, stroke });
    }

    fn polyline(&mut self, points: &[Point], stroke: Stroke) {
        self.commands.push(DrawCommand::Polyline {
            points: points.to_vec(),
            stroke,
        });
    }

    fn text(&mut self, pos: Point, text: &str, size: f32, color: Color) {
        self.commands.push(DrawCommand::Text {
            pos,
            text: text.to_string(),
            size,
            color,
        });
    }
}

/// Stateless renderer for the live RMS chart
#[derive(Debug, Clone)]
pub struct LiveChartRenderer {
    config: ChartConfig,
}

impl LiveChartRenderer {
    pub fn new(config: ChartConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    /// Vertical divisor: the largest `max` in the window, floored
    pub fn scale_divisor(&self, buffer: &SampleBuffer) -> f64 {
        buffer
            .peak_max()
            .unwrap_or(0.0)
            .max(self.config.scale_floor)
    }

    /// Surface coordinates of every buffered sample's RMS value
    pub fn plot_points(&self, buffer: &SampleBuffer, width: f32, height: f32) -> Vec<Point> {
        let pad = self.config.padding as f64;
        let plot_w = width as f64 - 2.0 * pad;
        let plot_h = height as f64 - 2.0 * pad;
        let divisor = self.scale_divisor(buffer);
        let last_index = (buffer.capacity().max(2) - 1) as f64;

        buffer
            .values()
            .enumerate()
            .map(|(i, sample)| {
                let x = pad + plot_w * i as f64 / last_index;
                let y = height as f64 - pad - plot_h * (sample.rms_or_zero() / divisor);
                Point::new(x as f32, y as f32)
            })
            .collect()
    }

    /// Redraw the chart for the current window
    pub fn render(&self, buffer: &SampleBuffer, surface: &mut dyn ChartSurface) {
        let (width, height) = surface.size();
        let pad = self.config.padding;

        surface.clear();
        surface.fill_rect(
            Point::new(0.0, 0.0),
            Point::new(width, height),
            self.config.background,
        );

        let grid = Stroke {
            width: self.config.grid_width,
            color: self.config.grid_color,
        };
        let divisions = self.config.grid_divisions.max(1);
        for i in 0..=divisions {
            let y = pad + (height - 2.0 * pad) * i as f32 / divisions as f32;
            surface.line(Point::new(pad, y), Point::new(width - pad, y), grid);
        }

        if buffer.len() < 2 {
            return;
        }

        let points = self.plot_points(buffer, width, height);
        surface.polyline(
            &points,
            Stroke {
                width: self.config.line_width,
                color: self.config.line_color,
            },
        );
        surface.text(
            Point::new(pad, pad - 5.0),
            &self.config.label,
            self.config.label_size,
            self.config.line_color,
        );
    }

    /// Render into a fresh display list of the configured size
    pub fn render_frame(&self, buffer: &SampleBuffer) -> DisplayList {
        let mut frame = DisplayList::new(self.config.width, self.config.height);
        self.render(buffer, &mut frame);
        frame
    }
}

/// Buffer observer that renders a frame after every push and hands it on
pub struct ChartPublisher<F>
where
    F: FnMut(DisplayList) + Send,
{
    renderer: LiveChartRenderer,
    publish: F,
}

impl<F> ChartPublisher<F>
where
    F: FnMut(DisplayList) + Send,
{
    pub fn new(renderer: LiveChartRenderer, publish: F) -> Self {
        Self { renderer, publish }
    }
}

impl<F> BufferObserver for ChartPublisher<F>
where
    F: FnMut(DisplayList) + Send,
{
    fn on_push(&mut self, buffer: &SampleBuffer) {
        let frame = self.renderer.render_frame(buffer);
        (self.publish)(frame);
    }
}
