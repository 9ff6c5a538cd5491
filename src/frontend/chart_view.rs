//! Paints live chart frames with egui
//!
//! Frames arrive from the backend as [`DisplayList`]s sized to the configured
//! chart surface. [`EguiSurface`] replays one into a rectangle of the UI,
//! scaling surface coordinates to fit.

use crate::chart::{ChartSurface, Color, DisplayList, Point, Stroke};
use egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Sense, Ui, Vec2};

/// [`ChartSurface`] drawing into an egui painter
pub struct EguiSurface<'a> {
    painter: &'a Painter,
    rect: Rect,
    scale: Vec2,
    size: (f32, f32),
}

impl<'a> EguiSurface<'a> {
    /// Map a `width × height` surface onto `rect`
    pub fn new(painter: &'a Painter, rect: Rect, width: f32, height: f32) -> Self {
        let scale = Vec2::new(
            rect.width() / width.max(1.0),
            rect.height() / height.max(1.0),
        );
        Self {
            painter,
            rect,
            scale,
            size: (width, height),
        }
    }

    fn pos(&self, p: Point) -> Pos2 {
        self.rect.min + Vec2::new(p.x * self.scale.x, p.y * self.scale.y)
    }

    fn stroke(&self, stroke: Stroke) -> egui::Stroke {
        egui::Stroke::new(stroke.width, color(stroke.color))
    }
}

fn color(c: Color) -> Color32 {
    Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3])
}

impl ChartSurface for EguiSurface<'_> {
    fn size(&self) -> (f32, f32) {
        self.size
    }

    fn clear(&mut self) {}

    fn fill_rect(&mut self, min: Point, max: Point, c: Color) {
        let rect = Rect::from_min_max(self.pos(min), self.pos(max));
        self.painter.rect_filled(rect, 0.0, color(c));
    }

    fn line(&mut self, from: Point, to: Point, stroke: Stroke) {
        self.painter
            .line_segment([self.pos(from), self.pos(to)], self.stroke(stroke));
    }

    fn polyline(&mut self, points: &[Point], stroke: Stroke) {
        let points: Vec<Pos2> = points.iter().map(|p| self.pos(*p)).collect();
        self.painter
            .add(egui::Shape::line(points, self.stroke(stroke)));
    }

    fn text(&mut self, pos: Point, text: &str, size: f32, c: Color) {
        self.painter.text(
            self.pos(pos),
            Align2::LEFT_BOTTOM,
            text,
            FontId::proportional(size * self.scale.y.min(self.scale.x).max(0.5)),
            color(c),
        );
    }
}

/// Draw `frame` stretched over the available width, keeping its aspect ratio
pub fn show_chart(ui: &mut Ui, frame: Option<&DisplayList>, width: f32, height: f32) {
    let avail = ui.available_width().max(width.min(200.0));
    let size = Vec2::new(avail, avail * height / width.max(1.0));
    let (rect, _response) = ui.allocate_exact_size(size, Sense::hover());
    let painter = ui.painter_at(rect);

    match frame {
        Some(frame) => {
            let (w, h) = frame.size();
            let mut surface = EguiSurface::new(&painter, rect, w, h);
            frame.replay(&mut surface);
        }
        None => {
            painter.rect_filled(rect, 0.0, ui.visuals().extreme_bg_color);
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "Waiting for data",
                FontId::proportional(14.0),
                ui.visuals().weak_text_color(),
            );
        }
    }
}
