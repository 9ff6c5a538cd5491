//! Custom widgets for the monitor UI
//!
//! - [`StatusIndicator`] - Colored status dot with label
//! - [`ValueDisplay`] - Formatted value with label and optional unit
//! - [`Banner`] - Full-width coloured message box

use crate::types::ConnectionStatus;
use egui::{Color32, Response, RichText, Ui, Widget};

/// A widget that displays a colored status indicator
pub struct StatusIndicator {
    color: Color32,
    label: String,
    tooltip: Option<String>,
}

impl StatusIndicator {
    pub fn new(color: Color32, label: impl Into<String>) -> Self {
        Self {
            color,
            label: label.into(),
            tooltip: None,
        }
    }

    /// Indicator for a connection status, using `label` as text when given
    pub fn for_status(status: ConnectionStatus, label: &str) -> Self {
        let color = status_color(status);
        if label.is_empty() {
            Self::new(color, status_name(status))
        } else {
            Self::new(color, label)
        }
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }
}

impl Widget for StatusIndicator {
    fn ui(self, ui: &mut Ui) -> Response {
        let response = ui
            .horizontal(|ui| {
                ui.colored_label(self.color, "●");
                ui.label(&self.label);
            })
            .response;

        if let Some(tooltip) = self.tooltip {
            response.on_hover_text(tooltip)
        } else {
            response
        }
    }
}

/// Dot colour for a connection status
pub fn status_color(status: ConnectionStatus) -> Color32 {
    match status {
        ConnectionStatus::Connected => Color32::GREEN,
        ConnectionStatus::Connecting => Color32::YELLOW,
        ConnectionStatus::Disconnected => Color32::GRAY,
        ConnectionStatus::Error => Color32::RED,
    }
}

pub fn status_name(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Connected => "Connected",
        ConnectionStatus::Connecting => "Connecting...",
        ConnectionStatus::Disconnected => "Disconnected",
        ConnectionStatus::Error => "Error",
    }
}

/// A widget for displaying a value with a label and optional unit
pub struct ValueDisplay {
    label: String,
    value: String,
    unit: Option<String>,
    color: Option<Color32>,
}

impl ValueDisplay {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            unit: None,
            color: None,
        }
    }

    /// Value formatted with a fixed number of decimals
    pub fn from_f64(label: impl Into<String>, value: f64, precision: usize) -> Self {
        Self::new(label, format!("{:.precision$}", value, precision = precision))
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_color(mut self, color: Color32) -> Self {
        self.color = Some(color);
        self
    }
}

impl Widget for ValueDisplay {
    fn ui(self, ui: &mut Ui) -> Response {
        ui.horizontal(|ui| {
            ui.label(format!("{}:", self.label));

            let value_text = match self.unit {
                Some(unit) => format!("{} {}", self.value, unit),
                None => self.value,
            };

            let text = RichText::new(value_text).monospace();
            match self.color {
                Some(color) => ui.colored_label(color, text),
                None => ui.strong(text),
            };
        })
        .response
    }
}

/// Coloured full-width message box
pub struct Banner {
    color: Color32,
    title: String,
    body: Option<String>,
}

impl Banner {
    pub fn new(color: Color32, title: impl Into<String>) -> Self {
        Self {
            color,
            title: title.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

impl Widget for Banner {
    fn ui(self, ui: &mut Ui) -> Response {
        egui::Frame::new()
            .fill(self.color)
            .corner_radius(4.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.label(RichText::new(self.title).strong().color(Color32::WHITE));
                if let Some(body) = self.body {
                    ui.label(RichText::new(body).color(Color32::WHITE));
                }
            })
            .response
    }
}

/// Convert an `[r, g, b]` triple
pub fn rgb(color: [u8; 3]) -> Color32 {
    Color32::from_rgb(color[0], color[1], color[2])
}
