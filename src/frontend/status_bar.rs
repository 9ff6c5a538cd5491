//! Status bar panel: bottom bar showing connection, stream counters and errors.

use egui::{Color32, RichText, Ui};

use crate::error::ErrorKind;
use crate::frontend::state::MonitorState;
use crate::frontend::widgets::{status_color, status_name};

/// Context needed to render the status bar.
pub struct StatusBarContext<'a> {
    pub state: &'a MonitorState,
}

/// Message colour for an error kind
pub fn error_color(kind: ErrorKind) -> Color32 {
    match kind {
        ErrorKind::Service => Color32::from_rgb(255, 170, 60),
        ErrorKind::Transport => Color32::LIGHT_RED,
        ErrorKind::Invariant => Color32::YELLOW,
        ErrorKind::Decode | ErrorKind::Internal => Color32::RED,
    }
}

/// Render the status bar.
pub fn render_status_bar(ui: &mut Ui, ctx: &StatusBarContext<'_>) {
    let state = ctx.state;

    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;

        // === Connection ===
        ui.colored_label(status_color(state.connection_status), "●");
        let label = if state.is_connected() {
            state.connection.label.clone()
        } else {
            status_name(state.connection_status).to_string()
        };
        ui.label(RichText::new(label).small());

        ui.separator();

        // === Stream counters ===
        let stats = &state.stream_stats;
        ui.label(RichText::new(format!("Samples: {}", stats.samples)).small());

        ui.separator();

        ui.label(RichText::new(format!("Heartbeats: {}", stats.heartbeats)).small());

        ui.separator();

        let drop_color = if stats.decode_failures > 0 {
            Color32::LIGHT_RED
        } else {
            Color32::GRAY
        };
        ui.colored_label(
            drop_color,
            RichText::new(format!("Dropped: {}", stats.decode_failures)).small(),
        );

        // === Bridge link ===
        if let Some(bridge) = &state.bridge_status {
            ui.separator();
            ui.label(RichText::new(bridge.to_string()).small());
        }

        // === Error message (right-aligned) ===
        if let Some(error) = &state.last_error {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.colored_label(
                    error_color(error.kind),
                    RichText::new(&error.message).small(),
                );
            });
        }
    });
}
