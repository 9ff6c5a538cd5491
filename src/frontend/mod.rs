//! Frontend module for the monitor UI
//!
//! This module contains the egui application. It never touches the network:
//! every action is sent to the backend thread as a command, and everything
//! it displays arrives as a [`BackendMessage`](crate::backend::BackendMessage)
//! folded into [`MonitorState`].
//!
//! # Layout
//!
//! - Top: connection panel
//! - Bottom: status bar
//! - Center: live monitor, experiment controls and analysis results

pub mod chart_view;
pub mod panels;
pub mod state;
pub mod status_bar;
pub mod widgets;

pub use state::{MonitorState, UiError};

use crate::backend::FrontendReceiver;
use crate::config::AppConfig;
use panels::{ConnectionPanel, ExperimentPanel, MonitorPanel, ResultsPanel};
use status_bar::{render_status_bar, StatusBarContext};

/// Main application
pub struct MonitorApp {
    frontend: FrontendReceiver,
    config: AppConfig,
    state: MonitorState,
    #[cfg(feature = "mock-bridge")]
    use_simulated: bool,
}

impl MonitorApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, frontend: FrontendReceiver, config: AppConfig) -> Self {
        let state = MonitorState::new(config.capture.default_duration_secs);
        frontend.refresh_devices();

        Self {
            frontend,
            config,
            state,
            #[cfg(feature = "mock-bridge")]
            use_simulated: false,
        }
    }

    fn process_backend_messages(&mut self) -> bool {
        let messages = self.frontend.drain();
        let had_messages = !messages.is_empty();

        for msg in messages {
            self.state.apply(msg);
        }

        had_messages
    }

    #[cfg(feature = "mock-bridge")]
    fn render_simulation_toggle(&mut self, ui: &mut egui::Ui) {
        let editable = !self.state.is_connected();
        let response = ui.add_enabled(
            editable,
            egui::Checkbox::new(&mut self.use_simulated, "Simulated device"),
        );
        if response.changed() {
            self.frontend.use_simulated_bridge(self.use_simulated);
            self.frontend.refresh_devices();
        }
    }
}

impl eframe::App for MonitorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let had_messages = self.process_backend_messages();

        if self.state.is_connected() || self.state.analyzing || had_messages {
            ctx.request_repaint();
        }

        egui::TopBottomPanel::top("connection_panel").show(ctx, |ui| {
            ui.add_space(4.0);
            ConnectionPanel::render(ui, &mut self.state, &self.frontend);
            #[cfg(feature = "mock-bridge")]
            self.render_simulation_toggle(ui);
            ui.add_space(2.0);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            render_status_bar(ui, &StatusBarContext { state: &self.state });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.state.backend_stopped {
                ui.colored_label(egui::Color32::RED, "Backend stopped. Restart the application.");
            }

            egui::ScrollArea::vertical().show(ui, |ui| {
                MonitorPanel::render(ui, &self.state, &self.config.chart);
                ui.separator();
                ExperimentPanel::render(ui, &mut self.state, &self.frontend);
                if self.state.report.is_some() {
                    ui.separator();
                    ResultsPanel::render(ui, &self.state);
                }
            });
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.frontend.shutdown();
    }
}
