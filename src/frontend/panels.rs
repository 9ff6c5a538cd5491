//! Panel components for the monitor UI
//!
//! # Panels
//!
//! - [`ConnectionPanel`] - Port picker, connect/disconnect and link status
//! - [`MonitorPanel`] - Live readouts and the rolling chart
//! - [`ExperimentPanel`] - Capture duration, start/stop/analyze and countdown
//! - [`ResultsPanel`] - Risk assessment, statistics and the captured series

use crate::backend::FrontendReceiver;
use crate::config::ChartConfig;
use crate::frontend::chart_view::show_chart;
use crate::frontend::state::MonitorState;
use crate::frontend::widgets::{rgb, Banner, StatusIndicator, ValueDisplay};
use crate::types::{ConnectionStatus, Sample};
use egui::{Color32, RichText, Ui};
use egui_plot::{Legend, Line, Plot, PlotPoints};

/// Longest capture the duration field accepts
pub const MAX_CAPTURE_SECS: u32 = 600;

/// Port selection and connection controls
pub struct ConnectionPanel;

impl ConnectionPanel {
    pub fn render(ui: &mut Ui, state: &mut MonitorState, backend: &FrontendReceiver) {
        ui.horizontal(|ui| {
            let status = state.connection_status;
            let editable = matches!(
                status,
                ConnectionStatus::Disconnected | ConnectionStatus::Error
            );

            ui.label("Port:");
            ui.add_enabled_ui(editable, |ui| {
                let selected_text = state
                    .devices
                    .iter()
                    .find(|d| d.id == state.selected_port)
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "Select a port".to_string());

                egui::ComboBox::from_id_salt("connection_port_selector")
                    .selected_text(selected_text)
                    .width(220.0)
                    .show_ui(ui, |ui| {
                        for device in &state.devices {
                            ui.selectable_value(
                                &mut state.selected_port,
                                device.id.clone(),
                                device.to_string(),
                            );
                        }
                    });

                if ui.button("🔄").on_hover_text("Refresh ports").clicked() {
                    backend.refresh_devices();
                }
            });

            match status {
                ConnectionStatus::Disconnected | ConnectionStatus::Error => {
                    let can_connect = !state.selected_port.is_empty();
                    if ui
                        .add_enabled(can_connect, egui::Button::new("🔌 Connect"))
                        .clicked()
                    {
                        backend.connect(state.selected_port.clone());
                    }
                }
                ConnectionStatus::Connecting => {
                    ui.add_enabled(false, egui::Button::new("⏳ Connecting..."));
                }
                ConnectionStatus::Connected => {
                    if ui.button("🔌 Disconnect").clicked() {
                        backend.disconnect();
                    }
                }
            }

            ui.separator();
            ui.add(StatusIndicator::for_status(status, &state.connection.label));

            if state.is_connected() && ui.small_button("Bridge status").clicked() {
                backend.request_status();
            }
        });

        if let Some(failure) = state.stream_failure.clone() {
            ui.horizontal(|ui| {
                ui.colored_label(Color32::LIGHT_RED, failure);
                if ui.button("Reopen stream").clicked() {
                    state.stream_failure = None;
                    backend.reopen_stream();
                }
            });
        }
    }
}

/// Live readouts and chart
pub struct MonitorPanel;

impl MonitorPanel {
    pub fn render(ui: &mut Ui, state: &MonitorState, chart: &ChartConfig) {
        ui.heading("Live monitor");

        let readout = &state.readout;
        ui.horizontal(|ui| {
            ui.add(ValueDisplay::new("RMS", readout.rms_text()).with_unit("g"));
            ui.separator();
            ui.add(ValueDisplay::new("Peak", readout.max_text()).with_unit("g"));
            ui.separator();
            ui.add(ValueDisplay::new("Crest factor", readout.crest_text()));
            ui.separator();
            ui.add(ValueDisplay::new("Samples", readout.sample_count.to_string()));
        });

        ui.add_space(4.0);
        show_chart(ui, state.chart.as_ref(), chart.width, chart.height);
    }
}

/// Timed capture controls
pub struct ExperimentPanel;

impl ExperimentPanel {
    pub fn render(ui: &mut Ui, state: &mut MonitorState, backend: &FrontendReceiver) {
        ui.heading("Experiment");

        ui.horizontal(|ui| {
            ui.label("Duration:");
            ui.add_enabled(
                !state.capture.state.is_active(),
                egui::DragValue::new(&mut state.capture_duration_secs)
                    .range(1..=MAX_CAPTURE_SECS)
                    .suffix(" s"),
            );

            if ui
                .add_enabled(state.can_start_capture(), egui::Button::new("▶ Start"))
                .clicked()
            {
                backend.start_capture(state.capture_duration_secs);
            }

            if ui
                .add_enabled(state.can_stop_capture(), egui::Button::new("⏹ Stop"))
                .clicked()
            {
                backend.stop_capture();
            }

            if ui
                .add_enabled(state.can_analyze(), egui::Button::new("📊 Analyze"))
                .clicked()
            {
                backend.analyze();
            }

            if state.analyzing {
                ui.spinner();
            }
        });

        let capture = &state.capture;
        match &capture.status_text {
            Some(text) => {
                ui.label(RichText::new(text).strong());
            }
            None if state.is_connected() => {
                ui.label(RichText::new("Ready").weak());
            }
            None => {
                ui.label(RichText::new("Connect a device to capture").weak());
            }
        }

        if capture.rms_summary.count > 0 {
            let (min, max, avg) = capture.rms_summary.as_tuple();
            ui.horizontal(|ui| {
                ui.label(RichText::new("Captured RMS").small());
                ui.add(ValueDisplay::from_f64("mean", avg, 4));
                ui.add(ValueDisplay::from_f64("min", min, 4));
                ui.add(ValueDisplay::from_f64("max", max, 4));
            });
        }
    }
}

/// Analysis result display
pub struct ResultsPanel;

impl ResultsPanel {
    pub fn render(ui: &mut Ui, state: &MonitorState) {
        let Some(report) = &state.report else {
            return;
        };

        ui.heading("Results");

        let risk = &report.risk;
        let mut banner = Banner::new(rgb(risk.severity.rgb()), risk.level.clone());
        if !risk.description.is_empty() {
            banner = banner.with_body(risk.description.clone());
        }
        ui.add(banner);

        if risk.extra_warning {
            ui.colored_label(
                Color32::from_rgb(255, 170, 60),
                "⚠ Peak acceleration above 0.15 g",
            );
        }
        if let Some(text) = report.resonance_text() {
            ui.add(Banner::new(rgb([0xe7, 0x4c, 0x3c]), text));
        }

        ui.add_space(4.0);
        let stats = &report.statistics;
        egui::Grid::new("results_stats_grid")
            .num_columns(4)
            .striped(true)
            .show(ui, |ui| {
                ui.strong("Metric");
                ui.strong("Mean");
                ui.strong("Max");
                ui.strong("Min");
                ui.end_row();

                let mut row = |name: &str, m: &crate::analysis::MetricStats, precision: usize| {
                    ui.label(name);
                    ui.monospace(format!("{:.precision$}", m.mean, precision = precision));
                    ui.monospace(format!("{:.precision$}", m.max, precision = precision));
                    ui.monospace(format!("{:.precision$}", m.min, precision = precision));
                    ui.end_row();
                };
                row("RMS", &stats.rms, 4);
                row("Peak", &stats.peak, 4);
                row("Crest factor", &stats.crest, 2);
                if let Some(deviation) = &stats.deviation {
                    row("Std deviation", deviation, 4);
                }
            });

        ui.horizontal(|ui| {
            ui.add(ValueDisplay::new("Amplification", report.amplification_text()));
            ui.separator();
            ui.add(ValueDisplay::new("Samples analyzed", report.sample_count.to_string()));
        });

        for (label, text) in [
            ("Health", &risk.health_impact),
            ("Social", &risk.social_impact),
            ("Recommendation", &risk.recommendation),
        ] {
            if let Some(text) = text.as_deref().filter(|t| !t.is_empty()) {
                ui.label(format!("{}: {}", label, text));
            }
        }

        if !state.analyzed_samples.is_empty() {
            ui.add_space(4.0);
            Self::render_series(ui, &state.analyzed_samples);
        }
    }

    fn render_series(ui: &mut Ui, samples: &[Sample]) {
        Plot::new("captured_series_plot")
            .height(180.0)
            .legend(Legend::default().position(egui_plot::Corner::RightTop))
            .x_axis_label("sample")
            .show(ui, |plot_ui| {
                let rms = PlotPoints::from(series(samples, Sample::rms_or_zero));
                let peak = PlotPoints::from(series(samples, Sample::max_or_zero));
                let crest = PlotPoints::from(series(samples, Sample::crest_or_zero));
                plot_ui.line(Line::new("RMS", rms).width(1.5));
                plot_ui.line(Line::new("Peak", peak).width(1.0));
                plot_ui.line(Line::new("Crest factor", crest).width(1.0));
            });
    }
}

/// `[index, value]` pairs of one metric
fn series(samples: &[Sample], metric: fn(&Sample) -> f64) -> Vec<[f64; 2]> {
    samples
        .iter()
        .enumerate()
        .map(|(i, s)| [i as f64, metric(s)])
        .collect()
}
