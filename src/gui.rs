// src/gui.rs
use anyhow::anyhow;
use eframe::egui;
use egui::Color32;
use egui_plot::{HLine, Legend, Line, Plot, PlotPoints, Points, VLine};
use crate::bode::BodeSummary;
use crate::types::SamplePoint;
const GAIN_COLOR: Color32 = Color32::from_rgb(0, 255, 255);
const PHASE_COLOR: Color32 = Color32::from_rgb(255, 0, 255);
/// Read-only Bode plot of a finished sweep.
pub struct BodeViewerApp {
    title: String,
    gain: Vec<[f64; 2]>,
    phase: Vec<[f64; 2]>,
    summary: Option<BodeSummary>,
    point_count: usize,
}
impl BodeViewerApp {
    pub fn new(title: &str, points: &[SamplePoint], summary: Option<BodeSummary>) -> Self {
        let (gain, phase) = bode_traces(points);
        Self {
            title: title.to_owned(),
            gain,
            phase,
            summary,
            point_count: points.len(),
        }
    }
    fn draw_summary(&self, ui: &mut egui::Ui) {
        ui.heading(self.title.as_str());
        ui.label(format!("{} points", self.point_count));
        ui.separator();
        match &self.summary {
            Some(s) => {
                ui.label(format!("Unity gain: {:.2} Hz", s.unity_gain_hz));
                ui.label(format!("Gain there: {:.2} dB", s.gain_at_unity_db));
                ui.label(
                    egui::RichText::new(format!("Phase margin: {:.2} deg", s.phase_margin_deg))
                        .strong()
                        .color(Color32::YELLOW),
                );
                if let Some(c) = &s.crossover {
                    ui.separator();
                    ui.label("Interpolated 0 dB crossing");
                    ui.label(format!("{:.2} Hz, PM {:.2} deg", c.frequency_hz, c.phase_margin_deg));
                }
            }
            None => {
                ui.label(egui::RichText::new("No summary available").color(Color32::RED));
            }
        }
        ui.separator();
        ui.label(egui::RichText::new("x axis: log10(frequency / Hz)").small());
    }
}
impl eframe::App for BodeViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::SidePanel::left("summary")
            .min_width(220.0)
            .show(ctx, |ui| self.draw_summary(ui));
        egui::CentralPanel::default().show(ctx, |ui| {
            let unity_x = self
                .summary
                .as_ref()
                .filter(|s| s.unity_gain_hz > 0.0)
                .map(|s| s.unity_gain_hz.log10());
            let panel_height = (ui.available_height() - 40.0).max(200.0) / 2.0;
            ui.label("Gain (dB)");
            Plot::new("gain_plot")
                .height(panel_height)
                .legend(Legend::default())
                .show(ui, |plot_ui| {
                    plot_ui.line(
                        Line::new(PlotPoints::new(self.gain.clone()))
                            .name("gain")
                            .color(GAIN_COLOR),
                    );
                    if let (Some(x), Some(s)) = (unity_x, &self.summary) {
                        plot_ui.vline(VLine::new(x).name("unity gain").color(Color32::YELLOW));
                        plot_ui.points(
                            Points::new(vec![[x, s.gain_at_unity_db]])
                                .radius(5.0)
                                .color(Color32::YELLOW),
                        );
                    }
                });
            ui.label("Phase (deg)");
            Plot::new("phase_plot")
                .height(panel_height)
                .legend(Legend::default())
                .show(ui, |plot_ui| {
                    plot_ui.line(
                        Line::new(PlotPoints::new(self.phase.clone()))
                            .name("phase")
                            .color(PHASE_COLOR),
                    );
                    if let (Some(x), Some(s)) = (unity_x, &self.summary) {
                        plot_ui.vline(VLine::new(x).name("unity gain").color(Color32::YELLOW));
                        plot_ui.hline(
                            HLine::new(-s.phase_margin_deg)
                                .name("-phase margin")
                                .color(Color32::RED),
                        );
                    }
                });
        });
    }
}
/// (log10 f, gain) and (log10 f, phase) pairs; non-positive frequencies and
/// non-finite readings are dropped.
fn bode_traces(points: &[SamplePoint]) -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
    let usable = points
        .iter()
        .filter(|p| p.set_point_hz > 0.0 && p.set_point_hz.is_finite());
    let mut gain = Vec::with_capacity(points.len());
    let mut phase = Vec::with_capacity(points.len());
    for p in usable {
        let x = p.set_point_hz.log10();
        if p.gain_db.is_finite() {
            gain.push([x, p.gain_db]);
        }
        if p.phase_deg.is_finite() {
            phase.push([x, p.phase_deg]);
        }
    }
    (gain, phase)
}
/// Blocks until the window is closed.
pub fn show(points: &[SamplePoint], summary: Option<BodeSummary>, title: &str) -> anyhow::Result<()> {
    let app = BodeViewerApp::new(title, points, summary);
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1200.0, 800.0])
        .with_min_inner_size([640.0, 480.0])
        .with_title(title);
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(title, options, Box::new(move |_cc| Box::new(app)))
        .map_err(|e| anyhow!("viewer window failed: {e}"))
}
