use eframe::egui;

use crate::state::ViewerState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct XReportViewer {
    pub state: ViewerState,
}

impl XReportViewer {
    pub fn new(state: ViewerState) -> Self {
        Self { state }
    }
}

impl eframe::App for XReportViewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: splits and statistics ----
        egui::SidePanel::left("split_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: histograms ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::histogram_plot(ui, &self.state);
        });
    }
}
