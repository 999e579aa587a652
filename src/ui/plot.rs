use eframe::egui::Ui;
use egui_plot::{Legend, Line, Plot, PlotPoints};

use crate::data::sample::Split;
use crate::state::ViewerState;

// ---------------------------------------------------------------------------
// Histogram plot (central panel)
// ---------------------------------------------------------------------------

/// Render the per-split intensity histograms in the central panel.
pub fn histogram_plot(ui: &mut Ui, state: &ViewerState) {
    if state.pixels.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a dataset to compare splits  (File → Open dataset…)");
        });
        return;
    }

    let y_label = if state.density { "Density" } else { "Pixels" };

    Plot::new("intensity_plot")
        .legend(Legend::default())
        .x_axis_label("Pixel intensity")
        .y_axis_label(y_label)
        .include_x(0.0)
        .include_x(255.0)
        .include_y(0.0)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for split in Split::ALL {
                if !state.is_visible(split) {
                    continue;
                }
                let Some(series) = state.series(split) else {
                    continue;
                };
                let points: PlotPoints = series.into_iter().collect();
                let line = Line::new(points)
                    .name(split.to_string())
                    .color(state.colors.color_for(split))
                    .width(1.5);
                plot_ui.line(line);
            }
        });
}
