use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::data::sample::Split;
use crate::state::ViewerState;

// ---------------------------------------------------------------------------
// Left side panel – split toggles and statistics
// ---------------------------------------------------------------------------

/// Render the left panel.
pub fn side_panel(ui: &mut Ui, state: &mut ViewerState) {
    ui.heading("Splits");
    ui.separator();

    let Some(pixels) = state.pixels.clone() else {
        ui.label("No dataset loaded.");
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for split in Split::ALL {
                let hist = pixels.get(split);
                let color = state.colors.color_for(split);

                let mut checked = state.is_visible(split);
                let label = RichText::new(split.to_string()).strong().color(color);
                if ui.checkbox(&mut checked, label).changed() {
                    state.toggle_split(split);
                }

                egui::Grid::new(format!("{split}_stats"))
                    .num_columns(2)
                    .show(ui, |ui: &mut Ui| {
                        ui.label("Images");
                        ui.label(hist.images().to_string());
                        ui.end_row();
                        ui.label("Skipped");
                        ui.label(hist.skipped().to_string());
                        ui.end_row();
                        ui.label("Mean");
                        ui.label(format!("{:.2}", hist.mean()));
                        ui.end_row();
                        ui.label("Std");
                        ui.label(format!("{:.2}", hist.std_dev()));
                        ui.end_row();
                    });
                if let Some(path) = state.previews.get(&split) {
                    ui.add(
                        egui::Image::new(format!("file://{}", path.display()))
                            .max_width(200.0),
                    );
                }
                ui.add_space(6.0);
            }

            ui.separator();
            ui.strong("Train vs test");
            let cmp = pixels.comparison;
            ui.label(format!("Intersection: {:.4}", cmp.intersection));
            ui.label(format!("Mean delta: {:.2}", cmp.mean_delta));
            ui.label(format!("Max bin delta: {:.4}", cmp.max_bin_delta));
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut ViewerState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open dataset…").clicked() {
                open_dataset_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let (Some(source), Some(px)) = (&state.source, &state.pixels) {
            ui.label(format!(
                "{}: {} train / {} test images",
                source.display(),
                px.train.images(),
                px.test.images()
            ));
        }

        ui.separator();

        if ui.selectable_label(state.density, "Density").clicked() {
            state.density = !state.density;
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

/// Ask for a report table, then for the folder holding its images.
pub fn open_dataset_dialog(state: &mut ViewerState) {
    let Some(dataset) = rfd::FileDialog::new()
        .set_title("Open report dataset")
        .add_filter("Supported files", &["csv", "json", "parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file()
    else {
        return;
    };

    let start = dataset.parent().map(|p| p.to_path_buf()).unwrap_or_default();
    let Some(images) = rfd::FileDialog::new()
        .set_title("Select the image folder")
        .set_directory(&start)
        .pick_folder()
    else {
        return;
    };

    state.load(&dataset, &images);
    if state.status_message.is_none() {
        log::info!("Loaded histograms for {}", dataset.display());
    }
}
