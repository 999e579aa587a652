use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::sample::Split;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    (0..n)
        .map(|i| {
            let hue = ((i as f32 / n as f32) * 360.0 + 210.0) % 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Split → Color32
// ---------------------------------------------------------------------------

/// One fixed colour per dataset split, shared by plot and legend.
#[derive(Debug, Clone)]
pub struct SplitColors {
    mapping: BTreeMap<Split, Color32>,
}

impl Default for SplitColors {
    fn default() -> Self {
        let mapping = Split::ALL
            .into_iter()
            .zip(generate_palette(Split::ALL.len()))
            .collect();
        SplitColors { mapping }
    }
}

impl SplitColors {
    pub fn color_for(&self, split: Split) -> Color32 {
        self.mapping.get(&split).copied().unwrap_or(Color32::GRAY)
    }

    /// Legend entries (split label → colour) for the UI.
    pub fn legend_entries(&self) -> Vec<(String, Color32)> {
        self.mapping
            .iter()
            .map(|(s, c)| (s.to_string(), *c))
            .collect()
    }
}
