use std::collections::HashMap;

use eframe::egui::Color32;

// Tableau-10 categorical palette.
const PALETTE: [Color32; 10] = [
    Color32::from_rgb(0x4e, 0x79, 0xa7),
    Color32::from_rgb(0xf2, 0x8e, 0x2c),
    Color32::from_rgb(0xe1, 0x57, 0x59),
    Color32::from_rgb(0x76, 0xb7, 0xb2),
    Color32::from_rgb(0x59, 0xa1, 0x4f),
    Color32::from_rgb(0xed, 0xc9, 0x49),
    Color32::from_rgb(0xaf, 0x7a, 0xa1),
    Color32::from_rgb(0xff, 0x9d, 0xa7),
    Color32::from_rgb(0x9c, 0x75, 0x5f),
    Color32::from_rgb(0xba, 0xb0, 0xab),
];

/// Stable categorical color assignment: colors are handed out in first-seen
/// order and cycle past ten categories, so a category keeps its color for
/// the whole session.
#[derive(Default)]
pub(in crate::app) struct CategoryPalette {
    assigned: HashMap<String, Color32>,
    next: usize,
}

impl CategoryPalette {
    pub(in crate::app) fn color_for(&mut self, category: &str) -> Color32 {
        if let Some(color) = self.assigned.get(category) {
            return *color;
        }

        let color = PALETTE[self.next % PALETTE.len()];
        self.next += 1;
        self.assigned.insert(category.to_owned(), color);
        color
    }
}
