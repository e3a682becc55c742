use palette::{Hsl, IntoColor, Srgb};

use crate::diff::Subset;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues, as
/// `#rrggbb` strings.
pub fn generate_palette(n: usize) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            let rgb: Srgb<u8> = rgb.into_format();
            format!("#{:02x}{:02x}{:02x}", rgb.red, rgb.green, rgb.blue)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Subset → colour
// ---------------------------------------------------------------------------

/// Pair each subset label with a distinct colour, in subset order.
pub fn subset_colors(subsets: &[Subset]) -> Vec<(String, String)> {
    subsets
        .iter()
        .map(|s| s.label.clone())
        .zip(generate_palette(subsets.len()))
        .collect()
}
