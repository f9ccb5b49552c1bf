//! TUI color theme and the stable per-resource color assignment,
//! grounded on `hud/src/tui/theme.rs` and `gui/trace.c`'s `PLOT_PALETTE`.

use ratatui::style::Color;

pub const HUD_GREEN: Color = Color::Rgb(0, 255, 0);
pub const HUD_CYAN: Color = Color::Rgb(0, 255, 255);
pub const CAUTION_AMBER: Color = Color::Rgb(255, 191, 0);
pub const CRITICAL_RED: Color = Color::Rgb(255, 0, 0);
pub const INFO_DIM: Color = Color::Rgb(0, 180, 0);
pub const IDLE_GRAY: Color = Color::Rgb(90, 90, 90);

/// Deterministic-by-id resource palette, the same idea as `PLOT_PALETTE`
/// but in `ratatui` colors. Resource 0 (no resource) always maps to
/// [`IDLE_GRAY`] rather than a palette slot.
const RESOURCE_PALETTE: &[Color] = &[
    Color::Rgb(255, 99, 71),
    Color::Rgb(255, 191, 0),
    Color::Rgb(0, 255, 255),
    Color::Rgb(186, 85, 211),
    Color::Rgb(255, 105, 180),
    Color::Rgb(100, 149, 237),
    Color::Rgb(144, 238, 144),
];

#[must_use]
pub fn resource_color(resource_id: u32) -> Color {
    if resource_id == 0 {
        return IDLE_GRAY;
    }
    RESOURCE_PALETTE[(resource_id as usize - 1) % RESOURCE_PALETTE.len()]
}

#[must_use]
pub fn gauge_bar(percentage: f64, width: usize) -> String {
    let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * width as f64) as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "|".repeat(filled), " ".repeat(empty))
}

#[must_use]
pub fn load_color(percentage: f64) -> Color {
    if percentage > 85.0 {
        CRITICAL_RED
    } else if percentage > 60.0 {
        CAUTION_AMBER
    } else {
        HUD_GREEN
    }
}
