use ratatui::style::Color;

use crate::config::{Rgb, ThemeConfig};

#[derive(Debug, Clone)]
pub struct Theme {
    pub transcript_bg: Color,
    pub insights_bg: Color,
    pub input_bg: Color,
    pub status_bg: Color,
    pub text_fg: Color,
    pub muted_fg: Color,
    pub active_fg: Color,
    pub accent_fg: Color,
    pub success_fg: Color,
    pub warning_fg: Color,
    pub error_fg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_config(&ThemeConfig::default())
    }
}

impl Theme {
    pub fn from_config(config: &ThemeConfig) -> Self {
        Self {
            transcript_bg: to_color(config.transcript_bg),
            insights_bg: to_color(config.insights_bg),
            input_bg: to_color(config.input_bg),
            status_bg: to_color(config.status_bg),
            text_fg: to_color(config.text_fg),
            muted_fg: to_color(config.muted_fg),
            active_fg: to_color(config.active_fg),
            accent_fg: to_color(config.accent_fg),
            success_fg: Color::Rgb(120, 200, 140),
            warning_fg: Color::Rgb(230, 190, 90),
            error_fg: Color::Rgb(235, 110, 110),
        }
    }
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}
