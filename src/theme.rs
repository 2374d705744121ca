//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use grainflow::cell::SAND_VARIANTS;
use grainflow::{Cell, Material, SandVariant, Status};
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Settled grains are drawn at this fraction of their colour.
pub const SETTLED_DIM: f32 = 0.9;

/// Sand grades from coarse dark to fine pale.
const DEFAULT_SAND: [Color; SAND_VARIANTS] = [
    Color::Rgb(139, 115, 85),
    Color::Rgb(160, 130, 98),
    Color::Rgb(194, 154, 108),
    Color::Rgb(218, 165, 32),
    Color::Rgb(238, 203, 173),
    Color::Rgb(255, 228, 196),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// One colour per sand variant.
    pub sand: [Color; SAND_VARIANTS],
    pub stone: Color,
    /// Playfield background (empty cells).
    pub bg: Color,
    /// Borders.
    pub div_line: Color,
    pub main_fg: Color,
    /// Titles and labels.
    pub title: Color,
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            sand: DEFAULT_SAND,
            stone: Color::Rgb(128, 128, 128),
            bg: Color::Rgb(0, 0, 0),
            div_line: Color::Rgb(0x3F, 0x44, 0x4F),
            main_fg: Color::Rgb(0xAB, 0xB2, 0xBF),
            title: Color::Rgb(0xE5, 0xC0, 0x7B),
            inactive_fg: Color::Rgb(0x5C, 0x63, 0x70),
        }
    }
}

impl Theme {
    /// Loads a btop-style theme file; `None` gives the defaults. Keys missing from the
    /// file keep their default colour.
    pub fn load(path: Option<&Path>) -> Result<Self, ThemeError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let s = std::fs::read_to_string(path)?;
        Self::from_map(&parse_theme_file(&s))
    }

    fn from_map(map: &HashMap<String, String>) -> Result<Self, ThemeError> {
        let mut theme = Self::default();
        let get = |key: &str, slot: &mut Color| -> Result<(), ThemeError> {
            if let Some(v) = map.get(key) {
                *slot = parse_hex(v)?;
            }
            Ok(())
        };
        for (i, slot) in theme.sand.iter_mut().enumerate() {
            get(&format!("sand_{i}"), slot)?;
        }
        get("stone", &mut theme.stone)?;
        get("main_bg", &mut theme.bg)?;
        get("div_line", &mut theme.div_line)?;
        get("main_fg", &mut theme.main_fg)?;
        get("title", &mut theme.title)?;
        get("inactive_fg", &mut theme.inactive_fg)?;
        Ok(theme)
    }

    #[inline]
    pub fn sand_color(&self, variant: SandVariant) -> Color {
        self.sand[usize::from(variant.id())]
    }

    /// Colour a cell is drawn with; settled sand is dimmed.
    pub fn cell_color(&self, cell: &Cell) -> Color {
        match cell.material {
            Material::Empty => self.bg,
            Material::Stone => self.stone,
            Material::Sand(v) if cell.status == Status::Settled => dim(self.sand_color(v), SETTLED_DIM),
            Material::Sand(v) => self.sand_color(v),
        }
    }
}

/// Scales an RGB colour towards black. Named colours pass through.
pub fn dim(color: Color, factor: f32) -> Color {
    let scale = |c: u8| (f32::from(c) * factor) as u8;
    match color {
        Color::Rgb(r, g, b) => Color::Rgb(scale(r), scale(g), scale(b)),
        other => other,
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    let channel = |range: std::ops::Range<usize>| {
        s.get(range)
            .and_then(|d| u8::from_str_radix(d, 16).ok())
            .ok_or_else(invalid)
    };
    let (r, g, b) = match s.len() {
        6 => (channel(0..2)?, channel(2..4)?, channel(4..6)?),
        3 => (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17),
        _ => return Err(invalid()),
    };
    Ok(Color::Rgb(r, g, b))
}
