//! Color lookup: the 16-color palette, the xterm 256-color cube and ramp,
//! and the canonical labels used in annotations.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({},{},{})", self.r, self.g, self.b)
    }
}

/// Named palette in SGR order: entries 0-7 are the normal colors, 8-15 the
/// bright ones.
pub const PALETTE: [(&str, Rgb); 16] = [
    ("black", Rgb::new(0, 0, 0)),
    ("red", Rgb::new(170, 0, 0)),
    ("green", Rgb::new(0, 170, 0)),
    ("yellow", Rgb::new(170, 85, 0)),
    ("blue", Rgb::new(0, 0, 170)),
    ("magenta", Rgb::new(170, 0, 170)),
    ("cyan", Rgb::new(0, 170, 170)),
    ("white", Rgb::new(170, 170, 170)),
    ("bright-black", Rgb::new(85, 85, 85)),
    ("bright-red", Rgb::new(255, 85, 85)),
    ("bright-green", Rgb::new(85, 255, 85)),
    ("bright-yellow", Rgb::new(255, 255, 85)),
    ("bright-blue", Rgb::new(85, 85, 255)),
    ("bright-magenta", Rgb::new(255, 85, 255)),
    ("bright-cyan", Rgb::new(85, 255, 255)),
    ("bright-white", Rgb::new(255, 255, 255)),
];

const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

pub const DEFAULT_BG: Rgb = PALETTE[0].1;
pub const DEFAULT_FG: Rgb = PALETTE[7].1;

/// Palette entry for an SGR 16-color index. Out-of-range indices wrap to the
/// last entry, matching how terminals clamp.
pub fn ansi_16(index: u8) -> Rgb {
    PALETTE[usize::from(index.min(15))].1
}

/// xterm 256-color entry: the palette, a 6x6x6 cube, then a 24-step gray ramp
/// from 8 to 238.
pub fn ansi_256(index: u8) -> Rgb {
    match index {
        0..=15 => ansi_16(index),
        16..=231 => {
            let cube = index - 16;
            let level = |digit: u8| CUBE_LEVELS[usize::from(digit % 6)];
            Rgb::new(level(cube / 36), level(cube / 6), level(cube))
        }
        232..=255 => {
            let gray = 8 + 10 * (index - 232);
            Rgb::new(gray, gray, gray)
        }
    }
}

/// Canonical name of a color when it exactly matches a palette entry.
pub fn palette_name(color: Rgb) -> Option<&'static str> {
    PALETTE
        .iter()
        .find(|(_, rgb)| *rgb == color)
        .map(|(name, _)| *name)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ColorLabel(String);

impl ColorLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn classify(color: Rgb) -> ColorLabel {
    match palette_name(color) {
        Some(name) => ColorLabel(name.to_string()),
        None => ColorLabel(color.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_indices_map_to_xterm_levels() {
        let cases = [
            (16, Rgb::new(0, 0, 0)),
            (17, Rgb::new(0, 0, 95)),
            (21, Rgb::new(0, 0, 255)),
            (52, Rgb::new(95, 0, 0)),
            (88, Rgb::new(135, 0, 0)),
            (160, Rgb::new(215, 0, 0)),
            (196, Rgb::new(255, 0, 0)),
            (231, Rgb::new(255, 255, 255)),
        ];
        for (index, expected) in cases {
            assert_eq!(ansi_256(index), expected, "index {index}");
        }
    }

    #[test]
    fn grayscale_ramp_steps_by_ten() {
        assert_eq!(ansi_256(232), Rgb::new(8, 8, 8));
        assert_eq!(ansi_256(255), Rgb::new(238, 238, 238));
    }

    #[test]
    fn low_256_indices_reuse_palette() {
        assert_eq!(ansi_256(2), Rgb::new(0, 170, 0));
        assert_eq!(ansi_256(9), Rgb::new(255, 85, 85));
    }

    #[test]
    fn exact_truecolor_match_uses_name() {
        assert_eq!(classify(Rgb::new(255, 85, 85)).as_str(), "bright-red");
        assert_eq!(classify(Rgb::new(255, 85, 255)).as_str(), "bright-magenta");
        assert_eq!(classify(DEFAULT_FG).as_str(), "white");
    }

    #[test]
    fn cube_color_without_name_uses_rgb_label() {
        assert_eq!(classify(ansi_256(17)).as_str(), "rgb(0,0,95)");
        assert_eq!(classify(Rgb::new(1, 2, 3)).to_string(), "rgb(1,2,3)");
    }

    #[test]
    fn cube_color_matching_palette_uses_name() {
        // 16 and 231 land on pure black and white, which are palette entries.
        assert_eq!(classify(ansi_256(16)).as_str(), "black");
        assert_eq!(classify(ansi_256(231)).as_str(), "bright-white");
    }
}
