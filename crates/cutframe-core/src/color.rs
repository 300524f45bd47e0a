//! Color type and CSS color parsing.

use crate::error::{CutframeError, Result};
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// RGBA color with 32-bit float components in `0.0..=1.0`, straight alpha.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// Create a new color from RGBA components.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a color from RGB with alpha = 1.0.
    #[inline]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color from 8-bit RGBA values.
    #[inline]
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// Convert to 8-bit RGBA.
    #[inline]
    pub fn to_rgba8(self) -> [u8; 4] {
        [
            (self.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.b.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.a.clamp(0.0, 1.0) * 255.0).round() as u8,
        ]
    }

    /// Same color with its alpha multiplied by `opacity`.
    #[inline]
    pub fn with_opacity(self, opacity: f32) -> Self {
        Self {
            a: self.a * opacity.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Whether the color contributes nothing when drawn.
    #[inline]
    pub fn is_transparent(self) -> bool {
        self.a <= 0.0
    }

    /// Parse a CSS color: `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`,
    /// `rgb()`/`rgba()`, `hsl()`/`hsla()`, or a named color.
    pub fn parse_css(input: &str) -> Result<Self> {
        let s = input.trim().to_ascii_lowercase();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| invalid(input));
        }
        if let Some(args) = function_args(&s, &["rgba", "rgb"]) {
            return parse_rgb_args(args).ok_or_else(|| invalid(input));
        }
        if let Some(args) = function_args(&s, &["hsla", "hsl"]) {
            return parse_hsl_args(args).ok_or_else(|| invalid(input));
        }
        named(&s).ok_or_else(|| invalid(input))
    }

    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const RED: Self = Self::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Self = Self::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Self = Self::new(0.0, 0.0, 1.0, 1.0);
}

fn invalid(input: &str) -> CutframeError {
    CutframeError::Parse(format!("invalid color: {input:?}"))
}

/// Returns the argument list of `name(...)` for the first matching name.
fn function_args<'a>(s: &'a str, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| {
        s.strip_prefix(name)
            .map(str::trim_start)
            .and_then(|rest| rest.strip_prefix('('))
            .and_then(|rest| rest.strip_suffix(')'))
    })
}

fn parse_hex(hex: &str) -> Option<Color> {
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        3 => Some(Color::from_rgba8(nibble(0)?, nibble(1)?, nibble(2)?, 255)),
        4 => Some(Color::from_rgba8(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
        6 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, 255)),
        8 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

/// Splits `a, b, c` / `a b c / d` argument lists.
fn split_args(args: &str) -> Vec<&str> {
    args.split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect()
}

fn parse_channel(part: &str) -> Option<f32> {
    if let Some(pct) = part.strip_suffix('%') {
        pct.parse::<f32>().ok().map(|v| (v / 100.0).clamp(0.0, 1.0))
    } else {
        part.parse::<f32>().ok().map(|v| (v / 255.0).clamp(0.0, 1.0))
    }
}

fn parse_alpha(part: &str) -> Option<f32> {
    if let Some(pct) = part.strip_suffix('%') {
        pct.parse::<f32>().ok().map(|v| (v / 100.0).clamp(0.0, 1.0))
    } else {
        part.parse::<f32>().ok().map(|v| v.clamp(0.0, 1.0))
    }
}

fn parse_rgb_args(args: &str) -> Option<Color> {
    let parts = split_args(args);
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let a = match parts.get(3) {
        Some(part) => parse_alpha(part)?,
        None => 1.0,
    };
    Some(Color::new(
        parse_channel(parts[0])?,
        parse_channel(parts[1])?,
        parse_channel(parts[2])?,
        a,
    ))
}

fn parse_hsl_args(args: &str) -> Option<Color> {
    let parts = split_args(args);
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let h = parts[0].trim_end_matches("deg").parse::<f32>().ok()?;
    let s = parts[1].strip_suffix('%')?.parse::<f32>().ok()? / 100.0;
    let l = parts[2].strip_suffix('%')?.parse::<f32>().ok()? / 100.0;
    let a = match parts.get(3) {
        Some(part) => parse_alpha(part)?,
        None => 1.0,
    };

    let h = h.rem_euclid(360.0) / 360.0;
    let (s, l) = (s.clamp(0.0, 1.0), l.clamp(0.0, 1.0));
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let hue = |mut t: f32| {
        t = t.rem_euclid(1.0);
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    };
    Some(Color::new(
        hue(h + 1.0 / 3.0),
        hue(h),
        hue(h - 1.0 / 3.0),
        a,
    ))
}

fn named(name: &str) -> Option<Color> {
    let rgb = |r, g, b| Some(Color::from_rgba8(r, g, b, 255));
    match name {
        "transparent" => Some(Color::TRANSPARENT),
        "black" => rgb(0, 0, 0),
        "white" => rgb(255, 255, 255),
        "red" => rgb(255, 0, 0),
        "green" => rgb(0, 128, 0),
        "lime" => rgb(0, 255, 0),
        "blue" => rgb(0, 0, 255),
        "yellow" => rgb(255, 255, 0),
        "cyan" | "aqua" => rgb(0, 255, 255),
        "magenta" | "fuchsia" => rgb(255, 0, 255),
        "gray" | "grey" => rgb(128, 128, 128),
        "silver" => rgb(192, 192, 192),
        "orange" => rgb(255, 165, 0),
        "purple" => rgb(128, 0, 128),
        "pink" => rgb(255, 192, 203),
        "navy" => rgb(0, 0, 128),
        "teal" => rgb(0, 128, 128),
        "maroon" => rgb(128, 0, 0),
        "olive" => rgb(128, 128, 0),
        _ => None,
    }
}
