//! Fallback color handling for texture slots.
//!
//! Upload forms deliver colors as CSS `rgba(r, g, b, a)` strings in gamma
//! encoded sRGB. usdzconvert expects linear values, either as a `r,g,b` triple
//! or as a single luminance value depending on the map type.

use std::sync::LazyLock;

use regex::Regex;

use crate::job::MapType;

static RE_RGBA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*rgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*(?:,\s*([0-9.]+)\s*)?\)\s*$")
        .unwrap()
});

/// How a map type consumes its fallback color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorKind {
    Rgb,
    Xyz,
    Lum,
}

impl ColorKind {
    pub fn for_map_type(map_type: MapType) -> Self {
        match map_type {
            MapType::DiffuseColor | MapType::EmissiveColor => ColorKind::Rgb,
            MapType::Normal => ColorKind::Xyz,
            MapType::Metallic
            | MapType::Roughness
            | MapType::Occlusion
            | MapType::Opacity
            | MapType::Clearcoat
            | MapType::ClearcoatRoughness => ColorKind::Lum,
        }
    }
}

/// An 8-bit sRGB color as entered in the upload form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    /// Parses `rgba(r, g, b, a)` or `rgb(r, g, b)`.
    ///
    /// Returns `None` for empty or malformed input, including channels above
    /// 255.
    pub fn parse(input: &str) -> Option<Self> {
        let caps = RE_RGBA.captures(input)?;
        let channel = |i: usize| caps.get(i)?.as_str().parse::<u8>().ok();
        let a = match caps.get(4) {
            Some(m) => m.as_str().parse::<f32>().ok()?,
            None => 1.0,
        };
        Some(Self {
            r: channel(1)?,
            g: channel(2)?,
            b: channel(3)?,
            a,
        })
    }

    pub fn to_linear(&self) -> [f64; 3] {
        [
            srgb_to_linear(f64::from(self.r) / 255.0),
            srgb_to_linear(f64::from(self.g) / 255.0),
            srgb_to_linear(f64::from(self.b) / 255.0),
        ]
    }

    /// Rec. 709 relative luminance of the linearized color.
    pub fn luminance(&self) -> f64 {
        let [r, g, b] = self.to_linear();
        0.2126 * r + 0.7152 * g + 0.0722 * b
    }
}

/// Converts one normalized gamma encoded sRGB channel to linear.
pub fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Builds the usdzconvert color argument for a map type.
///
/// Returns `None` when `rgba` is empty or cannot be parsed, in which case no
/// argument is emitted.
pub fn color_argument(map_type: MapType, rgba: &str) -> Option<String> {
    if rgba.trim().is_empty() {
        return None;
    }
    let color = Rgba::parse(rgba)?;

    match ColorKind::for_map_type(map_type) {
        ColorKind::Rgb | ColorKind::Xyz => {
            let [r, g, b] = color.to_linear();
            Some(format!("{},{},{}", r, g, b))
        }
        ColorKind::Lum => Some(color.luminance().to_string()),
    }
}
